//! Error types for the `framegrab` crate.
//!
//! This module defines [`FrameGrabError`], the unified error type returned by
//! all fallible operations in the crate. Errors name the resource that failed
//! (a file path, a camera index, an output file) so a caller can surface them
//! to a user without additional context.
//!
//! Conditions that the extraction engine treats as normal termination or as
//! warnings (end of stream, a camera disconnecting, unreliable frame-rate
//! metadata) are deliberately absent here; see
//! [`ExtractionWarning`](crate::ExtractionWarning).

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `framegrab` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameGrabError {
    /// The file or capture device could not be opened.
    #[error("Failed to open {descriptor}: {reason}")]
    SourceUnavailable {
        /// Human-readable source description (path or `camera N`).
        descriptor: String,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// A frame could not be written to disk.
    #[error("Failed to write frame to {path}: {reason}")]
    EncodeError {
        /// Destination that could not be written.
        path: PathBuf,
        /// Underlying reason the encode failed.
        reason: String,
    },

    /// A sampling interval that is zero, negative, or not finite.
    #[error("Sampling interval must be greater than zero")]
    InvalidInterval,

    /// A target frame count of zero.
    #[error("Target frame count must be at least 1")]
    InvalidTargetCount,

    /// The requested output image format is not supported.
    #[error("Unsupported image format: {0} (expected jpg or png)")]
    UnsupportedImageFormat(String),

    /// An FFmpeg log level name that is not recognised.
    #[error("Unknown FFmpeg log level: {0}")]
    InvalidLogLevel(String),

    /// The output directory could not be created.
    #[error("Failed to prepare output directory {path}: {reason}")]
    OutputDirectory {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Another extraction is already running on this engine.
    #[error("An extraction is already running on this engine")]
    ExtractionInProgress,

    /// The background extraction thread panicked.
    #[error("Extraction worker panicked")]
    WorkerPanicked,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<FfmpegError> for FrameGrabError {
    fn from(error: FfmpegError) -> Self {
        FrameGrabError::FfmpegError(error.to_string())
    }
}
