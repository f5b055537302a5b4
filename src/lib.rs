//! # framegrab
//!
//! Sample still frames from video files and capture devices, either at a
//! fixed time interval or as a fixed number of evenly spaced frames, and
//! write them to a directory as JPEG or PNG images.
//!
//! Decoding is powered by FFmpeg via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next); encoding by the
//! [`image`](https://crates.io/crates/image) crate.
//!
//! ## Quick Start
//!
//! ### Ten evenly spaced frames from a file
//!
//! ```no_run
//! use framegrab::{
//!     ExtractOptions, ExtractionEngine, ExtractionRequest, FfmpegSource, SamplingConfig,
//!     SourceDescriptor,
//! };
//!
//! let engine = ExtractionEngine::new(FfmpegSource::new());
//! let request = ExtractionRequest::new(
//!     SourceDescriptor::file("input.mp4"),
//!     "frames",
//!     SamplingConfig::by_count(10)?,
//! );
//! let report = engine.run(&request, &ExtractOptions::new());
//! println!("{}", report.outcome);
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```
//!
//! ### One frame every two seconds from a camera, in the background
//!
//! ```no_run
//! use std::{sync::Arc, thread, time::Duration};
//!
//! use framegrab::{
//!     ExtractOptions, ExtractionEngine, ExtractionRequest, ExtractionWorker, FfmpegSource,
//!     ImageFormat, SamplingConfig, SourceDescriptor,
//! };
//!
//! let engine = Arc::new(ExtractionEngine::new(FfmpegSource::new()));
//! let request = ExtractionRequest::new(
//!     SourceDescriptor::camera(0),
//!     "captures",
//!     SamplingConfig::by_interval_seconds(2.0)?,
//! )
//! .with_format(ImageFormat::Png);
//!
//! let handle = ExtractionWorker::spawn(engine, request, ExtractOptions::new())?;
//! thread::sleep(Duration::from_secs(10));
//! handle.cancel();
//! let report = handle.join()?;
//! println!("{} frame(s) saved", report.frames_saved());
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```
//!
//! ## Sampling
//!
//! - **By interval** on a file: every `round(fps * interval)`-th frame.
//! - **By count** on a file: `N` frames at `floor(i * frame_count / N)`,
//!   clamped to the frame count.
//! - **By interval** on a camera: wall-clock pacing, one frame each time
//!   another interval has elapsed.
//! - **By count** on a camera: manual capture, one frame per
//!   [`CaptureControl::capture`] trigger until `N` are saved.
//!
//! Output files are named `frame_{index:04}_{H-MM-SS}.{ext}` (manual
//! captures: `frame_{index:04}.{ext}`).
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`extract_async`] runs an extraction on Tokio's blocking pool |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries (including libavdevice for camera capture)
//! must be installed on your system.

pub mod capture;
pub mod codec;
pub mod configuration;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod media_source;
pub mod metadata;
pub mod progress;
pub mod sampling;
pub mod source;
#[cfg(feature = "async")]
pub mod stream;
mod utilities;
pub mod worker;

pub use capture::{FfmpegSession, FfmpegSource};
pub use codec::{DEFAULT_JPEG_QUALITY, FrameCodec, ImageFormat};
pub use configuration::{ExtractOptions, FrameOutputOptions};
pub use engine::{
    EngineState, ExtractionEngine, ExtractionOutcome, ExtractionReport, ExtractionRequest,
    SkippedFrame,
};
pub use error::FrameGrabError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use media_source::{
    CameraDevice, DEFAULT_CAMERA_PROBE_LIMIT, DeviceClaim, Frame, MediaSession, MediaSource,
    claim_device, probe_cameras,
};
pub use metadata::{
    MIN_RELIABLE_FRAMES_PER_SECOND, MediaInfo, NOMINAL_CAMERA_FRAMES_PER_SECOND, format_clock,
};
pub use progress::{
    CancellationToken, CaptureCommand, CaptureControl, ExtractionWarning, FrameObserver,
    ProgressCallback, ProgressInfo, StatusEvent,
};
pub use sampling::{
    ExtractionPlan, IntervalPacer, PlanStep, SamplingConfig, SeekTarget, frame_interval,
    manual_file_name, plan_by_count, plan_by_interval, timed_file_name,
};
pub use source::SourceDescriptor;
#[cfg(feature = "async")]
pub use stream::{ExtractionFuture, extract_async};
pub use worker::{ExtractionHandle, ExtractionWorker};
