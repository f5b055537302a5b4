//! Extraction options.
//!
//! [`ExtractOptions`] is a builder that threads progress callbacks,
//! cancellation, capture triggers, and encoding settings through an
//! extraction run without widening every signature.
//!
//! # Example
//!
//! ```
//! use framegrab::{CancellationToken, ExtractOptions};
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_cancellation(token.clone())
//!     .with_jpeg_quality(85)
//!     .with_read_retries(2)
//!     .with_batch_size(10);
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use crate::{
    codec::{DEFAULT_JPEG_QUALITY, FrameCodec},
    progress::{CancellationToken, CaptureControl, FrameObserver, NoOpProgress, ProgressCallback},
};

/// Output resolution for decoded frames.
///
/// With no dimensions set the source resolution is kept. Setting one
/// dimension with [`maintain_aspect_ratio`](FrameOutputOptions::maintain_aspect_ratio)
/// computes the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutputOptions {
    /// Target width. `None` keeps the source width.
    pub width: Option<u32>,
    /// Target height. `None` keeps the source height.
    pub height: Option<u32>,
    /// Preserve the source aspect ratio when only one dimension is given.
    pub maintain_aspect_ratio: bool,
}

impl Default for FrameOutputOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            maintain_aspect_ratio: true,
        }
    }
}

impl FrameOutputOptions {
    /// Resolve the final `(width, height)` for a source of the given size.
    pub fn resolve_dimensions(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w.max(1), h.max(1)),
            (Some(w), None) if self.maintain_aspect_ratio && source_width > 0 => {
                let ratio = w as f64 / source_width as f64;
                let h = (source_height as f64 * ratio).round() as u32;
                (w.max(1), h.max(1))
            }
            (Some(w), None) => (w.max(1), source_height),
            (None, Some(h)) if self.maintain_aspect_ratio && source_height > 0 => {
                let ratio = h as f64 / source_height as f64;
                let w = (source_width as f64 * ratio).round() as u32;
                (w.max(1), h.max(1))
            }
            (None, Some(h)) => (source_width, h.max(1)),
            (None, None) => (source_width, source_height),
        }
    }
}

/// Options for one extraction run.
///
/// Defaults: no progress callback, no cancellation, batch size 1, JPEG
/// quality 95, one read retry.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) capture_control: Option<CaptureControl>,
    pub(crate) frame_observer: Option<Arc<dyn FrameObserver>>,
    pub(crate) batch_size: u64,
    pub(crate) jpeg_quality: u8,
    pub(crate) read_retries: u32,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("has_capture_control", &self.capture_control.is_some())
            .field("has_frame_observer", &self.frame_observer.is_some())
            .field("batch_size", &self.batch_size)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("read_retries", &self.read_retries)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            capture_control: None,
            frame_observer: None,
            batch_size: 1,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            read_retries: 1,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// A cancelled run ends as
    /// [`ExtractionOutcome::Cancelled`](crate::ExtractionOutcome::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Attach the trigger queue for manual camera capture.
    ///
    /// Without one, a manual capture run saves nothing and only ends on
    /// cancellation or disconnect.
    #[must_use]
    pub fn with_capture_control(mut self, control: CaptureControl) -> Self {
        self.capture_control = Some(control);
        self
    }

    /// Observe each live frame during manual capture.
    #[must_use]
    pub fn with_frame_observer(mut self, observer: Arc<dyn FrameObserver>) -> Self {
        self.frame_observer = Some(observer);
        self
    }

    /// Fire the progress callback every `size` frames. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// JPEG quality, clamped to `1..=100`.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// How many times a failed file read is retried (re-seek and re-read)
    /// before the frame is skipped.
    #[must_use]
    pub fn with_read_retries(mut self, retries: u32) -> Self {
        self.read_retries = retries;
        self
    }

    /// The cancellation token, if one is attached.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// The capture trigger queue, if one is attached.
    pub fn capture_control(&self) -> Option<&CaptureControl> {
        self.capture_control.as_ref()
    }

    pub(crate) fn codec(&self) -> FrameCodec {
        FrameCodec::new(self.jpeg_quality)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
