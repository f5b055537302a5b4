//! Progress reporting, status events, and cooperative control.
//!
//! This module provides [`ProgressCallback`] for monitoring an extraction
//! run, [`CancellationToken`] for cooperative cancellation, and
//! [`CaptureControl`] for driving manual camera capture from another thread.
//!
//! The extraction loop is the only writer of progress; callbacks observe it.
//! Cancellation and capture triggers flow the other way and are only looked
//! at between frames, never in the middle of a decode or an encode.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framegrab::{
//!     CancellationToken, ExtractOptions, ProgressCallback, ProgressInfo, StatusEvent,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:.1}% ({} saved)", info.fraction * 100.0, info.frames_saved);
//!     }
//!
//!     fn on_status(&self, event: &StatusEvent) {
//!         println!("{event}");
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_cancellation(token.clone());
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::media_source::Frame;

/// A snapshot of run progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    /// Frames attempted so far, saved or skipped.
    pub current: u64,
    /// Frames written to disk so far.
    pub frames_saved: u64,
    /// Total frames expected, when known ahead of time.
    pub total: Option<u64>,
    /// Completion in `[0, 1]`. Never decreases within a run.
    pub fraction: f64,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
    /// Estimated time remaining, when `total` is known.
    pub estimated_remaining: Option<Duration>,
    /// Position of the frame just processed, when known.
    pub current_frame: Option<u64>,
    /// Timestamp of the frame just processed, when known.
    pub current_timestamp: Option<Duration>,
}

/// Non-fatal conditions reported during a run.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ExtractionWarning {
    /// More frames were requested than the source has.
    TargetClamped {
        /// Frames requested.
        requested: u64,
        /// Frames the source reports.
        available: u64,
    },
    /// The source's frame rate is unusable; a nominal rate is assumed for
    /// labels and wall-clock pacing is used.
    UnreliableFrameRate {
        /// Rate the source reported.
        reported: f64,
        /// Rate assumed instead.
        assumed: f64,
    },
    /// The source reports no frame count, so frames are read sequentially.
    UnknownFrameCount,
    /// A live source stopped producing frames before the run's own stop
    /// condition.
    CameraDisconnected {
        /// Frames saved before the disconnect.
        frames_saved: u64,
    },
}

impl Display for ExtractionWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ExtractionWarning::TargetClamped {
                requested,
                available,
            } => write!(
                f,
                "Video has fewer frames than requested ({requested}). Extracting all {available} frames."
            ),
            ExtractionWarning::UnreliableFrameRate { reported, assumed } => write!(
                f,
                "Reported frame rate {reported:.2} is unreliable; using estimated frame rate: {assumed} fps"
            ),
            ExtractionWarning::UnknownFrameCount => {
                f.write_str("Source does not report a frame count")
            }
            ExtractionWarning::CameraDisconnected { frames_saved } => write!(
                f,
                "Camera stopped delivering frames after {frames_saved} saved frame(s)"
            ),
        }
    }
}

/// A status message for the controlling context.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum StatusEvent {
    /// Informational message.
    Message(String),
    /// A non-fatal condition.
    Warning(ExtractionWarning),
    /// A frame was written.
    FrameSaved {
        /// Step or capture number.
        index: u64,
        /// Path of the written file.
        path: PathBuf,
    },
    /// A frame could not be read or written; the run continues.
    FrameSkipped {
        /// Step or capture number.
        index: u64,
        /// Why it was skipped.
        reason: String,
    },
}

impl Display for StatusEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StatusEvent::Message(message) => f.write_str(message),
            StatusEvent::Warning(warning) => write!(f, "Warning: {warning}"),
            StatusEvent::FrameSaved { index, path } => {
                write!(f, "Saved frame #{index}: {}", path.display())
            }
            StatusEvent::FrameSkipped { index, reason } => {
                write!(f, "Skipped frame #{index}: {reason}")
            }
        }
    }
}

/// Receives progress updates and status events during extraction.
///
/// Implementations must be [`Send`] and [`Sync`] because callbacks are
/// invoked from the extraction worker thread.
///
/// Callbacks are infallible: they observe but cannot halt the run. Use
/// [`CancellationToken`] to stop it.
pub trait ProgressCallback: Send + Sync {
    /// Called after frames are processed, at the configured batch cadence.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called for each status event. Ignored by default.
    fn on_status(&self, _event: &StatusEvent) {}
}

/// A no-op implementation, used when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Receives every live frame during manual capture, e.g. to drive a preview.
pub trait FrameObserver: Send + Sync {
    /// Called with each decoded frame and the capture tally so far.
    fn on_frame(&self, frame: &Frame, captured: u64, target: u64);
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone it and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any of them. The extraction
/// loop checks it before encoding each frame, so a cancelled run never
/// leaves a partially written file.
///
/// # Example
///
/// ```
/// use framegrab::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A trigger for manual camera capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    /// Save the next live frame.
    Capture,
    /// End the capture session.
    Stop,
}

/// Channel of [`CaptureCommand`]s from a controller to the capture loop.
///
/// Clones share one queue. Each queued [`Capture`](CaptureCommand::Capture)
/// saves one distinct frame.
///
/// # Example
///
/// ```
/// use framegrab::CaptureControl;
///
/// let control = CaptureControl::new();
/// control.capture();
/// control.stop();
/// ```
#[derive(Debug, Clone)]
pub struct CaptureControl {
    sender: Sender<CaptureCommand>,
    receiver: Receiver<CaptureCommand>,
}

impl CaptureControl {
    /// Create an empty command queue.
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// Request one capture.
    pub fn capture(&self) {
        let _ = self.sender.send(CaptureCommand::Capture);
    }

    /// Request the capture session to end.
    pub fn stop(&self) {
        let _ = self.sender.send(CaptureCommand::Stop);
    }

    /// Take the next pending command, if any.
    pub(crate) fn try_next(&self) -> Option<CaptureCommand> {
        match self.receiver.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Default for CaptureControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks progress for one run and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    current: u64,
    frames_saved: u64,
    fraction: f64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, batch_size: u64) -> Self {
        Self {
            callback,
            total: None,
            current: 0,
            frames_saved: 0,
            fraction: 0.0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    pub(crate) fn set_total(&mut self, total: Option<u64>) {
        self.total = total;
    }

    pub(crate) fn frames_saved(&self) -> u64 {
        self.frames_saved
    }

    pub(crate) fn fraction(&self) -> f64 {
        self.fraction
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Record one attempted frame. `fraction` is clamped to `[0, 1]` and
    /// never allowed to go below the last reported value.
    pub(crate) fn record(
        &mut self,
        saved: bool,
        fraction: f64,
        frame_number: Option<u64>,
        timestamp: Option<Duration>,
    ) {
        self.current += 1;
        if saved {
            self.frames_saved += 1;
        }
        if fraction.is_finite() {
            self.fraction = fraction.clamp(0.0, 1.0).max(self.fraction);
        }

        self.items_since_last_report += 1;
        if self.items_since_last_report >= self.batch_size {
            self.report(frame_number, timestamp);
            self.items_since_last_report = 0;
        }
    }

    /// Mark the run complete (fraction 1.0) and emit a final report.
    pub(crate) fn complete(&mut self) {
        self.fraction = 1.0;
        self.report(None, None);
    }

    /// Emit a final report without changing the fraction.
    pub(crate) fn finish(&mut self) {
        self.report(None, None);
    }

    pub(crate) fn status(&self, event: StatusEvent) {
        log::debug!("{event}");
        self.callback.on_status(&event);
    }

    fn report(&self, frame_number: Option<u64>, timestamp: Option<Duration>) {
        let elapsed = self.start_time.elapsed();

        let estimated_remaining = match self.total {
            Some(total) if self.current > 0 => {
                let remaining = total.saturating_sub(self.current);
                Some(elapsed.mul_f64(remaining as f64 / self.current as f64))
            }
            _ => None,
        };

        let info = ProgressInfo {
            current: self.current,
            frames_saved: self.frames_saved,
            total: self.total,
            fraction: self.fraction,
            elapsed,
            estimated_remaining,
            current_frame: frame_number,
            current_timestamp: timestamp,
        };

        self.callback.on_progress(&info);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        fractions: Mutex<Vec<f64>>,
    }

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.fractions.lock().unwrap().push(info.fraction);
        }
    }

    #[test]
    fn fraction_never_decreases_and_saturates() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker = ProgressTracker::new(recorder.clone(), 1);
        tracker.record(true, 0.5, None, None);
        tracker.record(true, 0.25, None, None);
        tracker.record(false, f64::NAN, None, None);
        tracker.record(true, 3.0, None, None);

        assert_eq!(*recorder.fractions.lock().unwrap(), vec![0.5, 0.5, 0.5, 1.0]);
        assert_eq!(tracker.frames_saved(), 3);
    }

    #[test]
    fn batch_size_throttles_reports() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker = ProgressTracker::new(recorder.clone(), 3);
        for step in 1..=7 {
            tracker.record(true, step as f64 / 7.0, Some(step), None);
        }
        assert_eq!(recorder.fractions.lock().unwrap().len(), 2);
        tracker.complete();
        assert_eq!(recorder.fractions.lock().unwrap().last(), Some(&1.0));
    }

    #[test]
    fn capture_commands_are_fifo() {
        let control = CaptureControl::new();
        let clone = control.clone();
        clone.capture();
        clone.stop();
        assert_eq!(control.try_next(), Some(CaptureCommand::Capture));
        assert_eq!(control.try_next(), Some(CaptureCommand::Stop));
        assert_eq!(control.try_next(), None);
    }
}
