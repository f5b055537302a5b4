//! Background extraction runs.
//!
//! [`ExtractionWorker::spawn`] runs an [`ExtractionEngine`] on a dedicated
//! thread and returns an [`ExtractionHandle`] for the controlling context.
//! The handle is how a UI or CLI stays responsive during a run: it can
//! cancel, trigger manual captures, read progress without locking, and
//! receive status events over a channel.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framegrab::{
//!     ExtractOptions, ExtractionEngine, ExtractionRequest, ExtractionWorker, FfmpegSource,
//!     SamplingConfig, SourceDescriptor,
//! };
//!
//! let engine = Arc::new(ExtractionEngine::new(FfmpegSource::new()));
//! let request = ExtractionRequest::new(
//!     SourceDescriptor::file("input.mp4"),
//!     "frames",
//!     SamplingConfig::by_interval_seconds(2.0)?,
//! );
//!
//! let handle = ExtractionWorker::spawn(engine, request, ExtractOptions::new())?;
//! for event in handle.events() {
//!     println!("{event} ({:.0}%)", handle.progress() * 100.0);
//! }
//! let report = handle.join()?;
//! println!("{}", report.outcome);
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    configuration::ExtractOptions,
    engine::{ExtractionEngine, ExtractionReport, ExtractionRequest},
    error::FrameGrabError,
    media_source::MediaSource,
    progress::{CancellationToken, CaptureControl, ProgressCallback, ProgressInfo, StatusEvent},
};

const WORKER_THREAD_NAME: &str = "framegrab-extraction";

/// Progress counters shared between the worker and its handle.
#[derive(Debug, Default)]
struct SharedProgress {
    fraction_bits: AtomicU64,
    frames_saved: AtomicU64,
}

/// Mirrors progress into [`SharedProgress`] and status events into a channel
/// before passing both on to the caller's own callback.
struct ForwardingProgress {
    inner: Arc<dyn ProgressCallback>,
    shared: Arc<SharedProgress>,
    events: Sender<StatusEvent>,
}

impl ProgressCallback for ForwardingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.shared
            .fraction_bits
            .store(info.fraction.to_bits(), Ordering::Release);
        self.shared
            .frames_saved
            .store(info.frames_saved, Ordering::Release);
        self.inner.on_progress(info);
    }

    fn on_status(&self, event: &StatusEvent) {
        // The handle may already have been dropped.
        let _ = self.events.send(event.clone());
        self.inner.on_status(event);
    }
}

/// Spawns extraction runs on a dedicated thread.
pub struct ExtractionWorker;

impl ExtractionWorker {
    /// Start `request` on a new thread.
    ///
    /// A cancellation token and a capture queue are attached to `options`
    /// when absent, so the returned handle can always cancel and capture.
    ///
    /// # Errors
    ///
    /// [`FrameGrabError::IoError`] if the thread cannot be spawned.
    pub fn spawn<S>(
        engine: Arc<ExtractionEngine<S>>,
        request: ExtractionRequest,
        options: ExtractOptions,
    ) -> Result<ExtractionHandle, FrameGrabError>
    where
        S: MediaSource + 'static,
    {
        let cancellation = options.cancellation().cloned().unwrap_or_default();
        let capture_control = options.capture_control().cloned().unwrap_or_default();
        let shared = Arc::new(SharedProgress::default());
        let (sender, events) = crossbeam_channel::unbounded();

        let forwarding = ForwardingProgress {
            inner: options.progress.clone(),
            shared: Arc::clone(&shared),
            events: sender,
        };
        let options = options
            .with_cancellation(cancellation.clone())
            .with_capture_control(capture_control.clone())
            .with_progress(Arc::new(forwarding));

        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || engine.run(&request, &options))?;

        log::debug!("Spawned extraction worker");

        Ok(ExtractionHandle {
            thread,
            cancellation,
            capture_control,
            shared,
            events,
        })
    }
}

/// Controls and observes a run started by [`ExtractionWorker::spawn`].
///
/// Dropping the handle detaches the thread; the run continues until its
/// own stop condition. Call [`cancel`](Self::cancel) first to stop it.
pub struct ExtractionHandle {
    thread: JoinHandle<ExtractionReport>,
    cancellation: CancellationToken,
    capture_control: CaptureControl,
    shared: Arc<SharedProgress>,
    events: Receiver<StatusEvent>,
}

impl ExtractionHandle {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Queue one manual capture.
    pub fn capture(&self) {
        self.capture_control.capture();
    }

    /// End a manual capture session.
    pub fn stop_capture(&self) {
        self.capture_control.stop();
    }

    /// The token this run observes.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The manual capture queue this run reads.
    pub fn capture_control(&self) -> &CaptureControl {
        &self.capture_control
    }

    /// Last reported progress fraction in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.shared.fraction_bits.load(Ordering::Acquire))
    }

    /// Frames saved as of the last progress report.
    pub fn frames_saved(&self) -> u64 {
        self.shared.frames_saved.load(Ordering::Acquire)
    }

    /// Status events in emission order. Iterating blocks until the run ends
    /// and the channel closes.
    ///
    /// The channel is unbounded so the worker never blocks on a slow reader.
    /// Undrained events stay queued (one per saved or skipped frame) until
    /// the handle is dropped, so a long camera run should keep draining it,
    /// for example with [`Receiver::try_iter`] from a UI tick.
    pub fn events(&self) -> &Receiver<StatusEvent> {
        &self.events
    }

    /// Returns `true` once the worker thread has returned.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run to end.
    ///
    /// # Errors
    ///
    /// [`FrameGrabError::WorkerPanicked`] if the worker thread panicked.
    pub fn join(self) -> Result<ExtractionReport, FrameGrabError> {
        self.thread
            .join()
            .map_err(|_| FrameGrabError::WorkerPanicked)
    }
}
