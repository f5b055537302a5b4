//! The extraction engine.
//!
//! [`ExtractionEngine`] turns an [`ExtractionRequest`] into files on disk. A
//! run moves through `Idle -> Opening -> Running` and ends in exactly one of
//! `Completed`, `Cancelled`, or `Failed`:
//!
//! - **Opening** creates the output directory and opens the source. Any
//!   failure here is fatal and nothing is written.
//! - **Running** picks a policy from the sampling mode and the source:
//!   a precomputed plan for files (seek, read, encode per step), paced
//!   sampling for live or metadata-poor sources, or manual capture for count
//!   sampling on a camera.
//! - Cancellation is checked between frames and again right before each
//!   encode, so the number of files on disk always equals the saved count.
//! - The session is closed exactly once, whichever way the run ends.
//!
//! Per-frame failures (a read that keeps failing, an encode error) skip that
//! frame and the run continues. End of stream is a normal end, including a
//! camera that disconnects mid-run.
//!
//! # Example
//!
//! ```no_run
//! use framegrab::{
//!     ExtractOptions, ExtractionEngine, ExtractionRequest, FfmpegSource, ImageFormat,
//!     SamplingConfig, SourceDescriptor,
//! };
//!
//! let engine = ExtractionEngine::new(FfmpegSource::new());
//! let request = ExtractionRequest::new(
//!     SourceDescriptor::file("input.mp4"),
//!     "frames",
//!     SamplingConfig::by_count(10)?,
//! )
//! .with_format(ImageFormat::Png);
//!
//! let report = engine.run(&request, &ExtractOptions::new());
//! println!("{}", report.outcome);
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{
    codec::{FrameCodec, ImageFormat},
    configuration::ExtractOptions,
    error::FrameGrabError,
    media_source::{Frame, MediaSession, MediaSource},
    metadata::{MediaInfo, NOMINAL_CAMERA_FRAMES_PER_SECOND, format_clock},
    progress::{CaptureCommand, ExtractionWarning, ProgressTracker, StatusEvent},
    sampling::{
        IntervalPacer, PlanStep, SamplingConfig, manual_file_name, plan_by_count,
        plan_by_interval,
    },
    source::SourceDescriptor,
};

/// Saved frames at which paced progress reaches one half.
const PACED_PROGRESS_HALF_POINT: f64 = 10.0;

/// What to extract and where to put it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    /// Source to open.
    pub source: SourceDescriptor,
    /// Directory receiving the image files. Created if missing.
    pub output_directory: PathBuf,
    /// Sampling policy.
    pub sampling: SamplingConfig,
    /// Output image format.
    pub format: ImageFormat,
}

impl ExtractionRequest {
    /// Create a request that writes JPEG files.
    pub fn new<P: AsRef<Path>>(
        source: SourceDescriptor,
        output_directory: P,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            source,
            output_directory: output_directory.as_ref().to_path_buf(),
            sampling,
            format: ImageFormat::default(),
        }
    }

    /// Set the output image format.
    #[must_use]
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }
}

/// Lifecycle state of an [`ExtractionEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No run has started yet.
    Idle,
    /// Preparing output and opening the source.
    Opening,
    /// Extracting frames.
    Running,
    /// The last run finished normally.
    Completed,
    /// The last run was cancelled.
    Cancelled,
    /// The last run failed.
    Failed,
}

impl EngineState {
    /// Returns `true` for `Completed`, `Cancelled`, and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EngineState::Completed | EngineState::Cancelled | EngineState::Failed
        )
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum ExtractionOutcome {
    /// The policy ran to its end (including end of stream or disconnect).
    Completed {
        /// Frames written.
        frames_saved: u64,
    },
    /// Cancelled through the [`CancellationToken`](crate::CancellationToken).
    Cancelled {
        /// Frames written before cancellation took effect.
        frames_saved: u64,
    },
    /// The run could not start or could not continue.
    Failed {
        /// Why.
        reason: FrameGrabError,
    },
}

impl ExtractionOutcome {
    /// Returns `true` for [`ExtractionOutcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, ExtractionOutcome::Completed { .. })
    }

    /// Returns `true` for [`ExtractionOutcome::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractionOutcome::Cancelled { .. })
    }

    /// Returns `true` for [`ExtractionOutcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, ExtractionOutcome::Failed { .. })
    }

    fn state(&self) -> EngineState {
        match self {
            ExtractionOutcome::Completed { .. } => EngineState::Completed,
            ExtractionOutcome::Cancelled { .. } => EngineState::Cancelled,
            ExtractionOutcome::Failed { .. } => EngineState::Failed,
        }
    }
}

impl Display for ExtractionOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ExtractionOutcome::Completed { frames_saved } => {
                write!(f, "Completed ({frames_saved} frame(s) saved)")
            }
            ExtractionOutcome::Cancelled { frames_saved } => {
                write!(f, "Cancelled ({frames_saved} frame(s) saved)")
            }
            ExtractionOutcome::Failed { reason } => write!(f, "Failed: {reason}"),
        }
    }
}

/// A frame that was attempted but not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFrame {
    /// Step or capture number. Failed sequential reads use the stream
    /// position instead.
    pub index: u64,
    /// Why it was skipped.
    pub reason: String,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct ExtractionReport {
    /// Terminal result.
    pub outcome: ExtractionOutcome,
    /// Files written, in order.
    pub saved_files: Vec<PathBuf>,
    /// Frames attempted but not written.
    pub skipped: Vec<SkippedFrame>,
    /// Non-fatal conditions encountered.
    pub warnings: Vec<ExtractionWarning>,
    /// Source metadata, when the source was opened.
    pub media_info: Option<MediaInfo>,
    /// Final progress fraction.
    pub progress: f64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl ExtractionReport {
    /// Number of files written.
    pub fn frames_saved(&self) -> u64 {
        self.saved_files.len() as u64
    }

    fn rejected(reason: FrameGrabError) -> Self {
        Self {
            outcome: ExtractionOutcome::Failed { reason },
            saved_files: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
            media_info: None,
            progress: 0.0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Orchestrates a [`MediaSource`], the sampling policies, and the
/// [`FrameCodec`] into cancellable, progress-reporting runs.
///
/// At most one run is active per engine; a concurrent [`run`](Self::run)
/// call is refused with [`FrameGrabError::ExtractionInProgress`]. Each run
/// opens its own session and owns it until the run ends.
pub struct ExtractionEngine<S: MediaSource> {
    source: S,
    active: AtomicBool,
    state: Mutex<EngineState>,
}

impl<S: MediaSource> ExtractionEngine<S> {
    /// Create an engine over `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            active: AtomicBool::new(false),
            state: Mutex::new(EngineState::Idle),
        }
    }

    /// The underlying media source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` while a run is in progress.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Execute one extraction run to a terminal state.
    ///
    /// Blocks the calling thread; see
    /// [`ExtractionWorker`](crate::ExtractionWorker) for a background run.
    pub fn run(&self, request: &ExtractionRequest, options: &ExtractOptions) -> ExtractionReport {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Refusing to start a second extraction on a busy engine");
            return ExtractionReport::rejected(FrameGrabError::ExtractionInProgress);
        }
        let _active = ActiveFlag(&self.active);

        log::info!(
            "Starting extraction from {} into {} ({:?}, {})",
            request.source,
            request.output_directory.display(),
            request.sampling,
            request.format
        );

        let mut run = Run::new(request, options);
        let outcome = match self.execute(&mut run) {
            Ok(Termination::Completed) => ExtractionOutcome::Completed {
                frames_saved: run.tracker.frames_saved(),
            },
            Ok(Termination::Cancelled) => ExtractionOutcome::Cancelled {
                frames_saved: run.tracker.frames_saved(),
            },
            Err(reason) => ExtractionOutcome::Failed { reason },
        };

        match &outcome {
            ExtractionOutcome::Completed { frames_saved } => {
                run.tracker.complete();
                run.tracker.status(StatusEvent::Message(format!(
                    "Extracted {frames_saved} frames to {}",
                    request.output_directory.display()
                )));
            }
            ExtractionOutcome::Cancelled { frames_saved } => {
                run.tracker.finish();
                run.tracker.status(StatusEvent::Message(format!(
                    "Extraction cancelled after {frames_saved} frames"
                )));
            }
            ExtractionOutcome::Failed { reason } => {
                log::error!("Extraction failed: {reason}");
                run.tracker.finish();
                run.tracker
                    .status(StatusEvent::Message(format!("Extraction failed: {reason}")));
            }
        }

        self.set_state(outcome.state());
        log::info!("Extraction finished: {outcome}");

        ExtractionReport {
            progress: run.tracker.fraction(),
            elapsed: run.tracker.elapsed(),
            outcome,
            saved_files: run.saved_files,
            skipped: run.skipped,
            warnings: run.warnings,
            media_info: run.media_info,
        }
    }

    fn execute(&self, run: &mut Run<'_>) -> Result<Termination, FrameGrabError> {
        self.set_state(EngineState::Opening);

        let request = run.request;
        request.sampling.validate()?;

        fs::create_dir_all(&request.output_directory).map_err(|error| {
            FrameGrabError::OutputDirectory {
                path: request.output_directory.clone(),
                reason: error.to_string(),
            }
        })?;

        let mut session = SessionGuard::new(self.source.open(&request.source)?);
        self.set_state(EngineState::Running);

        let info = session.info().clone();
        run.media_info = Some(info.clone());

        let termination = match request.sampling {
            SamplingConfig::ByCount { target_count } if session.is_live() => {
                run.manual_capture(&mut *session, target_count)
            }
            SamplingConfig::ByCount { target_count } => {
                let plan = plan_by_count(&info, target_count, request.format)?;
                let duration = info.duration().unwrap_or_default();
                run.tracker.status(StatusEvent::Message(format!(
                    "Extracting {} evenly spaced frames from {} video with {} frames",
                    plan.len(),
                    format_clock(duration, ':'),
                    info.frame_count
                )));
                let frame_count = plan.frame_count();
                let (steps, warnings) = plan.into_parts();
                warnings.into_iter().for_each(|warning| run.warn(warning));
                run.run_plan(&mut *session, steps, frame_count)
            }
            SamplingConfig::ByInterval { interval } => {
                run.tracker.status(StatusEvent::Message(format!(
                    "Extracting frames ({:.2}s interval)",
                    interval.as_secs_f64()
                )));
                if session.is_live() {
                    if !info.has_reliable_frame_rate() {
                        run.warn(ExtractionWarning::UnreliableFrameRate {
                            reported: info.frames_per_second,
                            assumed: NOMINAL_CAMERA_FRAMES_PER_SECOND,
                        });
                    }
                    run.run_paced(&mut *session, interval, PacingClock::WallClock)?
                } else {
                    let plan = plan_by_interval(&info, interval, request.format)?;
                    let frame_count = plan.frame_count();
                    let (steps, warnings) = plan.into_parts();
                    let clock = if !info.has_reliable_frame_rate() {
                        Some(PacingClock::WallClock)
                    } else if !info.has_frame_count() {
                        Some(PacingClock::MediaTime {
                            frames_per_second: info.frames_per_second,
                        })
                    } else {
                        None
                    };
                    warnings.into_iter().for_each(|warning| run.warn(warning));

                    match clock {
                        Some(clock) => run.run_paced(&mut *session, interval, clock)?,
                        None => run.run_plan(&mut *session, steps, frame_count),
                    }
                }
            }
        };

        session.release();
        Ok(termination)
    }
}

enum Termination {
    Completed,
    Cancelled,
}

/// What paced sampling measures elapsed time against.
#[derive(Debug, Clone, Copy)]
enum PacingClock {
    /// Time since the run started.
    WallClock,
    /// Position of the decoded frame divided by the frame rate.
    MediaTime { frames_per_second: f64 },
}

/// Mutable state of one run.
struct Run<'a> {
    request: &'a ExtractionRequest,
    options: &'a ExtractOptions,
    codec: FrameCodec,
    tracker: ProgressTracker,
    saved_files: Vec<PathBuf>,
    skipped: Vec<SkippedFrame>,
    warnings: Vec<ExtractionWarning>,
    media_info: Option<MediaInfo>,
}

impl<'a> Run<'a> {
    fn new(request: &'a ExtractionRequest, options: &'a ExtractOptions) -> Self {
        Self {
            request,
            options,
            codec: options.codec(),
            tracker: ProgressTracker::new(options.progress.clone(), options.batch_size),
            saved_files: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
            media_info: None,
        }
    }

    fn warn(&mut self, warning: ExtractionWarning) {
        log::warn!("{warning}");
        self.tracker.status(StatusEvent::Warning(warning.clone()));
        self.warnings.push(warning);
    }

    fn skip(&mut self, index: u64, reason: String) {
        log::warn!("Skipping frame #{index}: {reason}");
        self.tracker.status(StatusEvent::FrameSkipped {
            index,
            reason: reason.clone(),
        });
        self.skipped.push(SkippedFrame { index, reason });
    }

    /// Encode `frame` as `file_name`. Returns `true` when the file was written.
    fn write_frame(&mut self, index: u64, file_name: &str, frame: &Frame) -> bool {
        let path = self.request.output_directory.join(file_name);
        match self.codec.encode(&frame.image, self.request.format, &path) {
            Ok(()) => {
                self.tracker.status(StatusEvent::FrameSaved {
                    index,
                    path: path.clone(),
                });
                self.saved_files.push(path);
                true
            }
            Err(error) => {
                self.skip(index, error.to_string());
                false
            }
        }
    }

    /// Seek to `position` and read, retrying the pair on error.
    fn read_at<T: MediaSession + ?Sized>(
        &self,
        session: &mut T,
        position: u64,
    ) -> Result<Option<Frame>, FrameGrabError> {
        let mut attempt = 0;
        loop {
            let result = session.seek(position).and_then(|()| session.read_next());
            match result {
                Err(error) if attempt < self.options.read_retries => {
                    attempt += 1;
                    log::debug!("Read of frame {position} failed ({error}); retry {attempt}");
                }
                result => return result,
            }
        }
    }

    fn run_plan<T: MediaSession + ?Sized>(
        &mut self,
        session: &mut T,
        steps: Vec<PlanStep>,
        frame_count: u64,
    ) -> Termination {
        self.tracker.set_total(Some(steps.len() as u64));
        let fraction_at = |position: u64| {
            if frame_count == 0 {
                0.0
            } else {
                (position + 1) as f64 / frame_count as f64
            }
        };

        for step in steps {
            if self.options.is_cancelled() {
                return Termination::Cancelled;
            }

            let position = step.frame_position().unwrap_or_default();
            let frame = match self.read_at(session, position) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::debug!(
                        "End of stream before frame {position}; stopping after {} step(s)",
                        step.index
                    );
                    return Termination::Completed;
                }
                Err(error) => {
                    self.skip(step.index, error.to_string());
                    self.tracker
                        .record(false, fraction_at(position), Some(position), None);
                    continue;
                }
            };

            if self.options.is_cancelled() {
                return Termination::Cancelled;
            }

            let saved = self.write_frame(step.index, &step.file_name, &frame);
            self.tracker.record(
                saved,
                fraction_at(position),
                Some(frame.position),
                frame.timestamp,
            );
        }

        Termination::Completed
    }

    fn run_paced<T: MediaSession + ?Sized>(
        &mut self,
        session: &mut T,
        interval: Duration,
        clock: PacingClock,
    ) -> Result<Termination, FrameGrabError> {
        self.tracker.set_total(None);
        let mut pacer = IntervalPacer::new(interval, self.request.format)?;
        let live = session.is_live();
        let started = Instant::now();
        let mut consecutive_failures = 0_u32;
        let mut next_position = 0_u64;
        let fraction = |saved: u64| saved as f64 / (saved as f64 + PACED_PROGRESS_HALF_POINT);

        loop {
            if self.options.is_cancelled() {
                return Ok(Termination::Cancelled);
            }

            let frame = match session.read_next() {
                Ok(Some(frame)) => {
                    consecutive_failures = 0;
                    next_position = frame.position + 1;
                    frame
                }
                Ok(None) => {
                    if live {
                        self.warn(ExtractionWarning::CameraDisconnected {
                            frames_saved: self.tracker.frames_saved(),
                        });
                    }
                    return Ok(Termination::Completed);
                }
                Err(error) if live => {
                    log::warn!("Camera read failed: {error}");
                    self.warn(ExtractionWarning::CameraDisconnected {
                        frames_saved: self.tracker.frames_saved(),
                    });
                    return Ok(Termination::Completed);
                }
                Err(error) => {
                    // Skipped reads are filed under their stream position.
                    let position = next_position;
                    next_position += 1;
                    consecutive_failures += 1;
                    self.skip(position, error.to_string());
                    self.tracker.record(
                        false,
                        fraction(self.tracker.frames_saved()),
                        Some(position),
                        None,
                    );
                    if consecutive_failures > self.options.read_retries {
                        return Ok(Termination::Completed);
                    }
                    continue;
                }
            };

            let elapsed = match clock {
                PacingClock::WallClock => started.elapsed(),
                PacingClock::MediaTime { frames_per_second } => {
                    Duration::try_from_secs_f64(frame.position as f64 / frames_per_second)
                        .unwrap_or_default()
                }
            };

            let Some(step) = pacer.poll(elapsed) else {
                continue;
            };

            if self.options.is_cancelled() {
                return Ok(Termination::Cancelled);
            }

            let saved = self.write_frame(step.index, &step.file_name, &frame);
            let saved_total = self.tracker.frames_saved() + u64::from(saved);
            self.tracker.record(
                saved,
                fraction(saved_total),
                Some(frame.position),
                Some(elapsed),
            );
        }
    }

    fn manual_capture<T: MediaSession + ?Sized>(
        &mut self,
        session: &mut T,
        target_count: u64,
    ) -> Termination {
        self.tracker.set_total(Some(target_count));
        self.tracker.status(StatusEvent::Message(format!(
            "Camera mode: capture {target_count} frame(s); stop to finish early"
        )));

        let mut captured = 0_u64;
        loop {
            if captured >= target_count {
                return Termination::Completed;
            }
            if self.options.is_cancelled() {
                return Termination::Cancelled;
            }

            let frame = match session.read_next() {
                Ok(Some(frame)) => frame,
                Ok(None) | Err(_) => {
                    self.warn(ExtractionWarning::CameraDisconnected {
                        frames_saved: captured,
                    });
                    return Termination::Completed;
                }
            };

            if let Some(observer) = &self.options.frame_observer {
                observer.on_frame(&frame, captured, target_count);
            }

            let command = self
                .options
                .capture_control
                .as_ref()
                .and_then(|control| control.try_next());

            match command {
                Some(CaptureCommand::Stop) => return Termination::Completed,
                Some(CaptureCommand::Capture) => {
                    if self.options.is_cancelled() {
                        return Termination::Cancelled;
                    }
                    let file_name = manual_file_name(captured, self.request.format);
                    let saved = self.write_frame(captured, &file_name, &frame);
                    if saved {
                        captured += 1;
                    }
                    self.tracker.record(
                        saved,
                        captured as f64 / target_count as f64,
                        Some(frame.position),
                        None,
                    );
                    self.tracker.status(StatusEvent::Message(format!(
                        "Captured {captured}/{target_count} frames"
                    )));
                }
                None => {}
            }
        }
    }
}

/// Closes the wrapped session exactly once, on release or drop.
struct SessionGuard<T: MediaSession> {
    session: T,
    released: bool,
}

impl<T: MediaSession> SessionGuard<T> {
    fn new(session: T) -> Self {
        Self {
            session,
            released: false,
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.session.close();
        }
    }
}

impl<T: MediaSession> Deref for SessionGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.session
    }
}

impl<T: MediaSession> DerefMut for SessionGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.session
    }
}

impl<T: MediaSession> Drop for SessionGuard<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Clears the engine's busy flag when the run ends, even by unwinding.
struct ActiveFlag<'a>(&'a AtomicBool);

impl Drop for ActiveFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
