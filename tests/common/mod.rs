//! In-memory media source used by the engine and worker tests.
//!
//! `FakeSource` produces tiny solid-colour frames without touching FFmpeg,
//! and records what the engine did to it (opens, closes, seeks).

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use framegrab::{
    CancellationToken, Frame, FrameGrabError, MediaInfo, MediaSession, MediaSource,
    ProgressCallback, ProgressInfo, SourceDescriptor, StatusEvent,
};
use image::{DynamicImage, Rgb, RgbImage};

/// How a fake source behaves.
#[derive(Debug, Clone)]
pub struct FakeScript {
    pub info: MediaInfo,
    pub live: bool,
    /// The stream ends after this many frames.
    pub stream_end: Option<u64>,
    /// Reads at these positions always fail.
    pub failing_positions: HashSet<u64>,
    /// Reads at these positions fail this many times before succeeding.
    pub flaky_positions: HashMap<u64, u32>,
    /// Sleep before delivering each frame.
    pub frame_delay: Duration,
    pub fail_open: bool,
    /// Cancelled as the frame at this position is handed out.
    pub cancel_on_read: Option<(u64, CancellationToken)>,
}

impl FakeScript {
    pub fn file(frame_count: u64, frames_per_second: f64) -> Self {
        Self {
            info: MediaInfo {
                frame_count,
                frames_per_second,
                width: 4,
                height: 4,
            },
            live: false,
            stream_end: None,
            failing_positions: HashSet::new(),
            flaky_positions: HashMap::new(),
            frame_delay: Duration::ZERO,
            fail_open: false,
            cancel_on_read: None,
        }
    }

    pub fn camera(frames_per_second: f64) -> Self {
        Self {
            live: true,
            ..Self::file(0, frames_per_second)
        }
    }

    pub fn with_stream_end(mut self, frames: u64) -> Self {
        self.stream_end = Some(frames);
        self
    }

    pub fn with_failing_position(mut self, position: u64) -> Self {
        self.failing_positions.insert(position);
        self
    }

    pub fn with_flaky_position(mut self, position: u64, failures: u32) -> Self {
        self.flaky_positions.insert(position, failures);
        self
    }

    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    pub fn cancelling_on_read(mut self, position: u64, token: CancellationToken) -> Self {
        self.cancel_on_read = Some((position, token));
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeCounters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub reads: AtomicUsize,
    pub seeks: Mutex<Vec<u64>>,
}

impl FakeCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.seeks.lock().unwrap().clone()
    }
}

pub struct FakeSource {
    pub script: FakeScript,
    pub counters: Arc<FakeCounters>,
}

impl FakeSource {
    pub fn new(script: FakeScript) -> Self {
        Self {
            script,
            counters: Arc::new(FakeCounters::default()),
        }
    }
}

impl MediaSource for FakeSource {
    type Session = FakeSession;

    fn open(&self, descriptor: &SourceDescriptor) -> Result<FakeSession, FrameGrabError> {
        if self.script.fail_open {
            return Err(FrameGrabError::SourceUnavailable {
                descriptor: descriptor.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            script: self.script.clone(),
            counters: Arc::clone(&self.counters),
            cursor: 0,
            flaky_remaining: self.script.flaky_positions.clone(),
        })
    }
}

pub struct FakeSession {
    script: FakeScript,
    counters: Arc<FakeCounters>,
    cursor: u64,
    flaky_remaining: HashMap<u64, u32>,
}

impl FakeSession {
    fn frame_at(&self, position: u64) -> Frame {
        let shade = (position % 256) as u8;
        let image = RgbImage::from_pixel(
            self.script.info.width,
            self.script.info.height,
            Rgb([shade, shade, shade]),
        );
        let timestamp = (!self.script.live && self.script.info.has_reliable_frame_rate())
            .then(|| Duration::from_secs_f64(position as f64 / self.script.info.frames_per_second));
        Frame {
            position,
            timestamp,
            image: DynamicImage::ImageRgb8(image),
        }
    }
}

impl MediaSession for FakeSession {
    fn info(&self) -> &MediaInfo {
        &self.script.info
    }

    fn is_live(&self) -> bool {
        self.script.live
    }

    fn seek(&mut self, frame_index: u64) -> Result<(), FrameGrabError> {
        if self.script.live {
            return Ok(());
        }
        self.counters.seeks.lock().unwrap().push(frame_index);
        self.cursor = match self.script.info.frame_count {
            0 => frame_index,
            count => frame_index.min(count - 1),
        };
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>, FrameGrabError> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        let position = self.cursor;

        if self.script.stream_end.is_some_and(|end| position >= end) {
            return Ok(None);
        }
        if !self.script.live
            && self.script.info.has_frame_count()
            && position >= self.script.info.frame_count
        {
            return Ok(None);
        }

        if !self.script.frame_delay.is_zero() {
            thread::sleep(self.script.frame_delay);
        }

        self.cursor += 1;

        if self.script.failing_positions.contains(&position) {
            return Err(FrameGrabError::VideoDecodeError(format!(
                "scripted failure at {position}"
            )));
        }
        if let Some(remaining) = self.flaky_remaining.get_mut(&position) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FrameGrabError::VideoDecodeError(format!(
                    "scripted transient failure at {position}"
                )));
            }
        }

        if let Some((_, token)) = self
            .script
            .cancel_on_read
            .as_ref()
            .filter(|(at, _)| *at == position)
        {
            token.cancel();
        }

        Ok(Some(self.frame_at(position)))
    }

    fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every progress report and status event.
#[derive(Default)]
pub struct RecordingProgress {
    pub infos: Mutex<Vec<ProgressInfo>>,
    pub events: Mutex<Vec<StatusEvent>>,
}

impl RecordingProgress {
    pub fn fractions(&self) -> Vec<f64> {
        self.infos.lock().unwrap().iter().map(|info| info.fraction).collect()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }

    fn on_status(&self, event: &StatusEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Sorted file names in `directory`.
pub fn files_in(directory: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(directory)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().is_file())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
