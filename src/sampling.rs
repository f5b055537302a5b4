//! Frame sampling policies.
//!
//! Given [`MediaInfo`] and a [`SamplingConfig`], the planners here decide
//! which frames an extraction run saves and what each output file is called.
//! They are pure: no I/O, no clocks.
//!
//! - [`plan_by_interval`] selects every `round(fps * interval)`-th frame of a
//!   file with known frame count and reliable frame rate.
//! - [`plan_by_count`] spreads `target_count` frames evenly over the whole
//!   file using floor spacing, so frame 0 is always first.
//! - [`IntervalPacer`] is the live counterpart of interval sampling. It
//!   cannot be precomputed; it is fed the elapsed time after each decoded
//!   frame and answers whether that frame should be saved.
//!
//! Manual capture (count sampling on a camera) has no planner: the engine
//! saves frames when told to and names them with [`manual_file_name`].
//!
//! # Example
//!
//! ```
//! use framegrab::{ImageFormat, MediaInfo, plan_by_count};
//!
//! let info = MediaInfo {
//!     frame_count: 100,
//!     frames_per_second: 25.0,
//!     width: 640,
//!     height: 360,
//! };
//! let plan = plan_by_count(&info, 10, ImageFormat::Png).unwrap();
//! assert_eq!(plan.frame_positions(), vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
//! assert_eq!(plan.steps()[1].file_name, "frame_0001_0-00-00.png");
//! ```

use std::time::Duration;

use crate::{
    codec::ImageFormat,
    error::FrameGrabError,
    metadata::{MediaInfo, NOMINAL_CAMERA_FRAMES_PER_SECOND, format_clock},
    progress::ExtractionWarning,
};

/// Which frames to extract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingConfig {
    /// One frame every `interval` of media (files) or wall-clock (cameras) time.
    ByInterval {
        /// Spacing between saved frames. Must be non-zero.
        interval: Duration,
    },
    /// `target_count` frames spread evenly over a file, or captured on demand
    /// from a camera.
    ByCount {
        /// Number of frames wanted. Must be at least 1.
        target_count: u64,
    },
}

impl SamplingConfig {
    /// Interval sampling from a seconds value.
    ///
    /// # Errors
    ///
    /// [`FrameGrabError::InvalidInterval`] unless `seconds` is finite and
    /// greater than zero.
    pub fn by_interval_seconds(seconds: f64) -> Result<Self, FrameGrabError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(FrameGrabError::InvalidInterval);
        }
        let interval =
            Duration::try_from_secs_f64(seconds).map_err(|_| FrameGrabError::InvalidInterval)?;
        let config = SamplingConfig::ByInterval { interval };
        config.validate()?;
        Ok(config)
    }

    /// Count sampling.
    ///
    /// # Errors
    ///
    /// [`FrameGrabError::InvalidTargetCount`] when `target_count` is zero.
    pub fn by_count(target_count: u64) -> Result<Self, FrameGrabError> {
        let config = SamplingConfig::ByCount { target_count };
        config.validate()?;
        Ok(config)
    }

    /// Check the variant's parameters.
    pub fn validate(&self) -> Result<(), FrameGrabError> {
        match *self {
            SamplingConfig::ByInterval { interval } if interval.is_zero() => {
                Err(FrameGrabError::InvalidInterval)
            }
            SamplingConfig::ByCount { target_count: 0 } => Err(FrameGrabError::InvalidTargetCount),
            _ => Ok(()),
        }
    }
}

/// Where a step's frame comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    /// A frame position in a seekable source.
    Frame(u64),
    /// Time elapsed since the run started (live pacing).
    Elapsed(Duration),
}

/// One frame to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Zero-based step number; also the number in the file name.
    pub index: u64,
    /// Which frame to save.
    pub target: SeekTarget,
    /// Output file name, unique within a plan.
    pub file_name: String,
}

impl PlanStep {
    /// The frame position for [`SeekTarget::Frame`] steps.
    pub fn frame_position(&self) -> Option<u64> {
        match self.target {
            SeekTarget::Frame(position) => Some(position),
            SeekTarget::Elapsed(_) => None,
        }
    }
}

/// An ordered, precomputed list of steps for a file source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionPlan {
    steps: Vec<PlanStep>,
    warnings: Vec<ExtractionWarning>,
    frame_count: u64,
}

impl ExtractionPlan {
    /// The steps, in execution order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Non-fatal conditions found while planning.
    pub fn warnings(&self) -> &[ExtractionWarning] {
        &self.warnings
    }

    /// Frame count of the source the plan was built for.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` when there is nothing to extract.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Frame positions of all steps, in order.
    pub fn frame_positions(&self) -> Vec<u64> {
        self.steps
            .iter()
            .filter_map(PlanStep::frame_position)
            .collect()
    }

    pub(crate) fn into_parts(self) -> (Vec<PlanStep>, Vec<ExtractionWarning>) {
        (self.steps, self.warnings)
    }
}

/// Name for a time-labelled frame: `frame_{index:04}_{H-MM-SS}.{ext}`.
pub fn timed_file_name(index: u64, timestamp: Duration, format: ImageFormat) -> String {
    format!(
        "frame_{index:04}_{}.{}",
        format_clock(timestamp, '-'),
        format.extension()
    )
}

/// Name for a manually captured frame: `frame_{index:04}.{ext}`.
pub fn manual_file_name(index: u64, format: ImageFormat) -> String {
    format!("frame_{index:04}.{}", format.extension())
}

/// Frames between interval samples: `round(fps * interval)`, at least 1.
pub fn frame_interval(frames_per_second: f64, interval: Duration) -> u64 {
    let frames = (frames_per_second * interval.as_secs_f64()).round();
    if frames.is_finite() && frames >= 1.0 {
        frames as u64
    } else {
        1
    }
}

fn position_timestamp(position: u64, frames_per_second: f64) -> Duration {
    Duration::try_from_secs_f64(position as f64 / frames_per_second).unwrap_or_default()
}

/// Plan interval sampling for a file.
///
/// Steps land on `0, n, 2n, …` while below the frame count, where
/// `n = round(fps * interval)`. A source without a reliable frame rate or a
/// frame count cannot be planned; the result is empty and carries a warning
/// so the caller can fall back to paced sampling.
///
/// # Errors
///
/// [`FrameGrabError::InvalidInterval`] for a zero interval.
pub fn plan_by_interval(
    info: &MediaInfo,
    interval: Duration,
    format: ImageFormat,
) -> Result<ExtractionPlan, FrameGrabError> {
    SamplingConfig::ByInterval { interval }.validate()?;

    let mut plan = ExtractionPlan {
        frame_count: info.frame_count,
        ..ExtractionPlan::default()
    };

    if !info.has_reliable_frame_rate() {
        plan.warnings.push(ExtractionWarning::UnreliableFrameRate {
            reported: info.frames_per_second,
            assumed: NOMINAL_CAMERA_FRAMES_PER_SECOND,
        });
        return Ok(plan);
    }
    if !info.has_frame_count() {
        plan.warnings.push(ExtractionWarning::UnknownFrameCount);
        return Ok(plan);
    }

    let fps = info.frames_per_second;
    let step = frame_interval(fps, interval);

    plan.steps = (0..info.frame_count)
        .step_by(step as usize)
        .zip(0_u64..)
        .map(|(position, index)| PlanStep {
            index,
            target: SeekTarget::Frame(position),
            file_name: timed_file_name(index, position_timestamp(position, fps), format),
        })
        .collect();

    log::debug!(
        "Interval plan: every {step} frame(s) of {} -> {} step(s)",
        info.frame_count,
        plan.steps.len()
    );
    Ok(plan)
}

/// Plan count sampling for a file.
///
/// When `target_count` exceeds the frame count it is clamped and a
/// [`ExtractionWarning::TargetClamped`] is attached. A source that does not
/// report a frame count yields an empty plan with
/// [`ExtractionWarning::UnknownFrameCount`]. Position `i` is
/// `floor(i * frame_count / target_count)`, computed in integers so the
/// spacing is exact for any frame count.
///
/// # Errors
///
/// [`FrameGrabError::InvalidTargetCount`] when `target_count` is zero.
pub fn plan_by_count(
    info: &MediaInfo,
    target_count: u64,
    format: ImageFormat,
) -> Result<ExtractionPlan, FrameGrabError> {
    SamplingConfig::ByCount { target_count }.validate()?;

    let frame_count = info.frame_count;
    let mut plan = ExtractionPlan {
        frame_count,
        ..ExtractionPlan::default()
    };

    if frame_count == 0 {
        log::warn!("Source does not report a frame count; nothing to plan");
        plan.warnings.push(ExtractionWarning::UnknownFrameCount);
        return Ok(plan);
    }

    let count = if target_count > frame_count {
        log::warn!(
            "Requested {target_count} frames but the source has {frame_count}; extracting all of them"
        );
        plan.warnings.push(ExtractionWarning::TargetClamped {
            requested: target_count,
            available: frame_count,
        });
        frame_count
    } else {
        target_count
    };

    let fps = info.effective_frames_per_second();
    plan.steps = (0..count)
        .map(|index| {
            let position = (u128::from(index) * u128::from(frame_count) / u128::from(count)) as u64;
            PlanStep {
                index,
                target: SeekTarget::Frame(position),
                file_name: timed_file_name(index, position_timestamp(position, fps), format),
            }
        })
        .collect();

    log::debug!("Count plan: {count} step(s) over {frame_count} frame(s)");
    Ok(plan)
}

/// Live interval sampling.
///
/// Emits step `n` for the first frame observed at or after `n * interval`.
/// At most one step is emitted per call, so a slow source never produces two
/// files from one frame.
#[derive(Debug, Clone)]
pub struct IntervalPacer {
    interval: Duration,
    format: ImageFormat,
    next_index: u64,
}

impl IntervalPacer {
    /// Create a pacer. `interval` must be non-zero.
    ///
    /// # Errors
    ///
    /// [`FrameGrabError::InvalidInterval`] for a zero interval.
    pub fn new(interval: Duration, format: ImageFormat) -> Result<Self, FrameGrabError> {
        SamplingConfig::ByInterval { interval }.validate()?;
        Ok(Self {
            interval,
            format,
            next_index: 0,
        })
    }

    /// Number of steps emitted so far.
    pub fn steps_emitted(&self) -> u64 {
        self.next_index
    }

    /// Offer a freshly decoded frame observed `elapsed` after the run began.
    pub fn poll(&mut self, elapsed: Duration) -> Option<PlanStep> {
        let due = self.interval.as_secs_f64() * self.next_index as f64;
        if elapsed.as_secs_f64() < due {
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;
        Some(PlanStep {
            index,
            target: SeekTarget::Elapsed(elapsed),
            file_name: timed_file_name(index, elapsed, self.format),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_info(frame_count: u64, fps: f64) -> MediaInfo {
        MediaInfo {
            frame_count,
            frames_per_second: fps,
            width: 320,
            height: 240,
        }
    }

    #[test]
    fn interval_rounds_and_has_floor_of_one() {
        assert_eq!(frame_interval(29.97, Duration::from_secs(1)), 30);
        assert_eq!(frame_interval(25.0, Duration::from_millis(10)), 1);
    }

    #[test]
    fn interval_plan_labels_use_media_time() {
        let plan =
            plan_by_interval(&file_info(125, 25.0), Duration::from_secs(2), ImageFormat::Jpeg)
                .unwrap();
        let names: Vec<_> = plan.steps().iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "frame_0000_0-00-00.jpg",
                "frame_0001_0-00-02.jpg",
                "frame_0002_0-00-04.jpg"
            ]
        );
    }

    #[test]
    fn interval_plan_without_frame_rate_is_empty_with_warning() {
        let plan = plan_by_interval(&file_info(500, 0.0), Duration::from_secs(1), ImageFormat::Png)
            .unwrap();
        assert!(plan.is_empty());
        assert!(matches!(
            plan.warnings(),
            [ExtractionWarning::UnreliableFrameRate { .. }]
        ));
    }

    #[test]
    fn count_plan_uneven_spacing_floors() {
        let plan = plan_by_count(&file_info(10, 25.0), 3, ImageFormat::Png).unwrap();
        assert_eq!(plan.frame_positions(), vec![0, 3, 6]);
    }

    #[test]
    fn count_plan_on_unknown_length_is_empty() {
        let plan = plan_by_count(&file_info(0, 25.0), 4, ImageFormat::Png).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.warnings(), [ExtractionWarning::UnknownFrameCount]);
    }

    #[test]
    fn pacer_emits_one_step_per_frame() {
        let mut pacer = IntervalPacer::new(Duration::from_secs(1), ImageFormat::Jpeg).unwrap();
        assert!(pacer.poll(Duration::ZERO).is_some());
        assert!(pacer.poll(Duration::from_millis(500)).is_none());
        // Far behind schedule: still one step per offered frame.
        let late = pacer.poll(Duration::from_secs(5)).unwrap();
        assert_eq!(late.index, 1);
        assert_eq!(late.file_name, "frame_0001_0-00-05.jpg");
        assert!(pacer.poll(Duration::from_secs(5)).is_some());
        assert_eq!(pacer.steps_emitted(), 3);
    }

    #[test]
    fn manual_names() {
        assert_eq!(manual_file_name(7, ImageFormat::Png), "frame_0007.png");
    }
}
