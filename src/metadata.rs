//! Media metadata.
//!
//! [`MediaInfo`] is a read-only snapshot taken once when a session is opened.
//! Capture devices commonly report no frame count and a zero or noisy frame
//! rate; the helpers here let callers decide whether the numbers can be
//! trusted without scattering threshold checks through the engine.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    time::Duration,
};

/// Frame rates below this are treated as unreliable.
pub const MIN_RELIABLE_FRAMES_PER_SECOND: f64 = 0.1;

/// Frame rate assumed for sources whose own report is unreliable.
///
/// Used for labelling only; it is not a measurement.
pub const NOMINAL_CAMERA_FRAMES_PER_SECOND: f64 = 30.0;

/// Metadata for an open media session.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use framegrab::MediaInfo;
///
/// let info = MediaInfo {
///     frame_count: 250,
///     frames_per_second: 25.0,
///     width: 1280,
///     height: 720,
/// };
/// assert_eq!(info.duration(), Some(Duration::from_secs(10)));
/// assert!(info.has_reliable_frame_rate());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct MediaInfo {
    /// Total number of frames, `0` when unknown (e.g. a live camera).
    pub frame_count: u64,
    /// Reported frames per second. May be `0` or noisy for capture devices.
    pub frames_per_second: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl MediaInfo {
    /// Whether the reported frame rate can be used for timing.
    pub fn has_reliable_frame_rate(&self) -> bool {
        self.frames_per_second.is_finite()
            && self.frames_per_second >= MIN_RELIABLE_FRAMES_PER_SECOND
    }

    /// Whether a frame count is known.
    pub fn has_frame_count(&self) -> bool {
        self.frame_count > 0
    }

    /// The reported frame rate, or the nominal camera rate when the report is
    /// unreliable.
    pub fn effective_frames_per_second(&self) -> f64 {
        if self.has_reliable_frame_rate() {
            self.frames_per_second
        } else {
            NOMINAL_CAMERA_FRAMES_PER_SECOND
        }
    }

    /// `frame_count / frames_per_second`, only when both are positive.
    pub fn duration(&self) -> Option<Duration> {
        if self.has_frame_count() && self.frames_per_second > 0.0 {
            Duration::try_from_secs_f64(self.frame_count as f64 / self.frames_per_second).ok()
        } else {
            None
        }
    }
}

impl Display for MediaInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}x{}, {:.2} FPS",
            self.width, self.height, self.frames_per_second
        )?;
        if let Some(duration) = self.duration() {
            write!(f, ", Duration: {}", format_clock(duration, ':'))?;
        }
        if self.has_frame_count() {
            write!(f, ", Frames: {}", self.frame_count)?;
        }
        Ok(())
    }
}

/// Render whole seconds as `H<sep>MM<sep>SS`.
///
/// Fractional seconds are truncated. Hours are not wrapped at 24.
pub fn format_clock(duration: Duration, separator: char) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}{separator}{minutes:02}{separator}{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_info(fps: f64) -> MediaInfo {
        MediaInfo {
            frame_count: 0,
            frames_per_second: fps,
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn low_frame_rate_falls_back_to_nominal() {
        let info = camera_info(0.05);
        assert!(!info.has_reliable_frame_rate());
        assert_eq!(info.effective_frames_per_second(), 30.0);
    }

    #[test]
    fn nan_frame_rate_is_unreliable() {
        assert!(!camera_info(f64::NAN).has_reliable_frame_rate());
    }

    #[test]
    fn duration_requires_count_and_rate() {
        assert_eq!(camera_info(30.0).duration(), None);
        let info = MediaInfo {
            frame_count: 90,
            ..camera_info(0.0)
        };
        assert_eq!(info.duration(), None);
    }

    #[test]
    fn clock_format_truncates_and_pads() {
        assert_eq!(format_clock(Duration::from_secs_f64(4.9), '-'), "0-00-04");
        assert_eq!(format_clock(Duration::from_secs(3723), ':'), "1:02:03");
        assert_eq!(format_clock(Duration::from_secs(90_000), '-'), "25-00-00");
    }

    #[test]
    fn display_summary() {
        let info = MediaInfo {
            frame_count: 250,
            frames_per_second: 25.0,
            width: 1280,
            height: 720,
        };
        assert_eq!(
            info.to_string(),
            "1280x720, 25.00 FPS, Duration: 0:00:10, Frames: 250"
        );
        assert_eq!(camera_info(0.0).to_string(), "640x480, 0.00 FPS");
    }
}
