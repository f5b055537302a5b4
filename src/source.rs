//! Source descriptors.
//!
//! A [`SourceDescriptor`] names what to open: a video file on disk or a
//! capture device by index. It is chosen once by the caller and never
//! mutated; a [`MediaSource`](crate::MediaSource) borrows it to open a
//! session.

use std::{
    convert::Infallible,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Prefix accepted by [`SourceDescriptor::from_str`] for capture devices.
const CAMERA_PREFIX: &str = "camera:";

/// Identifies a media source.
///
/// # Example
///
/// ```
/// use framegrab::SourceDescriptor;
///
/// let file: SourceDescriptor = "clips/input.mp4".parse().unwrap();
/// assert!(!file.is_camera());
///
/// let camera: SourceDescriptor = "camera:0".parse().unwrap();
/// assert_eq!(camera, SourceDescriptor::Camera(0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceDescriptor {
    /// A video file, opened for random access.
    File(PathBuf),
    /// A capture device, opened for forward-only reading.
    Camera(u32),
}

impl SourceDescriptor {
    /// Describe a file source.
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        SourceDescriptor::File(path.as_ref().to_path_buf())
    }

    /// Describe a capture device.
    pub fn camera(index: u32) -> Self {
        SourceDescriptor::Camera(index)
    }

    /// Returns `true` for capture devices.
    pub fn is_camera(&self) -> bool {
        matches!(self, SourceDescriptor::Camera(_))
    }
}

impl Display for SourceDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SourceDescriptor::File(path) => write!(f, "{}", path.display()),
            SourceDescriptor::Camera(index) => write!(f, "camera {index}"),
        }
    }
}

impl FromStr for SourceDescriptor {
    type Err = Infallible;

    /// `camera:N` selects capture device `N`; anything else is a file path.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some(index) = trimmed
            .strip_prefix(CAMERA_PREFIX)
            .and_then(|rest| rest.trim().parse::<u32>().ok())
        {
            return Ok(SourceDescriptor::Camera(index));
        }
        Ok(SourceDescriptor::File(PathBuf::from(trimmed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camera_prefix() {
        let parsed: SourceDescriptor = "camera:3".parse().unwrap();
        assert_eq!(parsed, SourceDescriptor::Camera(3));
        assert!(parsed.is_camera());
    }

    #[test]
    fn malformed_camera_index_is_a_path() {
        let parsed: SourceDescriptor = "camera:front".parse().unwrap();
        assert_eq!(parsed, SourceDescriptor::file("camera:front"));
    }

    #[test]
    fn display_names_the_resource() {
        assert_eq!(SourceDescriptor::Camera(2).to_string(), "camera 2");
        assert_eq!(SourceDescriptor::file("a/b.mp4").to_string(), "a/b.mp4");
    }
}
