//! Media source and session abstractions.
//!
//! A [`MediaSource`] opens a [`SourceDescriptor`] into a [`MediaSession`]: an
//! exclusively-owned handle that reports [`MediaInfo`], repositions (files
//! only), and decodes frames one at a time. The extraction engine is written
//! against these traits; [`FfmpegSource`](crate::FfmpegSource) is the
//! production implementation.
//!
//! Capture devices are exclusive. Implementations call [`claim_device`]
//! before opening a camera and hold the returned [`DeviceClaim`] for the
//! lifetime of the session, so a second open of the same index fails with
//! [`FrameGrabError::SourceUnavailable`] instead of racing the first.

use std::{
    collections::BTreeSet,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use image::DynamicImage;

use crate::{error::FrameGrabError, metadata::MediaInfo, source::SourceDescriptor};

/// Number of device indices probed by [`probe_cameras`] by default.
pub const DEFAULT_CAMERA_PROBE_LIMIT: u32 = 10;

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position in the stream. For live sources this is the
    /// number of frames read since the session opened.
    pub position: u64,
    /// Presentation time, when the source provides one.
    pub timestamp: Option<Duration>,
    /// Decoded pixels, ready to encode.
    pub image: DynamicImage,
}

impl Frame {
    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Opens sessions on media sources.
///
/// Implementations are shared with the extraction worker thread, so they must
/// be [`Send`] and [`Sync`]. Sessions themselves are created and consumed on
/// the thread that opened them.
pub trait MediaSource: Send + Sync {
    /// The session type produced by [`open`](MediaSource::open).
    type Session: MediaSession;

    /// Open `descriptor`.
    ///
    /// # Errors
    ///
    /// [`FrameGrabError::SourceUnavailable`] when the file or device cannot
    /// be opened, including when the device is already claimed.
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Self::Session, FrameGrabError>;
}

/// An open, exclusively-owned handle to a media source.
pub trait MediaSession {
    /// Metadata captured at open time.
    fn info(&self) -> &MediaInfo;

    /// `true` for forward-only live sources such as cameras.
    fn is_live(&self) -> bool;

    /// Reposition the decode cursor so the next [`read_next`](MediaSession::read_next)
    /// returns `frame_index`, clamped to `[0, frame_count - 1]`.
    ///
    /// A no-op on live sources.
    fn seek(&mut self, frame_index: u64) -> Result<(), FrameGrabError>;

    /// Decode the frame at the cursor and advance by one.
    ///
    /// `Ok(None)` signals end of stream. Once a live source has returned
    /// `Ok(None)` it keeps doing so.
    fn read_next(&mut self) -> Result<Option<Frame>, FrameGrabError>;

    /// Release the underlying file or device. Safe to call more than once.
    fn close(&mut self);
}

/// A capture device found by [`probe_cameras`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Device index, usable as [`SourceDescriptor::Camera`].
    pub index: u32,
    /// Display name.
    pub name: String,
}

/// Probe device indices `0..limit`, keeping those that open and yield at
/// least one readable frame.
///
/// Every probed session is closed before the next index is tried.
pub fn probe_cameras<S: MediaSource + ?Sized>(source: &S, limit: u32) -> Vec<CameraDevice> {
    let mut devices = Vec::new();

    for index in 0..limit {
        let descriptor = SourceDescriptor::Camera(index);
        let mut session = match source.open(&descriptor) {
            Ok(session) => session,
            Err(error) => {
                log::debug!("Camera probe: index {index} unavailable: {error}");
                continue;
            }
        };

        let readable = matches!(session.read_next(), Ok(Some(_)));
        session.close();

        if readable {
            devices.push(CameraDevice {
                index,
                name: format!("Camera {index}"),
            });
        } else {
            log::debug!("Camera probe: index {index} opened but produced no frame");
        }
    }

    log::info!("Found {} camera device(s)", devices.len());
    devices
}

static CLAIMED_DEVICES: Mutex<BTreeSet<u32>> = Mutex::new(BTreeSet::new());

/// Exclusive ownership of a capture device index.
///
/// Released when dropped.
#[derive(Debug)]
pub struct DeviceClaim {
    index: u32,
}

impl DeviceClaim {
    /// The claimed device index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        let mut claimed = CLAIMED_DEVICES
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        claimed.remove(&self.index);
        log::debug!("Released camera {}", self.index);
    }
}

/// Claim camera `index` for exclusive use.
///
/// # Errors
///
/// [`FrameGrabError::SourceUnavailable`] when another session holds it.
pub fn claim_device(index: u32) -> Result<DeviceClaim, FrameGrabError> {
    let mut claimed = CLAIMED_DEVICES
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if !claimed.insert(index) {
        return Err(FrameGrabError::SourceUnavailable {
            descriptor: SourceDescriptor::Camera(index).to_string(),
            reason: "device is already in use by another session".to_string(),
        });
    }

    Ok(DeviceClaim { index })
}

#[cfg(test)]
mod tests {
    use super::*;

    // High indices keep these tests clear of anything else in the process.
    #[test]
    fn second_claim_on_same_index_fails() {
        let first = claim_device(9_001).unwrap();
        let second = claim_device(9_001);
        assert!(matches!(
            second,
            Err(FrameGrabError::SourceUnavailable { .. })
        ));
        drop(first);
        assert!(claim_device(9_001).is_ok());
    }

    #[test]
    fn claims_on_different_indices_coexist() {
        let a = claim_device(9_101).unwrap();
        let b = claim_device(9_102).unwrap();
        assert_eq!((a.index(), b.index()), (9_101, 9_102));
    }
}
