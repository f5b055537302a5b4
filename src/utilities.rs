//! Internal helpers for pixel copying and time-base arithmetic.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use ffmpeg_sys_next::AV_TIME_BASE;

/// Copy an RGB24 frame into a tightly-packed buffer, dropping any per-row
/// stride padding so it can go straight to [`image::RgbImage::from_raw`].
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_bytes {
        return data[..row_bytes * (height as usize)].to_vec();
    }

    let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
    for row in 0..(height as usize) {
        let start = row * stride;
        buffer.extend_from_slice(&data[start..start + row_bytes]);
    }
    buffer
}

/// A rational as `f64`, or `0.0` when the denominator is zero.
pub(crate) fn rational_to_f64(value: Rational) -> f64 {
    if value.denominator() == 0 {
        0.0
    } else {
        value.numerator() as f64 / value.denominator() as f64
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * rational_to_f64(time_base)
}

/// Rescale a PTS value to a frame number, rounding to the nearest frame so
/// that time-base rounding cannot land one frame early.
pub(crate) fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let frame = pts_to_seconds(pts, time_base) * frames_per_second;
    if frame <= 0.0 { 0 } else { frame.round() as u64 }
}

/// Frame number to a container seek timestamp in `AV_TIME_BASE` units.
///
/// `Input::seek` goes through `avformat_seek_file` with no stream index,
/// which expects `AV_TIME_BASE` rather than the stream time base.
pub(crate) fn frame_number_to_seek_timestamp(frame_number: u64, frames_per_second: f64) -> i64 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    let seconds = frame_number as f64 / frames_per_second;
    (seconds * f64::from(AV_TIME_BASE)) as i64
}
