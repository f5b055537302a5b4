//! FFmpeg-backed media sources.
//!
//! [`FfmpegSource`] opens video files through libavformat and capture
//! devices through libavdevice (`video4linux2` on Linux, `avfoundation` on
//! macOS, `vfwcap` on Windows). Each [`FfmpegSession`] owns its demuxer,
//! decoder, and scaler, decodes one frame per
//! [`read_next`](MediaSession::read_next) call, and converts it to an RGB8
//! [`DynamicImage`].
//!
//! File seeks go to the nearest keyframe at or before the target and then
//! decode forward, discarding frames until the requested position is reached.
//!
//! # Example
//!
//! ```no_run
//! use framegrab::{FfmpegSource, MediaSession, MediaSource, SourceDescriptor};
//!
//! let source = FfmpegSource::new();
//! let mut session = source.open(&SourceDescriptor::file("input.mp4"))?;
//! println!("{}", session.info());
//!
//! session.seek(100)?;
//! if let Some(frame) = session.read_next()? {
//!     frame.image.save("frame_100.png")?;
//! }
//! session.close();
//! # Ok::<(), framegrab::FrameGrabError>(())
//! ```

use std::{path::Path, time::Duration};

use ffmpeg_next::{
    Dictionary, Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input, format::Format},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::{
    configuration::FrameOutputOptions,
    error::FrameGrabError,
    media_source::{DeviceClaim, Frame, MediaSession, MediaSource, claim_device},
    metadata::MediaInfo,
    source::SourceDescriptor,
    utilities,
};

/// Consecutive packet read failures tolerated before a read gives up.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 32;

/// Opens files and capture devices with FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegSource {
    output: FrameOutputOptions,
}

impl FfmpegSource {
    /// Create a source that keeps the native frame resolution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale decoded frames according to `output`.
    #[must_use]
    pub fn with_frame_output(mut self, output: FrameOutputOptions) -> Self {
        self.output = output;
        self
    }
}

impl MediaSource for FfmpegSource {
    type Session = FfmpegSession;

    fn open(&self, descriptor: &SourceDescriptor) -> Result<FfmpegSession, FrameGrabError> {
        let unavailable = |reason: String| FrameGrabError::SourceUnavailable {
            descriptor: descriptor.to_string(),
            reason,
        };

        ffmpeg_next::init()
            .map_err(|error| unavailable(format!("FFmpeg initialisation failed: {error}")))?;

        log::debug!("Opening {descriptor}");

        match descriptor {
            SourceDescriptor::File(path) => {
                let input = ffmpeg_next::format::input(path)
                    .map_err(|error| unavailable(error.to_string()))?;
                FfmpegSession::from_input(input, descriptor, &self.output, None)
            }
            SourceDescriptor::Camera(index) => {
                let claim = claim_device(*index)?;
                let input = open_capture_device(*index).map_err(unavailable)?;
                FfmpegSession::from_input(input, descriptor, &self.output, Some(claim))
            }
        }
    }
}

/// Platform capture demuxer name and device URL for `index`.
fn capture_device_url(index: u32) -> (&'static str, String) {
    if cfg!(target_os = "macos") {
        ("avfoundation", format!("{index}:none"))
    } else if cfg!(target_os = "windows") {
        ("vfwcap", index.to_string())
    } else {
        ("video4linux2", format!("/dev/video{index}"))
    }
}

fn open_capture_device(index: u32) -> Result<Input, String> {
    ffmpeg_next::device::register_all();

    let (demuxer, url) = capture_device_url(index);
    // Demuxer names may be comma-separated aliases, e.g. "video4linux2,v4l2".
    let format = ffmpeg_next::device::input::video()
        .find(|format| format.name().split(',').any(|name| name == demuxer))
        .ok_or_else(|| format!("capture backend {demuxer} is not available in this FFmpeg build"))?;

    let mut options = Dictionary::new();
    if demuxer == "avfoundation" {
        options.set("framerate", "30");
    }

    let context = ffmpeg_next::format::open_with(Path::new(&url), &Format::Input(format), options)
        .map_err(|error| error.to_string())?;
    Ok(context.input())
}

/// An open FFmpeg demuxer/decoder pair for one video stream.
pub struct FfmpegSession {
    input: Option<Input>,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    info: MediaInfo,
    live: bool,
    target_width: u32,
    target_height: u32,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    next_position: u64,
    pending_target: Option<u64>,
    eof_sent: bool,
    exhausted: bool,
    descriptor: String,
    claim: Option<DeviceClaim>,
}

impl FfmpegSession {
    fn from_input(
        input: Input,
        descriptor: &SourceDescriptor,
        output: &FrameOutputOptions,
        claim: Option<DeviceClaim>,
    ) -> Result<Self, FrameGrabError> {
        let live = descriptor.is_camera();
        let unavailable = |reason: String| FrameGrabError::SourceUnavailable {
            descriptor: descriptor.to_string(),
            reason,
        };

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unavailable("no video stream found".to_string()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| unavailable(format!("cannot open video decoder: {error}")))?;

        let mut frames_per_second = utilities::rational_to_f64(stream.avg_frame_rate());
        if frames_per_second <= 0.0 {
            frames_per_second = utilities::rational_to_f64(stream.rate());
        }

        let frame_count = if live {
            0
        } else if stream.frames() > 0 {
            stream.frames() as u64
        } else if input.duration() > 0 && frames_per_second > 0.0 {
            let seconds = input.duration() as f64 / f64::from(ffmpeg_sys_next::AV_TIME_BASE);
            (seconds * frames_per_second) as u64
        } else {
            0
        };

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(unavailable("video stream reports zero dimensions".to_string()));
        }

        let (target_width, target_height) = output.resolve_dimensions(width, height);
        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            target_width,
            target_height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| unavailable(format!("cannot convert frames to RGB: {error}")))?;

        let info = MediaInfo {
            frame_count,
            frames_per_second,
            width,
            height,
        };

        log::info!("Opened {descriptor}: {info}");

        Ok(Self {
            input: Some(input),
            decoder,
            scaler,
            stream_index,
            time_base,
            info,
            live,
            target_width,
            target_height,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            next_position: 0,
            pending_target: None,
            eof_sent: false,
            exhausted: false,
            descriptor: descriptor.to_string(),
            claim,
        })
    }

    fn convert_decoded_frame(&mut self) -> Result<DynamicImage, FrameGrabError> {
        self.scaler.run(&self.decoded_frame, &mut self.scaled_frame)?;

        let buffer = utilities::frame_to_rgb_buffer(
            &self.scaled_frame,
            self.target_width,
            self.target_height,
        );
        let image = RgbImage::from_raw(self.target_width, self.target_height, buffer).ok_or_else(
            || {
                FrameGrabError::VideoDecodeError(
                    "Failed to construct RGB image from decoded frame data".to_string(),
                )
            },
        )?;
        Ok(DynamicImage::ImageRgb8(image))
    }

    /// Position and timestamp of the frame currently in `decoded_frame`.
    fn locate_decoded_frame(&self) -> (u64, Option<Duration>) {
        if self.live {
            return (self.next_position, None);
        }

        match self.decoded_frame.timestamp().or_else(|| self.decoded_frame.pts()) {
            Some(pts) => {
                let position = utilities::pts_to_frame_number(
                    pts,
                    self.time_base,
                    self.info.effective_frames_per_second(),
                );
                let seconds = utilities::pts_to_seconds(pts, self.time_base).max(0.0);
                (position, Duration::try_from_secs_f64(seconds).ok())
            }
            None => (self.next_position, None),
        }
    }
}

impl MediaSession for FfmpegSession {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn seek(&mut self, frame_index: u64) -> Result<(), FrameGrabError> {
        if self.live {
            return Ok(());
        }
        let Some(input) = self.input.as_mut() else {
            return Ok(());
        };

        let target = if self.info.has_frame_count() {
            frame_index.min(self.info.frame_count - 1)
        } else {
            frame_index
        };

        let timestamp = utilities::frame_number_to_seek_timestamp(
            target,
            self.info.effective_frames_per_second(),
        );
        input.seek(timestamp, ..timestamp)?;
        self.decoder.flush();

        self.pending_target = Some(target);
        self.next_position = target;
        self.eof_sent = false;
        self.exhausted = false;

        log::debug!("Seeked {} to frame {target}", self.descriptor);
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>, FrameGrabError> {
        if self.exhausted || self.input.is_none() {
            return Ok(None);
        }

        let mut consecutive_errors = 0_u32;

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let (position, timestamp) = self.locate_decoded_frame();

                if let Some(target) = self.pending_target {
                    if position < target {
                        continue;
                    }
                    self.pending_target = None;
                }

                let image = self.convert_decoded_frame()?;
                self.next_position = position + 1;
                return Ok(Some(Frame {
                    position,
                    timestamp,
                    image,
                }));
            }

            if self.eof_sent {
                self.exhausted = true;
                return Ok(None);
            }

            let Some(input) = self.input.as_mut() else {
                return Ok(None);
            };

            let mut packet = Packet::empty();
            match packet.read(input) {
                Ok(()) => {
                    consecutive_errors = 0;
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) if self.live => {
                    log::warn!("{} stopped delivering frames: {error}", self.descriptor);
                    self.exhausted = true;
                    return Ok(None);
                }
                Err(error) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        return Err(FrameGrabError::VideoDecodeError(format!(
                            "repeated read failures on {}: {error}",
                            self.descriptor
                        )));
                    }
                }
            }
        }
    }

    fn close(&mut self) {
        if self.input.take().is_some() {
            self.exhausted = true;
            self.claim = None;
            log::debug!("Closed {}", self.descriptor);
        }
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        self.close();
    }
}
