//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions.

use std::path::PathBuf;

use framegrab::{
    FfmpegSource, FrameGrabError, MediaSource, SamplingConfig, SourceDescriptor, claim_device,
};

#[test]
fn open_nonexistent_file() {
    let result = FfmpegSource::new().open(&SourceDescriptor::file("this_file_does_not_exist.mp4"));
    let Err(error) = result else {
        panic!("expected an open failure");
    };

    assert!(matches!(error, FrameGrabError::SourceUnavailable { .. }));
    let message = error.to_string();
    assert!(
        message.contains("this_file_does_not_exist.mp4"),
        "Error message should name the file: {message}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = FfmpegSource::new().open(&SourceDescriptor::file(&invalid_file_path));
    let Err(error) = result else {
        panic!("Expected error for invalid media file");
    };

    assert!(matches!(error, FrameGrabError::SourceUnavailable { .. }));
    assert!(error.to_string().contains("invalid.mp4"), "{error}");
}

/// A valid 16-bit mono PCM WAV holding `samples` silent samples.
fn silent_wav(samples: u32) -> Vec<u8> {
    let data_len = samples * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1_u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&8_000_u32.to_le_bytes());
    bytes.extend_from_slice(&16_000_u32.to_le_bytes());
    bytes.extend_from_slice(&2_u16.to_le_bytes());
    bytes.extend_from_slice(&16_u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);
    bytes
}

#[test]
fn open_audio_only_file_names_the_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let audio_path = temporary_directory.path().join("speech.wav");
    std::fs::write(&audio_path, silent_wav(8_000)).expect("Failed to write wav file");

    let result = FfmpegSource::new().open(&SourceDescriptor::file(&audio_path));
    let Err(error) = result else {
        panic!("audio-only input has no frames to extract");
    };

    assert!(matches!(error, FrameGrabError::SourceUnavailable { .. }));
    let message = error.to_string();
    assert!(message.contains("speech.wav"), "{message}");
    assert!(message.contains("no video stream"), "{message}");
}

#[test]
fn claimed_camera_cannot_be_opened_again() {
    // An index no real system exposes, so only the claim is exercised.
    let claim = claim_device(4_242).unwrap();
    let result = FfmpegSource::new().open(&SourceDescriptor::camera(4_242));
    let Err(error) = result else {
        panic!("expected the claimed device to be refused");
    };

    let message = error.to_string();
    assert!(message.contains("camera 4242"), "{message}");
    assert!(message.contains("already in use"), "{message}");
    drop(claim);
}

#[test]
fn sampling_errors_are_descriptive() {
    let interval = SamplingConfig::by_interval_seconds(0.0).unwrap_err();
    assert!(interval.to_string().contains("greater than zero"));

    let count = SamplingConfig::by_count(0).unwrap_err();
    assert!(count.to_string().contains("at least 1"));
}

#[test]
fn encode_and_directory_errors_name_the_path() {
    let encode = FrameGrabError::EncodeError {
        path: PathBuf::from("frames/frame_0001_0-00-01.jpg"),
        reason: "disk full".to_string(),
    };
    assert_eq!(
        encode.to_string(),
        "Failed to write frame to frames/frame_0001_0-00-01.jpg: disk full"
    );

    let directory = FrameGrabError::OutputDirectory {
        path: PathBuf::from("/readonly/frames"),
        reason: "permission denied".to_string(),
    };
    assert!(directory.to_string().contains("/readonly/frames"));
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(FrameGrabError::from(io), FrameGrabError::IoError(_)));
}
