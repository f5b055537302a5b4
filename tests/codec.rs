//! Frame codec tests.

use framegrab::{FrameCodec, FrameGrabError, ImageFormat};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 16) as u8, (y * 16) as u8, 128])
    }))
}

// ── ImageFormat ────────────────────────────────────────────────────

#[test]
fn format_extensions() {
    assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    assert_eq!(ImageFormat::Png.extension(), "png");
    assert_eq!(ImageFormat::default(), ImageFormat::Jpeg);
    assert_eq!(ImageFormat::Png.to_string(), "png");
}

#[test]
fn format_parsing_is_case_insensitive() {
    for value in ["jpg", "JPG", "jpeg", ".Jpeg"] {
        assert_eq!(value.parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
    }
    assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);

    let error = "tiff".parse::<ImageFormat>().unwrap_err();
    assert!(matches!(error, FrameGrabError::UnsupportedImageFormat(_)));
    assert!(error.to_string().contains("tiff"));
}

// ── Encoding ───────────────────────────────────────────────────────

#[test]
fn png_round_trips_pixels_exactly() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("frame.png");
    let image = gradient(8, 6);

    FrameCodec::default()
        .encode(&image, ImageFormat::Png, &path)
        .unwrap();

    let decoded = image::open(&path).unwrap();
    assert_eq!(decoded.dimensions(), (8, 6));
    assert_eq!(decoded.to_rgb8(), image.to_rgb8());
}

#[test]
fn jpeg_output_is_a_readable_jpeg() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("frame.jpg");

    FrameCodec::new(80)
        .encode(&gradient(16, 16), ImageFormat::Jpeg, &path)
        .unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    assert_eq!(image::open(&path).unwrap().dimensions(), (16, 16));
}

#[test]
fn jpeg_accepts_images_with_alpha() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("alpha.jpg");
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 128])));

    FrameCodec::default()
        .encode(&image, ImageFormat::Jpeg, &path)
        .unwrap();

    assert!(path.is_file());
}

#[test]
fn lower_quality_produces_smaller_jpeg() {
    let directory = tempfile::tempdir().unwrap();
    let high = directory.path().join("high.jpg");
    let low = directory.path().join("low.jpg");
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
        Rgb([((x * 7 + y * 13) % 256) as u8, ((x * y) % 256) as u8, (x ^ y) as u8])
    }));

    FrameCodec::new(100).encode(&image, ImageFormat::Jpeg, &high).unwrap();
    FrameCodec::new(10).encode(&image, ImageFormat::Jpeg, &low).unwrap();

    let size = |path: &std::path::PathBuf| std::fs::metadata(path).unwrap().len();
    assert!(size(&low) < size(&high));
}

#[test]
fn existing_file_is_replaced() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("frame.png");
    std::fs::write(&path, b"stale").unwrap();

    FrameCodec::default()
        .encode(&gradient(2, 2), ImageFormat::Png, &path)
        .unwrap();

    assert_eq!(image::open(&path).unwrap().dimensions(), (2, 2));
}

#[test]
fn unwritable_destination_names_the_path() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("missing").join("frame.png");

    let error = FrameCodec::default()
        .encode(&gradient(2, 2), ImageFormat::Png, &path)
        .unwrap_err();

    match error {
        FrameGrabError::EncodeError { path: failed, .. } => assert_eq!(failed, path),
        other => panic!("Expected EncodeError, got: {other}"),
    }
    assert!(!path.exists());
}
