// SPDX-License-Identifier: GPL-3.0-only

//! Artifact naming and image encoding for recorded frames
//!
//! Every sampled tick produces three files sharing one frame index:
//!
//! ```text
//! color_007.png           aligned color (or raw color in depth-to-color mode)
//! color_unmapped_007.png  raw color
//! depth_007.png           16-bit depth, millimetres unchanged
//! ```

use crate::backends::sensor::{ColorFrame, DepthFrame, FrameSize};
use crate::constants::recording::FRAME_INDEX_WIDTH;
use crate::display::visualization::{bgra_to_rgba, rgba_to_bgra};
use crate::errors::{RecordingError, SensorError};
use image::{ImageBuffer, ImageFormat, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lossless encodings capable of 16-bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// PNG format (lossless compression)
    #[default]
    Png,
    /// TIFF format (uncompressed)
    Tiff,
}

impl EncodingFormat {
    pub const ALL: [EncodingFormat; 2] = [EncodingFormat::Png, EncodingFormat::Tiff];

    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Png => "png",
            EncodingFormat::Tiff => "tiff",
        }
    }

    fn to_image_format(self) -> ImageFormat {
        match self {
            EncodingFormat::Png => ImageFormat::Png,
            EncodingFormat::Tiff => ImageFormat::Tiff,
        }
    }

    /// Format for a file extension (case-insensitive, `tif` accepted)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(EncodingFormat::Png),
            "tif" | "tiff" => Some(EncodingFormat::Tiff),
            _ => None,
        }
    }
}

impl std::fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// The three artifacts written per sampled tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Color,
    ColorUnmapped,
    Depth,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Color,
        ArtifactKind::ColorUnmapped,
        ArtifactKind::Depth,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Color => "color",
            ArtifactKind::ColorUnmapped => "color_unmapped",
            ArtifactKind::Depth => "depth",
        }
    }
}

/// Zero-pad a frame index to three digits; larger indices widen
pub fn format_frame_index(index: u32) -> String {
    format!("{:0width$}", index, width = FRAME_INDEX_WIDTH)
}

/// `<prefix>_<NNN>.<ext>`
pub fn artifact_file_name(kind: ArtifactKind, index: u32, format: EncodingFormat) -> String {
    format!(
        "{}_{}.{}",
        kind.prefix(),
        format_frame_index(index),
        format.extension()
    )
}

/// Parse an artifact file name back into kind, index and format
pub fn parse_artifact_name(name: &str) -> Option<(ArtifactKind, u32, EncodingFormat)> {
    let (stem, ext) = name.rsplit_once('.')?;
    let format = EncodingFormat::from_extension(ext)?;
    let (prefix, digits) = stem.rsplit_once('_')?;

    if digits.len() < FRAME_INDEX_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let kind = ArtifactKind::ALL
        .into_iter()
        .find(|kind| kind.prefix() == prefix)?;
    let index = digits.parse().ok()?;
    Some((kind, index, format))
}

fn write_error(path: &Path, err: impl std::fmt::Display) -> RecordingError {
    RecordingError::Write {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Encode a BGRA frame as 8-bit RGBA
pub fn write_color_artifact(
    path: &Path,
    frame: &ColorFrame,
    format: EncodingFormat,
) -> Result<(), RecordingError> {
    let rgba = bgra_to_rgba(frame.as_slice());
    let img = RgbaImage::from_raw(frame.width, frame.height, rgba)
        .ok_or_else(|| write_error(path, "color buffer does not match frame size"))?;
    img.save_with_format(path, format.to_image_format())
        .map_err(|e| write_error(path, e))
}

/// Encode a depth frame as 16-bit single-channel, values unchanged
pub fn write_depth_artifact(
    path: &Path,
    frame: &DepthFrame,
    format: EncodingFormat,
) -> Result<(), RecordingError> {
    let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(
        frame.width,
        frame.height,
        frame.as_slice().to_vec(),
    )
    .ok_or_else(|| write_error(path, "depth buffer does not match frame size"))?;
    img.save_with_format(path, format.to_image_format())
        .map_err(|e| write_error(path, e))
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> SensorError {
    SensorError::Decode {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Decode a color artifact back into a BGRA frame
pub fn read_color_artifact(path: &Path) -> Result<ColorFrame, SensorError> {
    let img = image::open(path)
        .map_err(|e| decode_error(path, e))?
        .to_rgba8();
    let size = FrameSize::new(img.width(), img.height());
    ColorFrame::from_vec(size, rgba_to_bgra(img.as_raw()))
}

/// Decode a 16-bit depth artifact
pub fn read_depth_artifact(path: &Path) -> Result<DepthFrame, SensorError> {
    let img = image::open(path)
        .map_err(|e| decode_error(path, e))?
        .to_luma16();
    let size = FrameSize::new(img.width(), img.height());
    DepthFrame::from_vec(size, img.into_raw())
}

/// Pixel dimensions of an image file without decoding it
pub fn artifact_size(path: &Path) -> Result<FrameSize, SensorError> {
    let (width, height) = image::image_dimensions(path).map_err(|e| decode_error(path, e))?;
    Ok(FrameSize::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_padding() {
        assert_eq!(format_frame_index(9), "009");
        assert_eq!(format_frame_index(10), "010");
        assert_eq!(format_frame_index(36), "036");
        assert_eq!(format_frame_index(99), "099");
        assert_eq!(format_frame_index(100), "100");
        assert_eq!(format_frame_index(1000), "1000");
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!(
            artifact_file_name(ArtifactKind::ColorUnmapped, 7, EncodingFormat::Png),
            "color_unmapped_007.png"
        );
        assert_eq!(
            artifact_file_name(ArtifactKind::Depth, 1234, EncodingFormat::Tiff),
            "depth_1234.tiff"
        );
    }

    #[test]
    fn test_parse_artifact_names() {
        assert_eq!(
            parse_artifact_name("color_unmapped_042.png"),
            Some((ArtifactKind::ColorUnmapped, 42, EncodingFormat::Png))
        );
        assert_eq!(
            parse_artifact_name("color_000.tif"),
            Some((ArtifactKind::Color, 0, EncodingFormat::Tiff))
        );
        assert_eq!(parse_artifact_name("depth_12.png"), None);
        assert_eq!(parse_artifact_name("depth_abc.png"), None);
        assert_eq!(parse_artifact_name("recordLog.json"), None);
        assert_eq!(parse_artifact_name("unmapped_001.png"), None);
    }

    #[test]
    fn test_depth_artifact_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let size = FrameSize::new(3, 2);
        let frame = DepthFrame::from_vec(size, vec![0, 1, 499, 8000, 40000, u16::MAX]).unwrap();

        for format in EncodingFormat::ALL {
            let path = dir
                .path()
                .join(artifact_file_name(ArtifactKind::Depth, 0, format));
            write_depth_artifact(&path, &frame, format).unwrap();
            let decoded = read_depth_artifact(&path).unwrap();
            assert_eq!(decoded.as_slice(), frame.as_slice(), "{format}");
        }
    }

    #[test]
    fn test_color_artifact_is_stored_as_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let frame = ColorFrame::filled(FrameSize::new(2, 2), [10, 20, 30, 255]);
        let path = dir.path().join("color_000.png");
        write_color_artifact(&path, &frame, EncodingFormat::Png).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(1, 1).0, [30, 20, 10, 255]);
        assert_eq!(read_color_artifact(&path).unwrap().pixel(0, 0), [10, 20, 30, 255]);
    }

    #[test]
    fn test_unwritable_path_reports_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("depth_000.png");
        let frame = DepthFrame::filled(FrameSize::new(2, 2), 100);
        assert!(matches!(
            write_depth_artifact(&path, &frame, EncodingFormat::Png),
            Err(RecordingError::Write { .. })
        ));
    }
}
