use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{CanvasError, Result};

// ============================================================================
// SAVE FORMATS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    Bmp,
    Tga,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Webp => "webp",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
        }
    }

    pub fn all() -> &'static [SaveFormat] {
        &[
            SaveFormat::Png,
            SaveFormat::Jpeg,
            SaveFormat::Webp,
            SaveFormat::Bmp,
            SaveFormat::Tga,
        ]
    }

    /// Resolve a user-facing format name or file extension.
    pub fn from_name(name: &str) -> Option<SaveFormat> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "webp" => Some(SaveFormat::Webp),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            _ => None,
        }
    }

    /// Formats that drop the alpha channel on export.
    pub fn is_opaque(&self) -> bool {
        matches!(self, SaveFormat::Jpeg)
    }
}

// ============================================================================
// SNAPSHOT – lossless encoded copy of the whole surface
// ============================================================================

/// A lossless (PNG) encoding of a full surface, dimensions included.
///
/// History entries and restore requests carry these, so a snapshot taken
/// before a crop or resize restores the old size too.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Vec<u8>,
}

impl Snapshot {
    pub fn encode(image: &RgbaImage) -> Result<Self> {
        Ok(Self {
            bytes: encode_to_vec(image, SaveFormat::Png, 100)?,
        })
    }

    /// Wrap already-encoded bytes without validating them.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ============================================================================
// ENCODE / DECODE
// ============================================================================

/// Decode any supported encoded image into straight RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(CanvasError::Decode)?;
    Ok(img.to_rgba8())
}

/// Encode into an in-memory buffer. `quality` (1-100) only affects JPEG.
pub fn encode_to_vec(image: &RgbaImage, format: SaveFormat, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_encoded(image, &mut out, format, quality)?;
    Ok(out)
}

/// Encode and write an image to a file.
pub fn encode_and_write(image: &RgbaImage, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_encoded(image, &mut writer, format, quality)?;
    writer.flush()?;
    Ok(())
}

/// Read and decode an image file from disk.
pub fn load_image_file(path: &Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

fn write_encoded<W: Write>(image: &RgbaImage, writer: W, format: SaveFormat, quality: u8) -> Result<()> {
    let (w, h) = image.dimensions();
    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(writer);
            #[allow(deprecated)]
            encoder
                .encode(image.as_raw(), w, h, ColorType::Rgba8)
                .map_err(CanvasError::Encode)?;
        }
        SaveFormat::Jpeg => {
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut writer = writer;
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder
                .encode(rgb_image.as_raw(), w, h, ColorType::Rgb8)
                .map_err(CanvasError::Encode)?;
        }
        SaveFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(writer);
            encoder
                .encode(image.as_raw(), w, h, ColorType::Rgba8)
                .map_err(CanvasError::Encode)?;
        }
        SaveFormat::Bmp => {
            let mut writer = writer;
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder
                .encode(image.as_raw(), w, h, ColorType::Rgba8)
                .map_err(CanvasError::Encode)?;
        }
        SaveFormat::Tga => {
            let encoder = TgaEncoder::new(writer);
            encoder
                .encode(image.as_raw(), w, h, ColorType::Rgba8)
                .map_err(CanvasError::Encode)?;
        }
    }
    Ok(())
}
