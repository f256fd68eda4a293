// ============================================================================
// IMAGE I/O — decode files into PixelBuffers and encode them back out
// ============================================================================

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError};

use crate::buffer::PixelBuffer;
use crate::error::{EditorError, Result};

/// Output container for [`encode_and_write`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tiff,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tiff => "tiff",
        }
    }

    /// Format for a file extension (case-insensitive), if supported.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tif" | "tiff" => Some(SaveFormat::Tiff),
            _ => None,
        }
    }

    /// Infer from the path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| {
            EditorError::Encode(format!("unsupported output format '{}' for {}", ext, path.display()))
        })
    }
}

impl FromStr for SaveFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SaveFormat::from_extension(s).ok_or_else(|| format!("unknown format '{}'", s))
    }
}

/// Compression options for TIFF format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TiffCompression {
    #[default]
    None,
    Lzw,
    Deflate,
}

impl FromStr for TiffCompression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TiffCompression::None),
            "lzw" => Ok(TiffCompression::Lzw),
            "deflate" => Ok(TiffCompression::Deflate),
            _ => Err(format!("unknown TIFF compression '{}' (none, lzw, deflate)", s)),
        }
    }
}

/// Encoder settings for one save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveOptions {
    pub format: SaveFormat,
    /// JPEG quality, 1..=100.
    pub quality: u8,
    pub tiff_compression: TiffCompression,
}

impl SaveOptions {
    pub fn new(format: SaveFormat) -> Self {
        Self { format, quality: 90, tiff_compression: TiffCompression::None }
    }
}

// ============================================================================
// DECODE
// ============================================================================

/// Decode any supported raster file to 8-bit RGB. Alpha is dropped.
pub fn load_image(path: &Path) -> Result<PixelBuffer> {
    let img = image::io::Reader::open(path)
        .map_err(|e| EditorError::Decode(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| EditorError::Decode(format!("{}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| decode_error(path, e))?;
    PixelBuffer::from_rgb_image(img.to_rgb8())
}

/// Decode an in-memory encoded image.
pub fn decode_bytes(bytes: &[u8]) -> Result<PixelBuffer> {
    let img = image::load_from_memory(bytes).map_err(|e| EditorError::Decode(e.to_string()))?;
    PixelBuffer::from_rgb_image(img.to_rgb8())
}

fn decode_error(path: &Path, e: ImageError) -> EditorError {
    match e {
        ImageError::Limits(l) => EditorError::Decode(format!("{}: image too large ({})", path.display(), l)),
        other => EditorError::Decode(format!("{}: {}", path.display(), other)),
    }
}

// ============================================================================
// ENCODE
// ============================================================================

/// Encode `image` and write it to `path`. The bytes go to a sibling
/// `.tmp` file that is renamed over `path` only once fully written, so a
/// failed save never leaves a truncated image behind.
pub fn encode_and_write(image: &PixelBuffer, path: &Path, options: SaveOptions) -> Result<()> {
    let temp_path = temp_path_for(path);
    let written = File::create(&temp_path)
        .map_err(|e| EditorError::Encode(format!("{}: {}", temp_path.display(), e)))
        .and_then(|file| encode_into(image, file, path, options));

    let renamed = written.and_then(|()| {
        fs::rename(&temp_path, path).map_err(|e| {
            EditorError::Encode(format!("{}: could not replace with {}: {}", path.display(), temp_path.display(), e))
        })
    });
    if renamed.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    renamed
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn encode_into(image: &PixelBuffer, file: File, path: &Path, options: SaveOptions) -> Result<()> {
    let mut writer = BufWriter::new(file);
    let (w, h) = image.dimensions();
    let encode_err = |e: ImageError| EditorError::Encode(format!("{}: {}", path.display(), e));

    match options.format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer)
                .write_image(image.as_raw(), w, h, image::ColorType::Rgb8)
                .map_err(encode_err)?;
        }
        SaveFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, options.quality.clamp(1, 100));
            encoder
                .encode(image.as_raw(), w, h, image::ColorType::Rgb8)
                .map_err(encode_err)?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder
                .encode(image.as_raw(), w, h, image::ColorType::Rgb8)
                .map_err(encode_err)?;
        }
        SaveFormat::Tiff => {
            let err_map =
                |e: tiff::TiffError| EditorError::Encode(format!("{}: TIFF encode error: {}", path.display(), e));
            let mut tiff_enc = tiff::encoder::TiffEncoder::new(&mut writer).map_err(err_map)?;
            match options.tiff_compression {
                TiffCompression::None => {
                    tiff_enc
                        .write_image::<tiff::encoder::colortype::RGB8>(w, h, image.as_raw())
                        .map_err(err_map)?;
                }
                TiffCompression::Lzw => {
                    tiff_enc
                        .write_image_with_compression::<tiff::encoder::colortype::RGB8, _>(
                            w,
                            h,
                            tiff::encoder::compression::Lzw,
                            image.as_raw(),
                        )
                        .map_err(err_map)?;
                }
                TiffCompression::Deflate => {
                    tiff_enc
                        .write_image_with_compression::<tiff::encoder::colortype::RGB8, _>(
                            w,
                            h,
                            tiff::encoder::compression::Deflate::default(),
                            image.as_raw(),
                        )
                        .map_err(err_map)?;
                }
            }
        }
    }

    let io_err = |e: std::io::Error| EditorError::Encode(format!("{}: {}", path.display(), e));
    writer.flush().map_err(io_err)?;
    writer.get_ref().sync_all().map_err(io_err)
}
