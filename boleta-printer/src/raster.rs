//! Raster image conversion
//!
//! Turns bitmaps into the packed monochrome format of `GS v 0`:
//! one bit per dot, MSB = leftmost dot, 1 = ink, rows padded to whole
//! bytes with non-ink bits.

use crate::error::{PrintError, PrintResult};

/// Pixels with alpha above this are opaque
pub const INK_ALPHA_THRESHOLD: u8 = 128;

/// Opaque pixels with luminance below this print as ink
pub const INK_LUMA_THRESHOLD: f32 = 128.0;

/// Default logo width in dots
pub const LOGO_TARGET_WIDTH: u32 = 380;

/// Contrast boost applied to logos before posterizing
const LOGO_CONTRAST: f32 = 40.0;

/// Packed monochrome bitmap ready for `GS v 0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBlock {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterBlock {
    /// Wrap already packed rows
    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> PrintResult<Self> {
        let row_bytes = check_dimensions(width, height)?;
        let expected = row_bytes * height as usize;
        if data.len() != expected {
            return Err(PrintError::Encoding(format!(
                "raster data is {} bytes, expected {}",
                data.len(),
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Pack pixels row by row, asking `is_ink(x, y)` for each dot
    pub fn pack(width: u32, height: u32, is_ink: impl Fn(u32, u32) -> bool) -> PrintResult<Self> {
        let row_bytes = check_dimensions(width, height)?;
        let mut data = Vec::with_capacity(row_bytes * height as usize);

        for y in 0..height {
            for x_byte in 0..row_bytes as u32 {
                let mut byte = 0u8;
                for bit in 0..8 {
                    let x = x_byte * 8 + bit;
                    if x < width && is_ink(x, y) {
                        byte |= 1 << (7 - bit);
                    }
                }
                data.push(byte);
            }
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row: `ceil(width / 8)`
    pub fn row_bytes(&self) -> usize {
        self.width.div_ceil(8) as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Append `GS v 0 m xL xH yL yH d1...dk` to `out`
    pub fn write_command(&self, out: &mut Vec<u8>) {
        let x_bytes = self.row_bytes();
        out.reserve(8 + self.data.len());
        out.extend_from_slice(&[0x1D, 0x76, 0x30, 0x00]);
        out.push(x_bytes as u8);
        out.push((x_bytes >> 8) as u8);
        out.push(self.height as u8);
        out.push((self.height >> 8) as u8);
        out.extend_from_slice(&self.data);
    }

    /// Full `GS v 0` command
    pub fn command(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_command(&mut out);
        out
    }
}

/// Validate that both header fields fit their two-byte slots
fn check_dimensions(width: u32, height: u32) -> PrintResult<usize> {
    if width == 0 || height == 0 {
        return Err(PrintError::Encoding(format!(
            "empty raster {}x{}",
            width, height
        )));
    }
    let row_bytes = width.div_ceil(8);
    if row_bytes > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(PrintError::Encoding(format!(
            "raster {}x{} exceeds the encodable size",
            width, height
        )));
    }
    Ok(row_bytes as usize)
}

/// Whether an RGBA pixel prints as ink
///
/// Luminance uses the Rec. 709 weights.
pub fn is_ink(r: u8, g: u8, b: u8, a: u8) -> bool {
    if a <= INK_ALPHA_THRESHOLD {
        return false;
    }
    let luma = 0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32;
    luma < INK_LUMA_THRESHOLD
}

#[cfg(feature = "image")]
pub use self::imaging::{load_logo, prepare_logo, to_device_raster, to_device_raster_gray};

#[cfg(feature = "image")]
mod imaging {
    use super::*;
    use image::{DynamicImage, GenericImageView, GrayImage, RgbaImage};
    use tracing::{info, instrument};

    /// Threshold and pack an RGBA bitmap
    pub fn to_device_raster(img: &RgbaImage) -> PrintResult<RasterBlock> {
        RasterBlock::pack(img.width(), img.height(), |x, y| {
            let p = img.get_pixel(x, y);
            is_ink(p[0], p[1], p[2], p[3])
        })
    }

    /// Threshold and pack a greyscale bitmap (fully opaque)
    pub fn to_device_raster_gray(img: &GrayImage) -> PrintResult<RasterBlock> {
        RasterBlock::pack(img.width(), img.height(), |x, y| {
            let l = img.get_pixel(x, y)[0];
            is_ink(l, l, l, u8::MAX)
        })
    }

    /// Resize, greyscale, boost contrast and posterize a logo
    ///
    /// Height follows the aspect ratio. Alpha is kept so transparent
    /// areas stay blank.
    pub fn prepare_logo(img: &DynamicImage, target_width: u32) -> PrintResult<RgbaImage> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 || target_width == 0 {
            return Err(PrintError::Encoding(format!("empty logo {}x{}", w, h)));
        }

        let target_height = ((h as f64 * target_width as f64 / w as f64).round() as u32).max(1);
        let resized = img.resize_exact(
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        let mut rgba = resized
            .grayscale()
            .adjust_contrast(LOGO_CONTRAST)
            .to_rgba8();

        for p in rgba.pixels_mut() {
            let level = if (p[0] as f32) < INK_LUMA_THRESHOLD { 0 } else { 255 };
            p[0] = level;
            p[1] = level;
            p[2] = level;
        }

        Ok(rgba)
    }

    /// Open a logo file and prepare it for printing
    #[instrument]
    pub fn load_logo(path: &str, target_width: u32) -> PrintResult<RgbaImage> {
        let img = image::open(path)
            .map_err(|e| PrintError::Encoding(format!("open logo {}: {}", path, e)))?;
        info!(dimensions = ?img.dimensions(), "logo image opened");
        prepare_logo(&img, target_width)
    }
}
