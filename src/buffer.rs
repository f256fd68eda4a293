// ============================================================================
// PIXEL BUFFER — owned 3-channel 8-bit image storage
// ============================================================================
//
// Every stage of the engine produces a fresh PixelBuffer rather than mutating
// one that is referenced elsewhere. Transient buffers are ordinary locals and
// are released when they go out of scope.
// ============================================================================

use image::{GrayImage, Rgb, Rgb32FImage, RgbImage};
use rayon::prelude::*;

use crate::error::{EditorError, Result};

/// Wide-precision accumulator used by the tone math.
pub type FloatBuffer = Rgb32FImage;

/// An owned, non-empty grid of RGB samples.
///
/// Dimensions are fixed for the lifetime of the value; resizing always
/// produces a new buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: RgbImage,
}

impl PixelBuffer {
    /// Allocate a black buffer. Fails instead of aborting when the storage
    /// cannot be reserved.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::filled(width, height, Rgb([0, 0, 0]))
    }

    /// Allocate a buffer with every pixel set to `color`.
    pub fn filled(width: u32, height: u32, color: Rgb<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EditorError::DegenerateRegion);
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or(EditorError::Allocation { width, height })?;
        let mut raw: Vec<u8> = Vec::new();
        raw.try_reserve_exact(len)
            .map_err(|_| EditorError::Allocation { width, height })?;
        for _ in 0..(len / 3) {
            raw.extend_from_slice(&color.0);
        }
        let pixels = RgbImage::from_raw(width, height, raw)
            .ok_or(EditorError::Allocation { width, height })?;
        Ok(Self { pixels })
    }

    /// Wrap an already decoded image. Zero-area images are rejected.
    pub fn from_rgb_image(pixels: RgbImage) -> Result<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(EditorError::DegenerateRegion);
        }
        Ok(Self { pixels })
    }

    /// Build from interleaved RGB bytes.
    pub fn from_raw(width: u32, height: u32, raw: Vec<u8>) -> Result<Self> {
        let pixels = RgbImage::from_raw(width, height, raw)
            .ok_or(EditorError::Allocation { width, height })?;
        Self::from_rgb_image(pixels)
    }

    /// Replicate a single-channel image into all three channels.
    pub fn from_luma(gray: &GrayImage) -> Result<Self> {
        let raw: Vec<u8> = gray.as_raw().iter().flat_map(|&v| [v, v, v]).collect();
        Self::from_raw(gray.width(), gray.height(), raw)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.pixels.get_pixel(x, y)
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, px: Rgb<u8>) {
        self.pixels.put_pixel(x, y, px);
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn as_rgb_image(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn into_rgb_image(self) -> RgbImage {
        self.pixels
    }

    /// Bytes held by the pixel storage.
    pub fn memory_size(&self) -> usize {
        self.pixels.as_raw().len()
    }

    /// Widen to the f32 accumulator, optionally applying `v * alpha + beta`
    /// on the way (the linear contrast/brightness step).
    pub fn to_float_scaled(&self, alpha: f32, beta: f32) -> FloatBuffer {
        let raw: Vec<f32> = self
            .pixels
            .as_raw()
            .iter()
            .map(|&v| v as f32 * alpha + beta)
            .collect();
        // Length always matches the source dimensions.
        FloatBuffer::from_raw(self.width(), self.height(), raw)
            .unwrap_or_else(|| FloatBuffer::new(self.width(), self.height()))
    }

    pub fn to_float(&self) -> FloatBuffer {
        self.to_float_scaled(1.0, 0.0)
    }

    /// Narrow an accumulator back to 8 bits, rounding and saturating each
    /// sample into `[0, 255]`.
    pub fn from_float_saturating(src: &FloatBuffer) -> Result<Self> {
        let raw: Vec<u8> = src.as_raw().iter().map(|&v| saturate_u8(v)).collect();
        Self::from_raw(src.width(), src.height(), raw)
    }

    /// Per-pixel transform into a new buffer, parallel by row.
    pub fn map_pixels<F>(&self, transform: F) -> PixelBuffer
    where
        F: Fn([u8; 3]) -> [u8; 3] + Sync,
    {
        self.map_pixels_at(|_, _, px| transform(px))
    }

    /// Like [`PixelBuffer::map_pixels`] but the closure also receives the
    /// pixel coordinates.
    pub fn map_pixels_at<F>(&self, transform: F) -> PixelBuffer
    where
        F: Fn(u32, u32, [u8; 3]) -> [u8; 3] + Sync,
    {
        let w = self.width() as usize;
        let stride = w * 3;
        let src_raw = self.pixels.as_raw();
        let mut dst_raw = vec![0u8; src_raw.len()];

        dst_raw
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row_out)| {
                let row_in = &src_raw[y * stride..(y + 1) * stride];
                for x in 0..w {
                    let pi = x * 3;
                    let px = [row_in[pi], row_in[pi + 1], row_in[pi + 2]];
                    row_out[pi..pi + 3].copy_from_slice(&transform(x as u32, y as u32, px));
                }
            });

        let pixels = RgbImage::from_raw(self.width(), self.height(), dst_raw)
            .unwrap_or_else(|| self.pixels.clone());
        PixelBuffer { pixels }
    }

    /// Rec.601 luma, rounded.
    pub fn to_luma(&self) -> GrayImage {
        let raw: Vec<u8> = self
            .pixels
            .as_raw()
            .chunks_exact(3)
            .map(|p| crate::ops::color::luma(p[0], p[1], p[2]))
            .collect();
        GrayImage::from_raw(self.width(), self.height(), raw)
            .unwrap_or_else(|| GrayImage::new(self.width(), self.height()))
    }
}

/// Round and clamp into the 8-bit range.
#[inline]
pub fn saturate_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_is_rejected() {
        assert_eq!(PixelBuffer::new(0, 10).unwrap_err(), EditorError::DegenerateRegion);
        assert_eq!(
            PixelBuffer::from_rgb_image(RgbImage::new(4, 0)).unwrap_err(),
            EditorError::DegenerateRegion
        );
    }

    #[test]
    fn clone_is_independent() {
        let mut a = PixelBuffer::filled(2, 2, Rgb([10, 20, 30])).unwrap();
        let b = a.clone();
        a.put_pixel(0, 0, Rgb([255, 255, 255]));
        assert_eq!(b.get_pixel(0, 0), Rgb([10, 20, 30]));
        assert_ne!(a, b);
    }

    #[test]
    fn float_round_trip_saturates() {
        let buf = PixelBuffer::filled(3, 1, Rgb([250, 128, 3])).unwrap();
        let wide = buf.to_float_scaled(1.0, 10.0);
        let back = PixelBuffer::from_float_saturating(&wide).unwrap();
        assert_eq!(back.get_pixel(1, 0), Rgb([255, 138, 13]));

        let dark = PixelBuffer::from_float_saturating(&buf.to_float_scaled(1.0, -10.0)).unwrap();
        assert_eq!(dark.get_pixel(0, 0), Rgb([240, 118, 0]));
    }

    #[test]
    fn luma_replicates_to_three_channels() {
        let gray = GrayImage::from_raw(2, 1, vec![7, 200]).unwrap();
        let buf = PixelBuffer::from_luma(&gray).unwrap();
        assert_eq!(buf.get_pixel(1, 0), Rgb([200, 200, 200]));
    }

    #[test]
    fn overflowing_dimensions_report_allocation_failure() {
        let err = PixelBuffer::new(u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err, EditorError::Allocation { .. }));
    }
}
