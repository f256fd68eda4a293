// ============================================================================
// IMAGE FILTERS — Gaussian blur, convolution, blending, local equalization
// ============================================================================
//
// All neighbourhood filters sample past the edge with reflect-101 borders
// (`dcb|abcd|cba`): the edge pixel itself is not repeated.
// ============================================================================

use image::{GrayImage, RgbImage, imageops};
use rayon::prelude::*;

use crate::buffer::{PixelBuffer, saturate_u8};

/// Mirror an out-of-range index back into `[0, n)` without repeating the edge.
#[inline]
fn reflect101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let last = n as isize - 1;
    loop {
        if i < 0 {
            i = -i;
        } else if i > last {
            i = 2 * last - i;
        } else {
            return i as usize;
        }
    }
}

/// Sigma implied by a kernel size when none is given.
pub fn sigma_for_ksize(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Kernel size implied by a sigma when none is given (always odd).
pub fn ksize_for_sigma(sigma: f32) -> usize {
    ((sigma * 6.0 + 1.0).round() as usize) | 1
}

/// Normalized 1-D Gaussian of odd length `ksize`. Either argument may be
/// zero, in which case it is derived from the other.
pub fn gaussian_kernel(ksize: usize, sigma: f32) -> Vec<f32> {
    let ksize = if ksize == 0 { ksize_for_sigma(sigma) } else { ksize | 1 };
    let sigma = if sigma <= 0.0 { sigma_for_ksize(ksize) } else { sigma };
    let radius = (ksize / 2) as f32;
    let s2 = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..ksize)
        .map(|i| {
            let x = i as f32 - radius;
            (-x * x / s2).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    let inv = 1.0 / sum;
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Separable convolution over interleaved `channels`-wide samples,
/// parallel by row for both passes.
fn separable_blur(src: &[u8], w: usize, h: usize, channels: usize, kernel: &[f32]) -> Vec<u8> {
    let radius = kernel.len() as isize / 2;
    let stride = w * channels;

    // --- Horizontal pass ---
    let mut buf_h = vec![0.0f32; src.len()];
    buf_h.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src[y * stride..(y + 1) * stride];
        for x in 0..w {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = reflect101(x as isize + ki as isize - radius, w);
                    acc += row_in[sx * channels + c] as f32 * kv;
                }
                row_out[x * channels + c] = acc;
            }
        }
    });

    // --- Vertical pass ---
    let mut dst = vec![0u8; src.len()];
    dst.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = reflect101(y as isize + ki as isize - radius, h);
                    acc += buf_h[sy * stride + x * channels + c] * kv;
                }
                row_out[x * channels + c] = saturate_u8(acc);
            }
        }
    });
    dst
}

/// Gaussian blur of a color buffer.
pub fn gaussian_blur(buf: &PixelBuffer, ksize: usize, sigma: f32) -> PixelBuffer {
    let (w, h) = buf.dimensions();
    let kernel = gaussian_kernel(ksize, sigma);
    let raw = separable_blur(buf.as_raw(), w as usize, h as usize, 3, &kernel);
    PixelBuffer::from_raw(w, h, raw).unwrap_or_else(|_| buf.clone())
}

/// Gaussian blur of a single-channel image.
pub fn gaussian_blur_gray(gray: &GrayImage, ksize: usize, sigma: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let kernel = gaussian_kernel(ksize, sigma);
    let raw = separable_blur(gray.as_raw(), w as usize, h as usize, 1, &kernel);
    GrayImage::from_raw(w, h, raw).unwrap_or_else(|| gray.clone())
}

/// 3×3 convolution (correlation) with reflect-101 borders.
pub fn filter3x3(buf: &PixelBuffer, kernel: [[f32; 3]; 3]) -> PixelBuffer {
    let (w, h) = (buf.width() as usize, buf.height() as usize);
    let src = buf.as_raw();
    buf.map_pixels_at(|x, y, _| {
        let mut acc = [0.0f32; 3];
        for (ky, krow) in kernel.iter().enumerate() {
            let sy = reflect101(y as isize + ky as isize - 1, h);
            for (kx, &kv) in krow.iter().enumerate() {
                if kv == 0.0 {
                    continue;
                }
                let sx = reflect101(x as isize + kx as isize - 1, w);
                let i = (sy * w + sx) * 3;
                for c in 0..3 {
                    acc[c] += src[i + c] as f32 * kv;
                }
            }
        }
        acc.map(saturate_u8)
    })
}

/// `a·wa + b·wb + gamma`, rounded and saturated. Both buffers must share
/// dimensions; `a` is returned unchanged otherwise.
pub fn add_weighted(a: &PixelBuffer, wa: f32, b: &PixelBuffer, wb: f32, gamma: f32) -> PixelBuffer {
    if a.dimensions() != b.dimensions() {
        return a.clone();
    }
    let braw = b.as_raw();
    let w = a.width() as usize;
    a.map_pixels_at(|x, y, px| {
        let i = (y as usize * w + x as usize) * 3;
        [0, 1, 2].map(|c| saturate_u8(px[c] as f32 * wa + braw[i + c] as f32 * wb + gamma))
    })
}

/// Unsharp mask: `src·k − blurred·(k − 1)`.
pub fn unsharp(src: &PixelBuffer, blurred: &PixelBuffer, k: f32) -> PixelBuffer {
    add_weighted(src, k, blurred, 1.0 - k, 0.0)
}

/// Linear `v·alpha + beta` per sample, saturated to 8 bits.
pub fn convert_scale(buf: &PixelBuffer, alpha: f32, beta: f32) -> PixelBuffer {
    buf.map_pixels(|px| px.map(|v| saturate_u8(v as f32 * alpha + beta)))
}

/// Linear `v·alpha + beta` on a single-channel image.
pub fn convert_scale_gray(gray: &GrayImage, alpha: f32, beta: f32) -> GrayImage {
    let mut out = gray.clone();
    for v in out.iter_mut() {
        *v = saturate_u8(*v as f32 * alpha + beta);
    }
    out
}

// ---------------------------------------------------------------------------
//  Contrast-limited adaptive histogram equalization
// ---------------------------------------------------------------------------

/// Contrast-limited adaptive histogram equalization on a `tiles_x × tiles_y`
/// grid, bilinearly blending the per-tile lookup tables.
pub fn clahe(gray: &GrayImage, clip_limit: f32, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let (tx, ty) = (tiles_x.max(1) as usize, tiles_y.max(1) as usize);
    // Tiles that overhang the image read reflected pixels.
    let tile_w = w.div_ceil(tx);
    let tile_h = h.div_ceil(ty);
    let tile_area = (tile_w * tile_h) as f32;
    let src = gray.as_raw();

    let clip = if clip_limit > 0.0 {
        ((clip_limit * tile_area / 256.0) as usize).max(1)
    } else {
        usize::MAX
    };
    let lut_scale = 255.0 / tile_area;

    let luts: Vec<[u8; 256]> = (0..tx * ty)
        .into_par_iter()
        .map(|t| {
            let (tile_col, tile_row) = (t % tx, t / tx);
            let mut hist = [0usize; 256];
            for yy in 0..tile_h {
                let sy = reflect101((tile_row * tile_h + yy) as isize, h);
                for xx in 0..tile_w {
                    let sx = reflect101((tile_col * tile_w + xx) as isize, w);
                    hist[src[sy * w + sx] as usize] += 1;
                }
            }

            if clip != usize::MAX {
                let mut clipped = 0;
                for bin in hist.iter_mut() {
                    if *bin > clip {
                        clipped += *bin - clip;
                        *bin = clip;
                    }
                }
                let batch = clipped / 256;
                let mut residual = clipped - batch * 256;
                for bin in hist.iter_mut() {
                    *bin += batch;
                }
                if residual > 0 {
                    let step = (256 / residual).max(1);
                    let mut i = 0;
                    while i < 256 && residual > 0 {
                        hist[i] += 1;
                        residual -= 1;
                        i += step;
                    }
                }
            }

            let mut lut = [0u8; 256];
            let mut sum = 0usize;
            for (i, &count) in hist.iter().enumerate() {
                sum += count;
                lut[i] = saturate_u8(sum as f32 * lut_scale);
            }
            lut
        })
        .collect();

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let mut dst = vec![0u8; w * h];
    dst.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1 = tyf.floor() as isize;
        let ya = tyf - ty1 as f32;
        let ty2 = ((ty1 + 1) as usize).min(ty - 1);
        let ty1 = ty1.max(0) as usize;
        for (x, out) in row_out.iter_mut().enumerate() {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor() as isize;
            let xa = txf - tx1 as f32;
            let tx2 = ((tx1 + 1) as usize).min(tx - 1);
            let tx1 = tx1.max(0) as usize;

            let v = src[y * w + x] as usize;
            let top = luts[ty1 * tx + tx1][v] as f32 * (1.0 - xa) + luts[ty1 * tx + tx2][v] as f32 * xa;
            let bot = luts[ty2 * tx + tx1][v] as f32 * (1.0 - xa) + luts[ty2 * tx + tx2][v] as f32 * xa;
            *out = saturate_u8(top * (1.0 - ya) + bot * ya);
        }
    });

    GrayImage::from_raw(w as u32, h as u32, dst).unwrap_or_else(|| gray.clone())
}

// ---------------------------------------------------------------------------
//  Resampling helpers
// ---------------------------------------------------------------------------

/// Box-average downscale (every output pixel is the mean of its source area).
pub fn area_downscale(buf: &PixelBuffer, w: u32, h: u32) -> PixelBuffer {
    let out: RgbImage = imageops::thumbnail(buf.as_rgb_image(), w.max(1), h.max(1));
    PixelBuffer::from_rgb_image(out).unwrap_or_else(|_| buf.clone())
}

/// Nearest-neighbour resample.
pub fn nearest_resize(buf: &PixelBuffer, w: u32, h: u32) -> PixelBuffer {
    let out = imageops::resize(buf.as_rgb_image(), w.max(1), h.max(1), imageops::FilterType::Nearest);
    PixelBuffer::from_rgb_image(out).unwrap_or_else(|_| buf.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn reflect101_mirrors_without_repeating_edge() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(-3, 1), 0);
    }

    #[test]
    fn kernel_size_derivation() {
        assert_eq!(ksize_for_sigma(1.2), 9);
        assert_eq!(gaussian_kernel(0, 1.2).len(), 9);
        assert!((sigma_for_ksize(21) - 3.5).abs() < 1e-5);
        let k = gaussian_kernel(7, 2.0);
        assert_eq!(k.len(), 7);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((k[0] - k[6]).abs() < 1e-7);
    }

    #[test]
    fn blur_preserves_flat_image() {
        let buf = PixelBuffer::filled(5, 4, Rgb([40, 120, 250])).unwrap();
        assert_eq!(gaussian_blur(&buf, 21, 0.0), buf);
        assert_eq!(gaussian_blur(&buf, 0, 1.2), buf);
    }

    #[test]
    fn sharpen_kernel_boosts_isolated_pixel() {
        let mut buf = PixelBuffer::filled(3, 3, Rgb([100, 100, 100])).unwrap();
        buf.put_pixel(1, 1, Rgb([120, 120, 120]));
        let k = [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]];
        let out = filter3x3(&buf, k);
        assert_eq!(out.get_pixel(1, 1), Rgb([200, 200, 200]));
        assert_eq!(out.get_pixel(1, 0), Rgb([60, 60, 60]));
    }

    #[test]
    fn add_weighted_saturates() {
        let a = PixelBuffer::filled(1, 1, Rgb([200, 10, 128])).unwrap();
        let b = PixelBuffer::filled(1, 1, Rgb([100, 100, 128])).unwrap();
        let out = add_weighted(&a, 1.25, &b, -0.25, 0.0);
        assert_eq!(out.get_pixel(0, 0), Rgb([225, 0, 128]));
    }

    #[test]
    fn clahe_keeps_flat_image_flat() {
        let gray = GrayImage::from_pixel(16, 16, image::Luma([90]));
        let out = clahe(&gray, 2.0, 8, 8);
        let first = out.as_raw()[0];
        assert!(out.as_raw().iter().all(|&v| v == first));
    }

    #[test]
    fn clahe_stretches_low_contrast_ramp() {
        let raw: Vec<u8> = (0..64u32).map(|i| 100 + (i % 8) as u8).collect();
        let gray = GrayImage::from_raw(8, 8, raw).unwrap();
        let out = clahe(&gray, 2.0, 2, 2);
        let min = *out.as_raw().iter().min().unwrap();
        let max = *out.as_raw().iter().max().unwrap();
        assert!(max - min > 7, "range {}..{}", min, max);
    }

    #[test]
    fn area_then_nearest_makes_blocks() {
        let mut buf = PixelBuffer::filled(4, 2, Rgb([0, 0, 0])).unwrap();
        buf.put_pixel(0, 0, Rgb([200, 200, 200]));
        buf.put_pixel(1, 1, Rgb([200, 200, 200]));
        let small = area_downscale(&buf, 2, 1);
        assert_eq!(small.dimensions(), (2, 1));
        let avg = small.get_pixel(0, 0).0[0];
        assert!((99..=101).contains(&avg), "block average {}", avg);
        let big = nearest_resize(&small, 4, 2);
        assert_eq!(big.get_pixel(1, 1), small.get_pixel(0, 0));
        assert_eq!(big.get_pixel(3, 0), Rgb([0, 0, 0]));
    }
}
