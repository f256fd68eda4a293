// ============================================================================
// COLOR SAMPLER — HSV / Lab conversions and color-matching masks
// ============================================================================
//
// Two hue scales coexist:
//   - degrees [0, 360) for picked colors (`rgb_to_hsv_degrees`)
//   - stored hue [0, 179] inside 8-bit HSV triples (degrees / 2)
// Anything that builds a mask or an additive hue shift from a picked color
// must halve the degree value first (`ColorSample::stored_hue`).
// ============================================================================

use image::{GrayImage, Rgb};
use rayon::prelude::*;

use crate::buffer::{PixelBuffer, saturate_u8};

/// Largest value of the stored hue channel.
pub const STORED_HUE_MAX: u8 = 179;

/// HSV with hue in degrees, saturation and value on the 0..255 scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HsvDegrees {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

/// A picked color together with its derived HSV triple.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorSample {
    pub rgb: Rgb<u8>,
    pub hsv: HsvDegrees,
}

impl ColorSample {
    pub fn new(rgb: Rgb<u8>) -> Self {
        Self { rgb, hsv: rgb_to_hsv_degrees(rgb) }
    }

    /// Hue on the stored 0..179 scale.
    pub fn stored_hue(&self) -> f32 {
        self.hsv.h / 2.0
    }
}

/// Max/min/delta HSV with `h` in degrees.
pub fn rgb_to_hsv_degrees(color: Rgb<u8>) -> HsvDegrees {
    let [r, g, b] = color.0.map(|c| c as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max == 0.0 { 0.0 } else { 255.0 * delta / max };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        60.0 * (2.0 + (b - r) / delta)
    } else {
        60.0 * (4.0 + (r - g) / delta)
    };
    if h < 0.0 {
        h += 360.0;
    }

    HsvDegrees { h, s, v }
}

/// Rec.601 luma, rounded to 8 bits.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    saturate_u8(0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
}

// ---------------------------------------------------------------------------
//  8-bit HSV (H 0..179, S 0..255, V 0..255)
// ---------------------------------------------------------------------------

/// Convert one RGB pixel to the stored 8-bit HSV triple.
pub fn rgb_to_hsv8(px: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = px.map(|c| c as i32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 { 0 } else { saturate_u8(255.0 * diff as f32 / v as f32) as i32 };

    let h = if diff == 0 {
        0.0
    } else {
        let deg = if v == r {
            60.0 * (g - b) as f32 / diff as f32
        } else if v == g {
            120.0 + 60.0 * (b - r) as f32 / diff as f32
        } else {
            240.0 + 60.0 * (r - g) as f32 / diff as f32
        };
        let mut half = (deg / 2.0).round();
        if half < 0.0 {
            half += 180.0;
        }
        if half >= 180.0 {
            half -= 180.0;
        }
        half
    };

    [h as u8, s as u8, v as u8]
}

/// Convert a stored 8-bit HSV triple back to RGB.
pub fn hsv8_to_rgb(hsv: [u8; 3]) -> [u8; 3] {
    let h = hsv[0] as f32 * 2.0;
    let s = hsv[1] as f32 / 255.0;
    let v = hsv[2] as f32 / 255.0;
    let (r, g, b) = hsv_to_rgb_unit(h, s, v);
    [saturate_u8(r * 255.0), saturate_u8(g * 255.0), saturate_u8(b * 255.0)]
}

/// Sector-based HSV → RGB; `h` in degrees, `s`/`v` in 0..1.
fn hsv_to_rgb_unit(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    if s <= 0.0 {
        return (v, v, v);
    }
    let mut hh = h / 60.0;
    while hh < 0.0 {
        hh += 6.0;
    }
    while hh >= 6.0 {
        hh -= 6.0;
    }
    let sector = hh.floor();
    let f = hh - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Saturating add on the stored hue channel: the result is clamped into
/// `[0, 179]`, never wrapped.
#[inline]
pub fn add_hue(h: u8, delta: f32) -> u8 {
    (h as f32 + delta).round().clamp(0.0, STORED_HUE_MAX as f32) as u8
}

/// Saturating add on an 8-bit channel.
#[inline]
pub fn add_channel(v: u8, delta: f32) -> u8 {
    saturate_u8(v as f32 + delta)
}

/// Round-trip every pixel through 8-bit HSV, letting `adjust` edit the
/// stored triple in between.
pub fn map_hsv<F>(buf: &PixelBuffer, adjust: F) -> PixelBuffer
where
    F: Fn([u8; 3]) -> [u8; 3] + Sync,
{
    buf.map_pixels(|px| hsv8_to_rgb(adjust(rgb_to_hsv8(px))))
}

/// Fixed additive shift of the stored H, S and V channels.
pub fn shift_hsv(buf: &PixelBuffer, dh: f32, ds: f32, dv: f32) -> PixelBuffer {
    map_hsv(buf, |[h, s, v]| [add_hue(h, dh), add_channel(s, ds), add_channel(v, dv)])
}

/// Binary mask of pixels whose stored HSV lies inside `[lo, hi]` on every
/// channel (inclusive, 255 = inside).
pub fn hsv_in_range(buf: &PixelBuffer, lo: [f32; 3], hi: [f32; 3]) -> GrayImage {
    let (w, h) = buf.dimensions();
    let raw: Vec<u8> = buf
        .as_raw()
        .par_chunks_exact(3)
        .map(|p| {
            let hsv = rgb_to_hsv8([p[0], p[1], p[2]]);
            let inside = (0..3).all(|c| {
                let v = hsv[c] as f32;
                v >= lo[c] && v <= hi[c]
            });
            if inside { 255 } else { 0 }
        })
        .collect();
    GrayImage::from_raw(w, h, raw).unwrap_or_else(|| GrayImage::new(w, h))
}

// ---------------------------------------------------------------------------
//  8-bit CIE Lab (L scaled to 0..255, a/b offset by 128), sRGB / D65
// ---------------------------------------------------------------------------

const D65_X: f32 = 0.950456;
const D65_Z: f32 = 1.088754;

const SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.412453, 0.357580, 0.180423],
    [0.212671, 0.715160, 0.072169],
    [0.019334, 0.119193, 0.950227],
];

const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [3.240479, -1.53715, -0.498535],
    [-0.969256, 1.875991, 0.041556],
    [0.055648, -0.204043, 1.057311],
];

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 { c * 12.92 } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA { t.cbrt() } else { t / (3.0 * DELTA * DELTA) + 4.0 / 29.0 }
}

#[inline]
fn lab_f_inv(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA { t * t * t } else { 3.0 * DELTA * DELTA * (t - 4.0 / 29.0) }
}

/// RGB → 8-bit Lab triple.
pub fn rgb_to_lab8(px: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = px.map(|c| srgb_to_linear(c as f32 / 255.0));
    let m = &SRGB_TO_XYZ;
    let x = (m[0][0] * r + m[0][1] * g + m[0][2] * b) / D65_X;
    let y = m[1][0] * r + m[1][1] * g + m[1][2] * b;
    let z = (m[2][0] * r + m[2][1] * g + m[2][2] * b) / D65_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = 116.0 * fy - 16.0;
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);

    [saturate_u8(l * 255.0 / 100.0), saturate_u8(a + 128.0), saturate_u8(bb + 128.0)]
}

/// 8-bit Lab triple → RGB.
pub fn lab8_to_rgb(lab: [u8; 3]) -> [u8; 3] {
    let l = lab[0] as f32 * 100.0 / 255.0;
    let a = lab[1] as f32 - 128.0;
    let b = lab[2] as f32 - 128.0;

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let x = D65_X * lab_f_inv(fx);
    let y = lab_f_inv(fy);
    let z = D65_Z * lab_f_inv(fz);

    let m = &XYZ_TO_SRGB;
    let lin = [
        m[0][0] * x + m[0][1] * y + m[0][2] * z,
        m[1][0] * x + m[1][1] * y + m[1][2] * z,
        m[2][0] * x + m[2][1] * y + m[2][2] * z,
    ];
    lin.map(|c| saturate_u8(linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0))
}

/// Fixed additive shift of the 8-bit L, a and b channels.
pub fn shift_lab(buf: &PixelBuffer, dl: f32, da: f32, db: f32) -> PixelBuffer {
    buf.map_pixels(|px| {
        let [l, a, b] = rgb_to_lab8(px);
        lab8_to_rgb([add_channel(l, dl), add_channel(a, da), add_channel(b, db)])
    })
}

// ---------------------------------------------------------------------------
//  Text form ("r,g,b" or "#rrggbb")
// ---------------------------------------------------------------------------

/// Serialize a color as "r,g,b".
pub fn color_to_str(c: Rgb<u8>) -> String {
    format!("{},{},{}", c[0], c[1], c[2])
}

/// Parse a color from "r,g,b" or "#rrggbb".
pub fn str_to_color(s: &str) -> Option<Rgb<u8>> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let v = u32::from_str_radix(hex, 16).ok()?;
        return Some(Rgb([(v >> 16) as u8, (v >> 8) as u8, v as u8]));
    }
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() == 3 {
        let r = parts[0].trim().parse::<u8>().ok()?;
        let g = parts[1].trim().parse::<u8>().ok()?;
        let b = parts[2].trim().parse::<u8>().ok()?;
        Some(Rgb([r, g, b]))
    } else {
        None
    }
}
