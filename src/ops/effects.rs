// ============================================================================
// EFFECT CATALOG — one-shot stylistic transforms of the current buffer
// ============================================================================
//
// Every effect is a pure function `&PixelBuffer -> PixelBuffer`; the engine
// pushes history before swapping the result in. Puzzle and film grain draw
// from the thread RNG and are not reproducible between calls.
// ============================================================================

use std::fmt;
use std::str::FromStr;

use image::Rgb;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::buffer::{PixelBuffer, saturate_u8};
use crate::error::{Result, check_range};
use crate::ops::color::{
    ColorSample, STORED_HUE_MAX, add_channel, hsv_in_range, luma, map_hsv, shift_hsv, shift_lab,
    str_to_color,
};
use crate::ops::filters::{
    add_weighted, area_downscale, clahe, convert_scale, convert_scale_gray, filter3x3, gaussian_blur,
    gaussian_blur_gray, nearest_resize,
};

pub const DEFAULT_PIXEL_SIZE: u32 = 12;
pub const DEFAULT_PUZZLE_GRID: u32 = 4;
pub const MAX_PIXEL_SIZE: u32 = 512;
pub const MAX_PUZZLE_GRID: u32 = 32;

/// Stored-hue half window used by color pop.
pub const COLOR_POP_TOLERANCE: f32 = 8.0;
/// Stored-hue half window used by the color filter.
pub const COLOR_FILTER_TOLERANCE: f32 = 12.0;
/// Default recolor strength, percent.
pub const DEFAULT_COLOR_MIX: u32 = 90;

const SHARPEN_KERNEL: [[f32; 3]; 3] = [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]];

const DUOTONE_DARK: Rgb<u8> = Rgb([20, 60, 100]);
const DUOTONE_LIGHT: Rgb<u8> = Rgb([200, 120, 10]);
const CYANOTYPE_DARK: Rgb<u8> = Rgb([80, 40, 20]);
const CYANOTYPE_LIGHT: Rgb<u8> = Rgb([255, 220, 180]);

/// A named catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    GrayscaleContrast,
    Sketch,
    Pixelate(u32),
    Puzzle(u32),
    HdrBoost,
    WarmTone,
    ColdTone,
    Sharpen,
    SoftBlur,
    /// Hue rotation in degrees.
    HueShift(i32),
    Sepia,
    Duotone,
    Cyanotype,
    CrossProcess,
    Infrared,
    /// Keeps colors near the target hue; `None` uses the engine's picked color.
    ColorPop(Option<Rgb<u8>>),
    FilmGrain,
    VintageFilm,
    WarmPortrait,
    BleachBypass,
    Matte,
    HighKey,
    LowKey,
}

/// Fixed per-channel offset applied in a color space.
#[derive(Clone, Copy, Debug, PartialEq)]
enum ChannelShift {
    /// Stored hue, saturation, value.
    Hsv(f32, f32, f32),
    /// 8-bit L, a, b.
    Lab(f32, f32, f32),
}

impl Effect {
    /// Every preset in menu order, with default parameters.
    pub fn catalog() -> Vec<Effect> {
        vec![
            Effect::GrayscaleContrast,
            Effect::Sketch,
            Effect::Pixelate(DEFAULT_PIXEL_SIZE),
            Effect::Puzzle(DEFAULT_PUZZLE_GRID),
            Effect::HdrBoost,
            Effect::WarmTone,
            Effect::ColdTone,
            Effect::Sharpen,
            Effect::SoftBlur,
            Effect::HueShift(30),
            Effect::HueShift(-30),
            Effect::Sepia,
            Effect::Duotone,
            Effect::Cyanotype,
            Effect::CrossProcess,
            Effect::Infrared,
            Effect::ColorPop(None),
            Effect::FilmGrain,
            Effect::VintageFilm,
            Effect::WarmPortrait,
            Effect::BleachBypass,
            Effect::Matte,
            Effect::HighKey,
            Effect::LowKey,
        ]
    }

    /// Stable machine name (the part before `:` on the command line).
    pub fn name(&self) -> &'static str {
        match self {
            Effect::GrayscaleContrast => "grayscale",
            Effect::Sketch            => "sketch",
            Effect::Pixelate(_)       => "pixelate",
            Effect::Puzzle(_)         => "puzzle",
            Effect::HdrBoost          => "hdr-boost",
            Effect::WarmTone          => "warm-tone",
            Effect::ColdTone          => "cold-tone",
            Effect::Sharpen           => "sharpen",
            Effect::SoftBlur          => "soft-blur",
            Effect::HueShift(_)       => "hue-shift",
            Effect::Sepia             => "sepia",
            Effect::Duotone           => "duotone",
            Effect::Cyanotype         => "cyanotype",
            Effect::CrossProcess      => "cross-process",
            Effect::Infrared          => "infrared",
            Effect::ColorPop(_)       => "color-pop",
            Effect::FilmGrain         => "film-grain",
            Effect::VintageFilm       => "vintage-film",
            Effect::WarmPortrait      => "warm-portrait",
            Effect::BleachBypass      => "bleach-bypass",
            Effect::Matte             => "matte",
            Effect::HighKey           => "high-key",
            Effect::LowKey            => "low-key",
        }
    }

    /// Human-readable label, parameters included.
    pub fn label(&self) -> String {
        match self {
            Effect::GrayscaleContrast => "Black & White".into(),
            Effect::Sketch            => "Pencil Sketch".into(),
            Effect::Pixelate(n)       => format!("Pixelate ({} px)", n),
            Effect::Puzzle(n)         => format!("Puzzle ({}×{})", n, n),
            Effect::HdrBoost          => "HDR Boost".into(),
            Effect::WarmTone          => "Warm Tone".into(),
            Effect::ColdTone          => "Cold Tone".into(),
            Effect::Sharpen           => "Sharpen".into(),
            Effect::SoftBlur          => "Soft Blur".into(),
            Effect::HueShift(d)       => format!("Hue Shift {:+}°", d),
            Effect::Sepia             => "Sepia".into(),
            Effect::Duotone           => "Duotone (Blue → Orange)".into(),
            Effect::Cyanotype         => "Cyanotype".into(),
            Effect::CrossProcess      => "Cross Process".into(),
            Effect::Infrared          => "Infrared".into(),
            Effect::ColorPop(_)       => "Color Pop".into(),
            Effect::FilmGrain         => "Film Grain".into(),
            Effect::VintageFilm       => "Vintage Film".into(),
            Effect::WarmPortrait      => "Warm Portrait".into(),
            Effect::BleachBypass      => "Bleach Bypass".into(),
            Effect::Matte             => "Matte".into(),
            Effect::HighKey           => "High Key".into(),
            Effect::LowKey            => "Low Key".into(),
        }
    }

    fn channel_shift(&self) -> Option<ChannelShift> {
        Some(match self {
            Effect::WarmTone     => ChannelShift::Hsv(-5.0, 10.0, 5.0),
            Effect::ColdTone     => ChannelShift::Hsv(8.0, -8.0, -3.0),
            Effect::CrossProcess => ChannelShift::Hsv(8.0, 20.0, -10.0),
            Effect::VintageFilm  => ChannelShift::Hsv(-6.0, -10.0, -4.0),
            Effect::WarmPortrait => ChannelShift::Hsv(-8.0, 15.0, 6.0),
            Effect::HighKey      => ChannelShift::Hsv(0.0, 0.0, 30.0),
            Effect::LowKey       => ChannelShift::Hsv(0.0, 8.0, -40.0),
            Effect::Infrared     => ChannelShift::Lab(30.0, -10.0, 10.0),
            Effect::BleachBypass => ChannelShift::Lab(20.0, -10.0, -10.0),
            _ => return None,
        })
    }

    /// Range-check parameters against the buffer they will run on.
    pub fn validate(&self, buf: &PixelBuffer) -> Result<()> {
        match *self {
            Effect::Pixelate(n) => check_range("pixel size", n, 1, MAX_PIXEL_SIZE),
            Effect::Puzzle(n) => {
                let max = MAX_PUZZLE_GRID.min(buf.width()).min(buf.height());
                check_range("puzzle grid", n, 1, max)
            }
            Effect::HueShift(d) => check_range("hue shift", d, -180, 180),
            _ => Ok(()),
        }
    }

    /// Produce the effect's output. `picked` is the target for
    /// `ColorPop(None)`.
    pub fn apply(&self, buf: &PixelBuffer, picked: Rgb<u8>) -> Result<PixelBuffer> {
        self.validate(buf)?;

        if let Some(shift) = self.channel_shift() {
            return Ok(match shift {
                ChannelShift::Hsv(h, s, v) => shift_hsv(buf, h, s, v),
                ChannelShift::Lab(l, a, b) => shift_lab(buf, l, a, b),
            });
        }

        Ok(match *self {
            Effect::GrayscaleContrast => grayscale_contrast(buf)?,
            Effect::Sketch => pencil_sketch(buf)?,
            Effect::Pixelate(n) => pixelate(buf, n),
            Effect::Puzzle(n) => puzzle(buf, n),
            Effect::HdrBoost => hdr_boost(buf),
            Effect::Sharpen => filter3x3(buf, SHARPEN_KERNEL),
            Effect::SoftBlur => gaussian_blur(buf, 7, 2.0),
            Effect::HueShift(d) => shift_hsv(buf, d as f32 / 2.0, 0.0, 0.0),
            Effect::Sepia => sepia(buf),
            Effect::Duotone => duotone(buf, DUOTONE_DARK, DUOTONE_LIGHT),
            Effect::Cyanotype => duotone(buf, CYANOTYPE_DARK, CYANOTYPE_LIGHT),
            Effect::ColorPop(target) => isolate_hue(buf, target.unwrap_or(picked), COLOR_POP_TOLERANCE)?,
            Effect::FilmGrain => film_grain(buf)?,
            Effect::Matte => add_weighted(buf, 0.85, &gaussian_blur(buf, 21, 0.0), 0.15, 0.0),
            // Channel shifts return early above.
            _ => buf.clone(),
        })
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Pixelate(n) | Effect::Puzzle(n) => write!(f, "{}:{}", self.name(), n),
            Effect::HueShift(d) => write!(f, "{}:{}", self.name(), d),
            Effect::ColorPop(Some(c)) => write!(f, "{}:{},{},{}", self.name(), c[0], c[1], c[2]),
            _ => f.write_str(self.name()),
        }
    }
}

impl FromStr for Effect {
    type Err = String;

    /// `name` or `name:param`, e.g. `pixelate:8`, `hue-shift:-30`,
    /// `color-pop:#ff0000`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, param) = match s.trim().split_once(':') {
            Some((n, p)) => (n.trim(), Some(p.trim())),
            None => (s.trim(), None),
        };
        let bad_param = |p: &str| format!("Invalid parameter '{}' for effect '{}'", p, name);

        let preset = Effect::catalog()
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("Unknown effect '{}'", name))?;

        let Some(p) = param else { return Ok(preset) };
        match preset {
            Effect::Pixelate(_) => p.parse().map(Effect::Pixelate).map_err(|_| bad_param(p)),
            Effect::Puzzle(_) => p.parse().map(Effect::Puzzle).map_err(|_| bad_param(p)),
            Effect::HueShift(_) => p.parse().map(Effect::HueShift).map_err(|_| bad_param(p)),
            Effect::ColorPop(_) => str_to_color(p)
                .map(|c| Effect::ColorPop(Some(c)))
                .ok_or_else(|| bad_param(p)),
            _ => Err(format!("Effect '{}' takes no parameter", name)),
        }
    }
}

// ---------------------------------------------------------------------------
//  Individual effects
// ---------------------------------------------------------------------------

fn grayscale_contrast(buf: &PixelBuffer) -> Result<PixelBuffer> {
    let equalized = clahe(&buf.to_luma(), 2.0, 8, 8);
    PixelBuffer::from_luma(&convert_scale_gray(&equalized, 1.15, -10.0))
}

/// Color-dodge of the luma over its blurred negative.
fn pencil_sketch(buf: &PixelBuffer) -> Result<PixelBuffer> {
    let gray = buf.to_luma();
    let mut inverted = gray.clone();
    image::imageops::invert(&mut inverted);
    let blurred = gaussian_blur_gray(&inverted, 21, 0.0);

    let mut out = gray.clone();
    for (dst, (&g, &b)) in out.iter_mut().zip(gray.iter().zip(blurred.iter())) {
        let denom = 255 - b;
        *dst = if denom == 0 { 0 } else { saturate_u8(g as f32 * 256.0 / denom as f32) };
    }
    PixelBuffer::from_luma(&out)
}

fn pixelate(buf: &PixelBuffer, size: u32) -> PixelBuffer {
    let (w, h) = buf.dimensions();
    let small = area_downscale(buf, (w / size).max(1), (h / size).max(1));
    nearest_resize(&small, w, h)
}

/// Shuffle `grid × grid` equal tiles. Pixels past the last whole tile
/// (when the size is not divisible by `grid`) stay where they are.
fn puzzle(buf: &PixelBuffer, grid: u32) -> PixelBuffer {
    let (w, h) = buf.dimensions();
    let cell_w = (w / grid).max(1);
    let cell_h = (h / grid).max(1);

    let tiles: Vec<(u32, u32)> = (0..grid)
        .flat_map(|gy| (0..grid).map(move |gx| (gx * cell_w, gy * cell_h)))
        .collect();
    let mut order: Vec<usize> = (0..tiles.len()).collect();
    order.shuffle(&mut rand::thread_rng());

    let src = buf.as_raw();
    let stride = w as usize * 3;
    let row_len = cell_w as usize * 3;
    let mut out = buf.clone();
    let dst = out.as_raw_mut();
    for (slot, &from) in order.iter().enumerate() {
        let (dx, dy) = tiles[slot];
        let (sx, sy) = tiles[from];
        for row in 0..cell_h as usize {
            let si = (sy as usize + row) * stride + sx as usize * 3;
            let di = (dy as usize + row) * stride + dx as usize * 3;
            dst[di..di + row_len].copy_from_slice(&src[si..si + row_len]);
        }
    }
    out
}

fn hdr_boost(buf: &PixelBuffer) -> PixelBuffer {
    let brightened = convert_scale(buf, 1.15, 0.0);
    let blurred = gaussian_blur(&brightened, 0, 1.2);
    add_weighted(&brightened, 1.25, &blurred, -0.25, 0.0)
}

/// Classic sepia matrix.
fn sepia(buf: &PixelBuffer) -> PixelBuffer {
    buf.map_pixels(|[r, g, b]| {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        [
            saturate_u8(0.393 * r + 0.769 * g + 0.189 * b),
            saturate_u8(0.349 * r + 0.686 * g + 0.168 * b),
            saturate_u8(0.272 * r + 0.534 * g + 0.131 * b),
        ]
    })
}

/// Map luma onto the gradient `dark → light`.
pub fn duotone(buf: &PixelBuffer, dark: Rgb<u8>, light: Rgb<u8>) -> PixelBuffer {
    buf.map_pixels(|[r, g, b]| {
        let t = luma(r, g, b) as f32 / 255.0;
        [0, 1, 2].map(|c| saturate_u8(dark[c] as f32 * (1.0 - t) + light[c] as f32 * t))
    })
}

fn film_grain(buf: &PixelBuffer) -> Result<PixelBuffer> {
    let (w, h) = buf.dimensions();
    let mut rng = rand::thread_rng();
    let noise_raw: Vec<u8> = (0..buf.as_raw().len()).map(|_| rng.gen_range(0..255)).collect();
    let noise = PixelBuffer::from_raw(w, h, noise_raw)?;
    Ok(add_weighted(buf, 0.95, &noise, 0.05, 0.0))
}

/// Keep pixels whose hue lies within `tolerance` stored units of `target`
/// (and are reasonably saturated and bright); everything else goes gray.
pub fn isolate_hue(buf: &PixelBuffer, target: Rgb<u8>, tolerance: f32) -> Result<PixelBuffer> {
    let h = ColorSample::new(target).stored_hue();
    let lo = [(h - tolerance).max(0.0), 50.0, 50.0];
    let hi = [(h + tolerance).min(180.0), 255.0, 255.0];
    let mask = hsv_in_range(buf, lo, hi);
    let gray = buf.to_luma();
    let (gw, mraw, graw) = (buf.width() as usize, mask.as_raw(), gray.as_raw());
    Ok(buf.map_pixels_at(|x, y, px| {
        let i = y as usize * gw + x as usize;
        if mraw[i] != 0 {
            px
        } else {
            [graw[i]; 3]
        }
    }))
}

/// Blend every stored hue toward `target`'s by `mix` percent and boost
/// saturation proportionally.
pub fn recolor(buf: &PixelBuffer, target: Rgb<u8>, mix: u32) -> Result<PixelBuffer> {
    check_range("color mix", mix, 0, 100)?;
    let m = mix as f32 / 100.0;
    let target_h = ColorSample::new(target).stored_hue();
    Ok(map_hsv(buf, |[h, s, v]| {
        let blended = (h as f32 * (1.0 - m) + target_h * m)
            .round()
            .clamp(0.0, STORED_HUE_MAX as f32) as u8;
        [blended, add_channel(s, 30.0 * m), v]
    }))
}

/// Color pop with the wider filter window.
pub fn color_filter(buf: &PixelBuffer, target: Rgb<u8>) -> Result<PixelBuffer> {
    isolate_hue(buf, target, COLOR_FILTER_TOLERANCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;
    use crate::ops::color::rgb_to_hsv8;

    fn gradient(w: u32, h: u32) -> PixelBuffer {
        let raw: Vec<u8> = (0..w * h)
            .flat_map(|i| {
                let v = (i * 7 % 256) as u8;
                [v, 255 - v, v / 2]
            })
            .collect();
        PixelBuffer::from_raw(w, h, raw).unwrap()
    }

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    #[test]
    fn catalog_entries_parse_back() {
        let catalog = Effect::catalog();
        assert_eq!(catalog.len(), 24);
        for e in &catalog {
            assert_eq!(&e.to_string().parse::<Effect>().unwrap(), e, "{}", e);
        }
    }

    #[test]
    fn parses_parameters() {
        assert_eq!("pixelate:8".parse::<Effect>().unwrap(), Effect::Pixelate(8));
        assert_eq!("Hue-Shift:-30".parse::<Effect>().unwrap(), Effect::HueShift(-30));
        assert_eq!(
            "color-pop:#00ff00".parse::<Effect>().unwrap(),
            Effect::ColorPop(Some(Rgb([0, 255, 0])))
        );
        assert!("sepia:3".parse::<Effect>().is_err());
        assert!("posterize".parse::<Effect>().is_err());
        assert!("puzzle:x".parse::<Effect>().is_err());
    }

    #[test]
    fn deterministic_effects_are_idempotent_under_same_input() {
        let src = gradient(24, 18);
        for e in Effect::catalog() {
            if matches!(e, Effect::Puzzle(_) | Effect::FilmGrain) {
                continue;
            }
            let a = e.apply(&src, WHITE).unwrap();
            let b = e.apply(&src, WHITE).unwrap();
            assert_eq!(a, b, "{}", e.label());
            assert_eq!(a.dimensions(), src.dimensions(), "{}", e.label());
        }
    }

    #[test]
    fn puzzle_is_a_permutation_of_tiles() {
        let src = gradient(8, 8);
        let out = Effect::Puzzle(4).apply(&src, WHITE).unwrap();
        let mut a = src.as_raw().to_vec();
        let mut b = out.as_raw().to_vec();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn puzzle_keeps_remainder_strip() {
        let src = gradient(9, 9);
        let out = Effect::Puzzle(4).apply(&src, WHITE).unwrap();
        for y in 0..9 {
            assert_eq!(out.get_pixel(8, y), src.get_pixel(8, y));
        }
    }

    #[test]
    fn puzzle_grid_larger_than_image_is_rejected() {
        let src = gradient(3, 10);
        let err = Effect::Puzzle(4).apply(&src, WHITE).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedParameter { name: "puzzle grid", .. }));
    }

    #[test]
    fn pixelate_produces_uniform_blocks() {
        let src = gradient(8, 8);
        let out = Effect::Pixelate(4).apply(&src, WHITE).unwrap();
        let block = out.get_pixel(0, 0);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(out.get_pixel(x, y), block);
            }
        }
        assert!(Effect::Pixelate(0).apply(&src, WHITE).is_err());
    }

    #[test]
    fn sketch_of_flat_image_is_white() {
        let src = PixelBuffer::filled(6, 6, Rgb([120, 120, 120])).unwrap();
        let out = Effect::Sketch.apply(&src, WHITE).unwrap();
        assert_eq!(out.get_pixel(3, 3), Rgb([255, 255, 255]));
    }

    #[test]
    fn sketch_of_black_is_black() {
        let src = PixelBuffer::filled(4, 4, Rgb([0, 0, 0])).unwrap();
        let out = Effect::Sketch.apply(&src, WHITE).unwrap();
        assert_eq!(out.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn hue_shift_effect_moves_stored_hue_by_half() {
        let src = PixelBuffer::filled(2, 2, Rgb([0, 255, 0])).unwrap();
        let out = Effect::HueShift(30).apply(&src, WHITE).unwrap();
        assert_eq!(rgb_to_hsv8(out.get_pixel(0, 0).0)[0], 75);
    }

    #[test]
    fn sepia_uses_standard_matrix() {
        let src = PixelBuffer::filled(1, 1, Rgb([100, 50, 20])).unwrap();
        let out = Effect::Sepia.apply(&src, WHITE).unwrap();
        // 39.3 + 38.45 + 3.78, 34.9 + 34.3 + 3.36, 27.2 + 26.7 + 2.62
        assert_eq!(out.get_pixel(0, 0), Rgb([82, 73, 57]));
    }

    #[test]
    fn duotone_endpoints() {
        let mut src = PixelBuffer::filled(2, 1, Rgb([0, 0, 0])).unwrap();
        src.put_pixel(1, 0, Rgb([255, 255, 255]));
        let out = Effect::Cyanotype.apply(&src, WHITE).unwrap();
        assert_eq!(out.get_pixel(0, 0), CYANOTYPE_DARK);
        assert_eq!(out.get_pixel(1, 0), CYANOTYPE_LIGHT);
    }

    #[test]
    fn color_pop_keeps_target_and_grays_the_rest() {
        let mut src = PixelBuffer::filled(2, 1, Rgb([255, 0, 0])).unwrap();
        src.put_pixel(1, 0, Rgb([0, 0, 255]));
        let out = Effect::ColorPop(None).apply(&src, Rgb([250, 10, 10])).unwrap();
        assert_eq!(out.get_pixel(0, 0), Rgb([255, 0, 0]));
        let blue_luma = luma(0, 0, 255);
        assert_eq!(out.get_pixel(1, 0), Rgb([blue_luma; 3]));
    }

    #[test]
    fn recolor_full_mix_takes_target_hue() {
        let src = PixelBuffer::filled(1, 1, Rgb([255, 0, 0])).unwrap();
        let out = recolor(&src, Rgb([0, 255, 0]), 100).unwrap();
        assert_eq!(rgb_to_hsv8(out.get_pixel(0, 0).0)[0], 60);
        let untouched = recolor(&src, Rgb([0, 255, 0]), 0).unwrap();
        assert_eq!(untouched, src);
        assert!(recolor(&src, WHITE, 101).is_err());
    }

    #[test]
    fn high_key_brightens() {
        let src = PixelBuffer::filled(1, 1, Rgb([100, 100, 100])).unwrap();
        let out = Effect::HighKey.apply(&src, WHITE).unwrap();
        assert_eq!(out.get_pixel(0, 0), Rgb([130, 130, 130]));
    }

    #[test]
    fn film_grain_stays_close_to_source() {
        let src = PixelBuffer::filled(4, 4, Rgb([128, 128, 128])).unwrap();
        let out = Effect::FilmGrain.apply(&src, WHITE).unwrap();
        for &v in out.as_raw() {
            // 0.95·128 + 0.05·[0, 254]
            assert!((122..=134).contains(&v), "{}", v);
        }
    }
}
