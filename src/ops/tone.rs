// ============================================================================
// TONE — composite brightness / contrast / HSV / warmth / sharpness
// ============================================================================
//
// `compute_tone` is a pure function of (original, transform, tone). Stages
// that are identity for the given values are skipped, so a neutral
// ToneState returns exactly the geometry result.
// ============================================================================

use crate::buffer::PixelBuffer;
use crate::error::{Result, check_range};
use crate::ops::color::{add_channel, add_hue, map_hsv};
use crate::ops::filters::{gaussian_blur, unsharp};
use crate::ops::transform::{TransformState, apply_geometry};

/// Blur sigma used by the sharpness unsharp mask.
pub const SHARPEN_SIGMA: f32 = 1.2;

/// One adjustable tone parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToneField {
    Brightness,
    Contrast,
    Saturation,
    Sharpness,
    Warmth,
    Hue,
}

impl ToneField {
    pub fn all() -> &'static [ToneField] {
        &[
            ToneField::Brightness,
            ToneField::Contrast,
            ToneField::Saturation,
            ToneField::Sharpness,
            ToneField::Warmth,
            ToneField::Hue,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToneField::Brightness => "brightness",
            ToneField::Contrast   => "contrast",
            ToneField::Saturation => "saturation",
            ToneField::Sharpness  => "sharpness",
            ToneField::Warmth     => "warmth",
            ToneField::Hue        => "hue",
        }
    }

    /// Inclusive value range.
    pub fn range(&self) -> (i32, i32) {
        match self {
            ToneField::Brightness | ToneField::Contrast | ToneField::Saturation => (-100, 100),
            ToneField::Sharpness => (0, 100),
            ToneField::Warmth => (-50, 50),
            ToneField::Hue => (-90, 90),
        }
    }

    pub fn check(&self, value: i32) -> Result<()> {
        let (min, max) = self.range();
        check_range(self.name(), value, min, max)
    }
}

/// Slider values. All zero is neutral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ToneState {
    pub brightness: i32,
    pub contrast: i32,
    pub saturation: i32,
    pub sharpness: i32,
    pub warmth: i32,
    pub hue: i32,
}

impl ToneState {
    pub fn get(&self, field: ToneField) -> i32 {
        match field {
            ToneField::Brightness => self.brightness,
            ToneField::Contrast   => self.contrast,
            ToneField::Saturation => self.saturation,
            ToneField::Sharpness  => self.sharpness,
            ToneField::Warmth     => self.warmth,
            ToneField::Hue        => self.hue,
        }
    }

    /// Copy with one field replaced, range-checked.
    pub fn with(&self, field: ToneField, value: i32) -> Result<ToneState> {
        field.check(value)?;
        let mut next = *self;
        match field {
            ToneField::Brightness => next.brightness = value,
            ToneField::Contrast   => next.contrast = value,
            ToneField::Saturation => next.saturation = value,
            ToneField::Sharpness  => next.sharpness = value,
            ToneField::Warmth     => next.warmth = value,
            ToneField::Hue        => next.hue = value,
        }
        Ok(next)
    }

    pub fn validate(&self) -> Result<()> {
        for &field in ToneField::all() {
            field.check(self.get(field))?;
        }
        Ok(())
    }

    pub fn is_neutral(&self) -> bool {
        *self == ToneState::default()
    }
}

/// Hue/saturation/value offsets produced by a warmth setting.
fn warmth_deltas(warmth: i32) -> (f32, f32, f32) {
    let w = warmth as f32 / 50.0;
    if w < 0.0 {
        let a = w.abs();
        (40.0 * a, -8.0 * a, -6.0 * a)
    } else {
        (-30.0 * w, 12.0 * w, 8.0 * w)
    }
}

/// Recompute the displayed buffer from the canonical source.
pub fn compute_tone(original: &PixelBuffer, transform: &TransformState, tone: &ToneState) -> Result<PixelBuffer> {
    tone.validate()?;

    let mut buf = apply_geometry(original, transform);

    if tone.contrast != 0 || tone.brightness != 0 {
        let alpha = 2f32.powf(tone.contrast as f32 / 50.0);
        let wide = buf.to_float_scaled(alpha, tone.brightness as f32);
        buf = PixelBuffer::from_float_saturating(&wide)?;
    }

    if tone.hue != 0 || tone.saturation != 0 || tone.warmth != 0 {
        let dh = tone.hue as f32 / 2.0;
        let ds = tone.saturation as f32;
        let warm = (tone.warmth != 0).then(|| warmth_deltas(tone.warmth));
        buf = map_hsv(&buf, |[mut h, mut s, mut v]| {
            if dh != 0.0 {
                h = add_hue(h, dh);
            }
            if ds != 0.0 {
                s = add_channel(s, ds);
            }
            if let Some((wh, ws, wv)) = warm {
                h = add_hue(h, wh);
                s = add_channel(s, ws);
                v = add_channel(v, wv);
            }
            [h, s, v]
        });
    }

    if tone.sharpness > 0 {
        let k = 1.0 + tone.sharpness as f32 / 100.0;
        let blurred = gaussian_blur(&buf, 0, SHARPEN_SIGMA);
        buf = unsharp(&buf, &blurred, k);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;
    use crate::ops::color::rgb_to_hsv8;
    use image::Rgb;

    fn solid(c: [u8; 3]) -> PixelBuffer {
        PixelBuffer::filled(4, 3, Rgb(c)).unwrap()
    }

    #[test]
    fn neutral_tone_is_geometry_only() {
        let src = solid([12, 34, 56]);
        let out = compute_tone(&src, &TransformState::default(), &ToneState::default()).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn brightness_saturates_on_white() {
        let src = solid([255, 255, 255]);
        let tone = ToneState { brightness: 100, ..Default::default() };
        let out = compute_tone(&src, &TransformState::default(), &tone).unwrap();
        assert_eq!(out.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn contrast_doubles_at_fifty() {
        let src = solid([40, 60, 100]);
        let tone = ToneState { contrast: 50, ..Default::default() };
        let out = compute_tone(&src, &TransformState::default(), &tone).unwrap();
        assert_eq!(out.get_pixel(1, 1), Rgb([80, 120, 200]));
    }

    #[test]
    fn hue_shift_adds_half_degrees_to_stored_hue() {
        let src = solid([0, 255, 0]);
        let tone = ToneState { hue: 30, ..Default::default() };
        let out = compute_tone(&src, &TransformState::default(), &tone).unwrap();
        let before = rgb_to_hsv8([0, 255, 0])[0];
        let after = rgb_to_hsv8(out.get_pixel(0, 0).0)[0];
        assert_eq!(after, before + 15);
    }

    #[test]
    fn warmth_sign_convention() {
        assert_eq!(warmth_deltas(-50), (40.0, -8.0, -6.0));
        assert_eq!(warmth_deltas(25), (-15.0, 6.0, 4.0));
    }

    #[test]
    fn out_of_range_field_is_rejected() {
        let tone = ToneState { warmth: 51, ..Default::default() };
        let err = compute_tone(&solid([0, 0, 0]), &TransformState::default(), &tone).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedParameter { name: "warmth", .. }));
        assert!(ToneState::default().with(ToneField::Sharpness, -1).is_err());
        assert_eq!(ToneState::default().with(ToneField::Hue, -90).unwrap().hue, -90);
    }

    #[test]
    fn sharpness_leaves_flat_areas_alone() {
        let src = solid([90, 90, 90]);
        let tone = ToneState { sharpness: 100, ..Default::default() };
        let out = compute_tone(&src, &TransformState::default(), &tone).unwrap();
        assert_eq!(out, src);
    }
}
