// ============================================================================
// GEOMETRY — quarter-turn rotation, mirror flips, resize and crop
// ============================================================================

use std::str::FromStr;

use image::imageops;

use crate::buffer::PixelBuffer;
use crate::canvas::SelectionRect;
use crate::error::{EditorError, Result, check_range};

/// Largest edge accepted by [`resize`].
pub const MAX_RESIZE_EDGE: u32 = 10_000;

/// Clockwise rotation in exact quarter turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// Accepts any multiple of 90, negative values included.
    pub fn from_degrees(deg: i32) -> Result<Self> {
        if deg % 90 != 0 {
            return Err(EditorError::UnsupportedParameter {
                name: "rotation",
                value: deg as f64,
                min: 0.0,
                max: 270.0,
            });
        }
        Ok(match deg.rem_euclid(360) {
            0 => Rotation::R0,
            90 => Rotation::R90,
            180 => Rotation::R180,
            _ => Rotation::R270,
        })
    }

    /// Next quarter turn clockwise.
    pub fn cw(self) -> Self {
        match self {
            Rotation::R0 => Rotation::R90,
            Rotation::R90 => Rotation::R180,
            Rotation::R180 => Rotation::R270,
            Rotation::R270 => Rotation::R0,
        }
    }
}

/// Orientation applied on top of the canonical source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TransformState {
    pub rotation: Rotation,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl TransformState {
    pub fn is_identity(&self) -> bool {
        *self == TransformState::default()
    }
}

/// Re-derive the oriented buffer from `original`: rotate, then mirror
/// horizontally, then vertically.
pub fn apply_geometry(original: &PixelBuffer, transform: &TransformState) -> PixelBuffer {
    let src = original.as_rgb_image();
    let mut img = match transform.rotation {
        Rotation::R0 => src.clone(),
        Rotation::R90 => imageops::rotate90(src),
        Rotation::R180 => imageops::rotate180(src),
        Rotation::R270 => imageops::rotate270(src),
    };
    if transform.flip_h {
        imageops::flip_horizontal_in_place(&mut img);
    }
    if transform.flip_v {
        imageops::flip_vertical_in_place(&mut img);
    }
    // Quarter turns and flips never produce an empty image from a valid one.
    PixelBuffer::from_rgb_image(img).unwrap_or_else(|_| original.clone())
}

/// Interpolation method for resize operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    Bilinear,
    Bicubic,
    #[default]
    Lanczos3,
}

impl Interpolation {
    pub fn name(&self) -> &'static str {
        match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Bilinear => "bilinear",
            Interpolation::Bicubic => "bicubic",
            Interpolation::Lanczos3 => "lanczos3",
        }
    }

    pub fn all() -> &'static [Interpolation] {
        &[
            Interpolation::Nearest,
            Interpolation::Bilinear,
            Interpolation::Bicubic,
            Interpolation::Lanczos3,
        ]
    }

    pub fn to_filter(&self) -> imageops::FilterType {
        match self {
            Interpolation::Nearest  => imageops::FilterType::Nearest,
            Interpolation::Bilinear => imageops::FilterType::Triangle,
            Interpolation::Bicubic  => imageops::FilterType::CatmullRom,
            Interpolation::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Interpolation::all()
            .iter()
            .copied()
            .find(|i| i.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown resize filter '{}'", s))
    }
}

/// Resample to `new_w × new_h`. Both edges must lie in `[1, 10000]`.
pub fn resize(buf: &PixelBuffer, new_w: u32, new_h: u32, interp: Interpolation) -> Result<PixelBuffer> {
    check_range("width", new_w, 1, MAX_RESIZE_EDGE)?;
    check_range("height", new_h, 1, MAX_RESIZE_EDGE)?;
    if (new_w, new_h) == buf.dimensions() {
        return Ok(buf.clone());
    }
    let out = imageops::resize(buf.as_rgb_image(), new_w, new_h, interp.to_filter());
    PixelBuffer::from_rgb_image(out)
}

/// Copy out the part of `rect` that lies inside `buf`.
pub fn crop(buf: &PixelBuffer, rect: &SelectionRect) -> Result<PixelBuffer> {
    let clipped = rect.clip_to(buf.width(), buf.height())?;
    let view = imageops::crop_imm(
        buf.as_rgb_image(),
        clipped.x,
        clipped.y,
        clipped.width,
        clipped.height,
    );
    PixelBuffer::from_rgb_image(view.to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// 3×2 buffer with a distinct value in every pixel.
    fn numbered() -> PixelBuffer {
        let raw: Vec<u8> = (0..6u8).flat_map(|i| [i * 10, 0, 0]).collect();
        PixelBuffer::from_raw(3, 2, raw).unwrap()
    }

    fn red(buf: &PixelBuffer, x: u32, y: u32) -> u8 {
        buf.get_pixel(x, y).0[0]
    }

    #[test]
    fn rotation_cycles_through_quarter_turns() {
        let mut r = Rotation::R0;
        let seen: Vec<u32> = (0..4).map(|_| { r = r.cw(); r.degrees() }).collect();
        assert_eq!(seen, vec![90, 180, 270, 0]);
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::R270);
        assert!(Rotation::from_degrees(45).is_err());
    }

    #[test]
    fn rotate_90_moves_bottom_left_to_top_left() {
        let buf = numbered();
        let t = TransformState { rotation: Rotation::R90, ..Default::default() };
        let out = apply_geometry(&buf, &t);
        assert_eq!(out.dimensions(), (2, 3));
        // Source (0,1) = 30 lands at (0,0) after a clockwise turn.
        assert_eq!(red(&out, 0, 0), 30);
        assert_eq!(red(&out, 1, 0), 0);
    }

    #[test]
    fn flips_apply_after_rotation() {
        let buf = numbered();
        let t = TransformState { rotation: Rotation::R90, flip_h: true, flip_v: false };
        let out = apply_geometry(&buf, &t);
        assert_eq!(red(&out, 0, 0), 0);
        assert_eq!(red(&out, 1, 0), 30);

        let both = TransformState { rotation: Rotation::R0, flip_h: true, flip_v: true };
        let half_turn = TransformState { rotation: Rotation::R180, ..Default::default() };
        assert_eq!(apply_geometry(&buf, &both), apply_geometry(&buf, &half_turn));
    }

    #[test]
    fn identity_geometry_is_a_copy() {
        let buf = numbered();
        assert_eq!(apply_geometry(&buf, &TransformState::default()), buf);
    }

    #[test]
    fn resize_rejects_out_of_range_edges() {
        let buf = PixelBuffer::filled(4, 4, Rgb([1, 2, 3])).unwrap();
        assert!(matches!(
            resize(&buf, 0, 4, Interpolation::Lanczos3),
            Err(EditorError::UnsupportedParameter { name: "width", .. })
        ));
        assert!(resize(&buf, 4, 10_001, Interpolation::Nearest).is_err());
        let out = resize(&buf, 8, 2, Interpolation::Nearest).unwrap();
        assert_eq!(out.dimensions(), (8, 2));
        assert_eq!(out.get_pixel(7, 1), Rgb([1, 2, 3]));
    }

    #[test]
    fn crop_extracts_region() {
        let buf = numbered();
        let out = crop(&buf, &SelectionRect { x: 1, y: 0, width: 2, height: 2 }).unwrap();
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(red(&out, 0, 0), 10);
        assert_eq!(red(&out, 1, 1), 50);
    }

    #[test]
    fn crop_outside_buffer_is_degenerate() {
        let buf = numbered();
        let err = crop(&buf, &SelectionRect { x: 5, y: 0, width: 2, height: 2 }).unwrap_err();
        assert_eq!(err, EditorError::DegenerateRegion);
    }

    #[test]
    fn interpolation_parses_names() {
        assert_eq!("Bicubic".parse::<Interpolation>().unwrap(), Interpolation::Bicubic);
        assert!("sinc".parse::<Interpolation>().is_err());
    }
}
