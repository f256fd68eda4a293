// ============================================================================
// TEXT STAMPS — glyph layout and rasterization onto the current buffer
// ============================================================================

use std::path::Path;

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use image::Rgb;

use crate::buffer::PixelBuffer;
use crate::canvas::SelectionRect;
use crate::error::{EditorError, Result, check_range};

/// Smallest pixel size a stamp is rendered at.
pub const MIN_FONT_PX: f32 = 8.0;
pub const MAX_TEXT_THICKNESS: u32 = 20;
pub const MIN_TEXT_SCALE: f32 = 0.1;
pub const MAX_TEXT_SCALE: f32 = 10.0;
pub const MAX_TEXT_CHARS: u32 = 10_000;

/// What to write and how.
#[derive(Clone, Debug, PartialEq)]
pub struct TextStamp {
    pub text: String,
    pub color: Rgb<u8>,
    /// Size multiplier relative to a 200 px wide placement box.
    pub scale: f32,
    /// Stroke weight in pixels (1 = plain bold).
    pub thickness: u32,
}

impl TextStamp {
    pub fn validate(&self) -> Result<()> {
        check_range("text length", self.text.chars().count() as u32, 1, MAX_TEXT_CHARS)?;
        check_range("text scale", self.scale, MIN_TEXT_SCALE, MAX_TEXT_SCALE)?;
        check_range("text thickness", self.thickness, 1, MAX_TEXT_THICKNESS)
    }
}

/// Pixel size for a stamp placed in a box `rect_w` pixels wide.
pub fn font_size_for(scale: f32, rect_w: u32) -> f32 {
    (12.0 * scale * rect_w as f32 / 200.0).floor().max(MIN_FONT_PX)
}

/// Lay out one line left-aligned at x = 0, returning `(glyph, x)` pairs.
fn layout_line(font: &FontArc, line: &str, font_size: f32) -> Vec<(GlyphId, f32)> {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::with_capacity(line.len());
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in line.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }
    glyphs
}

/// Render `stamp` with its first line's top at the top-left of `rect`.
/// Lines are split on `\n`; glyphs may run past the rectangle but are
/// clipped to the buffer.
pub fn stamp_text(buf: &PixelBuffer, font: &FontArc, rect: &SelectionRect, stamp: &TextStamp) -> Result<PixelBuffer> {
    stamp.validate()?;
    rect.validate()?;

    let (w, h) = buf.dimensions();
    let font_size = font_size_for(stamp.scale, rect.width);
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();
    let line_height = scaled.height() + scaled.line_gap();
    let origin_x = rect.x as f32;
    let origin_y = rect.y as f32;

    // Bold adds one pixel to the right; thickness dilates further.
    let spread = stamp.thickness as i64 - 1;
    let mut coverage = vec![0.0f32; w as usize * h as usize];
    let mut plot = |x: i64, y: i64, cov: f32| {
        for dy in 0..=spread {
            for dx in 0..=spread + 1 {
                let (px, py) = (x + dx, y + dy);
                if px >= 0 && py >= 0 && px < w as i64 && py < h as i64 {
                    let idx = py as usize * w as usize + px as usize;
                    coverage[idx] = coverage[idx].max(cov);
                }
            }
        }
    };

    for (line_idx, line) in stamp.text.split('\n').enumerate() {
        let baseline = origin_y + ascent + line_idx as f32 * line_height;
        for (glyph_id, gx) in layout_line(font, line, font_size) {
            let glyph = glyph_id.with_scale_and_position(font_size, point(origin_x + gx, baseline));
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|px, py, cov| {
                    plot(bounds.min.x as i64 + px as i64, bounds.min.y as i64 + py as i64, cov);
                });
            }
        }
    }

    let color = stamp.color;
    let width = w as usize;
    Ok(buf.map_pixels_at(|x, y, px| {
        let cov = coverage[y as usize * width + x as usize];
        if cov <= 0.001 {
            return px;
        }
        [0, 1, 2].map(|c| {
            let dst = px[c] as f32;
            (dst + (color[c] as f32 - dst) * cov.min(1.0)).round() as u8
        })
    }))
}

/// Load a bold face by family name from the system.
pub fn load_system_font(family: &str) -> Result<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight::BOLD;

    let unavailable = |e: String| EditorError::FontUnavailable(format!("{}: {}", family, e));
    let source = SystemSource::new();
    let handle = source
        .select_best_match(&[FamilyName::Title(family.to_string()), FamilyName::SansSerif], &props)
        .map_err(|e| unavailable(e.to_string()))?;

    let font_data = handle.load().map_err(|e| unavailable(e.to_string()))?;
    let bytes = font_data
        .copy_font_data()
        .ok_or_else(|| unavailable("no font data".into()))?;
    FontArc::try_from_vec((*bytes).clone()).map_err(|e| unavailable(e.to_string()))
}

/// Load a TrueType/OpenType file.
pub fn load_font_file(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path)
        .map_err(|e| EditorError::FontUnavailable(format!("{}: {}", path.display(), e)))?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| EditorError::FontUnavailable(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(text: &str) -> TextStamp {
        TextStamp { text: text.into(), color: Rgb([255, 255, 255]), scale: 1.0, thickness: 2 }
    }

    #[test]
    fn font_size_scales_with_box_width() {
        assert_eq!(font_size_for(1.0, 200), 12.0);
        assert_eq!(font_size_for(2.0, 500), 60.0);
        assert_eq!(font_size_for(1.0, 50), MIN_FONT_PX);
    }

    #[test]
    fn stamp_parameters_are_validated() {
        assert!(stamp("hi").validate().is_ok());
        assert!(stamp("").validate().is_err());
        assert!(TextStamp { thickness: 0, ..stamp("x") }.validate().is_err());
        assert!(TextStamp { scale: 0.0, ..stamp("x") }.validate().is_err());
    }

    #[test]
    fn missing_font_file_is_unavailable() {
        let err = load_font_file(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, EditorError::FontUnavailable(_)));
    }

    #[test]
    fn stamp_marks_pixels_near_the_box_origin() {
        // Skips on machines without any system font.
        let Ok(font) = load_system_font("DejaVu Sans") else { return };
        let buf = PixelBuffer::new(200, 80).unwrap();
        let rect = SelectionRect { x: 10, y: 10, width: 150, height: 40 };
        let out = stamp_text(&buf, &font, &rect, &stamp("HH")).unwrap();
        assert_ne!(out, buf);
        // Nothing above or left of the box is touched.
        for x in 0..200 {
            assert_eq!(out.get_pixel(x, 0), Rgb([0, 0, 0]));
        }
        for y in 0..80 {
            assert_eq!(out.get_pixel(5, y), Rgb([0, 0, 0]));
        }
    }
}
