// ============================================================================
// FREEHAND DRAWING — anti-aliased round-capped line segments
// ============================================================================

use image::Rgb;
use rayon::prelude::*;

use crate::buffer::PixelBuffer;
use crate::canvas::ImagePoint;
use crate::error::{Result, check_range};

pub const MAX_THICKNESS: u32 = 200;

/// Distance from `(px, py)` to the segment `a → b`.
fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Composite a `thickness`-wide capsule from `a` to `b` into `buf` in place.
/// Edge pixels are blended by their one-pixel coverage.
pub fn draw_segment(
    buf: &mut PixelBuffer,
    a: ImagePoint,
    b: ImagePoint,
    color: Rgb<u8>,
    thickness: u32,
) -> Result<()> {
    check_range("thickness", thickness, 1, MAX_THICKNESS)?;

    let (w, h) = buf.dimensions();
    let radius = thickness as f32 / 2.0;
    // Pixel centres sit at +0.5.
    let (ax, ay) = (a.x as f32 + 0.5, a.y as f32 + 0.5);
    let (bx, by) = (b.x as f32 + 0.5, b.y as f32 + 0.5);

    let reach = radius + 1.0;
    let x0 = (ax.min(bx) - reach).floor().max(0.0) as usize;
    let y0 = (ay.min(by) - reach).floor().max(0.0) as usize;
    let x1 = ((ax.max(bx) + reach).ceil() as usize).min(w as usize);
    let y1 = ((ay.max(by) + reach).ceil() as usize).min(h as usize);
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }

    let stride = w as usize * 3;
    let rows = &mut buf.as_raw_mut()[y0 * stride..y1 * stride];
    rows.par_chunks_mut(stride).enumerate().for_each(|(ry, row)| {
        let py = (y0 + ry) as f32 + 0.5;
        for x in x0..x1 {
            let d = sdf_line_segment(x as f32 + 0.5, py, ax, ay, bx, by);
            let cov = (radius + 0.5 - d).clamp(0.0, 1.0);
            if cov <= 0.0 {
                continue;
            }
            let pi = x * 3;
            for c in 0..3 {
                let dst = row[pi + c] as f32;
                row[pi + c] = (dst + (color[c] as f32 - dst) * cov).round() as u8;
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    #[test]
    fn horizontal_line_covers_its_row() {
        let mut buf = PixelBuffer::new(20, 9).unwrap();
        draw_segment(&mut buf, ImagePoint::new(2, 4), ImagePoint::new(17, 4), RED, 3).unwrap();
        for x in 2..=17 {
            assert_eq!(buf.get_pixel(x, 4), RED, "x={}", x);
            assert_eq!(buf.get_pixel(x, 3), RED, "x={}", x);
        }
        assert_eq!(buf.get_pixel(10, 0), Rgb([0, 0, 0]));
        assert_eq!(buf.get_pixel(10, 8), Rgb([0, 0, 0]));
    }

    #[test]
    fn zero_length_segment_is_a_dot() {
        let mut buf = PixelBuffer::new(9, 9).unwrap();
        draw_segment(&mut buf, ImagePoint::new(4, 4), ImagePoint::new(4, 4), RED, 5).unwrap();
        assert_eq!(buf.get_pixel(4, 4), RED);
        assert_eq!(buf.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn edges_are_blended() {
        let mut buf = PixelBuffer::new(10, 10).unwrap();
        draw_segment(&mut buf, ImagePoint::new(0, 5), ImagePoint::new(9, 5), RED, 2).unwrap();
        // Two pixels from the centre line: no coverage.
        assert_eq!(buf.get_pixel(5, 3), Rgb([0, 0, 0]));
        // One pixel away: half covered.
        assert_eq!(buf.get_pixel(5, 4).0[0], 128);
    }

    #[test]
    fn segment_outside_buffer_is_clipped() {
        let mut buf = PixelBuffer::new(4, 4).unwrap();
        let before = buf.clone();
        draw_segment(&mut buf, ImagePoint::new(100, 100), ImagePoint::new(120, 100), RED, 3).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn thickness_is_range_checked() {
        let mut buf = PixelBuffer::new(4, 4).unwrap();
        assert!(draw_segment(&mut buf, ImagePoint::new(0, 0), ImagePoint::new(3, 3), RED, 0).is_err());
    }
}
