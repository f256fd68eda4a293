// ============================================================================
// CANVAS — the open document and display ↔ image coordinate mapping
// ============================================================================

use std::path::PathBuf;

use crate::buffer::PixelBuffer;
use crate::error::{EditorError, Result};

/// The two long-lived buffers of an open image.
///
/// `original` is the canonical source every geometry/tone recomputation
/// starts from; it is only ever replaced wholesale (load, resize, crop),
/// never written to. `current` is what the user sees.
#[derive(Clone, Debug)]
pub struct Document {
    pub original: PixelBuffer,
    pub current: PixelBuffer,
    pub source_path: Option<PathBuf>,
}

impl Document {
    pub fn new(original: PixelBuffer, source_path: Option<PathBuf>) -> Self {
        let current = original.clone();
        Self { original, current, source_path }
    }

    pub fn memory_size(&self) -> usize {
        self.original.memory_size() + self.current.memory_size()
    }
}

// ---------------------------------------------------------------------------
//  Coordinates
// ---------------------------------------------------------------------------

/// A position inside the display box (may lie outside the drawn image).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DisplayPoint {
    pub x: i32,
    pub y: i32,
}

impl DisplayPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A pixel index inside the current buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ImagePoint {
    pub x: u32,
    pub y: u32,
}

impl ImagePoint {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Size of the widget the image is shown in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Where the letterboxed image sits inside the display box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRect {
    pub offset_x: i32,
    pub offset_y: i32,
    pub width: u32,
    pub height: u32,
}

/// Largest rectangle with the buffer's aspect ratio that fits in `display`,
/// centred. Never smaller than 1×1.
pub fn fit_rect(buffer: (u32, u32), display: DisplaySize) -> DrawRect {
    let (bw, bh) = (buffer.0.max(1) as u64, buffer.1.max(1) as u64);
    let (dw, dh) = (display.width.max(1) as u64, display.height.max(1) as u64);

    // Compare aspect ratios by cross-multiplying to stay in integers.
    let (draw_w, draw_h) = if bw * dh > dw * bh {
        (dw, dw * bh / bw)
    } else {
        (dh * bw / bh, dh)
    };
    let (draw_w, draw_h) = (draw_w.max(1) as u32, draw_h.max(1) as u32);

    DrawRect {
        offset_x: (display.width.max(1) as i32 - draw_w as i32) / 2,
        offset_y: (display.height.max(1) as i32 - draw_h as i32) / 2,
        width: draw_w,
        height: draw_h,
    }
}

/// Scale a drawn coordinate in `[0, drawn - 1]` onto `[0, size - 1]`, rounding
/// to the nearest pixel. Both ends of the range map onto each other exactly.
#[inline]
fn scale_axis(pos: u32, drawn: u32, size: u32) -> u32 {
    if drawn <= 1 || size <= 1 {
        return 0;
    }
    let num = pos as u64 * (size as u64 - 1);
    let den = drawn as u64 - 1;
    (((num + den / 2) / den) as u32).min(size - 1)
}

/// Map a display-space point onto the buffer shown letterboxed in `display`.
/// Points in the margins clamp onto the nearest edge pixel.
pub fn to_image_coords(point: DisplayPoint, buffer: (u32, u32), display: DisplaySize) -> ImagePoint {
    let rect = fit_rect(buffer, display);
    let rel_x = (point.x - rect.offset_x).clamp(0, rect.width as i32 - 1) as u32;
    let rel_y = (point.y - rect.offset_y).clamp(0, rect.height as i32 - 1) as u32;
    ImagePoint {
        x: scale_axis(rel_x, rect.width, buffer.0),
        y: scale_axis(rel_y, rect.height, buffer.1),
    }
}

// ---------------------------------------------------------------------------
//  Selection
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SelectionRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SelectionRect {
    /// Rectangle spanned by two corners, in either order.
    pub fn from_points(a: ImagePoint, b: ImagePoint) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: a.x.abs_diff(b.x),
            height: a.y.abs_diff(b.y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(EditorError::DegenerateRegion);
        }
        Ok(())
    }

    /// Intersection with a `w × h` buffer. Fails if nothing is left.
    pub fn clip_to(&self, w: u32, h: u32) -> Result<SelectionRect> {
        self.validate()?;
        let x0 = self.x.min(w);
        let y0 = self.y.min(h);
        let x1 = self.x.saturating_add(self.width).min(w);
        let y1 = self.y.saturating_add(self.height).min(h);
        let clipped = SelectionRect { x: x0, y: y0, width: x1 - x0, height: y1 - y0 };
        clipped.validate()?;
        Ok(clipped)
    }
}
