// ============================================================================
// TOOLS — interactive mode and per-tool drag state
// ============================================================================

use image::Rgb;

use crate::canvas::{ImagePoint, SelectionRect};
use crate::error::{EditorError, Result, check_range};
use crate::ops::draw::MAX_THICKNESS;
use crate::ops::text::TextStamp;

/// The one interactive tool currently receiving pointer input.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    Cropping(SelectionDrag),
    Drawing(StrokeTracker),
    PlacingText {
        stamp: TextStamp,
        drag: SelectionDrag,
    },
    SamplingColor,
}

impl InteractionMode {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionMode::Idle => "idle",
            InteractionMode::Cropping(_) => "crop",
            InteractionMode::Drawing(_) => "draw",
            InteractionMode::PlacingText { .. } => "text placement",
            InteractionMode::SamplingColor => "color sampling",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionMode::Idle)
    }
}

/// Two-corner rectangle being dragged out with the pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SelectionDrag {
    pub start: Option<ImagePoint>,
    pub end: Option<ImagePoint>,
}

impl SelectionDrag {
    /// Pointer down: restart the rectangle at `p`.
    pub fn press(&mut self, p: ImagePoint) {
        self.start = Some(p);
        self.end = Some(p);
    }

    /// Pointer moved with the button held.
    pub fn drag(&mut self, p: ImagePoint) {
        if self.start.is_some() {
            self.end = Some(p);
        }
    }

    /// The committed rectangle; both corners must be set and distinct on
    /// both axes.
    pub fn rect(&self) -> Result<SelectionRect> {
        let (Some(a), Some(b)) = (self.start, self.end) else {
            return Err(EditorError::EmptySelection);
        };
        let rect = SelectionRect::from_points(a, b);
        rect.validate()?;
        Ok(rect)
    }
}

/// Freehand stroke progress. `last` is set between pointer down and up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StrokeTracker {
    pub last: Option<ImagePoint>,
    /// Segments composited during the current stroke.
    pub segments: u32,
}

impl StrokeTracker {
    pub fn is_active(&self) -> bool {
        self.last.is_some()
    }
}

/// Pen used for freehand strokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawStyle {
    pub color: Rgb<u8>,
    pub thickness: u32,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self { color: Rgb([255, 0, 0]), thickness: 3 }
    }
}

impl DrawStyle {
    pub fn validate(&self) -> Result<()> {
        check_range("thickness", self.thickness, 1, MAX_THICKNESS)
    }
}
