// ============================================================================
// EDITOR — the single-document mutation engine
// ============================================================================
//
// Owns the Document, the TransformState/ToneState in force, the undo/redo
// history and the interaction mode. Every mutating command validates its
// inputs first; only a fully formed replacement buffer is ever published as
// `current`. Freehand strokes are the one in-place mutation, with history
// pushed at pointer-down.
// ============================================================================

use std::mem;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ab_glyph::FontArc;
use image::Rgb;

use crate::buffer::PixelBuffer;
use crate::canvas::{DisplayPoint, DisplaySize, Document, ImagePoint, SelectionRect, to_image_coords};
use crate::components::coalesce::ToneCoalescer;
use crate::components::history::{HistoryEntry, HistoryManager};
use crate::components::tools::{DrawStyle, InteractionMode, SelectionDrag, StrokeTracker};
use crate::error::{EditorError, Result, check_range};
use crate::io::{self, SaveFormat, SaveOptions};
use crate::ops::color::{ColorSample, color_to_str};
use crate::ops::draw;
use crate::ops::effects::{self, Effect};
use crate::ops::text::{self, TextStamp};
use crate::ops::tone::{ToneField, ToneState, compute_tone};
use crate::ops::transform::{self, Interpolation, Rotation, TransformState};
use crate::settings::EditorSettings;

/// Log a rejected command and hand the error back.
fn rejected(op: &str, e: EditorError) -> EditorError {
    log_warn!("{} rejected: {}", op, e);
    e
}

pub struct Editor {
    doc: Option<Document>,
    transform: TransformState,
    tone: ToneState,
    history: HistoryManager,
    mode: InteractionMode,
    settings: EditorSettings,
    picked_color: Rgb<u8>,
    draw_style: DrawStyle,
    font: Option<FontArc>,
    /// State before a live tone preview started; pushed as one entry when the
    /// preview ends.
    tone_preview: Option<HistoryEntry>,
    /// Slider input waiting out the debounce delay.
    tone_input: ToneCoalescer,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl Editor {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            doc: None,
            transform: TransformState::default(),
            tone: ToneState::default(),
            history: HistoryManager::new(settings.max_undo_steps),
            tone_input: ToneCoalescer::new(Duration::from_millis(settings.tone_debounce_ms)),
            mode: InteractionMode::Idle,
            picked_color: settings.picked_color,
            draw_style: DrawStyle { color: settings.draw_color, thickness: settings.draw_thickness },
            settings,
            font: None,
            tone_preview: None,
        }
    }

    // ========================================================================
    // DOCUMENT LIFECYCLE
    // ========================================================================

    /// Decode `path` and make it the open document. On failure the previous
    /// document (if any) stays open.
    pub fn load(&mut self, path: &Path) -> Result<&PixelBuffer> {
        let pixels = io::load_image(path).map_err(|e| {
            log_err!("Failed to load {}: {}", path.display(), e);
            e
        })?;
        Ok(self.open(pixels, Some(path.to_path_buf())))
    }

    /// Open an already decoded buffer.
    pub fn load_buffer(&mut self, pixels: PixelBuffer) -> &PixelBuffer {
        self.open(pixels, None)
    }

    fn open(&mut self, pixels: PixelBuffer, source_path: Option<PathBuf>) -> &PixelBuffer {
        let (w, h) = pixels.dimensions();
        match &source_path {
            Some(p) => log_info!("Loaded {} ({}x{})", p.display(), w, h),
            None => log_info!("Opened buffer ({}x{})", w, h),
        }
        self.transform = TransformState::default();
        self.tone = ToneState::default();
        self.history.clear();
        self.mode = InteractionMode::Idle;
        self.tone_preview = None;
        self.tone_input.flush();
        &self.doc.insert(Document::new(pixels, source_path)).current
    }

    /// Encode `current` to `path`, format inferred from the extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let format = SaveFormat::from_path(path).map_err(|e| rejected("Save", e))?;
        let mut options = SaveOptions::new(format);
        options.quality = self.settings.jpeg_quality;
        self.save_with(path, options)
    }

    pub fn save_with(&self, path: &Path, options: SaveOptions) -> Result<()> {
        let doc = self.doc().map_err(|e| rejected("Save", e))?;
        io::encode_and_write(&doc.current, path, options).map_err(|e| {
            log_err!("Failed to save {}: {}", path.display(), e);
            e
        })?;
        log_info!(
            "Saved {} ({}x{}, {:?})",
            path.display(),
            doc.current.width(),
            doc.current.height(),
            options.format
        );
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.doc.is_some()
    }

    fn doc(&self) -> Result<&Document> {
        self.doc.as_ref().ok_or(EditorError::NoDocumentLoaded)
    }

    /// The buffer on display.
    pub fn current(&self) -> Result<&PixelBuffer> {
        Ok(&self.doc()?.current)
    }

    /// Independent copy of `current` for export (clipboard and the like).
    pub fn snapshot(&self) -> Result<PixelBuffer> {
        Ok(self.doc()?.current.clone())
    }

    /// The canonical source geometry and tone are derived from.
    pub fn original(&self) -> Result<&PixelBuffer> {
        Ok(&self.doc()?.original)
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.doc.as_ref()?.source_path.as_deref()
    }

    pub fn transform(&self) -> TransformState {
        self.transform
    }

    pub fn tone(&self) -> ToneState {
        self.tone
    }

    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn picked_color(&self) -> Rgb<u8> {
        self.picked_color
    }

    pub fn set_picked_color(&mut self, color: Rgb<u8>) {
        self.picked_color = color;
    }

    pub fn draw_style(&self) -> DrawStyle {
        self.draw_style
    }

    pub fn set_draw_style(&mut self, style: DrawStyle) -> Result<()> {
        style.validate()?;
        self.draw_style = style;
        Ok(())
    }

    // ========================================================================
    // COMMIT / HISTORY PLUMBING
    // ========================================================================

    /// Publish `pixels` as the new `current`, recording the previous state.
    /// With `rebase`, `pixels` also becomes the canonical source.
    fn commit(
        &mut self,
        description: String,
        pixels: PixelBuffer,
        transform: TransformState,
        tone: ToneState,
        rebase: bool,
    ) -> Result<&PixelBuffer> {
        self.flush_tone_preview();
        let doc = self.doc.as_mut().ok_or(EditorError::NoDocumentLoaded)?;
        let original = rebase.then(|| mem::replace(&mut doc.original, pixels.clone()));
        let previous = mem::replace(&mut doc.current, pixels);
        self.history.push(HistoryEntry {
            description: description.clone(),
            pixels: previous,
            transform: self.transform,
            tone: self.tone,
            original,
        });
        self.transform = transform;
        self.tone = tone;
        log_info!("{} ({}x{})", description, doc.current.width(), doc.current.height());
        Ok(&doc.current)
    }

    /// Swap the live state with `entry`'s, returning the displaced state
    /// under the same description.
    fn swap_in(&mut self, mut entry: HistoryEntry) -> HistoryEntry {
        if let Some(doc) = self.doc.as_mut() {
            mem::swap(&mut doc.current, &mut entry.pixels);
            if let Some(original) = entry.original.as_mut() {
                mem::swap(&mut doc.original, original);
            }
        }
        mem::swap(&mut self.transform, &mut entry.transform);
        mem::swap(&mut self.tone, &mut entry.tone);
        entry
    }

    fn ensure_no_stroke(&self, op: &str) -> Result<()> {
        if let InteractionMode::Drawing(tracker) = &self.mode
            && tracker.is_active()
        {
            return Err(rejected(op, EditorError::InvalidMode { expected: "idle" }));
        }
        Ok(())
    }

    pub fn undo(&mut self) -> Result<&PixelBuffer> {
        self.doc().map_err(|e| rejected("Undo", e))?;
        self.ensure_no_stroke("Undo")?;
        self.tone_input.flush();
        self.flush_tone_preview();
        let entry = self.history.pop_undo().map_err(|e| rejected("Undo", e))?;
        let displaced = self.swap_in(entry);
        log_info!("Undo: {}", displaced.description);
        self.history.push_redo(displaced);
        self.current()
    }

    pub fn redo(&mut self) -> Result<&PixelBuffer> {
        self.doc().map_err(|e| rejected("Redo", e))?;
        self.ensure_no_stroke("Redo")?;
        self.tone_input.flush();
        self.flush_tone_preview();
        let entry = self.history.pop_redo().map_err(|e| rejected("Redo", e))?;
        let displaced = self.swap_in(entry);
        log_info!("Redo: {}", displaced.description);
        self.history.push_undo_keep_redo(displaced);
        self.current()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || self.tone_preview.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ========================================================================
    // GEOMETRY
    // ========================================================================

    fn apply_transform(&mut self, description: &str, transform: TransformState) -> Result<&PixelBuffer> {
        let doc = self.doc().map_err(|e| rejected(description, e))?;
        let pixels = compute_tone(&doc.original, &transform, &self.tone).map_err(|e| rejected(description, e))?;
        let tone = self.tone;
        self.commit(description.to_string(), pixels, transform, tone, false)
    }

    /// Quarter turn clockwise.
    pub fn rotate_cw(&mut self) -> Result<&PixelBuffer> {
        let mut t = self.transform;
        t.rotation = t.rotation.cw();
        self.apply_transform("Rotate", t)
    }

    /// Absolute rotation; any multiple of 90 degrees.
    pub fn set_rotation(&mut self, degrees: i32) -> Result<&PixelBuffer> {
        let rotation = Rotation::from_degrees(degrees).map_err(|e| rejected("Rotate", e))?;
        let mut t = self.transform;
        t.rotation = rotation;
        self.apply_transform("Rotate", t)
    }

    pub fn flip_horizontal(&mut self) -> Result<&PixelBuffer> {
        let mut t = self.transform;
        t.flip_h = !t.flip_h;
        self.apply_transform("Flip Horizontal", t)
    }

    pub fn flip_vertical(&mut self) -> Result<&PixelBuffer> {
        let mut t = self.transform;
        t.flip_v = !t.flip_v;
        self.apply_transform("Flip Vertical", t)
    }

    pub fn reset_transform(&mut self) -> Result<&PixelBuffer> {
        self.apply_transform("Reset Transform", TransformState::default())
    }

    /// Resample `current` with the configured filter. Rebases the document.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<&PixelBuffer> {
        self.resize_with(width, height, self.settings.resize_filter)
    }

    pub fn resize_with(&mut self, width: u32, height: u32, interp: Interpolation) -> Result<&PixelBuffer> {
        let doc = self.doc().map_err(|e| rejected("Resize", e))?;
        let pixels = transform::resize(&doc.current, width, height, interp).map_err(|e| rejected("Resize", e))?;
        self.commit(
            format!("Resize to {}x{} ({})", width, height, interp.name()),
            pixels,
            TransformState::default(),
            ToneState::default(),
            true,
        )
    }

    /// Cut `current` down to `rect` (clipped to the buffer). Rebases the
    /// document.
    pub fn crop(&mut self, rect: SelectionRect) -> Result<&PixelBuffer> {
        let doc = self.doc().map_err(|e| rejected("Crop", e))?;
        let pixels = transform::crop(&doc.current, &rect).map_err(|e| rejected("Crop", e))?;
        self.commit("Crop".to_string(), pixels, TransformState::default(), ToneState::default(), true)
    }

    // ========================================================================
    // TONE
    // ========================================================================

    /// Change one slider and recompute (one history entry).
    pub fn set_tone(&mut self, field: ToneField, value: i32) -> Result<&PixelBuffer> {
        let tone = self.tone.with(field, value).map_err(|e| rejected("Tone", e))?;
        self.apply_tone(tone)
    }

    /// Recompute `current` from the canonical source with `tone`. A value
    /// equal to the tone in force is a no-op. An open preview is closed into
    /// the same history entry.
    pub fn apply_tone(&mut self, tone: ToneState) -> Result<&PixelBuffer> {
        self.doc().map_err(|e| rejected("Tone", e))?;
        self.ensure_no_stroke("Tone")?;
        if self.tone_preview.is_some() {
            self.preview_tone(tone)?;
            self.tone_input.flush();
            self.flush_tone_preview();
            return self.current();
        }
        if tone == self.tone {
            return self.current();
        }
        let doc = self.doc()?;
        let pixels = compute_tone(&doc.original, &self.transform, &tone).map_err(|e| rejected("Tone", e))?;
        let transform = self.transform;
        self.commit("Adjust Tone".to_string(), pixels, transform, tone, false)
    }

    /// Live recompute without touching history. The first preview remembers
    /// the pre-edit state; `end_tone_edit` records it as a single entry.
    pub fn preview_tone(&mut self, tone: ToneState) -> Result<&PixelBuffer> {
        let doc = self.doc().map_err(|e| rejected("Tone preview", e))?;
        self.ensure_no_stroke("Tone preview")?;
        let pixels = compute_tone(&doc.original, &self.transform, &tone).map_err(|e| rejected("Tone preview", e))?;
        let doc = self.doc.as_mut().ok_or(EditorError::NoDocumentLoaded)?;
        let previous = mem::replace(&mut doc.current, pixels);
        if self.tone_preview.is_none() {
            self.tone_preview = Some(HistoryEntry {
                description: "Adjust Tone".to_string(),
                pixels: previous,
                transform: self.transform,
                tone: self.tone,
                original: None,
            });
        }
        self.tone = tone;
        Ok(&doc.current)
    }

    pub fn is_previewing_tone(&self) -> bool {
        self.tone_preview.is_some()
    }

    /// One slider tick. The change is validated now but only recomputed once
    /// the input has been quiet for `tone_debounce_ms` (see
    /// [`poll_tone_input`](Self::poll_tone_input)).
    pub fn slide_tone(&mut self, field: ToneField, value: i32, now: Instant) -> Result<()> {
        self.doc().map_err(|e| rejected("Tone", e))?;
        self.ensure_no_stroke("Tone")?;
        self.tone_input.update(self.tone, field, value, now).map_err(|e| rejected("Tone", e))
    }

    /// Per-frame tick: previews the settled slider state, if any.
    pub fn poll_tone_input(&mut self, now: Instant) -> Result<Option<&PixelBuffer>> {
        match self.tone_input.poll(now) {
            Some(tone) => self.preview_tone(tone).map(Some),
            None => Ok(None),
        }
    }

    pub fn has_pending_tone_input(&self) -> bool {
        self.tone_input.is_pending()
    }

    /// Slider released: apply any pending input and close the preview as one
    /// history entry.
    pub fn end_tone_edit(&mut self) -> Result<&PixelBuffer> {
        if let Some(tone) = self.tone_input.flush() {
            self.preview_tone(tone)?;
        }
        self.flush_tone_preview();
        self.current()
    }

    /// Abandon a live preview and restore the state before it.
    pub fn cancel_tone_edit(&mut self) -> Result<&PixelBuffer> {
        self.tone_input.flush();
        if let Some(entry) = self.tone_preview.take() {
            self.swap_in(entry);
            log_info!("Tone preview cancelled");
        }
        self.current()
    }

    fn flush_tone_preview(&mut self) {
        let Some(entry) = self.tone_preview.take() else { return };
        if entry.tone == self.tone {
            // Nothing changed overall; put the exact pre-preview pixels back.
            self.swap_in(entry);
            return;
        }
        log_info!("Adjust Tone ({:?})", self.tone);
        self.history.push(entry);
    }

    // ========================================================================
    // EFFECTS
    // ========================================================================

    pub fn apply_effect(&mut self, effect: Effect) -> Result<&PixelBuffer> {
        let doc = self.doc().map_err(|e| rejected("Effect", e))?;
        let pixels = effect
            .apply(&doc.current, self.picked_color)
            .map_err(|e| rejected(&format!("Effect {}", effect.name()), e))?;
        let (transform, tone) = (self.transform, self.tone);
        self.commit(format!("Effect: {}", effect.label()), pixels, transform, tone, false)
    }

    /// Pull every hue toward `target` by `mix` percent.
    pub fn recolor(&mut self, target: Rgb<u8>, mix: u32) -> Result<&PixelBuffer> {
        let doc = self.doc().map_err(|e| rejected("Recolor", e))?;
        let pixels = effects::recolor(&doc.current, target, mix).map_err(|e| rejected("Recolor", e))?;
        let (transform, tone) = (self.transform, self.tone);
        self.commit(
            format!("Recolor {} ({}%)", color_to_str(target), mix),
            pixels,
            transform,
            tone,
            false,
        )
    }

    /// Recolor toward the picked color with the configured mix.
    pub fn recolor_picked(&mut self) -> Result<&PixelBuffer> {
        self.recolor(self.picked_color, self.settings.color_mix)
    }

    pub fn color_filter(&mut self, target: Rgb<u8>) -> Result<&PixelBuffer> {
        let doc = self.doc().map_err(|e| rejected("Color filter", e))?;
        let pixels = effects::color_filter(&doc.current, target).map_err(|e| rejected("Color filter", e))?;
        let (transform, tone) = (self.transform, self.tone);
        self.commit(format!("Color Filter {}", color_to_str(target)), pixels, transform, tone, false)
    }

    // ========================================================================
    // INTERACTION MODES
    // ========================================================================

    fn enter_mode(&mut self, mode: InteractionMode) -> Result<()> {
        self.doc().map_err(|e| rejected(mode.name(), e))?;
        self.flush_tone_preview();
        if !self.mode.is_idle() {
            log_info!("Leaving {} mode", self.mode.name());
        }
        self.mode = mode;
        Ok(())
    }

    /// Back to idle, dropping any pending selection. No buffer changes.
    pub fn cancel_mode(&mut self) {
        if !self.mode.is_idle() {
            log_info!("Cancelled {} mode", self.mode.name());
        }
        self.mode = InteractionMode::Idle;
    }

    fn map_point(&self, point: DisplayPoint, display: DisplaySize) -> Result<ImagePoint> {
        let doc = self.doc()?;
        Ok(to_image_coords(point, doc.current.dimensions(), display))
    }

    // ---- crop ---------------------------------------------------------------

    pub fn begin_crop(&mut self) -> Result<()> {
        self.enter_mode(InteractionMode::Cropping(SelectionDrag::default()))
    }

    pub fn crop_press(&mut self, point: DisplayPoint, display: DisplaySize) -> Result<ImagePoint> {
        let p = self.map_point(point, display)?;
        match &mut self.mode {
            InteractionMode::Cropping(drag) => {
                drag.press(p);
                Ok(p)
            }
            _ => Err(EditorError::InvalidMode { expected: "crop" }),
        }
    }

    pub fn crop_drag(&mut self, point: DisplayPoint, display: DisplaySize) -> Result<ImagePoint> {
        let p = self.map_point(point, display)?;
        match &mut self.mode {
            InteractionMode::Cropping(drag) => {
                drag.drag(p);
                Ok(p)
            }
            _ => Err(EditorError::InvalidMode { expected: "crop" }),
        }
    }

    /// Crop to the dragged rectangle. On a bad selection the mode is kept so
    /// the user can drag again.
    pub fn commit_crop(&mut self) -> Result<&PixelBuffer> {
        let drag = match &self.mode {
            InteractionMode::Cropping(drag) => *drag,
            _ => return Err(rejected("Crop", EditorError::InvalidMode { expected: "crop" })),
        };
        let rect = drag.rect().map_err(|e| rejected("Crop", e))?;
        self.mode = InteractionMode::Idle;
        if let Err(e) = self.crop(rect).map(|_| ()) {
            self.mode = InteractionMode::Cropping(drag);
            return Err(e);
        }
        self.current()
    }

    // ---- freehand drawing ------------------------------------------------------

    pub fn begin_drawing(&mut self) -> Result<()> {
        self.enter_mode(InteractionMode::Drawing(StrokeTracker::default()))
    }

    /// Pointer down: stamp a dot and record the state before it for undo.
    pub fn stroke_begin(&mut self, point: DisplayPoint, display: DisplaySize) -> Result<&PixelBuffer> {
        if !matches!(self.mode, InteractionMode::Drawing(_)) {
            return Err(rejected("Stroke", EditorError::InvalidMode { expected: "draw" }));
        }
        let p = self.map_point(point, display).map_err(|e| rejected("Stroke", e))?;
        let style = self.draw_style;
        style.validate().map_err(|e| rejected("Stroke", e))?;
        self.flush_tone_preview();

        let doc = self.doc.as_mut().ok_or(EditorError::NoDocumentLoaded)?;
        let mut pixels = doc.current.clone();
        draw::draw_segment(&mut pixels, p, p, style.color, style.thickness).map_err(|e| rejected("Stroke", e))?;
        let previous = mem::replace(&mut doc.current, pixels);
        self.history.push(HistoryEntry {
            description: "Draw".to_string(),
            pixels: previous,
            transform: self.transform,
            tone: self.tone,
            original: None,
        });
        if let InteractionMode::Drawing(tracker) = &mut self.mode {
            tracker.last = Some(p);
            tracker.segments = 0;
        }
        Ok(&doc.current)
    }

    /// Pointer moved with the button down. Ignored between strokes.
    pub fn stroke_move(&mut self, point: DisplayPoint, display: DisplaySize) -> Result<&PixelBuffer> {
        let p = self.map_point(point, display)?;
        let style = self.draw_style;
        let doc = self.doc.as_mut().ok_or(EditorError::NoDocumentLoaded)?;
        match &mut self.mode {
            InteractionMode::Drawing(tracker) => {
                if let Some(last) = tracker.last {
                    draw::draw_segment(&mut doc.current, last, p, style.color, style.thickness)?;
                    tracker.last = Some(p);
                    tracker.segments += 1;
                }
                Ok(&doc.current)
            }
            _ => Err(EditorError::InvalidMode { expected: "draw" }),
        }
    }

    /// Pointer up.
    pub fn stroke_end(&mut self) -> Result<&PixelBuffer> {
        match &mut self.mode {
            InteractionMode::Drawing(tracker) => {
                if tracker.last.take().is_some() {
                    log_info!("Draw ({} segments)", tracker.segments);
                }
            }
            _ => return Err(EditorError::InvalidMode { expected: "draw" }),
        }
        self.current()
    }

    /// One self-contained segment in image coordinates (one history entry).
    pub fn draw_segment(&mut self, a: ImagePoint, b: ImagePoint, color: Rgb<u8>, thickness: u32) -> Result<&PixelBuffer> {
        let doc = self.doc().map_err(|e| rejected("Draw", e))?;
        let (w, h) = doc.current.dimensions();
        for p in [a, b] {
            check_range("x", p.x, 0, w - 1).map_err(|e| rejected("Draw", e))?;
            check_range("y", p.y, 0, h - 1).map_err(|e| rejected("Draw", e))?;
        }
        let mut pixels = doc.current.clone();
        draw::draw_segment(&mut pixels, a, b, color, thickness).map_err(|e| rejected("Draw", e))?;
        let (transform, tone) = (self.transform, self.tone);
        self.commit("Draw".to_string(), pixels, transform, tone, false)
    }

    // ---- text ---------------------------------------------------------------

    /// A stamp using the configured color, scale and thickness.
    pub fn default_text_stamp(&self, text: &str) -> TextStamp {
        TextStamp {
            text: text.to_string(),
            color: self.settings.text_color,
            scale: self.settings.text_scale,
            thickness: self.settings.text_thickness,
        }
    }

    pub fn begin_text_placement(&mut self, stamp: TextStamp) -> Result<()> {
        stamp.validate().map_err(|e| rejected("Text", e))?;
        self.enter_mode(InteractionMode::PlacingText { stamp, drag: SelectionDrag::default() })
    }

    pub fn text_press(&mut self, point: DisplayPoint, display: DisplaySize) -> Result<ImagePoint> {
        let p = self.map_point(point, display)?;
        match &mut self.mode {
            InteractionMode::PlacingText { drag, .. } => {
                drag.press(p);
                Ok(p)
            }
            _ => Err(EditorError::InvalidMode { expected: "text placement" }),
        }
    }

    pub fn text_drag(&mut self, point: DisplayPoint, display: DisplaySize) -> Result<ImagePoint> {
        let p = self.map_point(point, display)?;
        match &mut self.mode {
            InteractionMode::PlacingText { drag, .. } => {
                drag.drag(p);
                Ok(p)
            }
            _ => Err(EditorError::InvalidMode { expected: "text placement" }),
        }
    }

    /// Stamp the pending text into the dragged rectangle.
    pub fn commit_text(&mut self) -> Result<&PixelBuffer> {
        let (rect, stamp) = match &self.mode {
            InteractionMode::PlacingText { stamp, drag } => {
                (drag.rect().map_err(|e| rejected("Text", e))?, stamp.clone())
            }
            _ => return Err(rejected("Text", EditorError::InvalidMode { expected: "text placement" })),
        };
        self.place_text(rect, &stamp)?;
        self.mode = InteractionMode::Idle;
        self.current()
    }

    /// Stamp `stamp` with its top-left at `rect`'s.
    pub fn place_text(&mut self, rect: SelectionRect, stamp: &TextStamp) -> Result<&PixelBuffer> {
        let (w, h) = self.doc().map_err(|e| rejected("Text", e))?.current.dimensions();
        stamp.validate().map_err(|e| rejected("Text", e))?;
        let rect = rect.clip_to(w, h).map_err(|e| rejected("Text", e))?;
        let font = self.font().map_err(|e| rejected("Text", e))?;
        let doc = self.doc()?;
        let pixels = text::stamp_text(&doc.current, &font, &rect, stamp).map_err(|e| rejected("Text", e))?;
        let (transform, tone) = (self.transform, self.tone);
        self.commit(format!("Text \"{}\"", stamp.text.lines().next().unwrap_or("")), pixels, transform, tone, false)
    }

    /// The stamp font, loading the configured family on first use.
    fn font(&mut self) -> Result<FontArc> {
        if let Some(font) = &self.font {
            return Ok(font.clone());
        }
        let font = text::load_system_font(&self.settings.text_font_family)?;
        log_info!("Loaded font '{}'", self.settings.text_font_family);
        self.font = Some(font.clone());
        Ok(font)
    }

    pub fn set_font(&mut self, font: FontArc) {
        self.font = Some(font);
    }

    pub fn load_font_file(&mut self, path: &Path) -> Result<()> {
        let font = text::load_font_file(path).map_err(|e| rejected("Font", e))?;
        log_info!("Loaded font file {}", path.display());
        self.font = Some(font);
        Ok(())
    }

    // ---- pipette --------------------------------------------------------------

    pub fn begin_color_sampling(&mut self) -> Result<()> {
        self.enter_mode(InteractionMode::SamplingColor)
    }

    /// Sample under the pointer, remember it as the picked color and return
    /// to idle.
    pub fn sample_color(&mut self, point: DisplayPoint, display: DisplaySize) -> Result<ColorSample> {
        if self.mode != InteractionMode::SamplingColor {
            return Err(rejected("Pick color", EditorError::InvalidMode { expected: "color sampling" }));
        }
        let p = self.map_point(point, display)?;
        let sample = self.pick_color(p)?;
        self.mode = InteractionMode::Idle;
        Ok(sample)
    }

    /// Read the pixel at `p` and make it the picked color.
    pub fn pick_color(&mut self, p: ImagePoint) -> Result<ColorSample> {
        let doc = self.doc().map_err(|e| rejected("Pick color", e))?;
        let (w, h) = doc.current.dimensions();
        check_range("x", p.x, 0, w - 1).map_err(|e| rejected("Pick color", e))?;
        check_range("y", p.y, 0, h - 1).map_err(|e| rejected("Pick color", e))?;
        let sample = ColorSample::new(doc.current.get_pixel(p.x, p.y));
        self.picked_color = sample.rgb;
        log_info!(
            "Picked {} (H {:.0}° S {:.0} V {:.0})",
            color_to_str(sample.rgb),
            sample.hsv.h,
            sample.hsv.s,
            sample.hsv.v
        );
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor_with(w: u32, h: u32, color: Rgb<u8>) -> Editor {
        let mut ed = Editor::default();
        ed.load_buffer(PixelBuffer::filled(w, h, color).unwrap());
        ed
    }

    #[test]
    fn commands_need_a_document() {
        let mut ed = Editor::default();
        assert_eq!(ed.rotate_cw().unwrap_err(), EditorError::NoDocumentLoaded);
        assert_eq!(ed.undo().unwrap_err(), EditorError::NoDocumentLoaded);
        assert_eq!(ed.apply_effect(Effect::Sepia).unwrap_err(), EditorError::NoDocumentLoaded);
        assert_eq!(ed.begin_crop().unwrap_err(), EditorError::NoDocumentLoaded);
        assert!(ed.current().is_err());
    }

    #[test]
    fn rejected_tone_leaves_state_alone() {
        let mut ed = editor_with(4, 4, Rgb([100, 100, 100]));
        let err = ed.set_tone(ToneField::Contrast, 101).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedParameter { name: "contrast", .. }));
        assert_eq!(ed.history().undo_len(), 0);
        assert!(ed.tone().is_neutral());
    }

    #[test]
    fn unchanged_tone_is_not_recorded() {
        let mut ed = editor_with(4, 4, Rgb([100, 100, 100]));
        ed.apply_tone(ToneState::default()).unwrap();
        assert!(!ed.can_undo());
    }

    #[test]
    fn resize_rebases_and_undo_restores_original() {
        let mut ed = editor_with(8, 6, Rgb([10, 20, 30]));
        ed.set_tone(ToneField::Brightness, 20).unwrap();
        ed.resize_with(4, 3, Interpolation::Nearest).unwrap();
        assert_eq!(ed.original().unwrap().dimensions(), (4, 3));
        assert!(ed.tone().is_neutral());

        // A later tone tweak works at the new size.
        ed.set_tone(ToneField::Brightness, 10).unwrap();
        assert_eq!(ed.current().unwrap().dimensions(), (4, 3));
        assert_eq!(ed.current().unwrap().get_pixel(0, 0), Rgb([40, 50, 60]));

        ed.undo().unwrap();
        ed.undo().unwrap();
        assert_eq!(ed.original().unwrap().dimensions(), (8, 6));
        assert_eq!(ed.tone().brightness, 20);
        assert_eq!(ed.current().unwrap().get_pixel(0, 0), Rgb([30, 40, 50]));
    }

    #[test]
    fn tone_preview_collapses_to_one_entry() {
        let mut ed = editor_with(4, 4, Rgb([100, 100, 100]));
        for v in [5, 10, 15, 20] {
            ed.preview_tone(ToneState { brightness: v, ..Default::default() }).unwrap();
        }
        assert_eq!(ed.history().undo_len(), 0);
        ed.end_tone_edit().unwrap();
        assert_eq!(ed.history().undo_len(), 1);
        assert_eq!(ed.current().unwrap().get_pixel(0, 0), Rgb([120, 120, 120]));
        ed.undo().unwrap();
        assert_eq!(ed.current().unwrap().get_pixel(0, 0), Rgb([100, 100, 100]));
    }

    #[test]
    fn slider_burst_inside_idle_window_previews_once() {
        let settings = EditorSettings { tone_debounce_ms: 100, ..Default::default() };
        let mut ed = Editor::new(settings);
        ed.load_buffer(PixelBuffer::filled(4, 4, Rgb([100, 100, 100])).unwrap());
        let t0 = Instant::now();
        for (i, v) in [5, 10, 15, 20].into_iter().enumerate() {
            let at = t0 + Duration::from_millis(i as u64 * 20);
            ed.slide_tone(ToneField::Brightness, v, at).unwrap();
            assert!(ed.poll_tone_input(at + Duration::from_millis(10)).unwrap().is_none());
        }
        assert!(!ed.is_previewing_tone());
        assert_eq!(ed.current().unwrap().get_pixel(0, 0), Rgb([100, 100, 100]));

        let shown = ed.poll_tone_input(t0 + Duration::from_millis(160)).unwrap().unwrap();
        assert_eq!(shown.get_pixel(0, 0), Rgb([120, 120, 120]));
        assert!(ed.poll_tone_input(t0 + Duration::from_secs(1)).unwrap().is_none());

        ed.end_tone_edit().unwrap();
        assert_eq!(ed.history().undo_len(), 1);
        ed.undo().unwrap();
        assert_eq!(ed.current().unwrap().get_pixel(0, 0), Rgb([100, 100, 100]));
    }

    #[test]
    fn slider_release_applies_pending_input() {
        let mut ed = editor_with(4, 4, Rgb([100, 100, 100]));
        let now = Instant::now();
        ed.slide_tone(ToneField::Brightness, 10, now).unwrap();
        ed.slide_tone(ToneField::Brightness, 30, now).unwrap();
        assert!(ed.has_pending_tone_input());
        ed.end_tone_edit().unwrap();
        assert!(!ed.has_pending_tone_input());
        assert_eq!(ed.tone().brightness, 30);
        assert_eq!(ed.history().undo_len(), 1);
    }

    #[test]
    fn out_of_range_slider_value_is_reported() {
        let mut ed = editor_with(4, 4, Rgb([100, 100, 100]));
        let err = ed.slide_tone(ToneField::Hue, 91, Instant::now()).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedParameter { name: "hue", .. }));
        assert!(!ed.has_pending_tone_input());
        ed.end_tone_edit().unwrap();
        assert_eq!(ed.history().undo_len(), 0);
    }

    #[test]
    fn apply_during_preview_is_one_history_entry() {
        let mut ed = editor_with(4, 4, Rgb([100, 100, 100]));
        ed.preview_tone(ToneState { brightness: 10, ..Default::default() }).unwrap();
        ed.apply_tone(ToneState { brightness: 20, ..Default::default() }).unwrap();
        assert!(!ed.is_previewing_tone());
        assert_eq!(ed.history().undo_len(), 1);
        assert_eq!(ed.current().unwrap().get_pixel(0, 0), Rgb([120, 120, 120]));
        ed.undo().unwrap();
        assert_eq!(ed.current().unwrap().get_pixel(0, 0), Rgb([100, 100, 100]));
        assert!(!ed.can_undo());
    }

    #[test]
    fn tone_preview_is_rejected_mid_stroke() {
        let mut ed = editor_with(20, 20, Rgb([0, 0, 0]));
        let display = DisplaySize::new(20, 20);
        ed.begin_drawing().unwrap();
        ed.stroke_begin(DisplayPoint::new(5, 5), display).unwrap();
        let before = ed.snapshot().unwrap();
        let err = ed.preview_tone(ToneState { brightness: 50, ..Default::default() }).unwrap_err();
        assert_eq!(err, EditorError::InvalidMode { expected: "idle" });
        assert!(ed.slide_tone(ToneField::Brightness, 50, Instant::now()).is_err());
        assert!(!ed.is_previewing_tone());
        assert_eq!(ed.current().unwrap().as_raw(), before.as_raw());
        ed.stroke_end().unwrap();
        assert_eq!(ed.history().undo_len(), 1);
    }

    #[test]
    fn cancelled_preview_restores_pixels() {
        let mut ed = editor_with(4, 4, Rgb([100, 100, 100]));
        ed.preview_tone(ToneState { contrast: 50, ..Default::default() }).unwrap();
        ed.cancel_tone_edit().unwrap();
        assert!(ed.tone().is_neutral());
        assert_eq!(ed.current().unwrap().get_pixel(1, 1), Rgb([100, 100, 100]));
        assert!(!ed.can_undo());
    }

    #[test]
    fn pipette_sets_picked_color_and_returns_to_idle() {
        let mut ed = editor_with(10, 10, Rgb([0, 255, 0]));
        let display = DisplaySize::new(10, 10);
        assert!(ed.sample_color(DisplayPoint::new(5, 5), display).is_err());
        ed.begin_color_sampling().unwrap();
        let s = ed.sample_color(DisplayPoint::new(5, 5), display).unwrap();
        assert_eq!(s.hsv.h, 120.0);
        assert_eq!(ed.picked_color(), Rgb([0, 255, 0]));
        assert!(ed.mode().is_idle());
    }

    #[test]
    fn stroke_pushes_history_once() {
        let mut ed = editor_with(20, 20, Rgb([0, 0, 0]));
        let display = DisplaySize::new(20, 20);
        assert!(ed.stroke_begin(DisplayPoint::new(2, 2), display).is_err());
        ed.begin_drawing().unwrap();
        ed.stroke_begin(DisplayPoint::new(2, 10), display).unwrap();
        // The dot is already on the canvas when the entry is recorded.
        assert_eq!(ed.history().undo_len(), 1);
        assert_eq!(ed.current().unwrap().get_pixel(2, 10), Rgb([255, 0, 0]));
        for x in [6, 10, 14, 18] {
            ed.stroke_move(DisplayPoint::new(x, 10), display).unwrap();
        }
        assert_eq!(ed.undo().unwrap_err(), EditorError::InvalidMode { expected: "idle" });
        ed.stroke_end().unwrap();
        assert_eq!(ed.history().undo_len(), 1);
        assert_eq!(ed.current().unwrap().get_pixel(10, 10), Rgb([255, 0, 0]));
        ed.undo().unwrap();
        assert_eq!(ed.current().unwrap().get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn text_commit_without_drag_is_empty_selection() {
        let mut ed = editor_with(50, 50, Rgb([0, 0, 0]));
        let stamp = ed.default_text_stamp("hi");
        ed.begin_text_placement(stamp).unwrap();
        assert_eq!(ed.commit_text().unwrap_err(), EditorError::EmptySelection);
        assert!(matches!(ed.mode(), InteractionMode::PlacingText { .. }));
        ed.cancel_mode();
        assert!(ed.mode().is_idle());
        assert_eq!(ed.history().undo_len(), 0);
    }
}
