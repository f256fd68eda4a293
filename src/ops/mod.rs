// ============================================================================
// OPS — pure pixel operations over PixelBuffer
// ============================================================================
//
//   color.rs     — HSV / Lab codecs, color sampling, hue masks
//   filters.rs   — blur, convolution, blending, CLAHE, resampling helpers
//   transform.rs — rotation, flips, resize, crop
//   tone.rs      — composite tone recomputation
//   effects.rs   — named effect catalog, recolor, color filter
//   draw.rs      — anti-aliased stroke segments
//   text.rs      — glyph layout and text stamps
// ============================================================================

pub mod color;
pub mod draw;
pub mod effects;
pub mod filters;
pub mod text;
pub mod tone;
pub mod transform;
