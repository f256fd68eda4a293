// ============================================================================
// COMPONENTS — editing state that lives alongside the document
// ============================================================================
//
//   history.rs  — bounded undo/redo stacks of snapshots
//   tools.rs    — interaction mode, drag/stroke state, pen style
//   coalesce.rs — debounce helper for continuous tone input
// ============================================================================

pub mod coalesce;
pub mod history;
pub mod tools;
