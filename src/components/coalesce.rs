// ============================================================================
// TONE COALESCER — caller-side debounce for continuous slider input
// ============================================================================
//
// The engine has no timers. `Editor::slide_tone` feeds every slider change
// into a `ToneCoalescer` and `Editor::poll_tone_input` asks it once per frame;
// only the state that has been stable for the idle delay is recomputed.
// ============================================================================

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::ops::tone::{ToneField, ToneState};

pub const DEFAULT_IDLE: Duration = Duration::from_millis(150);

pub struct ToneCoalescer {
    idle: Duration,
    pending: Option<ToneState>,
    last_change: Option<Instant>,
}

impl Default for ToneCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE)
    }
}

impl ToneCoalescer {
    pub fn new(idle: Duration) -> Self {
        Self { idle, pending: None, last_change: None }
    }

    /// Record a slider change on top of `base` (the last committed or
    /// pending state). An out-of-range value is rejected and leaves the
    /// pending state as it was.
    pub fn update(&mut self, base: ToneState, field: ToneField, value: i32, now: Instant) -> Result<()> {
        let next = self.pending.unwrap_or(base).with(field, value)?;
        self.pending = Some(next);
        self.last_change = Some(now);
        Ok(())
    }

    /// State to commit, once the input has been quiet for the idle delay.
    pub fn poll(&mut self, now: Instant) -> Option<ToneState> {
        let last = self.last_change?;
        if now.saturating_duration_since(last) < self.idle {
            return None;
        }
        self.last_change = None;
        self.pending.take()
    }

    /// Take whatever is pending immediately (e.g. on slider release).
    pub fn flush(&mut self) -> Option<ToneState> {
        self.last_change = None;
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
