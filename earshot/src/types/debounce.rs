//! Edge debouncer for noisy digital inputs.
//!
//! A contact or comparator output rarely switches cleanly; one real
//! transition shows up as a burst of edges. The debouncer accepts an
//! edge and then ignores further edges until the window, measured from
//! that accepted edge, has passed.
//!
//! ```text
//!   accept(t0)      t < t0 + window        t >= t0 + window
//!  Quiet ──────────► Settling ─────────────────────────────► Quiet
//!                     │    ▲
//!                     └────┘ edge inside window (rejected)
//! ```
//!
//! Rejected edges do not move the window. A comparator that chatters
//! for as long as it hears sound therefore still yields one accepted
//! edge per window rather than going silent until the room is quiet.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct EdgeDebouncer {
    window: Duration,
    last_edge: Option<Instant>,
}

impl EdgeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_edge: None,
        }
    }

    /// Record an edge seen at `now`. Returns `true` if it should be
    /// acted on, `false` if it falls inside the window of the last
    /// accepted edge.
    pub fn accept(&mut self, now: Instant) -> bool {
        let accepted = match self.last_edge {
            Some(last) => now.saturating_duration_since(last) >= self.window,
            None => true,
        };
        if accepted {
            self.last_edge = Some(now);
        }
        accepted
    }
}
