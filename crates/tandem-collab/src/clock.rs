//! Timestamps for locally created operations.

use web_time::SystemTime;

/// Issues strictly increasing millisecond timestamps.
///
/// Wall clock, bumped by one when two operations land in the same
/// millisecond (or the clock steps backwards), so one author's edits
/// never tie or reorder against each other.
#[derive(Debug, Default)]
pub struct OpClock {
    last: u64,
}

impl OpClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp: wall clock now, or `last + 1` within the same tick.
    pub fn next(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last = now.max(self.last + 1);
        self.last
    }
}
