use std::time::{SystemTime, UNIX_EPOCH};

/// Strictly increasing timestamps for annotation creation.
/// Follows wall-clock milliseconds when it moves forward, otherwise counts up.
#[derive(Debug, Clone, Default)]
pub struct LogicalClock {
    last: u64,
}

impl LogicalClock {
    pub fn new() -> Self {
        LogicalClock::default()
    }

    pub fn tick(&mut self) -> u64 {
        self.last = (self.last + 1).max(now_millis());
        self.last
    }

    /// Make sure every later tick is greater than `timestamp`.
    pub fn observe(&mut self, timestamp: u64) {
        self.last = self.last.max(timestamp);
    }

    pub fn last(&self) -> u64 {
        self.last
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
