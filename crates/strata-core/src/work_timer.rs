use std::convert::TryInto;
use std::time::{Duration, Instant};

/// Measures the wall time of a named unit of work made of many items (e.g. the rays of one sensor batch).
pub struct WorkTimer {
    name: &'static str,
    started_at: Instant,
    items_completed: u32,
}

impl WorkTimer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            started_at: Instant::now(),
            items_completed: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn items_completed(&self) -> u32 {
        self.items_completed
    }

    pub fn complete_items(&mut self, n: u32) {
        self.items_completed = self.items_completed.saturating_add(n);
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn average_item_time_us(&self) -> u32 {
        let total_us: u32 = self.elapsed().as_micros().try_into().unwrap_or(u32::MAX);

        total_us / self.items_completed.max(1)
    }

    /// Stops the timer and logs the totals at debug level.
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        log::debug!(
            "{}: {} items in {:?} ({} us/item)",
            self.name,
            self.items_completed,
            elapsed,
            self.average_item_time_us()
        );
        elapsed
    }
}
