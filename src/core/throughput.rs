// ProfLog - core/throughput.rs
//
// Per-minute progress counter. Fed by the profiling reader whenever a
// record carries a progress marker.

use crate::util::constants;

/// Counts progress markers per minute elapsed since the stream started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThroughputCounter {
    counts: Vec<u64>,
}

impl ThroughputCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one progress marker `ms_since_start` milliseconds into the
    /// stream. Minutes with nothing registered stay at zero.
    ///
    /// A negative offset (a record older than the first one in the stream)
    /// cannot be placed on the timeline and is ignored.
    pub fn register_progress(&mut self, ms_since_start: i64) {
        let Ok(ms) = u64::try_from(ms_since_start) else {
            tracing::debug!(ms_since_start, "Progress marker before stream start, ignoring");
            return;
        };
        let minute = (ms / constants::MILLIS_PER_MINUTE as u64) as usize;
        if self.counts.len() <= minute {
            self.counts.resize(minute + 1, 0);
        }
        self.counts[minute] += 1;
    }

    /// Counts indexed by minute, from minute 0 to the last minute that
    /// received a marker.
    pub fn counts_per_minute(&self) -> &[u64] {
        &self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_grow_with_zero_filled_minutes() {
        let mut counter = ThroughputCounter::new();
        counter.register_progress(0);
        counter.register_progress(59_999);
        counter.register_progress(180_000);
        assert_eq!(counter.counts_per_minute(), &[2, 0, 0, 1]);
    }

    #[test]
    fn test_empty_counter() {
        assert!(ThroughputCounter::new().counts_per_minute().is_empty());
    }

    #[test]
    fn test_negative_offset_ignored() {
        let mut counter = ThroughputCounter::new();
        counter.register_progress(-5);
        assert!(counter.counts_per_minute().is_empty());
    }
}
