// ProfLog - core/summary.rs
//
// Nested per-tag timing accumulation.
//
// A `Collector` keeps one open `EventsSummary` per tag (thread name). Each
// summary maps an event type (method name) to its `Times`. Closing a tag
// hands the summary back to the caller and forgets it.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

/// Count, total, min and max of elapsed times, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Times {
    pub count: u64,
    pub total: u64,
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl Times {
    pub fn register(&mut self, elapsed_us: u64) {
        self.count += 1;
        self.total = self.total.saturating_add(elapsed_us);
        self.min = Some(self.min.map_or(elapsed_us, |m| m.min(elapsed_us)));
        self.max = Some(self.max.map_or(elapsed_us, |m| m.max(elapsed_us)));
    }

    /// Mean in microseconds; 0 when nothing was registered.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }
}

/// Event type -> accumulated times, iterated in event-type order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsSummary {
    events: BTreeMap<String, Times>,
}

impl EventsSummary {
    pub fn register(&mut self, event_type: &str, elapsed_us: u64) {
        self.events
            .entry(event_type.to_string())
            .or_default()
            .register(elapsed_us);
    }

    pub fn get(&self, event_type: &str) -> Option<&Times> {
        self.events.get(event_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Times)> {
        self.events.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// One line per event type, in name order, times in milliseconds:
    /// ` - <type>: <count> in <total> ms [min: <min> max: <max> avg: <avg>]`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, times) in &self.events {
            let ms = |us: u64| us as f64 / 1000.0;
            // Writing to a String cannot fail.
            let _ = writeln!(
                out,
                " - {:<80}: {:>6} in {:>10.3} ms [min: {:>9.3} max: {:>9.3} avg: {:>9.3}]",
                name,
                times.count,
                ms(times.total),
                ms(times.min.unwrap_or(0)),
                ms(times.max.unwrap_or(0)),
                times.average() / 1000.0
            );
        }
        out
    }
}

/// Tag -> currently open summary.
#[derive(Debug, Default)]
pub struct Collector {
    open: HashMap<String, EventsSummary>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: &str, event_type: &str, elapsed_us: u64) {
        self.open
            .entry(tag.to_string())
            .or_default()
            .register(event_type, elapsed_us);
    }

    /// Remove and return the summary of `tag`, if anything was registered.
    pub fn close_tag(&mut self, tag: &str) -> Option<EventsSummary> {
        self.open.remove(tag)
    }

    /// Discard every open summary.
    pub fn reset(&mut self) {
        self.open.clear();
    }

    pub fn open_tags(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_accumulate() {
        let mut t = Times::default();
        t.register(1500);
        t.register(500);
        t.register(1000);
        assert_eq!(t.count, 3);
        assert_eq!(t.total, 3000);
        assert_eq!(t.min, Some(500));
        assert_eq!(t.max, Some(1500));
        assert!((t.average() - 1000.0).abs() < 1e-9);
        assert_eq!(Times::default().average(), 0.0);
    }

    #[test]
    fn test_times_total_saturates() {
        let mut t = Times::default();
        t.register(u64::MAX - 1);
        t.register(10);
        assert_eq!(t.count, 2);
        assert_eq!(t.total, u64::MAX);
        assert_eq!(t.max, Some(u64::MAX - 1));
    }

    #[test]
    fn test_render_format_and_order() {
        let mut s = EventsSummary::default();
        s.register("b", 2500);
        s.register("a", 1000);
        s.register("a", 3000);
        let rendered = s.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(" - a "), "sorted by name: {rendered}");
        assert_eq!(
            lines[0],
            format!(
                " - {:<80}: {:>6} in {:>10.3} ms [min: {:>9.3} max: {:>9.3} avg: {:>9.3}]",
                "a", 2, 4.0, 1.0, 3.0, 2.0
            )
        );
        assert!(lines[1].contains("     1 in      2.500 ms"), "got: {}", lines[1]);
    }

    #[test]
    fn test_collector_close_and_reset() {
        let mut c = Collector::new();
        c.register("t1", "m", 10);
        c.register("t1", "m", 20);
        c.register("t2", "m", 30);
        assert_eq!(c.open_tags(), 2);

        let closed = c.close_tag("t1").expect("t1 was open");
        assert_eq!(closed.get("m").map(|t| t.count), Some(2));
        assert!(c.close_tag("t1").is_none(), "a closed tag is forgotten");

        c.reset();
        assert_eq!(c.open_tags(), 0);
    }
}
