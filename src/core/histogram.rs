// ProfLog - core/histogram.rs
//
// Fixed-width bucketed histogram over named variables.
//
// Values are clamped at the upper boundary before bucketing, so every
// sample above it lands in the top bucket; the unclamped maximum is kept
// separately so the report can show how far the tail really reaches.

use std::collections::BTreeMap;

/// One row of the histogram table.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramRow {
    pub index: usize,
    pub lower: u64,
    pub upper: u64,
    /// `(upper + 1) / 1000`: the row's upper bound in milliseconds.
    pub millis: f64,
    /// One count per variable, in variable-name order.
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct Histogram {
    bucket_size: u64,
    upper_boundary: u64,
    absolute_maximum: u64,
    variables: BTreeMap<String, Vec<u64>>,
}

impl Histogram {
    /// `bucket_size` must be at least 1; config validation guarantees it.
    pub fn new(bucket_size: u64, upper_boundary: u64) -> Self {
        Self {
            bucket_size: bucket_size.max(1),
            upper_boundary,
            absolute_maximum: 0,
            variables: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, variable: &str, value: u64) {
        let bucket = (value.min(self.upper_boundary) / self.bucket_size) as usize;
        let counts = self.variables.entry(variable.to_string()).or_default();
        if counts.len() <= bucket {
            counts.resize(bucket + 1, 0);
        }
        counts[bucket] += 1;
        self.absolute_maximum = self.absolute_maximum.max(value);
    }

    pub fn bucket_size(&self) -> u64 {
        self.bucket_size
    }

    /// Largest raw (unclamped) value ever added.
    pub fn absolute_maximum(&self) -> u64 {
        self.absolute_maximum
    }

    /// Variable names in sorted order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Length of the longest bucket list across all variables.
    pub fn bucket_count(&self) -> usize {
        self.variables.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Counts of bucket `index`, one per variable in name order; variables
    /// whose list is shorter report 0.
    pub fn bucket(&self, index: usize) -> Vec<u64> {
        self.variables
            .values()
            .map(|counts| counts.get(index).copied().unwrap_or(0))
            .collect()
    }

    /// All rows with their bounds. The last row's upper bound is the
    /// absolute maximum rather than the bucket edge.
    pub fn rows(&self) -> Vec<HistogramRow> {
        let count = self.bucket_count();
        (0..count)
            .map(|i| {
                let lower = i as u64 * self.bucket_size;
                let upper = if i + 1 == count {
                    self.absolute_maximum
                } else {
                    (i as u64 + 1) * self.bucket_size - 1
                };
                HistogramRow {
                    index: i,
                    lower,
                    upper,
                    millis: upper.saturating_add(1) as f64 / 1000.0,
                    counts: self.bucket(i),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucketing_and_clamping() {
        let mut h = Histogram::new(10_000, 1_000_000);
        h.add("m", 999_999);
        assert_eq!(h.bucket_count(), 100, "999999 lands in bucket 99");
        assert_eq!(h.bucket(99), vec![1]);

        h.add("m", 1_500_000);
        assert_eq!(h.bucket_count(), 101, "clamped value lands in the top bucket");
        assert_eq!(h.bucket(100), vec![1]);
        assert_eq!(h.absolute_maximum(), 1_500_000);
    }

    #[test]
    fn test_short_lists_report_zero() {
        let mut h = Histogram::new(10, 1_000);
        h.add("b", 55);
        h.add("a", 3);
        assert_eq!(h.variable_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(h.bucket(0), vec![1, 0]);
        assert_eq!(h.bucket(5), vec![0, 1]);
        assert_eq!(h.bucket(17), vec![0, 0]);
    }

    #[test]
    fn test_row_bounds() {
        let mut h = Histogram::new(10, 1_000);
        h.add("a", 3);
        h.add("a", 27);
        let rows = h.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!((rows[0].lower, rows[0].upper), (0, 9));
        assert_eq!((rows[1].lower, rows[1].upper), (10, 19));
        assert_eq!((rows[2].lower, rows[2].upper), (20, 27), "last upper is the max");
        assert!((rows[0].millis - 0.010).abs() < 1e-9);
        assert!((rows[2].millis - 0.028).abs() < 1e-9);
    }

    #[test]
    fn test_maximum_value_row() {
        let mut h = Histogram::new(10, 20);
        h.add("a", u64::MAX);
        let rows = h.rows();
        assert_eq!(rows.len(), 3, "clamped into bucket 2");
        assert_eq!(rows[2].upper, u64::MAX);
        assert!((rows[2].millis - u64::MAX as f64 / 1000.0).abs() < 1.0e6);
    }

    #[test]
    fn test_empty_histogram() {
        let h = Histogram::new(10, 100);
        assert!(h.is_empty());
        assert_eq!(h.bucket_count(), 0);
        assert!(h.rows().is_empty());
    }
}
