// ProfLog - core/export.rs
//
// Report writers. Delimited reports go through the `csv` crate with `;` as
// the delimiter; text reports are formatted directly.
// Core layer: writes to any Write trait object. The caller owns file
// creation and passes the path only for error context.

use crate::core::histogram::Histogram;
use crate::core::model::{MethodInvocation, Parameters};
use crate::core::tracker::ClosedInvocation;
use crate::util::constants;
use crate::util::error::ReportError;
use chrono::NaiveDateTime;
use std::io::Write;
use std::path::{Path, PathBuf};

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .has_headers(false)
        .from_writer(writer)
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> ReportError + '_ {
    move |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(constants::LOG_TIMESTAMP_FORMAT).to_string()
}

/// Render captured parameters as `{k=v, k2=v2}`.
pub fn format_parameters(parameters: Option<&Parameters>) -> String {
    let body = parameters
        .map(|p| {
            p.iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    format!("{{{body}}}")
}

// =============================================================================
// End-of-run reports
// =============================================================================

/// `Minute;Objects`, one row per minute from 0.
pub fn write_per_minute<W: Write>(
    counts: &[u64],
    writer: W,
    path: &Path,
) -> Result<(), ReportError> {
    let mut csv = csv_writer(writer);
    csv.write_record(["Minute", "Objects"]).map_err(csv_err(path))?;
    for (minute, count) in counts.iter().enumerate() {
        csv.write_record([minute.to_string(), count.to_string()])
            .map_err(csv_err(path))?;
    }
    csv.flush().map_err(io_err(path))
}

/// `Bucket;From;To;Millis;<variable...>`, one row per bucket.
pub fn write_histogram<W: Write>(
    histogram: &Histogram,
    writer: W,
    path: &Path,
) -> Result<(), ReportError> {
    let mut csv = csv_writer(writer);
    let header: Vec<&str> = ["Bucket", "From", "To", "Millis"]
        .into_iter()
        .chain(histogram.variable_names())
        .collect();
    csv.write_record(&header).map_err(csv_err(path))?;

    for row in histogram.rows() {
        let mut record = vec![
            row.index.to_string(),
            row.lower.to_string(),
            row.upper.to_string(),
            format!("{:.6}", row.millis),
        ];
        record.extend(row.counts.iter().map(u64::to_string));
        csv.write_record(&record).map_err(csv_err(path))?;
    }
    csv.flush().map_err(io_err(path))
}

/// One line per long invocation, columns padded for reading in a pager.
pub fn write_long_invocations_text<W: Write>(
    invocations: &[MethodInvocation],
    mut writer: W,
    path: &Path,
) -> Result<(), ReportError> {
    for inv in invocations {
        writeln!(
            writer,
            "{} {:<30} {:<60} {:>10} {:<70} {:<100} {} -> {}",
            format_timestamp(inv.timestamp()),
            format!("[{}]", inv.thread()),
            inv.method(),
            inv.elapsed_us(),
            category_label(inv),
            format_parameters(inv.parameters()),
            inv.arguments(),
            inv.return_value()
        )
        .map_err(io_err(path))?;
    }
    writer.flush().map_err(io_err(path))
}

/// The same data as the text listing, one `;`-delimited record each.
pub fn write_long_invocations_csv<W: Write>(
    invocations: &[MethodInvocation],
    writer: W,
    path: &Path,
) -> Result<(), ReportError> {
    let mut csv = csv_writer(writer);
    for inv in invocations {
        csv.write_record([
            format_timestamp(inv.timestamp()),
            inv.thread().to_string(),
            inv.method().to_string(),
            inv.elapsed_us().to_string(),
            category_label(inv),
            format_parameters(inv.parameters()),
            inv.arguments().to_string(),
            inv.return_value().to_string(),
        ])
        .map_err(csv_err(path))?;
    }
    csv.flush().map_err(io_err(path))
}

/// `Category;Count`, in category-name order.
pub fn write_category_counts<'a, W: Write>(
    counts: impl IntoIterator<Item = (&'a str, u64)>,
    writer: W,
    path: &Path,
) -> Result<(), ReportError> {
    let mut csv = csv_writer(writer);
    csv.write_record(["Category", "Count"]).map_err(csv_err(path))?;
    for (name, count) in counts {
        csv.write_record([name, count.to_string().as_str()])
            .map_err(csv_err(path))?;
    }
    csv.flush().map_err(io_err(path))
}

fn category_label(inv: &MethodInvocation) -> String {
    inv.category_name()
        .unwrap_or_else(|| constants::UNCATEGORIZED.to_string())
}

// =============================================================================
// Streamed reports
// =============================================================================

/// Appends one block per closed enclosing invocation.
pub struct AllInvocationsWriter<W: Write> {
    writer: W,
    path: PathBuf,
}

impl<W: Write> AllInvocationsWriter<W> {
    pub fn new(writer: W, path: &Path) -> Self {
        Self {
            writer,
            path: path.to_path_buf(),
        }
    }

    pub fn write(&mut self, closed: &ClosedInvocation) -> Result<(), ReportError> {
        write!(
            self.writer,
            "Method calls for entry #{} [{}] at {} (progress: {}):\n{}\n",
            closed.sequence,
            closed.thread,
            format_timestamp(closed.timestamp),
            closed.progress,
            closed.summary.render()
        )
        .map_err(io_err(&self.path))
    }

    pub fn finish(mut self) -> Result<W, ReportError> {
        self.writer.flush().map_err(io_err(&self.path))?;
        Ok(self.writer)
    }
}

/// One row per closed enclosing invocation with the longest call of each
/// selected method.
pub struct SelectedInvocationsWriter<W: Write> {
    csv: csv::Writer<W>,
    methods: Vec<String>,
    path: PathBuf,
}

impl<W: Write> SelectedInvocationsWriter<W> {
    /// Writes the header immediately. Columns are named after the part of
    /// each method name following `->`.
    pub fn new(writer: W, methods: &[String], path: &Path) -> Result<Self, ReportError> {
        let mut csv = csv_writer(writer);
        let mut header = vec![
            "Timestamp".to_string(),
            "Second".to_string(),
            "Thread".to_string(),
            "Progress".to_string(),
        ];
        header.extend(methods.iter().map(|m| short_method_name(m).to_string()));
        csv.write_record(&header).map_err(csv_err(path))?;
        Ok(Self {
            csv,
            methods: methods.to_vec(),
            path: path.to_path_buf(),
        })
    }

    /// `first_timestamp` is the stream start; the Second column counts whole
    /// seconds from it.
    pub fn write(
        &mut self,
        closed: &ClosedInvocation,
        first_timestamp: NaiveDateTime,
    ) -> Result<(), ReportError> {
        let seconds = (closed.timestamp - first_timestamp).num_milliseconds() / 1000;
        let mut record = vec![
            format_timestamp(closed.timestamp),
            seconds.to_string(),
            closed.thread.clone(),
            closed.progress.to_string(),
        ];
        record.extend(
            self.methods
                .iter()
                .map(|m| closed.max_elapsed_us(m).to_string()),
        );
        self.csv.write_record(&record).map_err(csv_err(&self.path))
    }

    pub fn finish(mut self) -> Result<(), ReportError> {
        self.csv.flush().map_err(io_err(&self.path))
    }
}

/// `a.b.C->method` becomes `method`; names without `->` become empty.
pub fn short_method_name(method: &str) -> &str {
    method.split_once("->").map_or("", |(_, short)| short)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::test_support::*;
    use crate::core::model::{Categorization, ItemKind};
    use crate::core::summary::EventsSummary;

    fn out(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    fn path() -> PathBuf {
        PathBuf::from("report")
    }

    fn closed(seq: u64, at: NaiveDateTime) -> ClosedInvocation {
        let mut summary = EventsSummary::default();
        summary.register("repo->searchObjects", 1200);
        summary.register("repo->searchObjects", 3400);
        ClosedInvocation {
            sequence: seq,
            thread: "pool-1-thread-1".to_string(),
            timestamp: at,
            progress: 42,
            summary,
        }
    }

    fn long_invocation(categorized: bool) -> MethodInvocation {
        let mut entry = item(ItemKind::Entry, 5, "repo->searchObjects", "w1");
        entry.detail = Some(record(ts(9, 0, 0, 0), "w1", "###### args: (UserType, q)"));
        let mut exit = item(ItemKind::Exit, 5, "repo->searchObjects", "w1");
        exit.elapsed_us = Some(75_000);
        exit.record.timestamp = ts(9, 0, 1, 5);
        exit.detail = Some(record(ts(9, 0, 1, 6), "w1", "###### retval: 3 objects"));
        let mut inv = MethodInvocation::new(entry, exit);
        if categorized {
            let mut parameters = Parameters::new();
            parameters.insert("paging".to_string(), "null paging".to_string());
            parameters.insert("other".to_string(), "x".to_string());
            inv.categorization = Some(Categorization {
                category: "search-user".to_string(),
                subcategories: vec!["no-paging".to_string()],
                parameters,
            });
        }
        inv
    }

    #[test]
    fn test_per_minute() {
        let mut buf = Vec::new();
        write_per_minute(&[3, 0, 7], &mut buf, &path()).unwrap();
        assert_eq!(out(buf), "Minute;Objects\n0;3\n1;0\n2;7\n");
    }

    #[test]
    fn test_histogram_table() {
        let mut h = Histogram::new(10, 1000);
        h.add("b", 5);
        h.add("a", 25);
        let mut buf = Vec::new();
        write_histogram(&h, &mut buf, &path()).unwrap();
        assert_eq!(
            out(buf),
            "Bucket;From;To;Millis;a;b\n\
             0;0;9;0.010000;0;1\n\
             1;10;19;0.020000;0;0\n\
             2;20;25;0.026000;1;0\n"
        );
    }

    #[test]
    fn test_parameters_rendering() {
        let mut p = Parameters::new();
        assert_eq!(format_parameters(Some(&p)), "{}");
        assert_eq!(format_parameters(None), "{}");
        p.insert("a".to_string(), "1".to_string());
        p.insert("b".to_string(), "x y".to_string());
        assert_eq!(format_parameters(Some(&p)), "{a=1, b=x y}");
    }

    #[test]
    fn test_long_invocations_text() {
        let mut buf = Vec::new();
        write_long_invocations_text(&[long_invocation(true)], &mut buf, &path()).unwrap();
        let text = out(buf);
        let expected = format!(
            "2019-05-27 09:00:01,005 {:<30} {:<60} {:>10} {:<70} {:<100} (UserType, q) -> 3 objects\n",
            "[w1]",
            "repo->searchObjects",
            75000,
            "search-user.no-paging",
            "{paging=null paging, other=x}"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_long_invocations_csv_marks_uncategorized() {
        let mut buf = Vec::new();
        write_long_invocations_csv(&[long_invocation(false)], &mut buf, &path()).unwrap();
        assert_eq!(
            out(buf),
            "2019-05-27 09:00:01,005;w1;repo->searchObjects;75000;-;{};(UserType, q);3 objects\n"
        );
    }

    #[test]
    fn test_category_counts() {
        let mut buf = Vec::new();
        write_category_counts([("-", 1), ("search-user", 4)], &mut buf, &path()).unwrap();
        assert_eq!(out(buf), "Category;Count\n-;1\nsearch-user;4\n");
    }

    #[test]
    fn test_all_invocations_block() {
        let mut writer = AllInvocationsWriter::new(Vec::new(), &path());
        writer.write(&closed(83329, ts(9, 42, 11, 230))).unwrap();
        let text = out(writer.finish().unwrap());
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Method calls for entry #83329 [pool-1-thread-1] at 2019-05-27 09:42:11,230 (progress: 42):")
        );
        assert!(lines.next().unwrap().starts_with(" - repo->searchObjects"));
        assert_eq!(lines.next(), Some(""), "blocks end with a blank line");
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_selected_invocations() {
        let methods = vec![
            "repo->searchObjects".to_string(),
            "repo->searchShadowOwner".to_string(),
        ];
        let mut buf = Vec::new();
        {
            let mut writer = SelectedInvocationsWriter::new(&mut buf, &methods, &path()).unwrap();
            writer.write(&closed(1, ts(9, 1, 5, 999)), ts(9, 0, 0, 0)).unwrap();
            writer.finish().unwrap();
        }
        assert_eq!(
            out(buf),
            "Timestamp;Second;Thread;Progress;searchObjects;searchShadowOwner\n\
             2019-05-27 09:01:05,999;65;pool-1-thread-1;42;3400;0\n"
        );
    }

    #[test]
    fn test_short_method_name() {
        assert_eq!(short_method_name("a.B->c"), "c");
        assert_eq!(short_method_name("plain"), "");
    }
}
