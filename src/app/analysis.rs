// ProfLog - app/analysis.rs
//
// One analysis run: a single sequential pass over the log directory.
//
// Pipeline:
//   MultiFileLineReader -> LogEntryAssembler -> ProfilingItemReader
//     -> InvocationTracker -> reports
//
// The all-invocations dump and the selected-invocations extract are
// written while the pass runs. Everything else is written once the input
// is exhausted.

use crate::app::line_reader::{self, MultiFileLineReader};
use crate::app::profile_mgr::AnalyzerConfig;
use crate::core::categorize::CategoryCounts;
use crate::core::export::{self, AllInvocationsWriter, SelectedInvocationsWriter};
use crate::core::parser::LogEntryAssembler;
use crate::core::profiling::ProfilingItemReader;
use crate::core::tracker::InvocationTracker;
use crate::util::constants;
use crate::util::error::{AnalyzerError, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Totals of a finished run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files: usize,
    pub lines: u64,
    pub records: u64,
    pub batches: u32,
    pub closed_invocations: u64,
    pub orphan_exits: u64,
    pub long_invocations: usize,
    /// Every report written, in write order.
    pub reports: Vec<PathBuf>,
}

/// Name of the histogram report for the given bucket size and keying suffix.
pub fn histogram_file_name(bucket_us: u64, suffix: &str) -> String {
    format!("methods-performance-histogram-{bucket_us}{suffix}.csv")
}

pub fn long_invocations_file_name(threshold_ms: u64, extension: &str) -> String {
    format!("invocations-long-{threshold_ms}.{extension}")
}

pub fn category_counts_file_name(threshold_ms: u64) -> String {
    format!("slow-query-category-counts-{threshold_ms}.csv")
}

fn create_report(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| AnalyzerError::Io {
        path: path.to_path_buf(),
        operation: "create report",
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Analyse every log file under `log_dir` and write the reports into
/// `output_dir`, creating it if needed.
pub fn run(log_dir: &Path, output_dir: &Path, config: &AnalyzerConfig) -> Result<RunSummary> {
    let started = Instant::now();
    std::fs::create_dir_all(output_dir).map_err(|e| AnalyzerError::Io {
        path: output_dir.to_path_buf(),
        operation: "create output directory",
        source: e,
    })?;

    let files = line_reader::scan_log_files(log_dir, &config.discovery)?;
    let mut summary = RunSummary {
        files: files.len(),
        ..Default::default()
    };
    if files.is_empty() {
        tracing::warn!(dir = %log_dir.display(), "No dated log files found");
    }

    let profile = &config.profile;
    let assembler = LogEntryAssembler::new(MultiFileLineReader::new(files));
    let mut items = ProfilingItemReader::new(assembler, profile.profiling.clone());
    let mut tracker = InvocationTracker::new(profile.tracker.clone());

    // Streamed reports
    let all_path = output_dir.join(constants::ALL_INVOCATIONS_FILE_NAME);
    let mut all = AllInvocationsWriter::new(create_report(&all_path)?, &all_path);
    let selected_path = output_dir.join(constants::SELECTED_INVOCATIONS_FILE_NAME);
    let mut selected = SelectedInvocationsWriter::new(
        create_report(&selected_path)?,
        &profile.selected_methods,
        &selected_path,
    )?;

    while let Some(item) = items.read_item(&mut tracker)? {
        if let Some(closed) = tracker.process(item) {
            all.write(&closed)?;
            let first = items.first_timestamp().unwrap_or(closed.timestamp);
            selected.write(&closed, first)?;
        }
    }
    all.finish()?;
    selected.finish()?;
    summary.reports.push(all_path);
    summary.reports.push(selected_path);

    // End-of-run reports
    let per_minute_path = output_dir.join(constants::PER_MINUTE_FILE_NAME);
    export::write_per_minute(
        items.throughput().counts_per_minute(),
        create_report(&per_minute_path)?,
        &per_minute_path,
    )?;
    summary.reports.push(per_minute_path);

    let histogram_path = output_dir.join(histogram_file_name(
        profile.tracker.histogram_bucket_us,
        &tracker.histogram_keying().file_suffix(),
    ));
    export::write_histogram(
        tracker.histogram(),
        create_report(&histogram_path)?,
        &histogram_path,
    )?;
    summary.reports.push(histogram_path);

    let threshold_ms = tracker.long_filter().threshold_ms();
    let mut long = tracker.take_long_invocations();
    let mut counts = CategoryCounts::default();
    for invocation in &mut long {
        profile.rules.apply(invocation);
        counts.increment(invocation);
    }

    let long_text_path = output_dir.join(long_invocations_file_name(threshold_ms, "txt"));
    export::write_long_invocations_text(&long, create_report(&long_text_path)?, &long_text_path)?;
    let long_csv_path = output_dir.join(long_invocations_file_name(threshold_ms, "csv"));
    export::write_long_invocations_csv(&long, create_report(&long_csv_path)?, &long_csv_path)?;
    let counts_path = output_dir.join(category_counts_file_name(threshold_ms));
    export::write_category_counts(counts.iter(), create_report(&counts_path)?, &counts_path)?;
    summary.reports.extend([long_text_path, long_csv_path, counts_path]);

    summary.lines = items.total_lines();
    summary.records = items.total_records();
    summary.batches = items.batch();
    summary.closed_invocations = tracker.closed_invocations();
    summary.orphan_exits = tracker.orphan_exits();
    summary.long_invocations = long.len();

    tracing::info!(
        files = summary.files,
        lines = summary.lines,
        records = summary.records,
        batches = summary.batches,
        closed = summary.closed_invocations,
        orphan_exits = summary.orphan_exits,
        long = summary.long_invocations,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Analysis complete"
    );
    for (category, count) in counts.iter() {
        tracing::info!(category, count, "Long invocations by category");
    }

    Ok(summary)
}
