// ProfLog - util/constants.rs
//
// Single source of truth for named constants, limits, and defaults.
// Anything a user may want to tune is also exposed through config.toml;
// the values here are the fallbacks used when the config is silent.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "ProfLog";

/// Application identifier used for the platform config directory.
pub const APP_ID: &str = "ProfLog";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Log line format
// =============================================================================

/// chrono format of the leading timestamp (`2019-05-27 09:42:11,230`).
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Regex fragment matching the leading timestamp.
pub const LOG_TIMESTAMP_REGEX: &str = r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}";

/// Length in characters of the leading timestamp; the file scan parses
/// exactly this many characters from the first line of each file.
pub const LOG_TIMESTAMP_LEN: usize = 23;

/// Logger name that marks a record as part of the profiling stream.
/// Also the logger assigned to records whose line carries no `(logger)`.
pub const PROFILING_LOGGER: &str = "PROFILING";

/// Number of raw lines between two "lines processed" progress messages.
pub const PROGRESS_MARK_LINES: u64 = 500_000;

// =============================================================================
// Profiling markers
// =============================================================================

/// Substring identifying a method entry header.
pub const ENTRY_MARKER: &str = "#### Entry: ";

/// Substring identifying a method exit header.
pub const EXIT_MARKER: &str = "##### Exit: ";

/// Prefix stripped from the descriptive line following an entry.
pub const ARGS_PREFIX: &str = "###### args: ";

/// Prefix stripped from the descriptive line following an exit.
pub const RETVAL_PREFIX: &str = "###### retval: ";

// =============================================================================
// Batching and throughput
// =============================================================================

/// Idle gap between consecutive profiling headers that starts a new batch.
pub const DEFAULT_IDLE_GAP_MS: i64 = 60_000;

/// Width of one throughput bucket.
pub const MILLIS_PER_MINUTE: i64 = 60_000;

// =============================================================================
// Histogram and long invocations (all values in microseconds)
// =============================================================================

/// Default width of one histogram bucket.
pub const DEFAULT_HISTOGRAM_BUCKET_US: u64 = 10_000;

/// Default value at which histogram samples are clamped.
pub const DEFAULT_HISTOGRAM_UPPER_US: u64 = 1_000_000;

/// Default elapsed time from which an invocation counts as "long".
pub const DEFAULT_LONG_THRESHOLD_US: u64 = 50_000;

// =============================================================================
// Thread roles
// =============================================================================

/// Thread-name prefix of scheduler (coordinator) threads.
pub const COORDINATOR_THREAD_PREFIX: &str = "midPointScheduler_Worker-";

/// Thread-name prefix of worker pool threads.
pub const WORKER_THREAD_PREFIX: &str = "pool-";

// =============================================================================
// Output files
// =============================================================================

/// Per-minute throughput report.
pub const PER_MINUTE_FILE_NAME: &str = "per-minute.csv";

/// Streamed dump of every closed enclosing invocation.
pub const ALL_INVOCATIONS_FILE_NAME: &str = "invocations-all.txt";

/// Streamed extract of selected method maxima per enclosing invocation.
pub const SELECTED_INVOCATIONS_FILE_NAME: &str = "invocations-selected.csv";

/// Placeholder printed for an invocation that matched no category.
pub const UNCATEGORIZED: &str = "-";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log message included in diagnostic output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Maximum size of a config file in bytes.
pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Maximum length of a single regex or template in the config.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;
