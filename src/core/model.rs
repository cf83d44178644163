// ProfLog - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies.
//
// These types are the shared vocabulary across all layers: the line
// reader produces positions, the assembler produces records, the
// profiling reader produces items, and the tracker pairs items into
// invocations that the categoriser annotates.

use crate::util::constants;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// Log files and positions
// =============================================================================

/// A log file retained by the directory scan, with the timestamp parsed
/// from its first line. Files are consumed in ascending `start` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub start: NaiveDateTime,
}

/// Where a line came from. Opaque except for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilePosition {
    pub file: Arc<Path>,
    /// 1-based line number within `file`.
    pub line_number: u64,
}

impl fmt::Display for LogFilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.file.display(), self.line_number)
    }
}

// =============================================================================
// Log records (output of assembly)
// =============================================================================

/// One structured log record: the header line plus any continuation lines
/// that followed it before the next structured line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub thread: String,
    pub level: String,
    /// Logger name; `PROFILING` when the line carried none.
    pub logger: String,
    pub message: String,
    /// The raw header line as read from the file.
    pub first_line: String,
    /// Lines that did not match the structured pattern, in file order.
    pub continuation: Vec<String>,
    pub position: LogFilePosition,
}

impl LogRecord {
    /// Whether this record belongs to the profiling stream.
    pub fn is_profiling(&self) -> bool {
        self.logger == constants::PROFILING_LOGGER
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{} [{}] {} ({}): {} @{}",
            self.timestamp.format(constants::LOG_TIMESTAMP_FORMAT),
            self.thread,
            self.level,
            self.logger,
            crate::util::logging::preview(&self.message, 30),
            self.position
        )
    }
}

// =============================================================================
// Profiling items (output of the profiling state machine)
// =============================================================================

/// Which side of a traced call a profiling item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Entry,
    Exit,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemKind::Entry => "ENTRY",
            ItemKind::Exit => "EXIT",
        })
    }
}

/// An entry or exit header, optionally completed by its descriptive line
/// (arguments for an entry, return value for an exit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilingItem {
    pub kind: ItemKind,
    pub sequence: u64,
    pub method: String,
    /// Elapsed time in microseconds. Always `Some` for exits, `None` for entries.
    pub elapsed_us: Option<u64>,
    /// The header record.
    pub record: LogRecord,
    /// The descriptive record that followed the header on the same thread.
    pub detail: Option<LogRecord>,
    /// Process-wide progress counter at the time the header was read.
    pub progress: u64,
    pub batch: u32,
    /// True for the header that opened its batch.
    pub new_batch: bool,
}

impl ProfilingItem {
    pub fn thread(&self) -> &str {
        &self.record.thread
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.record.timestamp
    }
}

impl fmt::Display for ProfilingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} ({}:{}) p:{}, b:{}{} {}",
            self.kind,
            self.sequence,
            self.method,
            self.elapsed_us
                .map(|us| us.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.progress,
            self.batch,
            if self.new_batch { " (new)" } else { "" },
            self.record
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " / {detail}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Thread roles
// =============================================================================

/// Coarse classification of a thread derived from its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThreadRole {
    Coordinator,
    Worker,
    Other,
}

impl ThreadRole {
    pub fn from_thread_name(name: &str) -> Self {
        if name.starts_with(constants::COORDINATOR_THREAD_PREFIX) {
            ThreadRole::Coordinator
        } else if name.starts_with(constants::WORKER_THREAD_PREFIX) {
            ThreadRole::Worker
        } else {
            ThreadRole::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThreadRole::Coordinator => "COORDINATOR",
            ThreadRole::Worker => "WORKER",
            ThreadRole::Other => "OTHER",
        }
    }
}

impl fmt::Display for ThreadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Method invocations
// =============================================================================

/// Captured template parameters, in capture order.
pub type Parameters = IndexMap<String, String>;

/// The classification assigned to an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Categorization {
    /// Name of the primary category definition that matched.
    pub category: String,
    /// Names of the subcategories that matched, in definition order.
    pub subcategories: Vec<String>,
    /// Captures of the primary templates merged with subcategory captures.
    pub parameters: Parameters,
}

impl Categorization {
    /// Full dotted name: `category.sub1.sub2`.
    pub fn full_name(&self) -> String {
        let mut name = self.category.clone();
        for sub in &self.subcategories {
            name.push('.');
            name.push_str(sub);
        }
        name
    }
}

/// A matched entry/exit pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInvocation {
    pub entry: ProfilingItem,
    pub exit: ProfilingItem,
    pub categorization: Option<Categorization>,
}

impl MethodInvocation {
    pub fn new(entry: ProfilingItem, exit: ProfilingItem) -> Self {
        Self {
            entry,
            exit,
            categorization: None,
        }
    }

    /// Timestamp of the exit header.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.exit.timestamp()
    }

    pub fn method(&self) -> &str {
        &self.entry.method
    }

    pub fn thread(&self) -> &str {
        self.entry.thread()
    }

    pub fn elapsed_us(&self) -> u64 {
        self.exit.elapsed_us.unwrap_or(0)
    }

    /// Serialised arguments from the entry's descriptive line, or "".
    pub fn arguments(&self) -> &str {
        detail_message(&self.entry, constants::ARGS_PREFIX)
    }

    /// Serialised return value from the exit's descriptive line, or "".
    pub fn return_value(&self) -> &str {
        detail_message(&self.exit, constants::RETVAL_PREFIX)
    }

    /// Dotted category name, or `None` when uncategorised.
    pub fn category_name(&self) -> Option<String> {
        self.categorization.as_ref().map(Categorization::full_name)
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.categorization.as_ref().map(|c| &c.parameters)
    }
}

fn detail_message<'a>(item: &'a ProfilingItem, prefix: &str) -> &'a str {
    match &item.detail {
        Some(detail) => detail
            .message
            .strip_prefix(prefix)
            .unwrap_or(&detail.message),
        None => "",
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Builders shared by the unit tests of several core modules.

    use super::*;
    use chrono::NaiveDate;

    pub fn ts(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 5, 27)
            .and_then(|d| d.and_hms_milli_opt(h, m, s, ms))
            .unwrap()
    }

    pub fn record(timestamp: NaiveDateTime, thread: &str, message: &str) -> LogRecord {
        LogRecord {
            timestamp,
            thread: thread.to_string(),
            level: "DEBUG".to_string(),
            logger: constants::PROFILING_LOGGER.to_string(),
            message: message.to_string(),
            first_line: message.to_string(),
            continuation: Vec::new(),
            position: LogFilePosition {
                file: Arc::from(Path::new("test.log")),
                line_number: 1,
            },
        }
    }

    pub fn item(kind: ItemKind, sequence: u64, method: &str, thread: &str) -> ProfilingItem {
        ProfilingItem {
            kind,
            sequence,
            method: method.to_string(),
            elapsed_us: match kind {
                ItemKind::Entry => None,
                ItemKind::Exit => Some(0),
            },
            record: record(ts(9, 0, 0, 0), thread, ""),
            detail: None,
            progress: 0,
            batch: 1,
            new_batch: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_thread_role_from_prefix() {
        assert_eq!(
            ThreadRole::from_thread_name("midPointScheduler_Worker-6"),
            ThreadRole::Coordinator
        );
        assert_eq!(
            ThreadRole::from_thread_name("pool-1-thread-1"),
            ThreadRole::Worker
        );
        assert_eq!(ThreadRole::from_thread_name("main"), ThreadRole::Other);
    }

    #[test]
    fn test_invocation_strips_detail_prefixes() {
        let mut entry = item(ItemKind::Entry, 1, "a->b", "t");
        entry.detail = Some(record(ts(9, 0, 0, 0), "t", "###### args: (UserType, x)"));
        let mut exit = item(ItemKind::Exit, 1, "a->b", "t");
        exit.elapsed_us = Some(1500);
        exit.detail = Some(record(ts(9, 0, 0, 1), "t", "###### retval: 42"));

        let invocation = MethodInvocation::new(entry, exit);
        assert_eq!(invocation.arguments(), "(UserType, x)");
        assert_eq!(invocation.return_value(), "42");
        assert_eq!(invocation.elapsed_us(), 1500);
        assert_eq!(invocation.category_name(), None);
    }

    #[test]
    fn test_invocation_without_details_yields_empty_strings() {
        let invocation = MethodInvocation::new(
            item(ItemKind::Entry, 1, "a->b", "t"),
            item(ItemKind::Exit, 1, "a->b", "t"),
        );
        assert_eq!(invocation.arguments(), "");
        assert_eq!(invocation.return_value(), "");
    }

    #[test]
    fn test_categorization_full_name_joins_subcategories() {
        let c = Categorization {
            category: "search-user".to_string(),
            subcategories: vec!["no-paging".to_string(), "x".to_string()],
            parameters: Parameters::new(),
        };
        assert_eq!(c.full_name(), "search-user.no-paging.x");
    }

    #[test]
    fn test_position_display() {
        let pos = LogFilePosition {
            file: Arc::from(Path::new("a.log")),
            line_number: 7,
        };
        assert_eq!(pos.to_string(), "[a.log:7]");
    }
}
