// ProfLog - core/parser.rs
//
// Structured log line parsing and multi-line record assembly.
// Core layer: pulls lines from a `LineSource`, never touches the filesystem
// directly. The production source is `app::line_reader::MultiFileLineReader`.

use crate::core::model::{LogFilePosition, LogRecord};
use crate::util::constants;
use crate::util::error::ParseError;
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

// =============================================================================
// Line sources
// =============================================================================

/// One raw line together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub text: String,
    pub position: LogFilePosition,
}

/// A pull-based sequence of raw lines.
///
/// `Ok(None)` means the source is exhausted; it stays exhausted on further
/// calls.
pub trait LineSource {
    fn next_line(&mut self) -> Result<Option<RawLine>, ParseError>;
}

// =============================================================================
// Line parsing
// =============================================================================

/// The fields of a line that matched the structured pattern, borrowed from
/// the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredLine<'a> {
    pub timestamp: &'a str,
    pub thread: &'a str,
    pub level: &'a str,
    pub logger: Option<&'a str>,
    pub message: &'a str,
}

fn structured_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"^(?P<timestamp>{}) \[(?P<thread>\S+)\] (?P<level>\S+)(?:\s+\((?P<logger>\S+)\))?: (?P<message>.*)$",
            constants::LOG_TIMESTAMP_REGEX
        );
        Regex::new(&pattern).expect("structured line regex is valid")
    })
}

/// Split a line into its structured fields, or `None` when it is a
/// continuation line.
pub fn parse_structured_line(line: &str) -> Option<StructuredLine<'_>> {
    let caps = structured_line_regex().captures(line)?;
    Some(StructuredLine {
        timestamp: caps.name("timestamp")?.as_str(),
        thread: caps.name("thread")?.as_str(),
        level: caps.name("level")?.as_str(),
        logger: caps.name("logger").map(|m| m.as_str()),
        message: caps.name("message")?.as_str(),
    })
}

/// Parse a `yyyy-MM-dd HH:mm:ss,SSS` timestamp.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ParseError> {
    NaiveDateTime::parse_from_str(raw, constants::LOG_TIMESTAMP_FORMAT).map_err(|_| {
        ParseError::InvalidTimestamp {
            raw: raw.to_string(),
            format: constants::LOG_TIMESTAMP_FORMAT,
        }
    })
}

/// Parse the start timestamp of a log file from its first line: exactly
/// the leading 23 characters, whatever follows them.
pub fn parse_file_start(first_line: &str) -> Result<NaiveDateTime, ParseError> {
    match first_line.get(..constants::LOG_TIMESTAMP_LEN) {
        Some(prefix) => parse_timestamp(prefix),
        None => Err(ParseError::InvalidTimestamp {
            raw: first_line.to_string(),
            format: constants::LOG_TIMESTAMP_FORMAT,
        }),
    }
}

// =============================================================================
// Record assembly
// =============================================================================

/// Groups raw lines into `LogRecord`s.
///
/// A record is only complete once the next structured line (or the end of
/// input) has been seen, so the assembler holds exactly one record of
/// look-ahead.
pub struct LogEntryAssembler<S> {
    source: S,
    pending: Option<LogRecord>,
    total_lines: u64,
    total_records: u64,
    first_timestamp: Option<NaiveDateTime>,
}

impl<S: LineSource> LogEntryAssembler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pending: None,
            total_lines: 0,
            total_records: 0,
            first_timestamp: None,
        }
    }

    /// Return the next complete record, or `None` once the input is
    /// exhausted and the last pending record has been handed out.
    pub fn read_record(&mut self) -> Result<Option<LogRecord>, ParseError> {
        loop {
            let Some(line) = self.source.next_line()? else {
                return Ok(self.pending.take());
            };

            self.total_lines += 1;
            if self.total_lines % constants::PROGRESS_MARK_LINES == 0 {
                tracing::info!(
                    lines = self.total_lines,
                    records = self.total_records,
                    "Lines processed"
                );
            }

            let Some(fields) = parse_structured_line(&line.text) else {
                match self.pending.as_mut() {
                    Some(open) => open.continuation.push(line.text),
                    None => tracing::warn!(
                        position = %line.position,
                        line = %crate::util::logging::preview(&line.text, constants::DEBUG_MAX_LINE_PREVIEW),
                        "Dropping continuation line with no open record"
                    ),
                }
                continue;
            };

            let timestamp = match parse_timestamp(fields.timestamp) {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::warn!(position = %line.position, error = %e, "Skipping line");
                    continue;
                }
            };

            let record = LogRecord {
                timestamp,
                thread: fields.thread.to_string(),
                level: fields.level.to_string(),
                logger: fields
                    .logger
                    .unwrap_or(constants::PROFILING_LOGGER)
                    .to_string(),
                message: fields.message.to_string(),
                first_line: line.text.clone(),
                continuation: Vec::new(),
                position: line.position,
            };

            self.total_records += 1;
            self.first_timestamp.get_or_insert(timestamp);

            if let Some(complete) = self.pending.replace(record) {
                return Ok(Some(complete));
            }
        }
    }

    /// Raw lines pulled from the source so far.
    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    /// Structured records recognised so far, including the pending one.
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Timestamp of the first structured record, once one has been seen.
    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.first_timestamp
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Arc;

    /// An in-memory line source over string literals.
    pub struct VecSource {
        lines: VecDeque<RawLine>,
    }

    impl VecSource {
        pub fn new(lines: &[&str]) -> Self {
            let file: Arc<Path> = Arc::from(Path::new("memory.log"));
            Self {
                lines: lines
                    .iter()
                    .enumerate()
                    .map(|(i, l)| RawLine {
                        text: (*l).to_string(),
                        position: LogFilePosition {
                            file: Arc::clone(&file),
                            line_number: i as u64 + 1,
                        },
                    })
                    .collect(),
            }
        }
    }

    impl LineSource for VecSource {
        fn next_line(&mut self) -> Result<Option<RawLine>, ParseError> {
            Ok(self.lines.pop_front())
        }
    }
}
