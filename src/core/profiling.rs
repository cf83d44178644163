// ProfLog - core/profiling.rs
//
// The profiling-item state machine.
//
// Turns the record stream into entry/exit items. Each profiling header
// opens an item for its thread; the next non-header profiling record of
// the same thread completes it. Idle gaps split the stream into batches,
// and every batch start discards whatever was still open.
//
// Progress markers are picked up from every record, profiling or not, and
// feed the per-minute throughput counter.

use crate::core::model::{ItemKind, LogRecord, ProfilingItem};
use crate::core::parser::{LineSource, LogEntryAssembler};
use crate::core::throughput::ThroughputCounter;
use crate::util::constants;
use crate::util::error::ParseError;
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

// =============================================================================
// Patterns
// =============================================================================

fn entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^#### Entry: (?P<seq>\d+)\s+\.\.\.(?P<method>\S+)$")
            .expect("entry regex is valid")
    })
}

fn exit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^##### Exit: (?P<seq>\d+)\s+\.\.\.(?P<method>\S+) etime: (?P<etime>\S+) ms$",
        )
        .expect("exit regex is valid")
    })
}

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.*\(total progress: (?P<total>\d+), wall clock avg: \d+ ms\)$")
            .expect("progress regex is valid")
    })
}

/// Classify a profiling message by marker substring. Entry wins when both
/// markers occur.
pub fn header_kind(message: &str) -> Option<ItemKind> {
    if message.contains(constants::ENTRY_MARKER) {
        Some(ItemKind::Entry)
    } else if message.contains(constants::EXIT_MARKER) {
        Some(ItemKind::Exit)
    } else {
        None
    }
}

/// Extract `N` from a trailing `(total progress: N, wall clock avg: M ms)`.
pub fn parse_progress(message: &str) -> Option<u64> {
    progress_regex()
        .captures(message)?
        .name("total")?
        .as_str()
        .parse()
        .ok()
}

/// Convert a decimal millisecond string to whole microseconds.
///
/// Works on the digits directly so no binary rounding creeps in: the value
/// is shifted three decimal places and anything below a microsecond is
/// truncated. `"7.708"` is 7708, `"2984"` is 2 984 000, `"0.0015"` is 1.
/// Returns `None` for anything that is not `digits[.digits]`.
pub fn parse_elapsed_us(raw: &str) -> Option<u64> {
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, f),
        None => (raw, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut micros: u64 = 0;
    for b in int_part.bytes() {
        micros = micros.checked_mul(10)?.checked_add(u64::from(b - b'0'))?;
    }
    let mut frac = frac_part.bytes();
    for _ in 0..3 {
        let digit = frac.next().map_or(0, |b| u64::from(b - b'0'));
        micros = micros.checked_mul(10)?.checked_add(digit)?;
    }
    Some(micros)
}

// =============================================================================
// Batch notification
// =============================================================================

/// Receives batch starts. Passed to each pull call rather than stored, so
/// the receiver can be any state the caller owns.
pub trait BatchListener {
    fn on_new_batch(&mut self, batch: u32, record: &LogRecord);
}

impl<F> BatchListener for F
where
    F: FnMut(u32, &LogRecord),
{
    fn on_new_batch(&mut self, batch: u32, record: &LogRecord) {
        self(batch, record)
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Outcome of consuming one record.
#[derive(Debug)]
pub enum Step {
    /// The record was absorbed without completing an item.
    Pending,
    /// An item is complete.
    Ready(ProfilingItem),
    /// The input is exhausted. Items still open are discarded.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ProfilingConfig {
    /// Gap between consecutive profiling headers that starts a new batch.
    pub idle_gap_ms: i64,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            idle_gap_ms: constants::DEFAULT_IDLE_GAP_MS,
        }
    }
}

pub struct ProfilingItemReader<S> {
    assembler: LogEntryAssembler<S>,
    config: ProfilingConfig,
    open: HashMap<String, ProfilingItem>,
    batch: u32,
    last_profiling: Option<NaiveDateTime>,
    first_timestamp: Option<NaiveDateTime>,
    progress: u64,
    throughput: ThroughputCounter,
    exhausted: bool,
}

impl<S: LineSource> ProfilingItemReader<S> {
    pub fn new(assembler: LogEntryAssembler<S>, config: ProfilingConfig) -> Self {
        Self {
            assembler,
            config,
            open: HashMap::new(),
            batch: 0,
            last_profiling: None,
            first_timestamp: None,
            progress: 0,
            throughput: ThroughputCounter::new(),
            exhausted: false,
        }
    }

    /// Pull records until an item completes or the input ends.
    pub fn read_item(
        &mut self,
        listener: &mut dyn BatchListener,
    ) -> Result<Option<ProfilingItem>, ParseError> {
        loop {
            match self.step(listener)? {
                Step::Pending => continue,
                Step::Ready(item) => return Ok(Some(item)),
                Step::Exhausted => return Ok(None),
            }
        }
    }

    /// Consume exactly one record.
    pub fn step(&mut self, listener: &mut dyn BatchListener) -> Result<Step, ParseError> {
        if self.exhausted {
            return Ok(Step::Exhausted);
        }
        let Some(record) = self.assembler.read_record()? else {
            self.exhausted = true;
            if !self.open.is_empty() {
                tracing::debug!(open = self.open.len(), "Input ended with open profiling items");
                self.open.clear();
            }
            return Ok(Step::Exhausted);
        };

        let first = *self.first_timestamp.get_or_insert(record.timestamp);
        if let Some(total) = parse_progress(&record.message) {
            self.progress = total;
            let since_start = (record.timestamp - first).num_milliseconds();
            self.throughput.register_progress(since_start);
        }

        if !record.is_profiling() {
            return Ok(Step::Pending);
        }

        match header_kind(&record.message) {
            Some(kind) => Ok(self.on_header(kind, record, listener)),
            None => Ok(self.on_detail(record)),
        }
    }

    fn on_header(
        &mut self,
        kind: ItemKind,
        record: LogRecord,
        listener: &mut dyn BatchListener,
    ) -> Step {
        let new_batch = match self.last_profiling {
            None => true,
            Some(last) => (record.timestamp - last).num_milliseconds() >= self.config.idle_gap_ms,
        };
        if new_batch {
            self.batch += 1;
            tracing::info!(
                batch = self.batch,
                at = %record.timestamp.format(constants::LOG_TIMESTAMP_FORMAT),
                "Starting batch"
            );
            if !self.open.is_empty() {
                tracing::warn!(
                    batch = self.batch,
                    dropped = self.open.len(),
                    "Discarding open profiling items at batch start"
                );
                self.open.clear();
            }
            listener.on_new_batch(self.batch, &record);
        }
        self.last_profiling = Some(record.timestamp);

        let Some(item) = self.build_item(kind, record, new_batch) else {
            return Step::Pending;
        };

        match self.open.insert(item.thread().to_string(), item) {
            Some(previous) => {
                tracing::info!(
                    thread = %previous.thread(),
                    item = %previous,
                    "Unexpected open item, completing it without a detail line"
                );
                Step::Ready(previous)
            }
            None => Step::Pending,
        }
    }

    fn build_item(&self, kind: ItemKind, record: LogRecord, new_batch: bool) -> Option<ProfilingItem> {
        let regex = match kind {
            ItemKind::Entry => entry_regex(),
            ItemKind::Exit => exit_regex(),
        };
        let parsed = regex.captures(&record.message).and_then(|caps| {
            let sequence: u64 = caps.name("seq")?.as_str().parse().ok()?;
            let method = caps.name("method")?.as_str().to_string();
            let elapsed_us = match kind {
                ItemKind::Entry => None,
                ItemKind::Exit => Some(parse_elapsed_us(caps.name("etime")?.as_str())?),
            };
            Some((sequence, method, elapsed_us))
        });

        let Some((sequence, method, elapsed_us)) = parsed else {
            tracing::warn!(
                kind = %kind,
                position = %record.position,
                message = %crate::util::logging::preview(&record.message, constants::DEBUG_MAX_LINE_PREVIEW),
                "Profiling header does not match its pattern, dropping"
            );
            return None;
        };

        Some(ProfilingItem {
            kind,
            sequence,
            method,
            elapsed_us,
            record,
            detail: None,
            progress: self.progress,
            batch: self.batch,
            new_batch,
        })
    }

    fn on_detail(&mut self, record: LogRecord) -> Step {
        match self.open.remove(&record.thread) {
            Some(mut item) => {
                item.detail = Some(record);
                Step::Ready(item)
            }
            None => {
                tracing::debug!(record = %record, "Profiling line with no open item, ignoring");
                Step::Pending
            }
        }
    }

    pub fn throughput(&self) -> &ThroughputCounter {
        &self.throughput
    }

    /// Current batch id; 0 before the first profiling header.
    pub fn batch(&self) -> u32 {
        self.batch
    }

    pub fn total_lines(&self) -> u64 {
        self.assembler.total_lines()
    }

    pub fn total_records(&self) -> u64 {
        self.assembler.total_records()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.assembler.first_timestamp()
    }
}

// =============================================================================
// Tests
// =============================================================================
