// ProfLog - core/tracker.rs
//
// Pairs profiling items into invocations and aggregates their timings.
//
// Per thread, nothing is recorded until an entry of a root method arrives.
// From then on every exit on that thread feeds the histogram and the
// thread's open summary, until the exit carrying the root entry's sequence
// number closes the enclosing invocation and flushes the summary.

use crate::core::filter::{LongInvocationFilter, MethodPatterns};
use crate::core::histogram::Histogram;
use crate::core::model::{ItemKind, LogRecord, MethodInvocation, ProfilingItem, ThreadRole};
use crate::core::profiling::BatchListener;
use crate::core::summary::{Collector, EventsSummary};
use crate::util::constants;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};

// =============================================================================
// Configuration
// =============================================================================

/// Which extra histogram variables each exit is recorded under, besides
/// the plain method name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramKeying {
    pub per_batch: bool,
    pub per_thread_role: bool,
}

impl HistogramKeying {
    /// Suffix of the histogram report file name.
    pub fn file_suffix(&self) -> String {
        format!(
            "{}{}",
            if self.per_batch { "-batch" } else { "" },
            if self.per_thread_role { "-thread" } else { "" }
        )
    }

    /// Variable names an exit of `method` is recorded under.
    pub fn variables(&self, method: &str, batch: u32, role: ThreadRole) -> Vec<String> {
        let mut names = Vec::with_capacity(3);
        if self.per_batch {
            if self.per_thread_role {
                names.push(format!("{method}:{batch:03}:{role}"));
            }
            names.push(format!("{method}:{batch:03}"));
        } else if self.per_thread_role {
            names.push(format!("{method}:{role}"));
        }
        names.push(method.to_string());
        names
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Methods whose entry starts an enclosing invocation.
    pub root_methods: HashSet<String>,
    pub histogram_bucket_us: u64,
    pub histogram_upper_us: u64,
    pub histogram_keying: HistogramKeying,
    /// Methods never recorded in the histogram.
    pub histogram_exclude: MethodPatterns,
    pub long_invocations: LongInvocationFilter,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            root_methods: HashSet::new(),
            histogram_bucket_us: constants::DEFAULT_HISTOGRAM_BUCKET_US,
            histogram_upper_us: constants::DEFAULT_HISTOGRAM_UPPER_US,
            histogram_keying: HistogramKeying::default(),
            histogram_exclude: MethodPatterns::default(),
            long_invocations: LongInvocationFilter {
                threshold_us: constants::DEFAULT_LONG_THRESHOLD_US,
                ..Default::default()
            },
        }
    }
}

// =============================================================================
// Closed invocations
// =============================================================================

/// The result of closing an enclosing invocation.
#[derive(Debug, Clone)]
pub struct ClosedInvocation {
    /// Sequence number of the root entry.
    pub sequence: u64,
    pub thread: String,
    /// Timestamp of the closing exit.
    pub timestamp: NaiveDateTime,
    pub progress: u64,
    pub summary: EventsSummary,
}

impl ClosedInvocation {
    /// Longest single call of `method` within this invocation, 0 if absent.
    pub fn max_elapsed_us(&self, method: &str) -> u64 {
        self.summary
            .get(method)
            .and_then(|t| t.max)
            .unwrap_or(0)
    }
}

// =============================================================================
// Tracker
// =============================================================================

pub struct InvocationTracker {
    config: TrackerConfig,
    /// Thread -> sequence number of its enclosing root entry.
    enclosing: HashMap<String, u64>,
    /// Sequence number -> entry still waiting for its exit.
    pending: HashMap<u64, ProfilingItem>,
    collector: Collector,
    histogram: Histogram,
    long_invocations: Vec<MethodInvocation>,
    orphan_exits: u64,
    closed: u64,
}

impl InvocationTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let histogram = Histogram::new(config.histogram_bucket_us, config.histogram_upper_us);
        Self {
            config,
            enclosing: HashMap::new(),
            pending: HashMap::new(),
            collector: Collector::new(),
            histogram,
            long_invocations: Vec::new(),
            orphan_exits: 0,
            closed: 0,
        }
    }

    /// Feed one item. Returns the flushed summary when the item closes its
    /// thread's enclosing invocation.
    pub fn process(&mut self, item: ProfilingItem) -> Option<ClosedInvocation> {
        let enclosing_seq = match self.enclosing.get(item.thread()).copied() {
            Some(seq) => seq,
            None if item.kind == ItemKind::Entry
                && self.config.root_methods.contains(&item.method) =>
            {
                tracing::debug!(
                    thread = %item.thread(),
                    sequence = item.sequence,
                    method = %item.method,
                    "Enclosing invocation started"
                );
                self.enclosing.insert(item.thread().to_string(), item.sequence);
                item.sequence
            }
            None => return None,
        };

        match item.kind {
            ItemKind::Entry => {
                self.pending.insert(item.sequence, item);
                None
            }
            ItemKind::Exit => self.on_exit(item, enclosing_seq),
        }
    }

    fn on_exit(&mut self, exit: ProfilingItem, enclosing_seq: u64) -> Option<ClosedInvocation> {
        let elapsed = exit.elapsed_us.unwrap_or(0);

        if !self.config.histogram_exclude.matches(&exit.method) {
            let role = ThreadRole::from_thread_name(exit.thread());
            for variable in self.config.histogram_keying.variables(&exit.method, exit.batch, role) {
                self.histogram.add(&variable, elapsed);
            }
        }
        self.collector.register(exit.thread(), &exit.method, elapsed);

        let closes = exit.sequence == enclosing_seq;
        let thread = exit.thread().to_string();
        let timestamp = exit.timestamp();
        let progress = exit.progress;
        let sequence = exit.sequence;

        match self.pending.remove(&exit.sequence) {
            Some(entry) => {
                if self.config.long_invocations.accepts(&exit.method, elapsed) {
                    self.long_invocations.push(MethodInvocation::new(entry, exit));
                }
            }
            None => {
                self.orphan_exits += 1;
                tracing::warn!(item = %exit, "Method exit without entry");
            }
        }

        if !closes {
            return None;
        }
        self.enclosing.remove(&thread);
        self.closed += 1;
        let summary = self.collector.close_tag(&thread).unwrap_or_default();
        Some(ClosedInvocation {
            sequence,
            thread,
            timestamp,
            progress,
            summary,
        })
    }

    /// Forget all in-flight state: enclosing invocations, pending entries
    /// and open summaries. Histogram and long invocations are kept.
    pub fn reset(&mut self) {
        if !self.pending.is_empty() || !self.enclosing.is_empty() {
            tracing::debug!(
                pending = self.pending.len(),
                enclosing = self.enclosing.len(),
                "Tracker reset"
            );
        }
        self.enclosing.clear();
        self.pending.clear();
        self.collector.reset();
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn histogram_keying(&self) -> HistogramKeying {
        self.config.histogram_keying
    }

    pub fn long_filter(&self) -> &LongInvocationFilter {
        &self.config.long_invocations
    }

    pub fn orphan_exits(&self) -> u64 {
        self.orphan_exits
    }

    pub fn closed_invocations(&self) -> u64 {
        self.closed
    }

    /// Long invocations, longest first. Equal times keep arrival order.
    pub fn take_long_invocations(&mut self) -> Vec<MethodInvocation> {
        let mut long = std::mem::take(&mut self.long_invocations);
        long.sort_by(|a, b| b.elapsed_us().cmp(&a.elapsed_us()));
        long
    }
}

impl BatchListener for InvocationTracker {
    fn on_new_batch(&mut self, _batch: u32, _record: &LogRecord) {
        self.reset();
    }
}
