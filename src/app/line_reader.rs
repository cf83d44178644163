// ProfLog - app/line_reader.rs
//
// Multi-file line source. Discovers the log files under a directory, dates
// each one by the timestamp on its first line, and yields the lines of all
// files as one stream: files in start-time order, lines in file order.
//
// Files are opened lazily, one at a time. A file whose first line carries
// no usable timestamp is skipped with a warning; an I/O failure on an
// accepted file aborts the run.

use crate::core::discovery::{self, DiscoveryConfig};
use crate::core::model::{LogFile, LogFilePosition};
use crate::core::parser::{self, LineSource, RawLine};
use crate::platform::fs::{self, LineFile};
use crate::util::error::{AnalyzerError, ParseError};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Discover and date the log files under `root`, oldest first.
///
/// Files with equal start times keep discovery (file name) order. A file
/// whose first line has no timestamp (or that is empty) is skipped; a file
/// that cannot be read aborts the scan.
pub fn scan_log_files(root: &Path, config: &DiscoveryConfig) -> Result<Vec<LogFile>, AnalyzerError> {
    let discovered = discovery::discover_files(root, config)?;
    let walk_warnings = discovered.warnings.len();

    let mut files = Vec::with_capacity(discovered.files.len());
    for path in discovered.files {
        match date_file(&path) {
            Ok(start) => files.push(LogFile { path, start }),
            Err(e @ ParseError::InvalidTimestamp { .. }) => {
                tracing::warn!(file = %path.display(), error = %e, "Skipping file")
            }
            Err(e) => return Err(e.into()),
        }
    }
    files.sort_by_key(|f| f.start);

    tracing::info!(
        root = %root.display(),
        files = files.len(),
        walk_warnings,
        "Log files scanned"
    );
    for file in &files {
        tracing::debug!(file = %file.path.display(), start = %file.start, "Log file");
    }
    Ok(files)
}

fn date_file(path: &Path) -> Result<chrono::NaiveDateTime, ParseError> {
    let first = fs::read_first_line(path).map_err(|e| ParseError::Io {
        file: path.to_path_buf(),
        source: e,
    })?;
    parser::parse_file_start(first.as_deref().unwrap_or_default())
}

/// Current file being read.
struct OpenFile {
    path: Arc<Path>,
    lines: LineFile,
    line_number: u64,
}

/// Line source over an ordered list of files.
pub struct MultiFileLineReader {
    pending: VecDeque<PathBuf>,
    current: Option<OpenFile>,
}

impl MultiFileLineReader {
    pub fn new(files: Vec<LogFile>) -> Self {
        Self {
            pending: files.into_iter().map(|f| f.path).collect(),
            current: None,
        }
    }

    /// Discover, date and order the files under `root`.
    pub fn open_dir(root: &Path, config: &DiscoveryConfig) -> Result<Self, AnalyzerError> {
        Ok(Self::new(scan_log_files(root, config)?))
    }

    /// Files not yet opened.
    pub fn remaining_files(&self) -> usize {
        self.pending.len()
    }

    fn open_next(&mut self) -> Result<bool, ParseError> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(false);
        };
        tracing::info!(file = %path.display(), "Opening log file");
        let lines = LineFile::open(&path).map_err(|e| ParseError::Io {
            file: path.clone(),
            source: e,
        })?;
        self.current = Some(OpenFile {
            path: Arc::from(path.as_path()),
            lines,
            line_number: 0,
        });
        Ok(true)
    }
}

impl LineSource for MultiFileLineReader {
    fn next_line(&mut self) -> Result<Option<RawLine>, ParseError> {
        loop {
            if let Some(open) = self.current.as_mut() {
                let read = open.lines.read_line().map_err(|e| ParseError::Io {
                    file: open.path.to_path_buf(),
                    source: e,
                })?;
                if let Some(text) = read {
                    open.line_number += 1;
                    return Ok(Some(RawLine {
                        text,
                        position: LogFilePosition {
                            file: Arc::clone(&open.path),
                            line_number: open.line_number,
                        },
                    }));
                }
                tracing::debug!(file = %open.path.display(), lines = open.line_number, "Finished log file");
                self.current = None;
            }
            if !self.open_next()? {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;

    fn collect(reader: &mut MultiFileLineReader) -> Vec<(String, u64, String)> {
        let mut out = Vec::new();
        while let Some(line) = reader.next_line().unwrap() {
            let name = line
                .position
                .file
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned();
            out.push((name, line.position.line_number, line.text));
        }
        out
    }

    #[test]
    fn test_files_are_read_in_start_order() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(
            dir.path().join("a.log"),
            "2019-05-27 10:00:00,000 [t] INFO: a1\na2\n",
        )
        .unwrap();
        stdfs::write(
            dir.path().join("b.log"),
            "2019-05-27 09:00:00,000 [t] INFO: b1\n",
        )
        .unwrap();

        let mut reader = MultiFileLineReader::open_dir(dir.path(), &DiscoveryConfig::default()).unwrap();
        let lines = collect(&mut reader);
        assert_eq!(
            lines,
            vec![
                ("b.log".to_string(), 1, "2019-05-27 09:00:00,000 [t] INFO: b1".to_string()),
                ("a.log".to_string(), 1, "2019-05-27 10:00:00,000 [t] INFO: a1".to_string()),
                ("a.log".to_string(), 2, "a2".to_string()),
            ]
        );
        // Exhausted sources stay exhausted.
        assert!(reader.next_line().unwrap().is_none());
    }

    #[test]
    fn test_undated_and_empty_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("ok.log"), "2019-05-27 10:00:00,000 [t] INFO: x\n").unwrap();
        stdfs::write(dir.path().join("junk.txt"), "not a log line\n").unwrap();
        stdfs::write(dir.path().join("empty.log"), "").unwrap();

        let files = scan_log_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("ok.log"));
    }

    #[test]
    fn test_overlapping_files_are_not_interleaved() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(
            dir.path().join("a.log"),
            "2019-05-27 09:30:00,000 [t] INFO: a1\n2019-05-27 09:00:05,000 [t] INFO: a2\n",
        )
        .unwrap();
        stdfs::write(
            dir.path().join("b.log"),
            "2019-05-27 09:00:00,000 [t] INFO: b1\n2019-05-27 10:00:00,000 [t] INFO: b2\n",
        )
        .unwrap();

        let mut reader = MultiFileLineReader::open_dir(dir.path(), &DiscoveryConfig::default()).unwrap();
        let order: Vec<String> = collect(&mut reader)
            .into_iter()
            .map(|(_, _, text)| text.rsplit(' ').next().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["b1", "b2", "a1", "a2"], "each file is read whole, in start order");
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("ok.log"), "2019-05-27 10:00:00,000 [t] INFO: x\n").unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing-target"), dir.path().join("dangling.log"))
            .unwrap();

        let result = scan_log_files(dir.path(), &DiscoveryConfig::default());
        assert!(
            matches!(result, Err(AnalyzerError::Parse(ParseError::Io { .. }))),
            "an unreadable log file must abort the scan"
        );
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = scan_log_files(&dir.path().join("nope"), &DiscoveryConfig::default());
        assert!(matches!(result, Err(AnalyzerError::Discovery(_))));
    }

    #[test]
    fn test_empty_file_list() {
        let mut reader = MultiFileLineReader::new(Vec::new());
        assert_eq!(reader.remaining_files(), 0);
        assert!(reader.next_line().unwrap().is_none());
    }
}
