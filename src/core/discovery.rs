// ProfLog - core/discovery.rs
//
// Recursive directory traversal and log file discovery.
//
// Architecture note: this module uses `walkdir` for directory traversal as an
// OS abstraction (similar to using std::path::Path). It never reads file
// contents; the first-line timestamp scan that decides which files are
// kept, and in which order, is owned by the app layer (app::line_reader).
//
// Error policy:
//   - An invalid root is fatal.
//   - Per-entry I/O errors during the walk are non-fatal and collected as
//     warnings.
//   - Exclude patterns short-circuit directory descent via filter_entry so
//     excluded subtrees are never traversed at all.

use crate::util::error::DiscoveryError;
use std::path::{Path, PathBuf};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a discovery operation.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Glob patterns matched against filenames AND directory component names.
    /// Matching files are skipped; matching directories are not descended into.
    /// An empty list means every file under the root is considered.
    pub exclude_patterns: Vec<String>,
}

/// Result of a discovery walk.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Candidate files in walk order (directory entries sorted by name).
    pub files: Vec<PathBuf>,
    /// Human-readable descriptions of entries that could not be visited.
    pub warnings: Vec<String>,
}

// =============================================================================
// Discovery
// =============================================================================

/// Discover candidate log files under `root`.
///
/// Entries are visited in file-name order within each directory so the
/// returned list, and therefore the tie-break between files sharing a start
/// timestamp, is deterministic across platforms.
///
/// # Fatal errors
/// Returns `Err` if the root path is invalid (`RootNotFound`,
/// `NotADirectory`, `PermissionDenied`) or an exclude pattern does not
/// compile (`InvalidPattern`).
pub fn discover_files(root: &Path, config: &DiscoveryConfig) -> Result<Discovered, DiscoveryError> {
    // `fs::metadata()` rather than `Path::is_dir()` so that access-denied is
    // distinguishable from not-found.
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(DiscoveryError::NotADirectory {
                path: root.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DiscoveryError::PermissionDenied {
                path: root.to_path_buf(),
                source: e,
            })
        }
        Err(_) => {
            return Err(DiscoveryError::RootNotFound {
                path: root.to_path_buf(),
            })
        }
    }

    tracing::debug!(
        root = %root.display(),
        exclude = ?config.exclude_patterns,
        "Discovery starting"
    );

    let exclude_pats = compile_patterns(&config.exclude_patterns)?;
    let mut result = Discovered::default();

    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.file_type().is_dir() && e.depth() > 0 {
                let name = e.file_name().to_str().unwrap_or("");
                return !is_excluded_component(name, &exclude_pats);
            }
            true
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                let path_str = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                let msg = format!("Cannot access '{path_str}': {e}");
                tracing::warn!(warning = %msg, "Discovery warning");
                result.warnings.push(msg);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            if is_excluded_filename(file_name, &exclude_pats) {
                tracing::trace!(file = file_name, "Excluded by pattern");
                continue;
            }
        }

        result.files.push(path.to_path_buf());
    }

    tracing::debug!(
        files = result.files.len(),
        warnings = result.warnings.len(),
        "Discovery complete"
    );

    Ok(result)
}

// =============================================================================
// Glob helpers
// =============================================================================

/// Compile exclude pattern strings into `glob::Pattern` objects.
fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, DiscoveryError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|source| DiscoveryError::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Returns true if `dir_name` matches any exclude pattern that contains no
/// wildcard characters. These are treated as directory component exclusions
/// (e.g. "archive", ".git") rather than filename glob patterns.
fn is_excluded_component(dir_name: &str, exclude_pats: &[glob::Pattern]) -> bool {
    exclude_pats.iter().any(|p| {
        let s = p.as_str();
        !s.contains('*') && !s.contains('?') && !s.contains('[') && p.matches(dir_name)
    })
}

/// Returns true if `file_name` matches any exclude pattern (wildcard or literal).
fn is_excluded_filename(file_name: &str, exclude_pats: &[glob::Pattern]) -> bool {
    exclude_pats.iter().any(|p| p.matches(file_name))
}

// =============================================================================
// Tests
// =============================================================================
