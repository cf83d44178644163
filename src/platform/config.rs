// ProfLog - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.
//
// This module owns reading the file and the sections that concern the
// process itself (`[discovery]`, `[logging]`). The analysis sections of the
// same document are compiled by `core::profile`.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for ProfLog configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/proflog/ or %APPDATA%\ProfLog\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be
    /// determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    /// Location of the per-user config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml sections owned by the platform layer
// =============================================================================

/// Raw deserialisable shape of the process-level sections of config.toml.
///
/// Unknown keys (including the analysis sections) are silently ignored.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[discovery]` section.
    pub discovery: DiscoverySection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[discovery]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Exclude glob patterns (file names and directory names).
    pub exclude_patterns: Option<Vec<String>>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Given on the command line.
    Explicit(PathBuf),
    /// Found in the platform config directory.
    Platform(PathBuf),
    /// No file; built-in defaults only.
    BuiltIn,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Platform(p) => Some(p),
            Self::BuiltIn => None,
        }
    }
}

/// A config document read from disk, with its process-level sections
/// validated.
#[derive(Debug)]
pub struct LoadedConfig {
    pub source: ConfigSource,
    /// File content, for the analysis sections. `None` for built-in.
    pub content: Option<String>,
    pub exclude_patterns: Vec<String>,
    pub log_level: Option<String>,
    /// Non-fatal validation findings.
    pub warnings: Vec<String>,
}

/// Locate and read the configuration.
///
/// `explicit` (from `--config`) must exist and parse; any failure is fatal.
/// Otherwise the platform config.toml is used if present. With neither,
/// the built-in defaults apply.
pub fn load_config(
    explicit: Option<&Path>,
    paths: &PlatformPaths,
) -> Result<LoadedConfig, ConfigError> {
    let source = match explicit {
        Some(path) => ConfigSource::Explicit(path.to_path_buf()),
        None => {
            let candidate = paths.config_file();
            if candidate.is_file() {
                ConfigSource::Platform(candidate)
            } else {
                tracing::debug!(path = %candidate.display(), "No config.toml found; using defaults");
                ConfigSource::BuiltIn
            }
        }
    };

    let Some(path) = source.path() else {
        return Ok(LoadedConfig {
            source,
            content: None,
            exclude_patterns: Vec::new(),
            log_level: None,
            warnings: Vec::new(),
        });
    };

    let content = read_config_file(path)?;
    let raw: RawConfig = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "Loaded config.toml");

    let (log_level, warnings) = validate_logging(&raw.logging);
    Ok(LoadedConfig {
        exclude_patterns: raw.discovery.exclude_patterns.unwrap_or_default(),
        log_level,
        warnings,
        content: Some(content),
        source,
    })
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > constants::MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            max_size: constants::MAX_CONFIG_FILE_SIZE,
        });
    }
    std::fs::read_to_string(path).map_err(io_err)
}

fn validate_logging(section: &LoggingSection) -> (Option<String>, Vec<String>) {
    let mut warnings = Vec::new();
    let level = section.level.as_ref().and_then(|level| {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            Some(level.to_lowercase())
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default ({}).",
                constants::DEFAULT_LOG_LEVEL
            ));
            None
        }
    });
    (level, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn paths_in(dir: &Path) -> PlatformPaths {
        PlatformPaths {
            config_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_no_file_means_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(None, &paths_in(dir.path())).unwrap();
        assert_eq!(loaded.source, ConfigSource::BuiltIn);
        assert!(loaded.content.is_none());
        assert!(loaded.exclude_patterns.is_empty());
    }

    #[test]
    fn test_platform_file_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "[discovery]\nexclude_patterns = [\"*.gz\"]\n[logging]\nlevel = \"DEBUG\"\n",
        )
        .unwrap();
        let loaded = load_config(None, &paths_in(dir.path())).unwrap();
        assert!(matches!(loaded.source, ConfigSource::Platform(_)));
        assert_eq!(loaded.exclude_patterns, vec!["*.gz"]);
        assert_eq!(loaded.log_level.as_deref(), Some("debug"));
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_explicit_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let result = load_config(Some(&missing), &paths_in(dir.path()));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_unparseable_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[discovery\n").unwrap();
        let result = load_config(Some(&path), &paths_in(dir.path()));
        assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
    }

    #[test]
    fn test_unknown_level_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        fs::write(&path, "[logging]\nlevel = \"loud\"\n[histogram]\nper_batch = true\n").unwrap();
        let loaded = load_config(Some(&path), &paths_in(dir.path())).unwrap();
        assert_eq!(loaded.log_level, None);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.content.unwrap().contains("per_batch"));
    }
}
