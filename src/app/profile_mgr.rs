// ProfLog - app/profile_mgr.rs
//
// Turns a loaded config document into the settings of one run: discovery
// excludes from the platform sections, and the analysis profile compiled
// from the built-in defaults with the user document overlaid on top.

use crate::core::discovery::DiscoveryConfig;
use crate::core::profile::{self, AnalysisProfile};
use crate::platform::config::{ConfigSource, LoadedConfig};
use crate::util::error::ConfigError;

/// Validated settings for an analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub source: ConfigSource,
    pub discovery: DiscoveryConfig,
    pub log_level: Option<String>,
    pub profile: AnalysisProfile,
    /// Non-fatal findings from every validation step.
    pub warnings: Vec<String>,
}

impl AnalyzerConfig {
    /// Settings from the built-in defaults alone.
    pub fn builtin() -> Result<Self, ConfigError> {
        let (profile, warnings) = profile::load_profile(None)?;
        Ok(Self {
            source: ConfigSource::BuiltIn,
            discovery: DiscoveryConfig::default(),
            log_level: None,
            profile,
            warnings,
        })
    }
}

/// Compile `loaded` into run settings.
///
/// Any fatal problem in the analysis sections (invalid regex, malformed
/// template, unnamed definition) aborts; everything else is collected into
/// `warnings`.
pub fn build_config(loaded: LoadedConfig) -> Result<AnalyzerConfig, ConfigError> {
    let user = match (&loaded.content, loaded.source.path()) {
        (Some(content), Some(path)) => Some((content.as_str(), path)),
        _ => None,
    };
    let (profile, profile_warnings) = profile::load_profile(user)?;

    let mut warnings = loaded.warnings;
    warnings.extend(profile_warnings);

    tracing::info!(
        source = ?loaded.source,
        categories = profile.rules.categories.len(),
        root_methods = profile.tracker.root_methods.len(),
        selected_methods = profile.selected_methods.len(),
        "Configuration ready"
    );

    Ok(AnalyzerConfig {
        source: loaded.source,
        discovery: DiscoveryConfig {
            exclude_patterns: loaded.exclude_patterns,
        },
        log_level: loaded.log_level,
        profile,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn loaded(content: &str) -> LoadedConfig {
        LoadedConfig {
            source: ConfigSource::Explicit(PathBuf::from("user.toml")),
            content: Some(content.to_string()),
            exclude_patterns: vec!["*.gz".to_string()],
            log_level: Some("debug".to_string()),
            warnings: vec!["from platform".to_string()],
        }
    }

    #[test]
    fn test_builtin_config() {
        let config = AnalyzerConfig::builtin().unwrap();
        assert_eq!(config.source, ConfigSource::BuiltIn);
        assert!(config.discovery.exclude_patterns.is_empty());
        assert_eq!(config.profile.rules.categories.len(), 9);
    }

    #[test]
    fn test_user_document_is_overlaid() {
        let config = build_config(loaded(
            "[discovery]\nexclude_patterns = [\"*.gz\"]\n[profiling]\nidle_gap_ms = 0\n",
        ))
        .unwrap();
        assert_eq!(config.discovery.exclude_patterns, vec!["*.gz"]);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        // Platform warnings come first, then the analysis ones.
        assert_eq!(config.warnings.len(), 2);
        assert_eq!(config.warnings[0], "from platform");
        assert!(config.warnings[1].contains("idle_gap_ms"));
    }

    #[test]
    fn test_fatal_analysis_error_propagates() {
        let result = build_config(loaded("[histogram]\nexclude = ['[']\n"));
        assert!(matches!(result, Err(ConfigError::InvalidRegex { .. })));
    }
}
