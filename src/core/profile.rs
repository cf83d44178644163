// ProfLog - core/profile.rs
//
// Analysis profile loading, validation, and compilation.
// Core layer: accepts TOML strings, never touches the filesystem.
// I/O is handled by app::profile_mgr which feeds content here.
//
// A profile is the analysis half of config.toml: batching, histogram,
// tracking, long-invocation and categorisation settings. The built-in
// profile is embedded at compile time; a user document is overlaid on it
// key by key before compilation.

use crate::core::categorize::{CategoryDefinition, CategoryRules, SubcategoryDefinition};
use crate::core::filter::{LongInvocationFilter, MethodPatterns};
use crate::core::profiling::ProfilingConfig;
use crate::core::template::Template;
use crate::core::tracker::{HistogramKeying, TrackerConfig};
use crate::util::constants;
use crate::util::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// Raw analysis definition as deserialized from TOML.
///
/// Every field is optional so that a user document can override single
/// keys of the built-in one. Sections that do not belong to the analysis
/// (`[discovery]`, `[logging]`) are ignored here.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisDefinition {
    pub profiling: ProfilingDef,
    pub histogram: HistogramDef,
    pub tracking: TrackingDef,
    pub long_invocations: LongInvocationsDef,
    pub categories: Option<Vec<CategoryDef>>,
    pub subcategories: Option<Vec<SubcategoryDef>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ProfilingDef {
    pub idle_gap_ms: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct HistogramDef {
    pub bucket_size_us: Option<i64>,
    pub upper_boundary_us: Option<i64>,
    pub per_batch: Option<bool>,
    pub per_thread_role: Option<bool>,
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingDef {
    pub root_methods: Option<Vec<String>>,
    pub selected_methods: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LongInvocationsDef {
    pub threshold_us: Option<i64>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CategoryDef {
    pub name: Option<String>,
    pub method: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SubcategoryDef {
    pub name: Option<String>,
    pub parameter: Option<String>,
    pub value: Option<String>,
}

// =============================================================================
// Compiled runtime profile
// =============================================================================

/// Everything a run needs from the configuration, validated and compiled.
#[derive(Debug, Clone)]
pub struct AnalysisProfile {
    pub profiling: ProfilingConfig,
    pub tracker: TrackerConfig,
    /// Methods whose per-invocation maximum goes into the selected report.
    pub selected_methods: Vec<String>,
    pub rules: CategoryRules,
}

/// Parse a TOML string into an `AnalysisDefinition`.
///
/// `source_path` is used for error messages only (not for I/O).
pub fn parse_definition(
    toml_content: &str,
    source_path: &Path,
) -> Result<AnalysisDefinition, ConfigError> {
    toml::from_str(toml_content).map_err(|e| ConfigError::TomlParse {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Overlay `user` on `base`: every key the user sets wins, lists included
/// (a user list replaces the base list, it is not appended to it).
pub fn overlay(base: AnalysisDefinition, user: AnalysisDefinition) -> AnalysisDefinition {
    AnalysisDefinition {
        profiling: ProfilingDef {
            idle_gap_ms: user.profiling.idle_gap_ms.or(base.profiling.idle_gap_ms),
        },
        histogram: HistogramDef {
            bucket_size_us: user.histogram.bucket_size_us.or(base.histogram.bucket_size_us),
            upper_boundary_us: user
                .histogram
                .upper_boundary_us
                .or(base.histogram.upper_boundary_us),
            per_batch: user.histogram.per_batch.or(base.histogram.per_batch),
            per_thread_role: user
                .histogram
                .per_thread_role
                .or(base.histogram.per_thread_role),
            exclude: user.histogram.exclude.or(base.histogram.exclude),
        },
        tracking: TrackingDef {
            root_methods: user.tracking.root_methods.or(base.tracking.root_methods),
            selected_methods: user
                .tracking
                .selected_methods
                .or(base.tracking.selected_methods),
        },
        long_invocations: LongInvocationsDef {
            threshold_us: user
                .long_invocations
                .threshold_us
                .or(base.long_invocations.threshold_us),
            include: user.long_invocations.include.or(base.long_invocations.include),
            exclude: user.long_invocations.exclude.or(base.long_invocations.exclude),
        },
        categories: user.categories.or(base.categories),
        subcategories: user.subcategories.or(base.subcategories),
    }
}

/// Validate an `AnalysisDefinition` and compile it into an `AnalysisProfile`.
///
/// Out-of-range numbers produce a warning (returned alongside the profile)
/// and fall back to their defaults. Invalid regexes, malformed templates and
/// definitions without a name are fatal.
pub fn validate_and_compile(
    def: AnalysisDefinition,
) -> Result<(AnalysisProfile, Vec<String>), ConfigError> {
    let mut warnings = Vec::new();

    let idle_gap_ms = positive_or_default(
        "profiling.idle_gap_ms",
        def.profiling.idle_gap_ms,
        1,
        constants::DEFAULT_IDLE_GAP_MS,
        &mut warnings,
    );

    let bucket_us = positive_or_default(
        "histogram.bucket_size_us",
        def.histogram.bucket_size_us,
        1,
        constants::DEFAULT_HISTOGRAM_BUCKET_US as i64,
        &mut warnings,
    ) as u64;

    let upper_us = match def.histogram.upper_boundary_us {
        Some(v) if v >= 0 && v as u64 >= bucket_us => v as u64,
        Some(v) => {
            let fallback = constants::DEFAULT_HISTOGRAM_UPPER_US.max(bucket_us);
            warnings.push(format!(
                "histogram.upper_boundary_us = {v} is below bucket_size_us ({bucket_us}). \
                 Using {fallback}."
            ));
            fallback
        }
        None => constants::DEFAULT_HISTOGRAM_UPPER_US.max(bucket_us),
    };

    let threshold_us = positive_or_default(
        "long_invocations.threshold_us",
        def.long_invocations.threshold_us,
        0,
        constants::DEFAULT_LONG_THRESHOLD_US as i64,
        &mut warnings,
    ) as u64;

    let root_methods = def.tracking.root_methods.unwrap_or_default();
    if root_methods.is_empty() {
        warnings.push(
            "tracking.root_methods is empty; no enclosing invocations will be reported."
                .to_string(),
        );
    }

    let tracker = TrackerConfig {
        root_methods: root_methods.into_iter().collect(),
        histogram_bucket_us: bucket_us,
        histogram_upper_us: upper_us,
        histogram_keying: HistogramKeying {
            per_batch: def.histogram.per_batch.unwrap_or(false),
            per_thread_role: def.histogram.per_thread_role.unwrap_or(false),
        },
        histogram_exclude: MethodPatterns::compile(
            "histogram.exclude",
            &def.histogram.exclude.unwrap_or_default(),
        )?,
        long_invocations: LongInvocationFilter {
            threshold_us,
            include: MethodPatterns::compile(
                "long_invocations.include",
                &def.long_invocations.include.unwrap_or_default(),
            )?,
            exclude: MethodPatterns::compile(
                "long_invocations.exclude",
                &def.long_invocations.exclude.unwrap_or_default(),
            )?,
        },
    };

    if tracker.long_invocations.include.is_empty() {
        warnings.push(
            "long_invocations.include is empty; no long invocations will be reported."
                .to_string(),
        );
    }

    let categories = def
        .categories
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, c)| compile_category(i, c))
        .collect::<Result<Vec<_>, _>>()?;
    let subcategories = def
        .subcategories
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, s)| compile_subcategory(i, s))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        warnings = warnings.len(),
        categories = categories.len(),
        subcategories = subcategories.len(),
        root_methods = tracker.root_methods.len(),
        "Analysis profile compiled"
    );

    Ok((
        AnalysisProfile {
            profiling: ProfilingConfig { idle_gap_ms },
            tracker,
            selected_methods: def.tracking.selected_methods.unwrap_or_default(),
            rules: CategoryRules::new(categories, subcategories),
        },
        warnings,
    ))
}

fn positive_or_default(
    field: &str,
    value: Option<i64>,
    min: i64,
    default: i64,
    warnings: &mut Vec<String>,
) -> i64 {
    match value {
        Some(v) if v >= min => v,
        Some(v) => {
            warnings.push(format!(
                "{field} = {v} is out of range (minimum {min}). Using default ({default})."
            ));
            default
        }
        None => default,
    }
}

fn compile_category(index: usize, def: CategoryDef) -> Result<CategoryDefinition, ConfigError> {
    let section = format!("categories[{index}]");
    let name = def.name.filter(|n| !n.is_empty()).ok_or(ConfigError::MissingField {
        section: section.clone(),
        field: "name",
    })?;
    Ok(CategoryDefinition {
        method: compile_template(&format!("{section}.method"), def.method.as_deref())?,
        arguments: compile_template(&format!("{section}.arguments"), def.arguments.as_deref())?,
        name,
    })
}

fn compile_subcategory(
    index: usize,
    def: SubcategoryDef,
) -> Result<SubcategoryDefinition, ConfigError> {
    let section = format!("subcategories[{index}]");
    let missing = |field| ConfigError::MissingField {
        section: section.clone(),
        field,
    };
    let name = def.name.filter(|n| !n.is_empty()).ok_or_else(|| missing("name"))?;
    let parameter = def
        .parameter
        .filter(|p| !p.is_empty())
        .ok_or_else(|| missing("parameter"))?;
    let value = def.value.ok_or_else(|| missing("value"))?;
    Ok(SubcategoryDefinition {
        value: compile_template(&format!("{section}.value"), Some(&value))?,
        name,
        parameter,
    })
}

/// Compile an optional template with length validation.
fn compile_template(field: &str, text: Option<&str>) -> Result<Template, ConfigError> {
    if let Some(text) = text {
        if text.len() > constants::MAX_REGEX_PATTERN_LENGTH {
            return Err(ConfigError::PatternTooLong {
                field: field.to_string(),
                length: text.len(),
                max_length: constants::MAX_REGEX_PATTERN_LENGTH,
            });
        }
    }
    Template::compile_optional(text).map_err(|e| ConfigError::Template {
        field: field.to_string(),
        source: e,
    })
}

// =============================================================================
// Built-in profile (embedded at compile time)
// =============================================================================

/// Embedded TOML content of the built-in analysis defaults.
pub const BUILTIN_PROFILE: &str = include_str!("../../config/default.toml");

/// Parse the built-in definition.
pub fn builtin_definition() -> Result<AnalysisDefinition, ConfigError> {
    parse_definition(BUILTIN_PROFILE, Path::new("<builtin>/default.toml"))
}

/// Build the effective profile from the built-in defaults and an optional
/// user document (content plus the path it was read from).
pub fn load_profile(
    user: Option<(&str, &Path)>,
) -> Result<(AnalysisProfile, Vec<String>), ConfigError> {
    let mut def = builtin_definition()?;
    if let Some((content, path)) = user {
        def = overlay(def, parse_definition(content, path)?);
    }
    validate_and_compile(def)
}

// =============================================================================
// Tests
// =============================================================================
