// ProfLog - core/filter.rs
//
// Method-name filters used while tracking invocations.
// Core layer: pure logic, no I/O.

use crate::util::constants;
use crate::util::error::ConfigError;
use regex::Regex;

/// An ordered list of regexes, each of which must match a method name in
/// full.
#[derive(Debug, Clone, Default)]
pub struct MethodPatterns {
    patterns: Vec<Regex>,
}

impl MethodPatterns {
    /// Compile `patterns`; `field` names the config key for error messages.
    pub fn compile(field: &str, patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                if p.len() > constants::MAX_REGEX_PATTERN_LENGTH {
                    return Err(ConfigError::PatternTooLong {
                        field: field.to_string(),
                        length: p.len(),
                        max_length: constants::MAX_REGEX_PATTERN_LENGTH,
                    });
                }
                Regex::new(&format!("^(?:{p})$")).map_err(|e| ConfigError::InvalidRegex {
                    field: field.to_string(),
                    pattern: p.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True if any pattern matches the whole of `method`.
    pub fn matches(&self, method: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(method))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// Decides which completed invocations are reported as "long".
#[derive(Debug, Clone, Default)]
pub struct LongInvocationFilter {
    /// Inclusive lower bound on elapsed time, in microseconds.
    pub threshold_us: u64,
    pub include: MethodPatterns,
    pub exclude: MethodPatterns,
}

impl LongInvocationFilter {
    pub fn accepts(&self, method: &str, elapsed_us: u64) -> bool {
        elapsed_us >= self.threshold_us
            && self.include.matches(method)
            && !self.exclude.matches(method)
    }

    /// The threshold in whole milliseconds, as used in report file names.
    pub fn threshold_ms(&self) -> u64 {
        self.threshold_us / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> MethodPatterns {
        let owned: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        MethodPatterns::compile("test", &owned).unwrap()
    }

    #[test]
    fn test_patterns_match_whole_name() {
        let p = patterns(&[".*SqlRepositoryServiceImpl->searchObjects"]);
        assert!(p.matches("repo.sql.SqlRepositoryServiceImpl->searchObjects"));
        assert!(
            !p.matches("repo.sql.SqlRepositoryServiceImpl->searchObjectsIterative"),
            "a prefix match is not enough"
        );
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let p = patterns(&["a|b"]);
        assert!(p.matches("a"));
        assert!(!p.matches("ab"));
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        assert!(!MethodPatterns::default().matches("anything"));
    }

    #[test]
    fn test_invalid_regex_reports_field() {
        let err = MethodPatterns::compile("histogram.exclude", &["(".to_string()]).unwrap_err();
        match err {
            ConfigError::InvalidRegex { field, pattern, .. } => {
                assert_eq!(field, "histogram.exclude");
                assert_eq!(pattern, "(");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_long_filter_threshold_is_inclusive() {
        let filter = LongInvocationFilter {
            threshold_us: 50_000,
            include: patterns(&[".*search.*"]),
            exclude: patterns(&[".*Iterative"]),
        };
        assert!(filter.accepts("x.search", 50_000));
        assert!(!filter.accepts("x.search", 49_999));
        assert!(!filter.accepts("x.other", 90_000), "not included");
        assert!(!filter.accepts("x.searchIterative", 90_000), "excluded");
        assert_eq!(filter.threshold_ms(), 50);
    }
}
