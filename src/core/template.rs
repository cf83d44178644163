// ProfLog - core/template.rs
//
// A small pattern language for classifying invocations.
//
// Template text is literal except for placeholders:
//
//   ##{name}##         capture `name`, matching anything
//   ##{name:regex}##   capture `name`, matching `regex`
//   ##{:regex}##       match `regex` without capturing
//   ##{}##             match anything without capturing
//
// Compilation runs in two stages that are exercised separately by the
// tests: `split_segments` cuts the text into literal and placeholder pieces,
// and `assemble` turns those pieces into a regex source with literals
// escaped. A template always matches the whole subject.

use crate::core::model::Parameters;
use crate::util::error::TemplateError;
use regex::Regex;

const PLACEHOLDER_START: &str = "##{";
const PLACEHOLDER_END: &str = "}##";
const MATCH_ANYTHING: &str = ".*";

// =============================================================================
// Stage 1: segments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Placeholder {
        /// `None` for a non-capturing placeholder.
        name: Option<&'a str>,
        /// `None` when no sub-pattern was given.
        pattern: Option<&'a str>,
    },
}

/// Split template text into literal and placeholder segments.
///
/// Empty literals are omitted. Fails when a `##{` has no closing `}##`.
pub fn split_segments(text: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(start) = rest.find(PLACEHOLDER_START) {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let body_start = start + PLACEHOLDER_START.len();
        let Some(body_len) = rest[body_start..].find(PLACEHOLDER_END) else {
            return Err(TemplateError::Unbalanced {
                template: text.to_string(),
                offset: offset + start,
            });
        };
        let body = &rest[body_start..body_start + body_len];
        let (name, pattern) = match body.split_once(':') {
            Some((name, pattern)) => (name, Some(pattern)),
            None => (body, None),
        };
        segments.push(Segment::Placeholder {
            name: (!name.is_empty()).then_some(name),
            pattern,
        });

        let consumed = body_start + body_len + PLACEHOLDER_END.len();
        offset += consumed;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

// =============================================================================
// Stage 2: regex assembly
// =============================================================================

/// Build the regex source (without anchors) and the ordered capture names.
pub fn assemble(segments: &[Segment<'_>]) -> (String, Vec<String>) {
    let mut source = String::new();
    let mut captures = Vec::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => source.push_str(&regex::escape(text)),
            Segment::Placeholder { name, pattern } => {
                let pattern = pattern.unwrap_or(MATCH_ANYTHING);
                match name {
                    Some(name) => {
                        source.push_str(&format!("(?P<{name}>{pattern})"));
                        captures.push((*name).to_string());
                    }
                    None => source.push_str(&format!("(?:{pattern})")),
                }
            }
        }
    }
    (source, captures)
}

// =============================================================================
// Compiled templates
// =============================================================================

#[derive(Debug, Clone)]
pub struct Template {
    /// `None` for the absent template, which matches everything.
    regex: Option<Regex>,
    captures: Vec<String>,
}

impl Template {
    pub fn compile(text: &str) -> Result<Self, TemplateError> {
        let segments = split_segments(text)?;
        let (source, captures) = assemble(&segments);
        let anchored = format!("^(?:{source})$");
        let regex = Regex::new(&anchored).map_err(|e| TemplateError::InvalidRegex {
            template: text.to_string(),
            regex: anchored.clone(),
            source: e,
        })?;
        Ok(Self {
            regex: Some(regex),
            captures,
        })
    }

    /// Compile `text` if present; an absent template matches anything.
    pub fn compile_optional(text: Option<&str>) -> Result<Self, TemplateError> {
        match text {
            Some(text) => Self::compile(text),
            None => Ok(Self::any()),
        }
    }

    /// The template that matches every subject and captures nothing.
    pub fn any() -> Self {
        Self {
            regex: None,
            captures: Vec::new(),
        }
    }

    /// Capture names in template order.
    pub fn capture_names(&self) -> &[String] {
        &self.captures
    }

    /// Match the whole of `subject`, returning captured values in template
    /// order. A capture inside an optional part that did not participate
    /// is left out.
    pub fn matches(&self, subject: &str) -> Option<Parameters> {
        let Some(regex) = &self.regex else {
            return Some(Parameters::new());
        };
        let caps = regex.captures(subject)?;
        Some(
            self.captures
                .iter()
                .filter_map(|name| {
                    let value = caps.name(name)?;
                    Some((name.clone(), value.as_str().to_string()))
                })
                .collect(),
        )
    }
}
