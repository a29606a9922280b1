//! Source Registry & Formatter
//!
//! Turns configured URL templates into concrete request targets for one
//! address. `{address}` is the only placeholder; `{{` and `}}` are literal
//! braces. A template that cannot be rendered is used verbatim so one bad
//! entry never blocks the rest of the batch.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::utils::constants::ADDRESS_PLACEHOLDER;

/// One configured upstream source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub url_template: String,
    pub needs_substitution: bool,
}

/// Why a template could not be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    UnknownPlaceholder(String),
    UnclosedBrace(usize),
    UnmatchedClosingBrace(usize),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPlaceholder(name) => write!(f, "unknown placeholder {{{}}}", name),
            Self::UnclosedBrace(pos) => write!(f, "unclosed '{{' at byte {}", pos),
            Self::UnmatchedClosingBrace(pos) => write!(f, "unmatched '}}' at byte {}", pos),
        }
    }
}

impl std::error::Error for TemplateError {}

impl SourceDescriptor {
    pub fn new(url_template: impl Into<String>) -> Self {
        let url_template = url_template.into();
        let needs_substitution = url_template.contains(ADDRESS_PLACEHOLDER);
        Self {
            url_template,
            needs_substitution,
        }
    }

    /// Parse a comma-separated list, skipping blanks
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::new)
            .collect()
    }

    /// Render the template for an address
    pub fn render(&self, address: &str) -> Result<String, TemplateError> {
        let template = self.url_template.as_str();
        let mut out = String::with_capacity(template.len() + address.len());
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        out.push('{');
                        continue;
                    }
                    let rest = &template[pos + 1..];
                    let close = rest.find('}').ok_or(TemplateError::UnclosedBrace(pos))?;
                    let name = &rest[..close];
                    if name.contains('{') {
                        return Err(TemplateError::UnclosedBrace(pos));
                    }
                    if name != "address" {
                        return Err(TemplateError::UnknownPlaceholder(name.to_string()));
                    }
                    out.push_str(address);
                    // skip "address}"
                    for _ in 0..=name.chars().count() {
                        chars.next();
                    }
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        out.push('}');
                    } else {
                        return Err(TemplateError::UnmatchedClosingBrace(pos));
                    }
                }
                other => out.push(other),
            }
        }

        Ok(out)
    }

    /// Render, falling back to the unmodified template
    pub fn render_or_original(&self, address: &str) -> String {
        if !self.needs_substitution && !self.url_template.contains(['{', '}']) {
            return self.url_template.clone();
        }
        match self.render(address) {
            Ok(url) => url,
            Err(e) => {
                warn!("⚠️ Malformed source template {:?}: {}", self.url_template, e);
                self.url_template.clone()
            }
        }
    }
}

/// Resolve every source to a concrete target for `address`, preserving order
pub fn format_sources(sources: &[SourceDescriptor], address: &str) -> Vec<String> {
    sources
        .iter()
        .map(|source| source.render_or_original(address))
        .collect()
}
