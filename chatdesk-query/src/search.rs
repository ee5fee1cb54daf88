//! Free-text search input handling.
//!
//! Search text is trimmed, cut to 100 characters, stripped of LIKE
//! metacharacters and wrapped as `%text%` for `ILIKE`.

use crate::sql::{ColumnRef, Predicate, SqlParam};
use chatdesk_core::constants::MAX_SEARCH_QUERY_CHARS;

/// Escape `\`, `%` and `_` so user text matches literally under LIKE/ILIKE.
pub fn like_escape(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// A normalized, non-empty search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    text: String,
}

impl SearchTerm {
    /// `None` for empty or whitespace-only input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let text: String = trimmed.chars().take(MAX_SEARCH_QUERY_CHARS).collect();
        Some(Self { text })
    }

    /// The truncated, unescaped text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `%text%` with wildcards in the text escaped.
    pub fn pattern(&self) -> String {
        format!("%{}%", like_escape(&self.text))
    }

    /// `ILIKE` on each column.
    pub fn matches(&self, columns: &[ColumnRef]) -> Vec<Predicate> {
        let pattern = self.pattern();
        columns
            .iter()
            .map(|column| Predicate::ILike(*column, SqlParam::String(pattern.clone())))
            .collect()
    }
}
