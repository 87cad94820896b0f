//! Source edits attached to diagnostics
//!
//! A [`Fix`] is a set of range replacements against one module's source text. Edits inside
//! a fix must not conflict with each other, and a fix records a fingerprint of the text it
//! was computed against so [`apply_fix`] can refuse to patch a source that moved on.

use crate::diagnostic::FixSafety;
use crate::syntax::{Position, Range};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Why a fix could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixRejection {
    #[error("source changed since the fix was computed")]
    SourceChanged,

    #[error("range {0} is outside the source text")]
    RangeOutOfBounds(Range),

    #[error("edits at {first} and {second} overlap")]
    Overlapping { first: Range, second: Range },

    #[error("fix does not change the source")]
    Unchanged,
}

/// A single replacement of `range` by `replacement`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub range: Range,
    pub replacement: String,
}

impl Edit {
    pub fn replace(range: Range, replacement: &str) -> Self {
        Self {
            range,
            replacement: replacement.to_string(),
        }
    }

    pub fn remove(range: Range) -> Self {
        Self::replace(range, "")
    }

    pub fn insert_at(position: Position, text: &str) -> Self {
        Self::replace(Range::new(position, position), text)
    }

    /// Two edits conflict when their ranges overlap or they start at the same position
    pub fn conflicts_with(&self, other: &Edit) -> bool {
        let (a, b) = (&self.range, &other.range);
        a.start == b.start || (a.start < b.end && b.start < a.end)
    }
}

/// An automatic fix for a diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    /// Edits sorted by range
    pub edits: Vec<Edit>,
    #[serde(default)]
    pub safety: FixSafety,
    /// Fingerprint of the source the edits were computed against
    #[serde(default)]
    pub source_fingerprint: Option<u64>,
}

impl Fix {
    /// Create a safe fix from a set of edits
    pub fn new(mut edits: Vec<Edit>) -> Self {
        edits.sort_by_key(|edit| edit.range);
        Self {
            edits,
            safety: FixSafety::Safe,
            source_fingerprint: None,
        }
    }

    pub fn with_safety(mut self, safety: FixSafety) -> Self {
        self.safety = safety;
        self
    }

    /// Pin the fix to the given source text
    pub fn against(mut self, source: &str) -> Self {
        self.source_fingerprint = Some(fingerprint(source));
        self
    }

    pub fn is_safe(&self) -> bool {
        self.safety == FixSafety::Safe
    }

    /// First pair of conflicting edits inside this fix, if any
    pub fn first_overlap(&self) -> Option<(&Edit, &Edit)> {
        self.edits.iter().enumerate().find_map(|(i, a)| {
            self.edits[i + 1..]
                .iter()
                .find(|b| a.conflicts_with(b))
                .map(|b| (a, b))
        })
    }

    /// Check if any edit of this fix conflicts with any edit of `other`
    pub fn conflicts_with(&self, other: &Fix) -> bool {
        self.edits
            .iter()
            .any(|a| other.edits.iter().any(|b| a.conflicts_with(b)))
    }
}

/// Hash of a source text, used to detect stale fixes
pub fn fingerprint(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// Apply a fix to `source`, re-validating it first
pub fn apply_fix(source: &str, fix: &Fix) -> Result<String, FixRejection> {
    if let Some(expected) = fix.source_fingerprint {
        if expected != fingerprint(source) {
            return Err(FixRejection::SourceChanged);
        }
    }
    if let Some((first, second)) = fix.first_overlap() {
        return Err(FixRejection::Overlapping {
            first: first.range,
            second: second.range,
        });
    }

    let fixed = apply_edits(source, &fix.edits)?;
    if fixed == source {
        return Err(FixRejection::Unchanged);
    }
    Ok(fixed)
}

/// Apply pairwise disjoint edits in one pass
pub(crate) fn apply_edits(source: &str, edits: &[Edit]) -> Result<String, FixRejection> {
    let index = LineIndex::new(source);
    let mut spans = Vec::with_capacity(edits.len());
    for edit in edits {
        let start = index.offset(edit.range.start);
        let end = index.offset(edit.range.end);
        match (start, end) {
            (Some(start), Some(end)) if start <= end => spans.push((start, end, edit)),
            _ => return Err(FixRejection::RangeOutOfBounds(edit.range)),
        }
    }
    spans.sort_by_key(|(start, end, _)| (*start, *end));

    let mut fixed = String::with_capacity(source.len());
    let mut cursor = 0;
    for (start, end, edit) in spans {
        if start < cursor {
            return Err(FixRejection::RangeOutOfBounds(edit.range));
        }
        fixed.push_str(&source[cursor..start]);
        fixed.push_str(&edit.replacement);
        cursor = end;
    }
    fixed.push_str(&source[cursor..]);
    Ok(fixed)
}

/// Source text covered by `range`, if the range lies inside the source
pub fn source_text(source: &str, range: Range) -> Option<&str> {
    let index = LineIndex::new(source);
    let start = index.offset(range.start)?;
    let end = index.offset(range.end)?;
    source.get(start..end)
}

/// Maps 1-based line/column positions to byte offsets
struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            source,
            line_starts,
        }
    }

    fn offset(&self, position: Position) -> Option<usize> {
        if position.line == 0 || position.column == 0 {
            return None;
        }
        let line_index = (position.line - 1) as usize;
        let line_start = *self.line_starts.get(line_index)?;
        let line_end = self
            .line_starts
            .get(line_index + 1)
            .map(|next| next - 1)
            .unwrap_or(self.source.len());
        let line = &self.source[line_start..line_end];

        let column = (position.column - 1) as usize;
        if column == line.chars().count() {
            return Some(line_end);
        }
        line.char_indices()
            .nth(column)
            .map(|(offset, _)| line_start + offset)
    }
}
