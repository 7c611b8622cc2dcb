// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dotted field paths and single-wildcard path patterns.
//!
//! Paths are the public contract of the decoder. They are ASCII, lowercase,
//! `.`-separated, contain no whitespace, and may carry an `[index]` suffix on
//! a segment for array elements (`error.entry[0].lba`). Ordering is plain
//! lexicographic order over the path string.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised by path and pattern validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Path string was empty.
    #[error("empty path")]
    Empty,
    /// A segment between two dots was empty.
    #[error("empty segment at index {index} in `{path}`")]
    EmptySegment {
        /// Offending path.
        path: String,
        /// Segment index (0-based).
        index: usize,
    },
    /// A character outside the path alphabet was found.
    #[error("invalid character {ch:?} in `{path}`")]
    InvalidCharacter {
        /// Offending path.
        path: String,
        /// Character that is not allowed.
        ch: char,
    },
    /// An `[index]` suffix was malformed.
    #[error("malformed index in segment `{segment}`")]
    MalformedIndex {
        /// Offending segment.
        segment: String,
    },
    /// A pattern used more than one wildcard segment.
    #[error("pattern `{pattern}` has more than one wildcard segment")]
    MultipleWildcards {
        /// Offending pattern.
        pattern: String,
    },
}

fn check_segment(path: &str, segment: &str, index: usize) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment {
            path: path.to_owned(),
            index,
        });
    }
    let (name, idx) = match segment.find('[') {
        Some(open) => (&segment[..open], Some(&segment[open..])),
        None => (segment, None),
    };
    if name.is_empty() {
        return Err(PathError::MalformedIndex {
            segment: segment.to_owned(),
        });
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
    {
        return Err(PathError::InvalidCharacter {
            path: path.to_owned(),
            ch,
        });
    }
    if let Some(idx) = idx {
        let digits = idx
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| PathError::MalformedIndex {
                segment: segment.to_owned(),
            })?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PathError::MalformedIndex {
                segment: segment.to_owned(),
            });
        }
    }
    Ok(())
}

fn array_name(segment: &str) -> Option<&str> {
    segment.find('[').map(|open| &segment[..open])
}

/// A validated dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(String);

impl FieldPath {
    /// Validate and wrap a path string.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        for (i, segment) in path.split('.').enumerate() {
            check_segment(path, segment, i)?;
        }
        Ok(Self(path.to_owned()))
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Append a child segment, validating it.
    pub fn child(&self, segment: &str) -> Result<Self, PathError> {
        Self::parse(&format!("{}.{segment}", self.0))
    }

    /// Whether `self` equals `prefix` or lies beneath it.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0 == prefix
            || (self.0.len() > prefix.len()
                && self.0.starts_with(prefix)
                && self.0.as_bytes()[prefix.len()] == b'.')
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.0
    }
}

impl std::str::FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A path pattern with at most one `*` segment.
///
/// The wildcard matches exactly one whole segment (`namespace.*.size_bytes`
/// matches `namespace.1.size_bytes` but not `namespace.1.lba_format[0].size`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    raw: String,
    wildcard: Option<usize>,
}

impl PathPattern {
    /// Parse a pattern; a plain path is a pattern without a wildcard.
    pub fn parse(pattern: &str) -> Result<Self, PathError> {
        if pattern.is_empty() {
            return Err(PathError::Empty);
        }
        let mut wildcard = None;
        for (i, segment) in pattern.split('.').enumerate() {
            if segment == "*" {
                if wildcard.is_some() {
                    return Err(PathError::MultipleWildcards {
                        pattern: pattern.to_owned(),
                    });
                }
                wildcard = Some(i);
            } else {
                check_segment(pattern, segment, i)?;
            }
        }
        Ok(Self {
            raw: pattern.to_owned(),
            wildcard,
        })
    }

    /// The pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Index of the wildcard segment, if any.
    pub fn wildcard_index(&self) -> Option<usize> {
        self.wildcard
    }

    /// Whether the pattern is a plain path.
    pub fn is_exact(&self) -> bool {
        self.wildcard.is_none()
    }

    /// Match a path; on success returns the segment bound to the wildcard
    /// (or `Some("")` for an exact pattern).
    pub fn capture<'p>(&self, path: &'p FieldPath) -> Option<&'p str> {
        let mut bound = "";
        let mut ours = self.raw.split('.');
        let mut theirs = path.segments();
        loop {
            match (ours.next(), theirs.next()) {
                (None, None) => return Some(bound),
                (Some("*"), Some(seg)) if self.wildcard.is_some() => bound = seg,
                (Some(a), Some(b)) if a == b => {}
                _ => return None,
            }
        }
    }

    /// Whether the pattern matches `path`.
    pub fn matches(&self, path: &FieldPath) -> bool {
        self.capture(path).is_some()
    }

    /// Whether the pattern matches `path` or one of its ancestors.
    ///
    /// A segment naming an array (`entry`) also covers its elements
    /// (`entry[3]`).
    pub fn covers(&self, path: &FieldPath) -> bool {
        let mut theirs = path.segments();
        for ours in self.raw.split('.') {
            match theirs.next() {
                Some(seg) if ours == "*" || ours == seg || array_name(seg) == Some(ours) => {}
                _ => return false,
            }
        }
        true
    }

    /// Substitute the wildcard with `segment`, producing a concrete path.
    pub fn bind(&self, segment: &str) -> Result<FieldPath, PathError> {
        match self.wildcard {
            None => FieldPath::parse(&self.raw),
            Some(at) => {
                let joined: Vec<&str> = self
                    .raw
                    .split('.')
                    .enumerate()
                    .map(|(i, s)| if i == at { segment } else { s })
                    .collect();
                FieldPath::parse(&joined.join("."))
            }
        }
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PathPattern> for String {
    fn from(value: PathPattern) -> Self {
        value.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_contract_paths() {
        for p in [
            "controller.serial_number",
            "smart.critical_warning._raw",
            "namespace.1.size_bytes",
            "error.entry[12].lba",
            "vendor.c0.bytes",
        ] {
            assert!(FieldPath::parse(p).is_ok(), "{p}");
        }
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!(FieldPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            FieldPath::parse("smart..x"),
            Err(PathError::EmptySegment { index: 1, .. })
        ));
        assert!(matches!(
            FieldPath::parse("Smart.x"),
            Err(PathError::InvalidCharacter { ch: 'S', .. })
        ));
        assert!(matches!(
            FieldPath::parse("smart.x y"),
            Err(PathError::InvalidCharacter { ch: ' ', .. })
        ));
        assert!(matches!(
            FieldPath::parse("error.entry[x]"),
            Err(PathError::MalformedIndex { .. })
        ));
    }

    #[test]
    fn wildcard_matches_one_segment() {
        let pat = PathPattern::parse("namespace.*.utilization_fraction").unwrap();
        let hit = FieldPath::parse("namespace.2.utilization_fraction").unwrap();
        let miss = FieldPath::parse("namespace.2.lba_format[0].utilization_fraction").unwrap();
        assert_eq!(pat.capture(&hit), Some("2"));
        assert!(!pat.matches(&miss));
        assert_eq!(
            pat.bind("7").unwrap().as_str(),
            "namespace.7.utilization_fraction"
        );
    }

    #[test]
    fn covers_descendants() {
        let pat = PathPattern::parse("smart.critical_warning").unwrap();
        assert!(pat.covers(&FieldPath::parse("smart.critical_warning._raw").unwrap()));
        assert!(pat.covers(&FieldPath::parse("smart.critical_warning").unwrap()));
        assert!(!pat.covers(&FieldPath::parse("smart.critical").unwrap()));
        let pat = PathPattern::parse("namespace.*").unwrap();
        assert!(pat.covers(&FieldPath::parse("namespace.1.size_lba").unwrap()));
        let pat = PathPattern::parse("error.entry").unwrap();
        assert!(pat.covers(&FieldPath::parse("error.entry[2].lba").unwrap()));
        assert!(!pat.covers(&FieldPath::parse("error.entry_count").unwrap()));
    }

    #[test]
    fn only_one_wildcard_allowed() {
        assert!(matches!(
            PathPattern::parse("*.*.x"),
            Err(PathError::MultipleWildcards { .. })
        ));
    }

    #[test]
    fn prefix_check_respects_segment_boundaries() {
        let p = FieldPath::parse("smart.critical_warning._raw").unwrap();
        assert!(p.starts_with("smart"));
        assert!(p.starts_with("smart.critical_warning"));
        assert!(!p.starts_with("smart.crit"));
    }
}
