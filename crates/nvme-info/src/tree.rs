// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The Information Tree: path-addressed fields with stable insertion order.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use crate::path::{FieldPath, PathPattern};
use crate::value::{Field, Value};

/// Error raised while assembling a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The same path was inserted twice.
    #[error("duplicate path `{0}`")]
    DuplicatePath(FieldPath),
}

/// Read-only mapping from [`FieldPath`] to [`Field`].
///
/// Iteration via [`InfoTree::iter`] follows insertion order (decoded groups
/// first, derived fields last); [`InfoTree::iter_sorted`] is lexicographic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoTree {
    entries: Vec<(FieldPath, Field)>,
    index: BTreeMap<FieldPath, usize>,
}

impl InfoTree {
    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree holds no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a field.
    pub fn get(&self, path: &FieldPath) -> Option<&Field> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    /// Look up a field by path string; invalid paths simply miss.
    pub fn lookup(&self, path: &str) -> Option<&Field> {
        FieldPath::parse(path).ok().and_then(|p| self.get(&p))
    }

    /// Value at `path`, if the field exists.
    pub fn value(&self, path: &str) -> Option<&Value> {
        self.lookup(path).map(Field::value)
    }

    /// Whether a field exists at `path`.
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.index.contains_key(path)
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &Field)> {
        self.entries.iter().map(|(p, f)| (p, f))
    }

    /// Fields in lexicographic path order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&FieldPath, &Field)> {
        self.index.iter().map(|(p, &i)| (p, &self.entries[i].1))
    }

    /// Paths in lexicographic order.
    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.index.keys()
    }

    /// All fields matching `pattern`, in lexicographic path order.
    pub fn matching<'t>(
        &'t self,
        pattern: &'t PathPattern,
    ) -> impl Iterator<Item = (&'t FieldPath, &'t Field)> + 't {
        self.iter_sorted().filter(move |(p, _)| pattern.matches(p))
    }

    /// Fields at or beneath `prefix`, in insertion order.
    pub fn group<'t>(
        &'t self,
        prefix: &'t str,
    ) -> impl Iterator<Item = (&'t FieldPath, &'t Field)> + 't {
        self.iter().filter(move |(p, _)| p.starts_with(prefix))
    }

    /// Insert a field that must not shadow an existing one.
    ///
    /// Returns `false` (and leaves the tree untouched) when `path` is taken.
    pub(crate) fn insert_new(&mut self, path: FieldPath, field: Field) -> bool {
        if self.index.contains_key(&path) {
            return false;
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, field));
        true
    }
}

impl Serialize for InfoTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, field) in &self.entries {
            map.serialize_entry(path.as_str(), field)?;
        }
        map.end()
    }
}

/// Incremental builder for an [`InfoTree`].
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: InfoTree,
}

impl TreeBuilder {
    /// Start an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; duplicate paths are rejected.
    pub fn insert(&mut self, path: FieldPath, field: Field) -> Result<&mut Self, TreeError> {
        if self.tree.contains(&path) {
            return Err(TreeError::DuplicatePath(path));
        }
        self.tree.insert_new(path, field);
        Ok(self)
    }

    /// Whether `path` has already been inserted.
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.tree.contains(path)
    }

    /// Finish building.
    pub fn finish(self) -> InfoTree {
        self.tree
    }
}
