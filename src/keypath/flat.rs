// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Flat key-path listings.

use crate::keypath::{
    tree::{Object, TreeNode},
    KeyPathError, Result,
};

use std::collections::HashSet;

/// Single delimited key-path with its leaf value.
///
/// Leaves are usually scalars. Arrays and empty objects are kept whole as
/// opaque leaves, since a key-path cannot address them faithfully.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatEntry {
    pub key: String,
    pub value: TreeNode,
}

impl FlatEntry {
    /// Construct new flat entry.
    pub fn new(key: impl Into<String>, value: impl Into<TreeNode>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Number of segments in key when split by separator.
    pub fn depth(&self, separator: char) -> usize {
        self.key.split(separator).count()
    }
}

/// Ordered listing of flat entries.
///
/// Keys are expected to be unique, but this is not checked by
/// [`FlatMap::push`]. Use [`FlatMap::set`] to keep keys unique.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FlatMap {
    entries: Vec<FlatEntry>,
}

impl FlatMap {
    /// Construct new empty flat map.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FlatEntry> {
        self.entries.iter()
    }

    /// Get value of first entry with matching key.
    pub fn get(&self, key: &str) -> Option<&TreeNode> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    /// Append entry without checking for duplicate keys.
    pub fn push(&mut self, entry: FlatEntry) {
        self.entries.push(entry);
    }

    /// Set value of key.
    ///
    /// Replaces value in place if key exists, keeping the entry's position.
    /// Otherwise, appends a new entry. Returns the replaced value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<TreeNode>) -> Option<TreeNode> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => Some(std::mem::replace(&mut entry.value, value)),
            None => {
                self.entries.push(FlatEntry { key, value });
                None
            }
        }
    }

    /// Find first key that occurs more than once.
    pub fn duplicate_key(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|entry| entry.key.as_str())
            .find(|key| !seen.insert(*key))
    }

    /// Place every entry verbatim at the top-level of a single object.
    ///
    /// # Errors
    ///
    /// - Return [`KeyPathError::DuplicateKey`] if a key occurs more than once.
    pub fn to_flat_object(&self) -> Result<Object> {
        let mut object = Object::new();
        for entry in &self.entries {
            if !object.try_insert(entry.key.as_str(), entry.value.clone()) {
                return Err(KeyPathError::DuplicateKey {
                    key: entry.key.clone(),
                });
            }
        }

        Ok(object)
    }
}

impl FromIterator<FlatEntry> for FlatMap {
    fn from_iter<I: IntoIterator<Item = FlatEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for FlatMap
where
    K: Into<String>,
    V: Into<TreeNode>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(key, value)| FlatEntry::new(key, value))
            .collect()
    }
}

impl Extend<FlatEntry> for FlatMap {
    fn extend<I: IntoIterator<Item = FlatEntry>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for FlatMap {
    type Item = FlatEntry;
    type IntoIter = std::vec::IntoIter<FlatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a FlatMap {
    type Item = &'a FlatEntry;
    type IntoIter = std::slice::Iter<'a, FlatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
