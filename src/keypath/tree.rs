// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Nested document representation.
//!
//! A document is a tree of objects, arrays, and scalar leaves. Objects keep
//! their keys in insertion order so that the order chosen by the codec is the
//! order that ends up on disk.

use serde_json::{Map, Number, Value};
use std::{
    borrow::Cow,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Node of a nested document.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// Mapping of unique keys to child nodes.
    Object(Object),

    /// Ordered sequence of child nodes.
    Array(Vec<TreeNode>),

    /// Leaf value.
    Scalar(Scalar),
}

impl TreeNode {
    /// Treat node as [`Object`] if it is one.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            Self::Array(_) | Self::Scalar(_) => None,
        }
    }

    /// Treat node as [`Scalar`] if it is one.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            Self::Object(_) | Self::Array(_) => None,
        }
    }

    /// Collect every scalar leaf reachable from this node, depth first.
    pub fn leaves(&self) -> Vec<&Scalar> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Object(object) => stack.extend(object.iter().rev().map(|(_, node)| node)),
                Self::Array(items) => stack.extend(items.iter().rev()),
                Self::Scalar(scalar) => leaves.push(scalar),
            }
        }

        leaves
    }
}

impl From<Scalar> for TreeNode {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

impl From<&str> for TreeNode {
    fn from(text: &str) -> Self {
        Self::Scalar(text.into())
    }
}

impl From<String> for TreeNode {
    fn from(text: String) -> Self {
        Self::Scalar(text.into())
    }
}

impl From<bool> for TreeNode {
    fn from(flag: bool) -> Self {
        Self::Scalar(flag.into())
    }
}

impl From<i64> for TreeNode {
    fn from(number: i64) -> Self {
        Self::Scalar(number.into())
    }
}

impl<T> From<Option<T>> for TreeNode
where
    T: Into<Scalar>,
{
    fn from(value: Option<T>) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<Object> for TreeNode {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<Value> for TreeNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, TreeNode::from(value)))
                    .collect(),
            ),
            Value::Array(items) => Self::Array(items.into_iter().map(TreeNode::from).collect()),
            Value::Null => Self::Scalar(Scalar::Null),
            Value::Bool(flag) => Self::Scalar(Scalar::Bool(flag)),
            Value::Number(number) => Self::Scalar(Scalar::Number(number)),
            Value::String(text) => Self::Scalar(Scalar::String(text)),
        }
    }
}

impl From<TreeNode> for Value {
    fn from(node: TreeNode) -> Self {
        match node {
            TreeNode::Object(object) => Value::Object(
                object
                    .into_iter()
                    .map(|(key, node)| (key, Value::from(node)))
                    .collect::<Map<_, _>>(),
            ),
            TreeNode::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            TreeNode::Scalar(scalar) => scalar.into(),
        }
    }
}

/// Insertion ordered mapping of unique keys to nodes.
///
/// # Invariant
///
/// - No duplicate keys.
/// - Insertion never overwrites an existing key.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Object {
    entries: Vec<(String, TreeNode)>,
}

impl Object {
    /// Construct new empty object.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&TreeNode> {
        self.position(key).map(|index| &self.entries[index].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut TreeNode> {
        self.position(key).map(|index| &mut self.entries[index].1)
    }

    /// Insert node under key if the key is not taken yet.
    ///
    /// Returns `false` and leaves the object untouched when the key already
    /// exists.
    pub fn try_insert(&mut self, key: impl Into<String>, node: impl Into<TreeNode>) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }

        self.entries.push((key, node.into()));
        true
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Iterate over key and node pairs in insertion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &TreeNode)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(entry, _)| entry == key)
    }
}

/// Builds object from pairs; the first occurrence of a key wins.
impl FromIterator<(String, TreeNode)> for Object {
    fn from_iter<I: IntoIterator<Item = (String, TreeNode)>>(iter: I) -> Self {
        let mut object = Object::new();
        for (key, node) in iter {
            object.try_insert(key, node);
        }

        object
    }
}

impl IntoIterator for Object {
    type Item = (String, TreeNode);
    type IntoIter = std::vec::IntoIter<(String, TreeNode)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Leaf value of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    /// Render scalar the way a configuration provider reads it.
    ///
    /// Configuration providers treat every leaf as text, so booleans and
    /// numbers are stringified. Null has no textual value.
    pub fn as_config_str(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Bool(flag) => Some(Cow::Owned(flag.to_string())),
            Self::Number(number) => Some(Cow::Owned(number.to_string())),
            Self::String(text) => Some(Cow::Borrowed(text.as_str())),
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", Value::from(self.clone()))
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Null => Value::Null,
            Scalar::Bool(flag) => Value::Bool(flag),
            Scalar::Number(number) => Value::Number(number),
            Scalar::String(text) => Value::String(text),
        }
    }
}

impl From<&str> for Scalar {
    fn from(text: &str) -> Self {
        Self::String(text.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(text: String) -> Self {
        Self::String(text)
    }
}

impl From<bool> for Scalar {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<i64> for Scalar {
    fn from(number: i64) -> Self {
        Self::Number(number.into())
    }
}

impl<T> From<Option<T>> for Scalar
where
    T: Into<Scalar>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
