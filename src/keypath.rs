// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Key-path tree codec.
//!
//! Configuration stores like .NET user-secrets keep their data as a flat
//! listing of __key-paths__, e.g., `ConnectionStrings:Default`, where a fixed
//! separator character denotes nesting. Flat listings are painful to read, so
//! this module converts between a flat listing and a nested document.
//!
//! # Unflattening
//!
//! Entries are placed deepest first. Whenever a key-path collides with a path
//! that is already taken, the colliding entry is kept at the top-level of the
//! document under its full original key instead. Thus, nothing is ever
//! overwritten:
//!
//! ```text
//! { "a:b": "1", "a:b:c": "2" }  =>  { "a": { "b": { "c": "2" } }, "a:b": "1" }
//! ```
//!
//! The only input that cannot be represented is one where the demoted key
//! itself is already taken at the top-level, e.g., `{ "a": "1", "a:b": "2" }`.
//! Such input is rejected with [`KeyPathError::FallbackCollision`].
//!
//! # Sorting
//!
//! [`sort_properties`] orders object keys case-insensitively at every level of
//! a document. Arrays keep their order.

pub mod flat;
pub mod tree;

pub use flat::{FlatEntry, FlatMap};
pub use tree::{Object, Scalar, TreeNode};

use std::cmp::{Ordering, Reverse};
use tracing::{debug, instrument};

/// Separator used by .NET configuration providers.
pub const DEFAULT_SEPARATOR: char = ':';

/// Convert flat listing into nested document.
///
/// # Errors
///
/// - Return [`KeyPathError::FallbackCollision`] if a conflicting entry cannot
///   be kept at the top-level because its full key is already taken there.
#[instrument(skip(flat), level = "debug")]
pub fn unflatten(flat: &FlatMap, separator: char) -> Result<TreeNode> {
    // INVARIANT: Deepest key-paths claim their slots first.
    //   - Stable sort, so entries of equal depth keep their input order.
    let mut ordered = flat.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|entry| Reverse(entry.depth(separator)));

    let mut root = Object::new();
    for entry in ordered {
        if place(&mut root, entry, separator) == Placement::Placed {
            continue;
        }

        debug!("key-path {:?} conflicts, keep it flat at top-level", entry.key);
        if !root.try_insert(entry.key.as_str(), entry.value.clone()) {
            return Err(KeyPathError::FallbackCollision {
                key: entry.key.clone(),
            });
        }
    }

    Ok(TreeNode::Object(root))
}

/// Sort object keys case-insensitively at every level of a document.
///
/// Keys equal in all but case keep their relative order. Array elements are
/// never reordered, only their descendants are sorted.
pub fn sort_properties(node: &TreeNode) -> TreeNode {
    match node {
        TreeNode::Object(object) => {
            let mut entries = object.iter().collect::<Vec<_>>();
            entries.sort_by(|(lhs, _), (rhs, _)| cmp_ignore_case(lhs, rhs));
            TreeNode::Object(
                entries
                    .into_iter()
                    .map(|(key, node)| (key.to_owned(), sort_properties(node)))
                    .collect(),
            )
        }
        TreeNode::Array(items) => TreeNode::Array(items.iter().map(sort_properties).collect()),
        TreeNode::Scalar(scalar) => TreeNode::Scalar(scalar.clone()),
    }
}

/// Convert nested document into flat listing.
///
/// Object keys are joined by the separator. Arrays and nested empty objects
/// are kept whole as opaque leaves, so unflattening and sorting hand them back
/// unchanged. An empty top-level object produces no entries.
pub fn flatten(node: &TreeNode, separator: char) -> FlatMap {
    let mut flat = FlatMap::new();
    flatten_into(node, None, separator, &mut flat);
    flat
}

fn flatten_into(node: &TreeNode, prefix: Option<&str>, separator: char, flat: &mut FlatMap) {
    let join = |segment: &str| match prefix {
        Some(prefix) => format!("{prefix}{separator}{segment}"),
        None => segment.to_owned(),
    };

    match node {
        TreeNode::Object(object) if !object.is_empty() || prefix.is_none() => {
            for (key, child) in object.iter() {
                flatten_into(child, Some(&join(key)), separator, flat);
            }
        }
        leaf => flat.push(FlatEntry::new(prefix.unwrap_or_default(), leaf.clone())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Placed,
    Conflict,
}

/// Place entry at its nested path, creating intermediate objects as needed.
///
/// Reports a conflict without touching existing nodes if an intermediate
/// segment is taken by a non-object, or if the terminal segment is taken.
fn place(root: &mut Object, entry: &FlatEntry, separator: char) -> Placement {
    let segments = entry.key.split(separator).collect::<Vec<_>>();
    let Some((last, parents)) = segments.split_last() else {
        return Placement::Conflict;
    };

    let mut current = root;
    for segment in parents {
        if !current.contains_key(segment) {
            current.try_insert(*segment, Object::new());
        }

        match current.get_mut(segment) {
            Some(TreeNode::Object(next)) => current = next,
            _ => return Placement::Conflict,
        }
    }

    if current.try_insert(*last, entry.value.clone()) {
        Placement::Placed
    } else {
        Placement::Conflict
    }
}

/// Ordinal comparison of upper-cased characters.
fn cmp_ignore_case(lhs: &str, rhs: &str) -> Ordering {
    lhs.chars()
        .map(simple_uppercase)
        .cmp(rhs.chars().map(simple_uppercase))
}

/// Upper-case a character only if it maps to exactly one character.
///
/// Characters like `ß` expand to several characters under full case mapping,
/// and are left as they are instead.
fn simple_uppercase(ch: char) -> char {
    let mut upper = ch.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(mapped), None) => mapped,
        _ => ch,
    }
}

/// Key-path codec error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KeyPathError {
    /// Conflicting entry cannot be kept flat, its key is taken at top-level.
    #[error("key {key:?} collides with a nested path and with an existing top-level key")]
    FallbackCollision { key: String },

    /// Same key occurs more than once in a flat listing.
    #[error("key {key:?} occurs more than once")]
    DuplicateKey { key: String },
}

/// Friendly result alias :3
pub type Result<T, E = KeyPathError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use simple_test_case::test_case;

    fn keys_of(node: &TreeNode) -> Vec<&str> {
        node.as_object().unwrap().keys().collect()
    }

    fn leaf_multiset<'a>(leaves: impl IntoIterator<Item = &'a Scalar>) -> Vec<String> {
        let mut leaves = leaves.into_iter().map(ToString::to_string).collect::<Vec<_>>();
        leaves.sort();
        leaves
    }

    #[test]
    fn unflatten_nests_shared_prefixes() -> anyhow::Result<()> {
        let flat = FlatMap::from_iter([("a:b", "1"), ("a:c", "2")]);
        let result = Value::from(unflatten(&flat, ':')?);

        assert_eq!(result, json!({ "a": { "b": "1", "c": "2" } }));

        Ok(())
    }

    #[test]
    fn unflatten_keeps_shallow_conflict_flat() -> anyhow::Result<()> {
        let flat = FlatMap::from_iter([("a:b", "1"), ("a:b:c", "2")]);
        let result = unflatten(&flat, ':')?;

        assert_eq!(Value::from(result.clone()), json!({ "a": { "b": { "c": "2" } }, "a:b": "1" }));
        assert_eq!(keys_of(&result), vec!["a", "a:b"]);

        Ok(())
    }

    #[test]
    fn unflatten_rejects_fallback_collision() {
        let flat = FlatMap::from_iter([("a", "1"), ("a:b", "2")]);
        let result = unflatten(&flat, ':');

        assert_eq!(result, Err(KeyPathError::FallbackCollision { key: "a".into() }));
    }

    #[test]
    fn unflatten_preserves_null() -> anyhow::Result<()> {
        let flat = FlatMap::from_iter([FlatEntry::new("x:y", Scalar::Null)]);
        let result = unflatten(&flat, ':')?;
        assert_eq!(Value::from(result.clone()), json!({ "x": { "y": null } }));

        let sorted = sort_properties(&result);
        assert_eq!(Value::from(sorted), json!({ "x": { "y": null } }));

        Ok(())
    }

    #[test]
    fn unflatten_keeps_input_order_for_equal_depth() -> anyhow::Result<()> {
        let flat = FlatMap::from_iter([("b", "1"), ("x:y", "2"), ("a", "3")]);
        let result = unflatten(&flat, ':')?;

        assert_eq!(keys_of(&result), vec!["x", "b", "a"]);

        Ok(())
    }

    #[test]
    fn unflatten_with_custom_separator() -> anyhow::Result<()> {
        let flat = FlatMap::from_iter([("Logging__LogLevel__Default", "Warning"), ("a:b", "1")]);
        let result = Value::from(unflatten(&flat, '_')?);

        // Empty segments between doubled separators are ordinary keys.
        let expect = json!({
            "Logging": { "": { "LogLevel": { "": { "Default": "Warning" } } } },
            "a:b": "1",
        });
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn unflatten_preserves_value_multiset() -> anyhow::Result<()> {
        let flat = FlatMap::from_iter([
            FlatEntry::new("db:host", "localhost"),
            FlatEntry::new("db:port", 5432_i64),
            FlatEntry::new("cache", "redis"),
            FlatEntry::new("db:host:ipv6", true),
            FlatEntry::new("token", Scalar::Null),
        ]);
        let result = unflatten(&flat, ':')?;

        let expect = leaf_multiset(flat.iter().flat_map(|entry| entry.value.leaves()));
        assert_eq!(leaf_multiset(result.leaves()), expect);
        assert_eq!(leaf_multiset(sort_properties(&result).leaves()), expect);

        Ok(())
    }

    #[test]
    fn place_reports_scalar_on_intermediate_segment() {
        let mut root = Object::new();
        root.try_insert("a", Scalar::from("x"));
        root.try_insert("n", Scalar::Null);

        let result = place(&mut root, &FlatEntry::new("a:b", "y"), ':');
        assert_eq!(result, Placement::Conflict);
        let result = place(&mut root, &FlatEntry::new("n:b", "y"), ':');
        assert_eq!(result, Placement::Conflict);

        assert_eq!(Value::from(TreeNode::Object(root)), json!({ "a": "x", "n": null }));
    }

    #[test_case(json!({ "B": 1, "a": 2, "C": 3 }), &["a", "B", "C"]; "mixed case")]
    #[test_case(json!({ "a": 1, "A": 2 }), &["a", "A"]; "case tie keeps lower first")]
    #[test_case(json!({ "A": 1, "a": 2 }), &["A", "a"]; "case tie keeps upper first")]
    #[test_case(json!({ "b": 1, "_x": 2, "A": 3 }), &["A", "b", "_x"]; "underscore after letters")]
    #[test_case(json!({ "a10": 1, "a2": 2, "a1": 3 }), &["a1", "a10", "a2"]; "ordinal digits")]
    #[test_case(json!({ "ß": 1, "ss": 2 }), &["ss", "ß"]; "sharp s is not ss")]
    #[test_case(json!({ "É": 1, "f": 2, "é": 3 }), &["f", "É", "é"]; "accented letters")]
    #[test]
    fn sort_properties_orders_keys(input: Value, expect: &[&str]) {
        let result = sort_properties(&TreeNode::from(input));
        pretty_assertions::assert_eq!(keys_of(&result), expect);
    }

    #[test]
    fn sort_properties_keeps_array_order() {
        let input = TreeNode::from(json!({ "list": [{ "Z": 1, "a": 2 }, { "b": 3 }] }));
        let result = sort_properties(&input);

        let TreeNode::Array(items) = result.as_object().unwrap().get("list").unwrap() else {
            panic!("list must stay an array");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(keys_of(&items[0]), vec!["a", "Z"]);
        assert_eq!(keys_of(&items[1]), vec!["b"]);
        assert_eq!(Value::from(result), json!({ "list": [{ "a": 2, "Z": 1 }, { "b": 3 }] }));
    }

    #[test]
    fn sort_properties_is_idempotent() {
        let input = TreeNode::from(json!({
            "zeta": { "Beta": [ { "y": 1, "X": 2 } ], "alpha": null },
            "Alpha": "a",
            "alpha": "b",
        }));
        let once = sort_properties(&input);
        let twice = sort_properties(&once);

        assert_eq!(once, twice);
        assert_eq!(keys_of(&once), vec!["Alpha", "alpha", "zeta"]);
    }

    #[test]
    fn flatten_joins_objects_and_indexes_arrays() {
        let input = TreeNode::from(json!({
            "ConnectionStrings": { "Default": "Server=.", "Replica": null },
            "Hosts": ["a", { "name": "b" }],
            "Empty": {},
            "Enabled": true,
        }));
        let result = flatten(&input, ':');

        let expect = FlatMap::from_iter([
            FlatEntry::new("ConnectionStrings:Default", "Server=."),
            FlatEntry::new("ConnectionStrings:Replica", Scalar::Null),
            FlatEntry::new("Hosts", TreeNode::from(json!(["a", { "name": "b" }]))),
            FlatEntry::new("Empty", Object::new()),
            FlatEntry::new("Enabled", true),
        ]);
        assert_eq!(result, expect);
    }

    #[test]
    fn flatten_of_empty_document_is_empty() {
        assert!(flatten(&TreeNode::from(json!({})), ':').is_empty());
    }

    #[test]
    fn format_round_trip_keeps_arrays_and_empty_containers() -> anyhow::Result<()> {
        let input = TreeNode::from(json!({
            "Hosts": ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"],
            "Empty": {},
            "None": [],
            "Nested": { "List": [{ "z": 1, "A": 2 }], "Inner": {} },
        }));
        let result = sort_properties(&unflatten(&flatten(&input, ':'), ':')?);

        let expect = json!({
            "Empty": {},
            "Hosts": ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"],
            "Nested": { "Inner": {}, "List": [{ "A": 2, "z": 1 }] },
            "None": [],
        });
        assert_eq!(Value::from(result.clone()), expect);
        assert_eq!(keys_of(&result), vec!["Empty", "Hosts", "Nested", "None"]);

        Ok(())
    }

    #[test]
    fn flatten_then_unflatten_restores_objects() -> anyhow::Result<()> {
        let input = TreeNode::from(json!({
            "Logging": { "LogLevel": { "Default": "Information", "Microsoft": "Warning" } },
            "ApiKey": "secret",
        }));
        let result = unflatten(&flatten(&input, ':'), ':')?;

        assert_eq!(Value::from(result), Value::from(input));

        Ok(())
    }
}
