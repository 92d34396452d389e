// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use chores::{
    keypath::{FlatMap, TreeNode},
    secrets::{store::Error, UserSecrets},
};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::fs::{create_dir_all, read_to_string, write};

fn write_secrets(id: &str, content: &str) -> Result<UserSecrets> {
    create_dir_all(id)?;
    write(format!("{id}/secrets.json"), content)?;
    Ok(UserSecrets::locate(id, ".")?)
}

#[sealed_test]
fn format_nests_and_sorts_flat_secrets() -> Result<()> {
    let secrets = write_secrets(
        "project",
        indoc! {r#"
            {
              "b": "2",
              "B:c": "3",
              "a:y": "1",
              "a:X": null
            }
        "#},
    )?;

    secrets.format(':')?;
    let result = read_to_string(secrets.path())?;
    let expect = indoc! {r#"
        {
          "a": {
            "X": null,
            "y": "1"
          },
          "B": {
            "c": "3"
          },
          "b": "2"
        }"#};
    assert_eq!(result, expect);

    // INVARIANT: Formatting an already formatted document changes nothing.
    secrets.format(':')?;
    assert_eq!(read_to_string(secrets.path())?, expect);

    Ok(())
}

#[sealed_test]
fn format_keeps_colliding_secrets_flat() -> Result<()> {
    let secrets = write_secrets("project", r#"{"a:b": "2", "a": "1"}"#)?;

    secrets.format(':')?;
    let result = read_to_string(secrets.path())?;
    let expect = indoc! {r#"
        {
          "a": "1",
          "a:b": "2"
        }"#};
    assert_eq!(result, expect);

    Ok(())
}

#[sealed_test]
fn load_missing_secrets_is_empty() -> Result<()> {
    let secrets = UserSecrets::locate("project", ".")?;
    let result = secrets.load(':')?;
    assert!(result.is_empty());

    Ok(())
}

#[sealed_test]
fn load_flattens_nested_secrets() -> Result<()> {
    let secrets = write_secrets(
        "project",
        r#"{"ConnectionStrings": {"Default": "Server=db"}, "Hosts": ["a", "b"], "Retries": 3}"#,
    )?;

    let result = secrets.load(':')?;
    let keys = result
        .iter()
        .map(|entry| entry.key.as_str())
        .collect::<Vec<_>>();
    assert_eq!(keys, vec!["ConnectionStrings:Default", "Hosts", "Retries"]);
    assert_eq!(
        result.get("ConnectionStrings:Default"),
        Some(&TreeNode::from("Server=db"))
    );
    assert_eq!(
        result.get("Hosts"),
        Some(&TreeNode::Array(vec!["a".into(), "b".into()]))
    );
    assert_eq!(result.get("Retries"), Some(&TreeNode::from(3_i64)));

    Ok(())
}

#[sealed_test]
fn save_creates_missing_id_directory() -> Result<()> {
    let secrets = UserSecrets::locate("fresh", "root")?;
    let flat = FlatMap::from_iter([("Logging:Level", "Debug")]);

    secrets.save(&flat, ':')?;
    let result = read_to_string("root/fresh/secrets.json")?;
    let expect = indoc! {r#"
        {
          "Logging": {
            "Level": "Debug"
          }
        }"#};
    assert_eq!(result, expect);

    Ok(())
}

#[sealed_test]
fn load_rejects_non_object_document() -> Result<()> {
    let secrets = write_secrets("project", "[1, 2, 3]")?;
    assert!(secrets.load(':').is_err());

    Ok(())
}

#[sealed_test]
fn format_keeps_arrays_and_empty_containers() -> Result<()> {
    let secrets = write_secrets(
        "project",
        r#"{"Hosts": ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"], "Empty": {}, "None": [], "Db:Name": "main"}"#,
    )?;

    secrets.format(':')?;
    let result = read_to_string(secrets.path())?;
    let expect = indoc! {r#"
        {
          "Db": {
            "Name": "main"
          },
          "Empty": {},
          "Hosts": [
            "a",
            "b",
            "c",
            "d",
            "e",
            "f",
            "g",
            "h",
            "i",
            "j",
            "k"
          ],
          "None": []
        }"#};
    assert_eq!(result, expect);

    Ok(())
}

#[sealed_test]
fn format_refuses_key_spelled_nested_and_flat() -> Result<()> {
    let content = r#"{"a": {"b": "1"}, "a:b": "2", "c": "3", "c:d": "4"}"#;
    let secrets = write_secrets("project", content)?;

    let result = secrets.format(':');
    assert!(matches!(result, Err(Error::AmbiguousKey { key, .. }) if key == "a:b"));
    assert_eq!(read_to_string(secrets.path())?, content);

    Ok(())
}
