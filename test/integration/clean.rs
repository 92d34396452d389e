// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use chores::clean::Cleaner;

use anyhow::Result;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};

fn make_project() -> Result<()> {
    for dir in ["a/bin/Debug", "a/obj", "b/src/bin", "bin", "keep/nested"] {
        create_dir_all(dir)?;
    }
    write("keep/file", "keep me")?;
    write("b/src/main.cs", "class Program {}")?;

    Ok(())
}

fn removed_paths(removals: &[chores::clean::Removal]) -> Vec<PathBuf> {
    removals.iter().map(|removal| removal.path.clone()).collect()
}

#[sealed_test]
fn clean_removes_artifacts_in_sorted_order() -> Result<()> {
    make_project()?;

    let removals = Cleaner::new(["bin", "obj"])?.clean(".")?;
    let expect = vec![
        PathBuf::from("./a/bin"),
        PathBuf::from("./a/obj"),
        PathBuf::from("./b/src/bin"),
        PathBuf::from("./bin"),
    ];
    assert_eq!(removed_paths(&removals), expect);
    assert!(removals.iter().all(|removal| removal.is_ok()));

    for path in &expect {
        assert!(!path.exists(), "{path:?} should be removed");
    }
    assert!(Path::new("keep/file").exists());
    assert!(Path::new("keep/nested").exists());
    assert!(Path::new("b/src/main.cs").exists());

    Ok(())
}

#[sealed_test]
fn clean_dry_run_keeps_everything() -> Result<()> {
    make_project()?;

    let removals = Cleaner::new(["bin", "obj"])?.dry_run(true).clean(".")?;
    assert_eq!(removals.len(), 4);
    for removal in &removals {
        assert!(removal.is_ok());
        assert!(removal.path.exists(), "{:?} should be kept", removal.path);
    }

    Ok(())
}

#[cfg(unix)]
#[sealed_test]
fn clean_never_follows_symlinks() -> Result<()> {
    create_dir_all("outside/bin")?;
    create_dir_all("project")?;
    std::os::unix::fs::symlink("../outside", "project/link")?;
    std::os::unix::fs::symlink("../outside/bin", "project/bin")?;

    let removals = Cleaner::new(["bin"])?.clean("project")?;
    assert!(removals.is_empty());
    assert!(Path::new("outside/bin").exists());

    Ok(())
}

#[sealed_test]
fn clean_missing_root_is_an_error() -> Result<()> {
    let result = Cleaner::new(["bin"])?.clean("does-not-exist");
    assert!(result.is_err());

    Ok(())
}
