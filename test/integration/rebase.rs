// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::RepoFixture;

use chores::rebase::{fetch_and_rebase, RebaseError, RebaseOutcome, RebaseTarget};

use anyhow::Result;
use indicatif::ProgressBar;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;

fn diverged() -> Result<(RepoFixture, RepoFixture)> {
    let upstream = RepoFixture::new("upstream")?;
    upstream.commit_file("README.md", "hello\n")?;

    let local = RepoFixture::clone_from(&upstream, "local")?;
    upstream.commit_file("upstream.txt", "from upstream\n")?;
    local.commit_file("local.txt", "from local\n")?;

    Ok((upstream, local))
}

#[sealed_test]
fn rebase_onto_tracking_branch_restores_local_changes() -> Result<()> {
    let (upstream, mut local) = diverged()?;
    local.write_file("README.md", "hello\nlocal edit\n")?;

    let result = fetch_and_rebase(
        local.workdir(),
        &RebaseTarget::tracking("origin"),
        ProgressBar::hidden(),
    )?;
    let expect = RebaseOutcome::Rebased {
        head: "main".into(),
        upstream: "origin/main".into(),
    };
    assert_eq!(result, expect);

    assert_eq!(local.head_parent()?, upstream.head()?);
    assert_eq!(local.read_file("upstream.txt")?, "from upstream\n");
    assert_eq!(local.read_file("local.txt")?, "from local\n");
    assert_eq!(local.read_file("README.md")?, "hello\nlocal edit\n");
    assert_eq!(local.stash_count()?, 0);

    Ok(())
}

#[sealed_test]
fn rebase_onto_named_remote_branch() -> Result<()> {
    let (upstream, local) = diverged()?;

    let result = fetch_and_rebase(
        local.workdir(),
        &RebaseTarget::parse("origin/main", "elsewhere"),
        ProgressBar::hidden(),
    )?;
    assert!(matches!(result, RebaseOutcome::Rebased { .. }));
    assert_eq!(local.head_parent()?, upstream.head()?);

    Ok(())
}

#[sealed_test]
fn rebase_when_up_to_date_keeps_head() -> Result<()> {
    let upstream = RepoFixture::new("upstream")?;
    upstream.commit_file("README.md", "hello\n")?;
    let local = RepoFixture::clone_from(&upstream, "local")?;
    let before = local.head()?;

    let result = fetch_and_rebase(
        local.workdir(),
        &RebaseTarget::tracking("origin"),
        ProgressBar::hidden(),
    )?;
    assert!(matches!(result, RebaseOutcome::Rebased { .. }));
    assert_eq!(local.head()?, before);

    Ok(())
}

#[sealed_test]
fn rebase_aborts_on_conflict() -> Result<()> {
    let upstream = RepoFixture::new("upstream")?;
    upstream.commit_file("README.md", "hello\n")?;
    let local = RepoFixture::clone_from(&upstream, "local")?;
    upstream.commit_file("README.md", "hello from upstream\n")?;
    local.commit_file("README.md", "hello from local\n")?;
    let before = local.head()?;

    let result = fetch_and_rebase(
        local.workdir(),
        &RebaseTarget::tracking("origin"),
        ProgressBar::hidden(),
    )?;
    let expect = RebaseOutcome::Conflicted {
        upstream: "origin/main".into(),
    };
    assert_eq!(result, expect);
    assert_eq!(local.head()?, before);
    assert_eq!(local.read_file("README.md")?, "hello from local\n");

    Ok(())
}

#[sealed_test]
fn rebase_missing_remote_restores_stash() -> Result<()> {
    let (_upstream, mut local) = diverged()?;
    local.write_file("README.md", "hello\nlocal edit\n")?;

    let result = fetch_and_rebase(
        local.workdir(),
        &RebaseTarget::tracking("nowhere"),
        ProgressBar::hidden(),
    );
    assert!(matches!(result, Err(RebaseError::MissingRemote { .. })));
    assert_eq!(local.read_file("README.md")?, "hello\nlocal edit\n");
    assert_eq!(local.stash_count()?, 0);

    Ok(())
}
