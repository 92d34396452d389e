// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Stash-protected fetch and rebase.
//!
//! Keeping a feature branch on top of its upstream usually takes four steps:
//! stash local changes, fetch the remote, rebase onto the upstream branch,
//! then pop the stash again. Forgetting the first or last step is easy, so
//! this module performs all four through libgit2.
//!
//! # Conflicts
//!
//! A rebase that runs into conflicts is aborted right away, leaving the
//! branch exactly where it was. Stashed changes are restored regardless of
//! whether the fetch or rebase succeeded.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    Branch, Direction, ErrorCode, FetchOptions, Reference, Remote, RemoteCallbacks, Repository,
    Signature, StatusOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    path::Path,
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

/// Message attached to the temporary stash entry.
pub const STASH_MESSAGE: &str = "Temporary stash before fetch+rebase";

/// Remote and optional branch to rebase onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseTarget {
    /// Name of remote to fetch from.
    pub remote: String,

    /// Branch of remote to rebase onto. Tracking branch of HEAD if `None`.
    pub branch: Option<String>,
}

impl RebaseTarget {
    /// Construct new target that rebases onto the tracking branch of HEAD.
    pub fn tracking(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: None,
        }
    }

    /// Parse `<remote>/<branch>` or `<branch>` target.
    ///
    /// Only a target with exactly one slash names a remote, anything
    /// else is a branch of the default remote.
    pub fn parse(target: impl AsRef<str>, default_remote: impl Into<String>) -> Self {
        let target = target.as_ref();
        match target.split('/').collect::<Vec<_>>().as_slice() {
            [remote, branch] => Self {
                remote: (*remote).to_owned(),
                branch: Some((*branch).to_owned()),
            },
            _ => Self {
                remote: default_remote.into(),
                branch: Some(target.to_owned()),
            },
        }
    }
}

/// Result of a fetch and rebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// Branch now sits on top of upstream.
    Rebased { head: String, upstream: String },

    /// Rebase hit conflicts and was aborted.
    Conflicted { upstream: String },
}

/// Stash local changes, fetch, rebase current branch, and restore stash.
///
/// Opens the repository containing target directory. Fetch progress is shown
/// through the given progress bar, which also hosts credential prompts.
///
/// # Errors
///
/// - Return [`RebaseError::MissingSignature`] if user name or email are not
///   configured.
/// - Return [`RebaseError::MissingRemote`] if target remote does not exist.
/// - Return [`RebaseError::DetachedHead`] if HEAD is not a branch.
/// - Return [`RebaseError::MissingUpstream`] if no upstream branch is found.
/// - Return [`RebaseError::StashPop`] if stashed changes cannot be restored.
/// - Return [`RebaseError::Git2`] if libgit2 operations fail.
#[instrument(skip(dir, bar), level = "debug")]
pub fn fetch_and_rebase(
    dir: impl AsRef<Path>,
    target: &RebaseTarget,
    bar: ProgressBar,
) -> Result<RebaseOutcome> {
    let mut repository = Repository::discover(dir.as_ref())?;
    let signature = repository
        .signature()
        .map_err(RebaseError::MissingSignature)?;

    let stashed = if is_dirty(&repository)? {
        info!("stash local changes");
        repository.stash_save(&signature, STASH_MESSAGE, None)?;
        true
    } else {
        false
    };

    let outcome = fetch_then_rebase(&repository, target, &signature, bar);

    // INVARIANT: Always restore stashed changes, even if fetch or rebase failed.
    if stashed {
        info!("apply stashed changes");
        repository
            .stash_pop(0, None)
            .map_err(RebaseError::StashPop)?;
    }

    outcome
}

fn fetch_then_rebase(
    repository: &Repository,
    target: &RebaseTarget,
    signature: &Signature<'_>,
    bar: ProgressBar,
) -> Result<RebaseOutcome> {
    let mut remote =
        repository
            .find_remote(&target.remote)
            .map_err(|err| RebaseError::MissingRemote {
                source: err,
                remote: target.remote.clone(),
            })?;
    fetch(repository, &mut remote, bar)?;

    let head = repository.head()?;
    if !head.is_branch() {
        return Err(RebaseError::DetachedHead);
    }

    let upstream = match &target.branch {
        Some(branch) => find_remote_branch(repository, &remote, &target.remote, branch),
        None => Branch::wrap(repository.head()?)
            .upstream()
            .ok()
            .map(Branch::into_reference),
    }
    .ok_or(RebaseError::MissingUpstream)?;
    let upstream_name = upstream.shorthand().unwrap_or("upstream").to_owned();
    let head_name = head.shorthand().unwrap_or("HEAD").to_owned();

    let head_oid = head.peel_to_commit()?.id();
    let upstream_oid = upstream.peel_to_commit()?.id();
    if head_oid == upstream_oid || repository.graph_descendant_of(head_oid, upstream_oid)? {
        info!("{head_name} is already up to date with {upstream_name}");
        return Ok(RebaseOutcome::Rebased {
            head: head_name,
            upstream: upstream_name,
        });
    }

    info!("rebase {head_name} onto {upstream_name}");
    let branch_commit = repository.reference_to_annotated_commit(&head)?;
    let upstream_commit = repository.reference_to_annotated_commit(&upstream)?;
    let mut rebase = repository.rebase(Some(&branch_commit), Some(&upstream_commit), None, None)?;

    while let Some(operation) = rebase.next() {
        if let Err(err) = operation {
            rebase.abort()?;
            return Err(err.into());
        }

        if repository.index()?.has_conflicts() {
            warn!("conflicts while rebasing onto {upstream_name}, abort");
            rebase.abort()?;
            return Ok(RebaseOutcome::Conflicted {
                upstream: upstream_name,
            });
        }

        match rebase.commit(None, signature, None) {
            Ok(oid) => debug!("applied commit as {oid}"),
            Err(err) if err.code() == ErrorCode::Applied => {
                debug!("patch already applied upstream, skip it")
            }
            Err(err) => {
                rebase.abort()?;
                return Err(err.into());
            }
        }
    }
    rebase.finish(Some(signature))?;

    Ok(RebaseOutcome::Rebased {
        head: head_name,
        upstream: upstream_name,
    })
}

/// Check for changes to tracked files in working tree or index.
fn is_dirty(repository: &Repository) -> Result<bool> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(false).include_ignored(false);
    let statuses = repository.statuses(Some(&mut opts))?;

    Ok(!statuses.is_empty())
}

/// Fetch configured refspecs of remote.
///
/// If any credentials are required for the fetch to continue, then the user
/// will be prompted for that information accordingly. The progress bar will
/// be blocked for user input.
fn fetch(repository: &Repository, remote: &mut Remote<'_>, bar: ProgressBar) -> Result<()> {
    let refspecs = remote
        .fetch_refspecs()?
        .iter()
        .flatten()
        .map(str::to_owned)
        .collect::<Vec<_>>();

    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(format!("fetch {}", remote.name().unwrap_or("remote")));
    bar.enable_steady_tick(Duration::from_millis(100));

    let prompter = IndicatifPrompter::new(bar.clone());
    let authenticator = GitAuthenticator::default().set_prompter(prompter);
    let config = repository.config()?;

    let mut throttle = Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    rc.transfer_progress(|progress| {
        if throttle.elapsed() > Duration::from_millis(10) {
            throttle = Instant::now();
            bar.set_length(progress.total_objects() as u64);
            bar.set_position(progress.received_objects() as u64);
        }
        true
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    let result = remote.fetch(&refspecs, Some(&mut fo), None);
    bar.finish_and_clear();
    result?;

    Ok(())
}

/// Find fetched branch of remote by name.
///
/// Looks through fetch refspecs whose destination is `.../<remote>/*`, and
/// picks the first destination that exists once `*` is replaced by branch.
fn find_remote_branch<'repo>(
    repository: &'repo Repository,
    remote: &Remote<'_>,
    remote_name: &str,
    branch: &str,
) -> Option<Reference<'repo>> {
    let suffix = format!("/{remote_name}/*");
    remote
        .refspecs()
        .filter(|refspec| refspec.direction() == Direction::Fetch)
        .filter_map(|refspec| refspec.dst().map(str::to_owned))
        .filter(|dst| dst.ends_with(&suffix))
        .map(|dst| format!("{}{branch}", dst.trim_end_matches('*')))
        .find_map(|name| repository.find_reference(&name).ok())
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Fetch and rebase error types.
#[derive(Debug, thiserror::Error)]
pub enum RebaseError {
    /// Git user name and/or email are not configured.
    #[error("git user.name and/or user.email are not configured")]
    MissingSignature(#[source] git2::Error),

    /// Target remote does not exist.
    #[error("no {remote:?} remote found")]
    MissingRemote {
        #[source]
        source: git2::Error,
        remote: String,
    },

    /// HEAD does not point to a branch.
    #[error("HEAD is detached, no branch to rebase")]
    DetachedHead,

    /// No upstream branch to rebase onto.
    #[error("no upstream tracking branch to rebase onto")]
    MissingUpstream,

    /// Stashed changes cannot be applied back.
    #[error("failed to apply stash, possible conflicts with restored changes")]
    StashPop(#[source] git2::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = RebaseError> = std::result::Result<T, E>;
