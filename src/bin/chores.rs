// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use chores::{
    clean::Cleaner,
    config::Settings,
    path::{default_config_path, default_user_secrets_dir},
    rebase::{fetch_and_rebase, RebaseOutcome, RebaseTarget},
    secrets::{
        sync_secrets,
        vault::{available_vaults, resolve_secrets_id},
        AzureCli, SyncAction, SyncOptions, UserSecrets,
    },
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Select, Text};
use std::{
    env::current_dir,
    fs::read_to_string,
    io::ErrorKind,
    path::PathBuf,
    process::exit,
    time::Duration,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "chores [options] <chores-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file to use instead of the default.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = load_settings(self.config)?;
        match self.command {
            Command::Clean(opts) => run_clean(opts, &settings),
            Command::Rebase(opts) => run_rebase(opts, &settings),
            Command::Secrets(opts) => match opts.command {
                SecretsCommand::Sync(opts) => run_secrets_sync(opts, &settings).await,
                SecretsCommand::Format(opts) => run_secrets_format(opts, &settings).await,
            },
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Remove build artifact directories recursively.
    #[command(override_usage = "chores clean [options] [<pattern>]...")]
    Clean(CleanOptions),

    /// Stash, fetch, rebase onto upstream, and restore stash.
    #[command(override_usage = "chores rebase [options] [<remote>/<branch> | <branch>]")]
    Rebase(RebaseOptions),

    /// Manage .NET user-secrets of current project.
    #[command(override_usage = "chores secrets <command> [options]")]
    Secrets(SecretsOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CleanOptions {
    /// Directory name patterns to remove instead of configured ones.
    #[arg(value_name = "pattern")]
    pub patterns: Vec<String>,

    /// Only show what would be removed.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RebaseOptions {
    /// Branch to rebase onto. Tracking branch of HEAD if left out.
    #[arg(value_name = "target")]
    pub target: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SecretsOptions {
    #[command(subcommand)]
    pub command: SecretsCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum SecretsCommand {
    /// Import secrets of an Azure Key Vault into user-secrets.
    #[command(override_usage = "chores secrets sync [options]")]
    Sync(SyncArgs),

    /// Rewrite user-secrets as a nested, sorted document.
    #[command(override_usage = "chores secrets format [options]")]
    Format(FormatArgs),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncArgs {
    /// User-secrets id to use instead of the one of current project.
    #[arg(short, long, value_name = "id")]
    pub id: Option<String>,

    /// Key Vault to import from.
    #[arg(short, long, value_name = "vault")]
    pub vault: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FormatArgs {
    /// User-secrets id to use instead of the one of current project.
    #[arg(short, long, value_name = "id")]
    pub id: Option<String>,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    match read_to_string(&path) {
        Ok(data) => data
            .parse::<Settings>()
            .with_context(|| format!("failed to parse settings at {:?}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("no settings at {:?}, use defaults", path.display());
            Ok(Settings::default())
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to read settings at {:?}", path.display()))
        }
    }
}

fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));

    Ok(bar)
}

fn run_clean(opts: CleanOptions, settings: &Settings) -> Result<()> {
    let patterns = if opts.patterns.is_empty() {
        settings.clean.directories.clone()
    } else {
        opts.patterns
    };

    let cleaner = Cleaner::new(patterns)?.dry_run(opts.dry_run);
    let removals = cleaner.clean(current_dir()?)?;
    let failed = removals.iter().filter(|removal| !removal.is_ok()).count();

    if removals.is_empty() {
        info!("nothing to clean");
    }

    if failed > 0 {
        bail!("failed to remove {failed} of {} directories", removals.len());
    }

    Ok(())
}

fn run_rebase(opts: RebaseOptions, settings: &Settings) -> Result<()> {
    let remote = settings.rebase.remote.as_str();
    let target = match opts.target {
        Some(target) => RebaseTarget::parse(target, remote),
        None => RebaseTarget::tracking(remote),
    };

    match fetch_and_rebase(current_dir()?, &target, ProgressBar::no_length())? {
        RebaseOutcome::Rebased { head, upstream } => {
            info!("{head} is on top of {upstream}");
            Ok(())
        }
        RebaseOutcome::Conflicted { upstream } => {
            Err(anyhow!("rebase onto {upstream} aborted due to conflicts"))
        }
    }
}

async fn run_secrets_sync(opts: SyncArgs, settings: &Settings) -> Result<()> {
    let secrets = locate_secrets(opts.id, settings).await?;
    let separator = settings.secrets.separator;

    let vault = match opts.vault.or_else(|| settings.secrets.default_vault.clone()) {
        Some(vault) => vault,
        None => select_vault().await?,
    };

    let mut flat = secrets.load(separator)?;
    let bar = spinner(format!("import secrets from {vault}"))?;
    let records = sync_secrets(
        &AzureCli,
        &vault,
        &mut flat,
        &SyncOptions::from(&settings.secrets),
    )
    .await;
    bar.finish_and_clear();
    let records = records?;

    for record in &records {
        match record.action {
            SyncAction::Unchanged => debug!("{} {}", record.action, record.key),
            _ => info!("{} {}", record.action, record.key),
        }
    }
    let changed = records
        .iter()
        .filter(|record| record.action != SyncAction::Unchanged)
        .count();
    info!("{changed} of {} secrets changed", records.len());

    secrets.save(&flat, separator)?;

    Ok(())
}

async fn run_secrets_format(opts: FormatArgs, settings: &Settings) -> Result<()> {
    let secrets = locate_secrets(opts.id, settings).await?;
    secrets.format(settings.secrets.separator)?;

    Ok(())
}

async fn locate_secrets(id: Option<String>, settings: &Settings) -> Result<UserSecrets> {
    let root = match &settings.secrets.store_dir {
        Some(dir) => dir.clone(),
        None => default_user_secrets_dir()?,
    };

    let id = match id {
        Some(id) => id,
        None => match resolve_secrets_id(current_dir()?).await {
            Some(id) => id,
            None => {
                warn!("cannot determine user-secrets id of current project");
                Text::new("user-secrets id").prompt()?
            }
        },
    };
    info!("use user-secrets {id}");

    Ok(UserSecrets::locate(id, root)?)
}

async fn select_vault() -> Result<String> {
    let bar = spinner("list key vaults")?;
    let vaults = available_vaults(&AzureCli).await;
    bar.finish_and_clear();
    let vaults = vaults?;

    if vaults.is_empty() {
        bail!("no key vaults available to current Azure account");
    }

    Ok(Select::new("key vault", vaults).prompt()?)
}
