// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Azure Key Vault synchronization.
//!
//! Secrets are read through the Azure CLI, so whatever account the user logged
//! into via `az login` determines which vaults are visible.

use crate::{
    config::SecretsSettings,
    keypath::{FlatMap, TreeNode, DEFAULT_SEPARATOR},
};

use futures::stream::{self, StreamExt, TryStreamExt};
use std::{
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    process::ExitStatus,
};
use tokio::process::Command;
use tracing::{debug, info, instrument};

#[cfg(windows)]
const AZ: &str = "az.cmd";
#[cfg(not(windows))]
const AZ: &str = "az";

/// Source of vault secrets.
///
/// Layer of indirection between synchronization logic and whatever actually
/// talks to the vault.
#[allow(async_fn_in_trait)]
pub trait SecretSource {
    /// List names of all vaults visible to the user.
    async fn list_vaults(&self) -> Result<Vec<String>>;

    /// List names of all secrets in a vault.
    async fn list_secrets(&self, vault: &str) -> Result<Vec<String>>;

    /// Read current value of a secret.
    async fn secret_value(&self, vault: &str, name: &str) -> Result<String>;
}

/// Secret source backed by the Azure CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct AzureCli;

impl SecretSource for AzureCli {
    async fn list_vaults(&self) -> Result<Vec<String>> {
        let stdout = syscall(AZ, ["keyvault", "list", "--query", "[].name"], None)
            .await
            .map_err(|err| match err {
                Error::Command { stderr, .. } => Error::LoginRequired { stderr },
                err => err,
            })?;

        parse_json(&stdout)
    }

    async fn list_secrets(&self, vault: &str) -> Result<Vec<String>> {
        let args = [
            "keyvault",
            "secret",
            "list",
            "--vault-name",
            vault,
            "--query",
            "[].name",
        ];
        let stdout = syscall(AZ, args, None).await?;

        parse_json(&stdout)
    }

    async fn secret_value(&self, vault: &str, name: &str) -> Result<String> {
        let args = [
            "keyvault",
            "secret",
            "show",
            "--vault-name",
            vault,
            "--name",
            name,
            "--query",
            "value",
        ];
        let stdout = syscall(AZ, args, None).await?;

        parse_json(&stdout)
    }
}

/// List vaults visible to source in ascending order.
///
/// # Errors
///
/// - Return any error of [`SecretSource::list_vaults`].
pub async fn available_vaults<S>(source: &S) -> Result<Vec<String>>
where
    S: SecretSource,
{
    let mut vaults = source.list_vaults().await?;
    vaults.sort();
    Ok(vaults)
}

/// Determine user-secrets id of the project in a directory.
///
/// Asks MSBuild for the `UserSecretsId` property of the project found in
/// target directory. Returns `None` if MSBuild fails, or if the project does
/// not define the property.
#[instrument(skip(dir), level = "debug")]
pub async fn resolve_secrets_id(dir: impl AsRef<Path>) -> Option<String> {
    let output = syscall(
        "dotnet",
        ["msbuild", "-getproperty:UserSecretsId"],
        Some(dir.as_ref()),
    )
    .await;

    match output {
        Ok(stdout) => Some(stdout.trim().to_owned()).filter(|id| !id.is_empty()),
        Err(err) => {
            debug!("cannot resolve user-secrets id: {err}");
            None
        }
    }
}

/// Synchronization settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Separator denoting nesting in user-secrets keys.
    pub separator: char,

    /// Separator denoting nesting in vault secret names.
    pub vault_separator: String,

    /// Maximum number of secret values fetched at once.
    pub concurrency: usize,
}

impl SyncOptions {
    /// Translate vault secret name into user-secrets key.
    pub fn secret_key(&self, name: &str) -> String {
        if self.vault_separator.is_empty() {
            return name.to_owned();
        }

        name.replace(&self.vault_separator, &self.separator.to_string())
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            vault_separator: "--".into(),
            concurrency: 4,
        }
    }
}

impl From<&SecretsSettings> for SyncOptions {
    fn from(settings: &SecretsSettings) -> Self {
        Self {
            separator: settings.separator,
            vault_separator: settings.vault_separator.clone(),
            concurrency: settings.concurrency,
        }
    }
}

/// What synchronization did to a single secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Local value already matched vault value.
    Unchanged,

    /// Local value was missing or empty.
    Added,

    /// Local value differed from vault value.
    Updated,
}

impl Display for SyncAction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unchanged => fmt.write_str("unchanged"),
            Self::Added => fmt.write_str("added"),
            Self::Updated => fmt.write_str("updated"),
        }
    }
}

/// Record of a single synchronized secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRecord {
    /// User-secrets key the secret was stored under.
    pub key: String,

    /// What happened to the secret.
    pub action: SyncAction,
}

/// Import every secret of a vault into a flat user-secrets listing.
///
/// Secret values are fetched with bounded concurrency. Records come back in
/// the order the source listed the secrets in. Only added or updated secrets
/// touch the listing.
///
/// # Errors
///
/// - Return any error of the source. Listing is left untouched on error.
#[instrument(skip(source, secrets, options), level = "debug")]
pub async fn sync_secrets<S>(
    source: &S,
    vault: &str,
    secrets: &mut FlatMap,
    options: &SyncOptions,
) -> Result<Vec<SyncRecord>>
where
    S: SecretSource,
{
    let names = source.list_secrets(vault).await?;
    info!("import {} secrets from {vault}", names.len());

    let values: Vec<(String, String)> = stream::iter(names)
        .map(|name| async move {
            let value = source.secret_value(vault, &name).await?;
            Ok::<_, Error>((name, value))
        })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

    let mut records = Vec::with_capacity(values.len());
    for (name, value) in values {
        let key = options.secret_key(&name);
        let action = match secrets.get(&key) {
            Some(TreeNode::Scalar(existing)) => match existing.as_config_str() {
                Some(existing) if existing == value => SyncAction::Unchanged,
                Some(existing) if !existing.is_empty() => SyncAction::Updated,
                _ => SyncAction::Added,
            },
            Some(_) => SyncAction::Updated,
            None => SyncAction::Added,
        };

        if action != SyncAction::Unchanged {
            secrets.set(key.as_str(), value);
        }

        debug!("{action} {key}");
        records.push(SyncRecord { key, action });
    }

    Ok(records)
}

async fn syscall(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    dir: Option<&Path>,
) -> Result<String> {
    let program = cmd.as_ref().to_string_lossy().into_owned();
    let mut command = Command::new(cmd.as_ref());
    command.args(args).kill_on_drop(true);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let output = command.output().await.map_err(|err| Error::Spawn {
        source: err,
        program: program.clone(),
    })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

    if !output.status.success() {
        return Err(Error::Command {
            program,
            status: output.status,
            stderr: stderr.trim_end().to_owned(),
        });
    }

    Ok(stdout)
}

fn parse_json<T>(stdout: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(stdout.trim()).map_err(|err| Error::Parse {
        source: err,
        output: stdout.trim().to_owned(),
    })
}

/// Vault synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// External program cannot be started.
    #[error("failed to run {program:?}, is it installed and on PATH?")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// External program exited with failure.
    #[error("command {program:?} failed with {status}:\n{stderr}")]
    Command {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Vaults cannot be listed, usually because the user is not logged in.
    #[error("could not list Azure Key Vaults, ensure you are logged in with 'az login':\n{stderr}")]
    LoginRequired { stderr: String },

    /// Azure CLI output is not the expected JSON.
    #[error("unexpected Azure CLI output {output:?}")]
    Parse {
        #[source]
        source: serde_json::Error,
        output: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
