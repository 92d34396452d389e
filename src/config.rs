// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the optional settings file that chores reads on
//! startup. Every field has a default, so an empty or missing file is valid.
//! File I/O is left to the caller to figure out.

use crate::keypath::DEFAULT_SEPARATOR;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Settings file layout.
///
/// # General Layout
///
/// One table per chore: `[clean]`, `[secrets]`, and `[rebase]`. Tables that
/// are left out take their defaults.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Settings for build artifact cleanup.
    pub clean: CleanSettings,

    /// Settings for user-secrets handling.
    pub secrets: SecretsSettings,

    /// Settings for fetch and rebase.
    pub rebase: RebaseSettings,
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on user-secrets root override.
        if let Some(store_dir) = &settings.secrets.store_dir {
            settings.secrets.store_dir = Some(PathBuf::from(
                shellexpand::full(store_dir.to_string_lossy().as_ref())
                    .map_err(ConfigError::ShellExpansion)?
                    .into_owned(),
            ));
        }

        if settings.secrets.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Build artifact cleanup settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanSettings {
    /// Glob patterns matched against directory names to remove.
    pub directories: Vec<String>,
}

impl Default for CleanSettings {
    fn default() -> Self {
        Self {
            directories: vec!["bin".into(), "obj".into()],
        }
    }
}

/// User-secrets settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretsSettings {
    /// Separator denoting nesting in user-secrets keys.
    pub separator: char,

    /// Separator denoting nesting in Key Vault secret names.
    pub vault_separator: String,

    /// Maximum number of secret values fetched at once.
    pub concurrency: usize,

    /// Root directory holding user-secrets documents.
    pub store_dir: Option<PathBuf>,

    /// Key Vault to sync from when none is given.
    pub default_vault: Option<String>,
}

impl Default for SecretsSettings {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            vault_separator: "--".into(),
            concurrency: 4,
            store_dir: None,
            default_vault: None,
        }
    }
}

/// Fetch and rebase settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RebaseSettings {
    /// Remote to fetch from when none is given.
    pub remote: String,
}

impl Default for RebaseSettings {
    fn default() -> Self {
        Self {
            remote: "origin".into(),
        }
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Secret fetch concurrency must allow at least one request.
    #[error("secrets.concurrency must be at least 1")]
    ZeroConcurrency,
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
