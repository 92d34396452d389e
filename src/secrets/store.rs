// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User-secrets document storage.

use crate::keypath::{flatten, sort_properties, unflatten, FlatMap, KeyPathError, TreeNode};

use serde_json::Value;
use std::{
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Name of user-secrets document inside its id directory.
pub const SECRETS_FILE: &str = "secrets.json";

/// User-secrets document of a single project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSecrets {
    path: PathBuf,
}

impl UserSecrets {
    /// Locate user-secrets document by id under a root directory.
    ///
    /// Does not check if the document actually exists.
    ///
    /// # Errors
    ///
    /// - Return [`Error::InvalidId`] if id is empty or is not a single plain
    ///   path component.
    pub fn locate(id: impl AsRef<str>, root: impl AsRef<Path>) -> Result<Self> {
        let id = id.as_ref().trim();
        let mut components = Path::new(id).components();
        let is_plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !is_plain {
            return Err(Error::InvalidId { id: id.to_owned() });
        }

        Ok(Self {
            path: root.as_ref().join(id).join(SECRETS_FILE),
        })
    }

    /// Use document at exact path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to user-secrets document.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Load document as flat listing of key-paths.
    ///
    /// Accepts both flat and nested documents. A missing or blank document is
    /// treated as an empty listing. Arrays and empty objects are carried as
    /// opaque values.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if document cannot be read.
    /// - Return [`Error::Parse`] if document is not valid JSON.
    /// - Return [`Error::NotAnObject`] if document is not a JSON object.
    /// - Return [`Error::AmbiguousKey`] if a nested path and a flat key spell
    ///   the same key-path, e.g., `{"a": {"b": 1}, "a:b": 2}`.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&self, separator: char) -> Result<FlatMap> {
        let content = match read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no user-secrets at {:?} yet", self.path.display());
                return Ok(FlatMap::new());
            }
            Err(err) => {
                return Err(Error::Read {
                    source: err,
                    path: self.path.clone(),
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(FlatMap::new());
        }

        let value: Value = serde_json::from_str(&content).map_err(|err| Error::Parse {
            source: err,
            path: self.path.clone(),
        })?;
        if !value.is_object() {
            return Err(Error::NotAnObject {
                path: self.path.clone(),
            });
        }

        let flat = flatten(&TreeNode::from(value), separator);

        // INVARIANT: Never hand out a listing that would lose a value on save.
        if let Some(key) = flat.duplicate_key() {
            return Err(Error::AmbiguousKey {
                key: key.to_owned(),
                path: self.path.clone(),
            });
        }

        Ok(flat)
    }

    /// Save flat listing as nested, sorted document.
    ///
    /// Creates the id directory if missing. If the listing cannot be nested
    /// without losing a value, it is saved flat and sorted instead.
    ///
    /// # Errors
    ///
    /// - Return [`Error::KeyPath`] if listing repeats a key.
    /// - Return [`Error::Serialize`] if document cannot be serialized.
    /// - Return [`Error::CreateDir`] if id directory cannot be created.
    /// - Return [`Error::Write`] if document cannot be written.
    #[instrument(skip(self, flat), level = "debug")]
    pub fn save(&self, flat: &FlatMap, separator: char) -> Result<()> {
        let tree = match unflatten(flat, separator) {
            Ok(tree) => tree,
            Err(KeyPathError::FallbackCollision { key }) => {
                warn!(
                    "cannot nest {key:?} without losing a value, keep {:?} flat",
                    self.path.display()
                );
                TreeNode::Object(flat.to_flat_object()?)
            }
            Err(err) => return Err(err.into()),
        };
        let content = serde_json::to_string_pretty(&Value::from(sort_properties(&tree)))?;

        if let Some(parent) = self.path.parent() {
            mkdirp::mkdirp(parent).map_err(|err| Error::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        write(&self.path, content).map_err(|err| Error::Write {
            source: err,
            path: self.path.clone(),
        })?;
        info!("saved {} secrets to {:?}", flat.len(), self.path.display());

        Ok(())
    }

    /// Rewrite document as nested, sorted document.
    ///
    /// # Errors
    ///
    /// - Return any error [`UserSecrets::load`] or [`UserSecrets::save`] can
    ///   return.
    pub fn format(&self, separator: char) -> Result<()> {
        let flat = self.load(separator)?;
        self.save(&flat, separator)
    }
}

/// User-secrets storage error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Id cannot be used as a directory name.
    #[error("invalid user-secrets id {id:?}")]
    InvalidId { id: String },

    /// Document cannot be read from.
    #[error("failed to read user-secrets at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Document is not valid JSON.
    #[error("failed to parse user-secrets at {:?}", path.display())]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Document is valid JSON, but not an object.
    #[error("user-secrets at {:?} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },

    /// Document spells the same key-path twice.
    #[error("user-secrets at {:?} define {key:?} both nested and flat", path.display())]
    AmbiguousKey { key: String, path: PathBuf },

    /// Listing cannot be written without losing a value.
    #[error(transparent)]
    KeyPath(#[from] KeyPathError),

    /// Id directory cannot be created when missing.
    #[error("failed to create user-secrets directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Document cannot be written to.
    #[error("failed to write user-secrets at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Document cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
