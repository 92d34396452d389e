// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! .NET user-secrets management.
//!
//! The .NET SDK keeps developer secrets outside of the project tree in a
//! single JSON document per project, addressed by the project's
//! `UserSecretsId`. Tooling that writes to this document, e.g.,
//! `dotnet user-secrets set`, keeps it as a flat listing of key-paths like
//! `ConnectionStrings:Default`.
//!
//! # Synchronization
//!
//! Teams commonly keep the canonical copy of their development secrets in an
//! Azure Key Vault. Key Vault secret names cannot contain `:`, so nesting is
//! spelled with `--` instead, e.g., `ConnectionStrings--Default`. The
//! [`vault`] module imports every secret of a vault into the local document,
//! translating the separator along the way.
//!
//! # Formatting
//!
//! After every write, the [`store`] module rewrites the document as a nested,
//! case-insensitively sorted JSON document through the
//! [`keypath`](crate::keypath) codec, which
//! makes the file a lot easier to read and review by hand.
//!
//! # See Also
//!
//! 1. [Safe storage of app secrets](https://learn.microsoft.com/aspnet/core/security/app-secrets)
//! 2. [`keypath`](crate::keypath)

pub mod store;
pub mod vault;

pub use store::UserSecrets;
pub use vault::{sync_secrets, AzureCli, SecretSource, SyncAction, SyncOptions, SyncRecord};
