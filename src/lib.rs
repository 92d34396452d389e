// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Everyday chores of .NET development.
//!
//! A small set of repetitive tasks that tend to pile up when working on .NET
//! projects:
//!
//! - Import secrets of an Azure Key Vault into a project's user-secrets
//!   document, and keep that document nested and sorted ([`secrets`]).
//! - Stash local changes, fetch, rebase onto upstream, and restore the stash
//!   in one go ([`rebase`]).
//! - Remove `bin` and `obj` build artifact directories recursively
//!   ([`clean`]).
//!
//! At the heart of the user-secrets handling sits the [`keypath`] codec,
//! which turns a flat listing of `Section:Sub:Key` entries into a nested
//! document and back again.

pub mod clean;
pub mod config;
pub mod keypath;
pub mod path;
pub mod rebase;
pub mod secrets;
