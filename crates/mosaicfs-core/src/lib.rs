// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! MosaicFS core — branch resolution and passthrough dispatch for a
//! union filesystem.
//!
//! A mount aggregates several backing directory trees ("branches") into
//! one namespace. This crate decides which branch satisfies each
//! request, resolves the concrete backing path, and forwards the raw
//! operation with POSIX error semantics preserved. The bridge runtime
//! (see `mosaicfs-fuse-host`) stays thin: it translates kernel requests
//! into [`ioctl`], [`ops`] and [`handle`] calls and maps typed failures
//! back to errnos.

pub mod branch;
pub mod config;
pub mod error;
pub mod handle;
pub mod ioctl;
pub mod ops;
pub mod passthrough;
pub mod path;
pub mod policy;
pub mod ugid;

pub use branch::{Branch, BranchMode, Branches};
pub use config::{Config, Settings};
pub use error::{errno_result, FsError, FsResult};
pub use handle::{DirHandle, FileHandle, Handle};
pub use ioctl::RequestContext;
pub use policy::SearchPolicy;
pub use ugid::UgidGuard;
