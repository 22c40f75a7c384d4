// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Routed metadata operations
//!
//! Same pipeline as device-control dispatch: read-lock the table,
//! impersonate the caller, select, resolve the first candidate, forward.
//! Directory listings deliberately come from that single branch; merging
//! entries across branches is a different, higher-level operation.

use crate::config::Config;
use crate::error::{FsError, FsResult};
use crate::ioctl::RequestContext;
use crate::path;
use crate::ugid::UgidGuard;
use std::ffi::OsString;
use std::fs::{self, FileType, Metadata};
use std::path::Path;

/// Stat `rel` on the branch the search policy resolves it to. Symlinks
/// are reported as themselves, not followed.
pub fn getattr(config: &Config, ctx: &RequestContext, rel: &Path) -> FsResult<Metadata> {
    let branches = config.branches();
    let _ugid = UgidGuard::new(ctx.uid, ctx.gid);
    let candidates = config
        .search()
        .select(&branches, rel, config.min_free_space())?;
    let root = candidates.first().ok_or(FsError::NotFound)?;
    Ok(fs::symlink_metadata(path::join(root, rel))?)
}

/// List the directory `rel` resolves to. Entries come from the
/// selector's first candidate only.
pub fn readdir(
    config: &Config,
    ctx: &RequestContext,
    rel: &Path,
) -> FsResult<Vec<(OsString, FileType)>> {
    let branches = config.branches();
    let _ugid = UgidGuard::new(ctx.uid, ctx.gid);
    let candidates = config
        .search()
        .select(&branches, rel, config.min_free_space())?;
    let root = candidates.first().ok_or(FsError::NotFound)?;

    let mut entries = Vec::new();
    for entry in fs::read_dir(path::join(root, rel))? {
        let entry = entry?;
        entries.push((entry.file_name(), entry.file_type()?));
    }
    Ok(entries)
}
