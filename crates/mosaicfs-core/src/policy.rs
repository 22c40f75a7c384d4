// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Branch search policies
//!
//! A search policy turns (branch table, union-relative path, free-space
//! floor) into an ordered list of candidate branch roots. Callers honor
//! the order; single-target operations consume only the first candidate.

use crate::branch::Branches;
use crate::error::{FsError, FsResult};
use crate::path;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait SearchPolicy: Send + Sync {
    /// Policy name as used in configuration.
    fn name(&self) -> &'static str;

    /// Ordered candidate branch roots for `rel`, or a typed failure.
    ///
    /// An implementation returning `Ok` must yield at least one
    /// candidate. Existence checks use lstat semantics so symlinks count
    /// as present even when their targets are not.
    fn select(
        &self,
        branches: &Branches,
        rel: &Path,
        min_free_space: u64,
    ) -> FsResult<Vec<PathBuf>>;
}

impl std::fmt::Debug for dyn SearchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPolicy").field("name", &self.name()).finish()
    }
}

/// `ff`: the first branch, in table order, containing the path.
///
/// The floor parameter is part of the selector contract but `ff` does
/// not filter on it; the floor constrains create-class placement, and
/// searching must still find entries on full disks.
pub struct FirstFound;

impl SearchPolicy for FirstFound {
    fn name(&self) -> &'static str {
        "ff"
    }

    fn select(
        &self,
        branches: &Branches,
        rel: &Path,
        _min_free_space: u64,
    ) -> FsResult<Vec<PathBuf>> {
        for branch in branches.iter() {
            if fs::symlink_metadata(path::join(&branch.path, rel)).is_ok() {
                return Ok(vec![branch.path.clone()]);
            }
        }
        Err(FsError::NotFound)
    }
}

/// `mfs`: every branch containing the path with at least
/// `min_free_space` bytes available, most available space first.
///
/// Distinguishes "no branch has the path" (not found) from "branches
/// have it but none meets the floor" (no space).
pub struct MostFreeSpace;

impl SearchPolicy for MostFreeSpace {
    fn name(&self) -> &'static str {
        "mfs"
    }

    fn select(
        &self,
        branches: &Branches,
        rel: &Path,
        min_free_space: u64,
    ) -> FsResult<Vec<PathBuf>> {
        let mut found = false;
        let mut eligible: Vec<(u64, PathBuf)> = Vec::new();
        for branch in branches.iter() {
            if fs::symlink_metadata(path::join(&branch.path, rel)).is_err() {
                continue;
            }
            found = true;
            let avail = match available_bytes(&branch.path) {
                Ok(n) => n,
                Err(_) => continue,
            };
            if avail < min_free_space {
                continue;
            }
            eligible.push((avail, branch.path.clone()));
        }

        if eligible.is_empty() {
            return Err(if found {
                FsError::NoSpace
            } else {
                FsError::NotFound
            });
        }
        eligible.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(eligible.into_iter().map(|(_, p)| p).collect())
    }
}

/// Bytes available to unprivileged writers on the filesystem holding
/// `path`.
fn available_bytes(path: &Path) -> FsResult<u64> {
    let vfs = nix::sys::statvfs::statvfs(path).map_err(|e| FsError::Io(e.into()))?;
    Ok(vfs.blocks_available() as u64 * vfs.fragment_size() as u64)
}

/// Look up a policy by its configuration name.
pub fn by_name(name: &str) -> FsResult<Box<dyn SearchPolicy>> {
    match name {
        "ff" => Ok(Box::new(FirstFound)),
        "mfs" => Ok(Box::new(MostFreeSpace)),
        other => Err(FsError::UnknownPolicy(other.to_string())),
    }
}
