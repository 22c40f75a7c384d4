// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-open handle state
//!
//! A file handle carries the descriptor resolved at open time; ioctl-class
//! operations reuse it verbatim and never re-resolve. A directory handle
//! carries only the union-relative path, because directory-class
//! operations must observe branch-table changes and re-resolve per call.

use crate::config::Config;
use crate::error::{FsError, FsResult};
use crate::ioctl::RequestContext;
use crate::passthrough;
use crate::path;
use crate::ugid::UgidGuard;
use libc::c_int;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

/// Open-file state. The descriptor and winning branch are fixed for the
/// file's lifetime.
#[derive(Debug)]
pub struct FileHandle {
    fd: OwnedFd,
    branch: PathBuf,
}

impl FileHandle {
    /// Routed open: resolve `rel` through the search policy and open it
    /// on the winning branch with the caller's flags.
    pub fn open(
        config: &Config,
        ctx: &RequestContext,
        rel: &Path,
        flags: c_int,
    ) -> FsResult<FileHandle> {
        let branches = config.branches();
        let _ugid = UgidGuard::new(ctx.uid, ctx.gid);
        let candidates = config
            .search()
            .select(&branches, rel, config.min_free_space())?;
        let root = candidates.first().ok_or(FsError::NotFound)?;
        let fd = passthrough::open(&path::join(root, rel), flags)?;
        Ok(FileHandle {
            fd,
            branch: root.clone(),
        })
    }

    pub fn fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Branch this handle was opened against.
    pub fn branch(&self) -> &Path {
        &self.branch
    }
}

/// Open-directory state: the logical path only, re-resolved per call.
pub struct DirHandle {
    rel_path: PathBuf,
}

impl DirHandle {
    pub fn new(rel_path: impl Into<PathBuf>) -> Self {
        Self {
            rel_path: rel_path.into(),
        }
    }

    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }
}

/// Tagged per-open state. The variant is the classification: a request
/// carrying the directory bit must find a `Dir` handle registered for
/// it, so a wrong-variant access is a defect caught where handles are
/// constructed, not at use.
pub enum Handle {
    File(FileHandle),
    Dir(DirHandle),
}

impl Handle {
    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }
}
