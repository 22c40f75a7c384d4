// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Device-control dispatch
//!
//! The representative passthrough operation: classify the request by its
//! handle, forward file-class commands on the descriptor fixed at open
//! time, and run directory-class commands through the full resolution
//! pipeline.

use crate::branch::Branches;
use crate::config::Config;
use crate::error::{FsError, FsResult};
use crate::handle::{DirHandle, FileHandle, Handle};
use crate::passthrough;
use crate::path;
use crate::policy::SearchPolicy;
use crate::ugid::UgidGuard;
use libc::{c_int, c_ulong, c_void};
use std::path::Path;

/// Ambient caller identity, as reported by the bridge runtime.
#[derive(Clone, Copy, Debug)]
pub struct RequestContext {
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
}

/// Forward `cmd` for `handle`.
///
/// File-class handles reuse the descriptor resolved at open time — no
/// locking, no path resolution. Directory-class handles re-resolve
/// against the live branch table on every call. Any step's failure is
/// terminal for the request; nothing is retried or reinterpreted.
///
/// # Safety
///
/// The payload is untyped; `data` must satisfy the size contract of
/// `cmd`.
pub unsafe fn ioctl(
    config: &Config,
    ctx: &RequestContext,
    handle: &Handle,
    cmd: c_ulong,
    data: *mut c_void,
) -> FsResult<c_int> {
    match handle {
        Handle::File(fi) => unsafe { ioctl_file(fi, cmd, data) },
        Handle::Dir(di) => unsafe { ioctl_dir(config, ctx, di, cmd, data) },
    }
}

unsafe fn ioctl_file(fi: &FileHandle, cmd: c_ulong, data: *mut c_void) -> FsResult<c_int> {
    unsafe { passthrough::ioctl_fd(fi.fd(), cmd, data) }
}

unsafe fn ioctl_dir(
    config: &Config,
    ctx: &RequestContext,
    di: &DirHandle,
    cmd: c_ulong,
    data: *mut c_void,
) -> FsResult<c_int> {
    // Guard order matters: the read lock spans selection through forward
    // so the table cannot be reconfigured mid-resolution, and the
    // impersonation covers every permission-sensitive step. Both unwind
    // on all exits.
    let branches = config.branches();
    let _ugid = UgidGuard::new(ctx.uid, ctx.gid);

    unsafe {
        ioctl_dir_base(
            config.search(),
            &branches,
            config.min_free_space(),
            di.rel_path(),
            cmd,
            data,
        )
    }
}

unsafe fn ioctl_dir_base(
    search: &dyn SearchPolicy,
    branches: &Branches,
    min_free_space: u64,
    rel: &Path,
    cmd: c_ulong,
    data: *mut c_void,
) -> FsResult<c_int> {
    let candidates = search.select(branches, rel, min_free_space)?;
    // Single-target operation: only the selector's first choice is used.
    // A policy returning Ok with no candidates violates its contract.
    let root = candidates.first().ok_or(FsError::NotFound)?;
    unsafe { passthrough::ioctl_path(&path::join(root, rel), cmd, data) }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::branch::{Branch, BranchMode};
    use crate::error::errno_result;
    use crate::policy::{self, MockSearchPolicy};
    use nix::unistd::{getgid, getuid};
    use std::fs;
    use std::io::Write;
    use std::ptr;
    use tempfile::TempDir;

    fn ctx() -> RequestContext {
        RequestContext {
            uid: getuid().as_raw(),
            gid: getgid().as_raw(),
            pid: std::process::id(),
        }
    }

    fn branches_over(dirs: &[&TempDir]) -> Branches {
        Branches::new(
            dirs.iter()
                .map(|d| Branch::new(d.path(), BranchMode::ReadWrite))
                .collect(),
        )
    }

    #[test]
    fn selector_failure_propagates_unchanged() {
        let b1 = TempDir::new().unwrap();
        let mut selector = MockSearchPolicy::new();
        selector
            .expect_select()
            .times(1)
            .returning(|_, _, _| Err(FsError::NoSpace));

        let res = unsafe {
            ioctl_dir_base(
                &selector,
                &branches_over(&[&b1]),
                100,
                Path::new("/docs/a.txt"),
                libc::FIONREAD as c_ulong,
                ptr::null_mut(),
            )
        };
        // The pipeline neither reinterprets the code nor attempts an
        // open (the mock is the only expectation that fires).
        assert_eq!(errno_result(res), -libc::ENOSPC);
    }

    #[test]
    fn only_the_first_candidate_is_used() {
        let b1 = TempDir::new().unwrap();
        let b2 = TempDir::new().unwrap();
        fs::File::create(b1.path().join("a.txt"))
            .unwrap()
            .write_all(b"12345")
            .unwrap();
        // No file in b2: if the pipeline ever fell through to a later
        // candidate this would still succeed, so prove the opposite by
        // listing b2 first.
        let mut selector = MockSearchPolicy::new();
        let first = b1.path().to_path_buf();
        let second = b2.path().to_path_buf();
        selector
            .expect_select()
            .times(1)
            .returning(move |_, _, _| Ok(vec![first.clone(), second.clone()]));

        let mut pending: c_int = 0;
        let rv = unsafe {
            ioctl_dir_base(
                &selector,
                &branches_over(&[&b1, &b2]),
                0,
                Path::new("/a.txt"),
                libc::FIONREAD as c_ulong,
                &mut pending as *mut c_int as *mut c_void,
            )
        }
        .unwrap();
        assert_eq!(rv, 0);
        assert_eq!(pending, 5);
    }

    #[test]
    fn empty_candidate_list_is_a_contract_defect_not_a_panic() {
        let b1 = TempDir::new().unwrap();
        let mut selector = MockSearchPolicy::new();
        selector
            .expect_select()
            .returning(|_, _, _| Ok(Vec::new()));

        let res = unsafe {
            ioctl_dir_base(
                &selector,
                &branches_over(&[&b1]),
                0,
                Path::new("/a.txt"),
                libc::FIONREAD as c_ulong,
                ptr::null_mut(),
            )
        };
        assert_eq!(errno_result(res), -libc::ENOENT);
    }

    #[test]
    fn file_class_requests_touch_no_shared_state() {
        let b1 = TempDir::new().unwrap();
        fs::File::create(b1.path().join("f"))
            .unwrap()
            .write_all(b"abc")
            .unwrap();

        let config = Config::new(
            branches_over(&[&b1]),
            policy::by_name("ff").unwrap(),
            0,
        );
        let fh = FileHandle::open(&config, &ctx(), Path::new("/f"), libc::O_RDONLY).unwrap();
        let handle = Handle::File(fh);

        // Empty the table outright. A dir-class request would now fail
        // in the selector; the file path consults neither the table nor
        // the selector and keeps working on its pinned descriptor.
        config.replace_branches(Branches::default());
        let mut pending: c_int = 0;
        let rv = unsafe {
            ioctl(
                &config,
                &ctx(),
                &handle,
                libc::FIONREAD as c_ulong,
                &mut pending as *mut c_int as *mut c_void,
            )
        }
        .unwrap();
        assert_eq!(rv, 0);
        assert_eq!(pending, 3);
    }

    #[test]
    fn dir_class_requests_resolve_through_the_table() {
        let b1 = TempDir::new().unwrap();
        let b2 = TempDir::new().unwrap();
        fs::File::create(b1.path().join("a.txt"))
            .unwrap()
            .write_all(b"12345")
            .unwrap();
        fs::File::create(b2.path().join("a.txt"))
            .unwrap()
            .write_all(b"12")
            .unwrap();

        let config = Config::new(
            branches_over(&[&b1, &b2]),
            policy::by_name("ff").unwrap(),
            0,
        );
        let handle = Handle::Dir(DirHandle::new("/a.txt"));
        let mut pending: c_int = 0;
        let rv = unsafe {
            ioctl(
                &config,
                &ctx(),
                &handle,
                libc::FIONREAD as c_ulong,
                &mut pending as *mut c_int as *mut c_void,
            )
        }
        .unwrap();
        assert_eq!(rv, 0);
        // First-found resolved b1, whose copy is five bytes.
        assert_eq!(pending, 5);

        // Re-resolution: drop b1 from the table and the same handle now
        // reaches b2's copy.
        let tail = Branches::new(vec![Branch::new(b2.path(), BranchMode::ReadWrite)]);
        config.replace_branches(tail);
        let rv = unsafe {
            ioctl(
                &config,
                &ctx(),
                &handle,
                libc::FIONREAD as c_ulong,
                &mut pending as *mut c_int as *mut c_void,
            )
        }
        .unwrap();
        assert_eq!(rv, 0);
        assert_eq!(pending, 2);
    }
}
