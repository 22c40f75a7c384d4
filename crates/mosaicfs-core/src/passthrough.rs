// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scoped open → forward → close passthrough
//!
//! Used when a directory-class operation has no persistent descriptor:
//! the concrete path is opened read-only just long enough to forward one
//! opaque device-control command, and the descriptor is released on
//! every exit path.

use crate::error::{FsError, FsResult};
use libc::{c_int, c_ulong, c_void};
use std::ffi::CString;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Skipping atime updates is an optimization, never a correctness
/// requirement; platforms without the flag get a no-op.
#[cfg(target_os = "linux")]
const O_NOATIME: c_int = libc::O_NOATIME;
#[cfg(not(target_os = "linux"))]
const O_NOATIME: c_int = 0;

/// Flags for transient passthrough opens.
pub(crate) const PASSTHROUGH_FLAGS: c_int = libc::O_RDONLY | O_NOATIME | libc::O_NONBLOCK;

/// Open `path` with the given flags. The returned descriptor closes when
/// dropped.
pub fn open(path: &Path, flags: c_int) -> FsResult<OwnedFd> {
    let cpath =
        CString::new(path.as_os_str().as_bytes()).map_err(|_| FsError::InvalidArgument)?;
    let fd = unsafe { libc::open(cpath.as_ptr(), flags) };
    if fd == -1 {
        return Err(FsError::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Forward one device-control command to the kernel.
///
/// A raw return of `-1` becomes the current errno; any other value,
/// including positive operation-defined payloads, passes through
/// unchanged.
///
/// # Safety
///
/// The payload is untyped; its size is defined entirely by `cmd`.
/// `data` must be valid for whatever reads and writes `cmd` implies.
pub unsafe fn ioctl_fd(fd: RawFd, cmd: c_ulong, data: *mut c_void) -> FsResult<c_int> {
    let rv = unsafe { libc::ioctl(fd, cmd as _, data) };
    if rv == -1 {
        return Err(FsError::last_os_error());
    }
    Ok(rv)
}

/// Open `path`, forward `cmd`, release the descriptor.
///
/// An open failure returns immediately with the open errno and leaves no
/// descriptor behind; a forward failure still closes before propagating.
///
/// # Safety
///
/// Same payload contract as [`ioctl_fd`].
pub unsafe fn ioctl_path(path: &Path, cmd: c_ulong, data: *mut c_void) -> FsResult<c_int> {
    let fd = open(path, PASSTHROUGH_FLAGS)?;
    // The owned descriptor closes when it leaves scope, on success and
    // failure alike.
    unsafe { ioctl_fd(fd.as_raw_fd(), cmd, data) }
}
