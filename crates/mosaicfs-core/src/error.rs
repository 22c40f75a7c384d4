// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the MosaicFS core

use libc::c_int;
use std::io;

/// Core routing error type
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not a directory")]
    NotADirectory,
    #[error("no space left")]
    NoSpace,
    #[error("read-only branch")]
    ReadOnly,
    #[error("unknown policy {0:?}")]
    UnknownPolicy(String),
    #[error("invalid branch spec: {0}")]
    InvalidBranchSpec(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported")]
    Unsupported,
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// The errno this failure surfaces as. `Io` keeps the raw OS code so
    /// open and forward failures report exactly what the syscall did.
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AccessDenied => libc::EACCES,
            FsError::InvalidArgument
            | FsError::UnknownPolicy(_)
            | FsError::InvalidBranchSpec(_) => libc::EINVAL,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::NoSpace => libc::ENOSPC,
            FsError::ReadOnly => libc::EROFS,
            FsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            FsError::Unsupported => libc::ENOTSUP,
        }
    }

    /// Capture the calling thread's current errno.
    pub(crate) fn last_os_error() -> FsError {
        FsError::Io(io::Error::last_os_error())
    }
}

/// Flatten a forwarded result into the bridge runtime's integer
/// convention: non-negative success payloads pass through unchanged,
/// failures become the negated errno.
pub fn errno_result(res: FsResult<c_int>) -> c_int {
    match res {
        Ok(v) => v,
        Err(e) => -e.errno(),
    }
}
