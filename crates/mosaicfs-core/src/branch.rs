// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Branch table model and branch-spec parsing
//!
//! A branch is one backing directory tree. The table is an ordered
//! sequence; order is search order for every policy that cares.

use crate::error::{FsError, FsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Write policy for one branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchMode {
    /// Fully writable.
    #[default]
    ReadWrite,
    /// Never written.
    ReadOnly,
    /// Writable for existing entries, excluded from creates.
    NoCreate,
}

impl FromStr for BranchMode {
    type Err = FsError;

    fn from_str(s: &str) -> FsResult<Self> {
        match s {
            "RW" => Ok(BranchMode::ReadWrite),
            "RO" => Ok(BranchMode::ReadOnly),
            "NC" => Ok(BranchMode::NoCreate),
            other => Err(FsError::InvalidBranchSpec(format!(
                "unknown mode {other:?}"
            ))),
        }
    }
}

impl fmt::Display for BranchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BranchMode::ReadWrite => "RW",
            BranchMode::ReadOnly => "RO",
            BranchMode::NoCreate => "NC",
        })
    }
}

/// One backing root. Entries are immutable once inserted; changing the
/// set means replacing the whole table under the write lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Absolute base path of the backing tree.
    pub path: PathBuf,
    #[serde(default)]
    pub mode: BranchMode,
    /// Bytes that must stay available for this branch to accept new
    /// entries. Zero disables the floor.
    #[serde(default)]
    pub min_free_space: u64,
}

impl Branch {
    pub fn new(path: impl Into<PathBuf>, mode: BranchMode) -> Self {
        Self {
            path: path.into(),
            mode,
            min_free_space: 0,
        }
    }

    /// Parse a `PATH[=MODE[,MINFREE]]` spec, e.g. `/mnt/disk1`,
    /// `/mnt/disk1=RO` or `/mnt/disk2=RW,10G`.
    pub fn parse(spec: &str) -> FsResult<Branch> {
        let (path, opts) = match spec.split_once('=') {
            Some((p, o)) => (p, Some(o)),
            None => (spec, None),
        };
        if path.is_empty() {
            return Err(FsError::InvalidBranchSpec("empty branch path".into()));
        }

        let mut branch = Branch::new(path, BranchMode::default());
        if let Some(opts) = opts {
            let mut parts = opts.split(',');
            if let Some(mode) = parts.next().filter(|m| !m.is_empty()) {
                branch.mode = mode.parse()?;
            }
            if let Some(minfree) = parts.next() {
                branch.min_free_space = parse_size(minfree)?;
            }
            if parts.next().is_some() {
                return Err(FsError::InvalidBranchSpec(format!(
                    "trailing options in {spec:?}"
                )));
            }
        }
        Ok(branch)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.path.display(), self.mode)?;
        if self.min_free_space > 0 {
            write!(f, ",{}", self.min_free_space)?;
        }
        Ok(())
    }
}

/// Parse a byte count with an optional K/M/G/T suffix (powers of 1024).
pub fn parse_size(s: &str) -> FsResult<u64> {
    let s = s.trim();
    let (digits, unit) = match s.chars().last() {
        Some('K') | Some('k') => (&s[..s.len() - 1], 1u64 << 10),
        Some('M') | Some('m') => (&s[..s.len() - 1], 1u64 << 20),
        Some('G') | Some('g') => (&s[..s.len() - 1], 1u64 << 30),
        Some('T') | Some('t') => (&s[..s.len() - 1], 1u64 << 40),
        _ => (s, 1),
    };
    let n: u64 = digits
        .parse()
        .map_err(|_| FsError::InvalidBranchSpec(format!("bad size {s:?}")))?;
    n.checked_mul(unit)
        .ok_or_else(|| FsError::InvalidBranchSpec(format!("size overflow {s:?}")))
}

/// Ordered branch table. Read-shared by every concurrent resolution; a
/// writer swaps the whole value under the exclusive lock in [`Config`].
///
/// [`Config`]: crate::config::Config
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branches(Vec<Branch>);

impl Branches {
    pub fn new(branches: Vec<Branch>) -> Self {
        Self(branches)
    }

    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> FsResult<Self> {
        specs
            .iter()
            .map(|s| Branch::parse(s.as_ref()))
            .collect::<FsResult<Vec<_>>>()
            .map(Self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Branch> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
