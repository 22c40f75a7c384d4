// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Shared mount configuration
//!
//! The branch table is the only state shared across concurrent requests.
//! It lives behind a reader-writer lock; a resolution holds the read
//! guard across its entire read-then-forward sequence so a
//! reconfiguration can never interleave mid-resolution.

use crate::branch::{parse_size, Branches};
use crate::error::{FsError, FsResult};
use crate::policy::{self, SearchPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard};
use tracing::info;

pub struct Config {
    branches: RwLock<Branches>,
    min_free_space: u64,
    search: Box<dyn SearchPolicy>,
}

impl Config {
    pub fn new(branches: Branches, search: Box<dyn SearchPolicy>, min_free_space: u64) -> Self {
        Self {
            branches: RwLock::new(branches),
            min_free_space,
            search,
        }
    }

    /// Read-shared view of the branch table. Callers keep the guard
    /// alive across every step that depends on the table.
    pub fn branches(&self) -> RwLockReadGuard<'_, Branches> {
        self.branches.read().unwrap()
    }

    /// Wholesale replacement under the exclusive lock. Blocks until all
    /// in-flight resolutions release their read guards; returns the
    /// previous table.
    pub fn replace_branches(&self, next: Branches) -> Branches {
        let mut guard = self.branches.write().unwrap();
        info!(branches = next.len(), "replacing branch table");
        std::mem::replace(&mut *guard, next)
    }

    /// Global free-space floor handed to the search policy.
    pub fn min_free_space(&self) -> u64 {
        self.min_free_space
    }

    pub fn search(&self) -> &dyn SearchPolicy {
        self.search.as_ref()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("branches", &*self.branches())
            .field("min_free_space", &self.min_free_space)
            .field("search", &self.search.name())
            .finish()
    }
}

/// Mount settings as loaded from CLI flags or a JSON settings file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Branch specs, `PATH[=MODE[,MINFREE]]`, searched in order.
    pub branches: Vec<String>,
    /// Free-space floor as a byte count with optional K/M/G/T suffix.
    #[serde(default)]
    pub min_free_space: Option<String>,
    /// Search policy name.
    #[serde(default = "default_policy")]
    pub search_policy: String,
}

fn default_policy() -> String {
    "ff".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            branches: Vec::new(),
            min_free_space: None,
            search_policy: default_policy(),
        }
    }
}

impl Settings {
    /// Validate and build the runtime configuration. All spec and policy
    /// errors surface here, before mount, never at request time.
    pub fn build(&self) -> FsResult<Config> {
        if self.branches.is_empty() {
            return Err(FsError::InvalidBranchSpec("no branches configured".into()));
        }
        let branches = Branches::from_specs(&self.branches)?;
        let search = policy::by_name(&self.search_policy)?;
        let min_free_space = match &self.min_free_space {
            Some(s) => parse_size(s)?,
            None => 0,
        };
        Ok(Config::new(branches, search, min_free_space))
    }
}
