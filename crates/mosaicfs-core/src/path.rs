// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Branch root + union-relative path joining

use std::path::{Path, PathBuf};

/// Join a branch root with a union-relative path.
///
/// Union paths arrive kernel-style with a leading `/`; strip it so the
/// join extends the root instead of replacing it. Traversal validation
/// happens upstream, before paths reach the routing core.
pub fn join(root: &Path, rel: &Path) -> PathBuf {
    root.join(rel.strip_prefix("/").unwrap_or(rel))
}
