// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

#[cfg(target_os = "linux")]
mod linux_tests {
    use std::path::PathBuf;
    use std::process::Command;

    #[test]
    fn fuse_host_binary_help_runs() {
        // This file lives in crates/mosaicfs-fuse-host; walk up to the
        // workspace root to find the shared target directory.
        let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let workspace_root = crate_dir
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace root")
            .to_path_buf();

        let bin_path = workspace_root
            .join("target")
            .join("debug")
            .join("mosaicfs-fuse-host");
        if !bin_path.exists() {
            eprintln!(
                "Skipping FUSE help test: binary not found at {}",
                bin_path.display()
            );
            return;
        }

        // --help must answer without attempting a mount.
        let status = Command::new(&bin_path)
            .arg("--help")
            .status()
            .expect("able to execute mosaicfs-fuse-host");

        assert!(status.success(), "--help should succeed");
    }
}
