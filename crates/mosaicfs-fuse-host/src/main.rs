// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! MosaicFS FUSE Host — union filesystem adapter
//!
//! This binary mounts a union of backing branches at a single mount
//! point and routes kernel requests into the MosaicFS core.

#[cfg(all(feature = "fuse", target_os = "linux"))]
mod adapter;

use anyhow::{Context, Result};
use clap::Parser;
use mosaicfs_core::Settings;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
struct Args {
    /// Mount point for the union
    mount_point: PathBuf,

    /// Branch spec `PATH[=MODE[,MINFREE]]`; may be given multiple times,
    /// searched in order
    #[arg(short, long = "branch")]
    branches: Vec<String>,

    /// Search policy (`ff`, `mfs`)
    #[arg(long)]
    policy: Option<String>,

    /// Free-space floor handed to the search policy (K/M/G/T suffixes)
    #[arg(long)]
    min_free_space: Option<String>,

    /// Settings file (JSON); CLI flags override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Allow other users to access the filesystem
    #[arg(long)]
    allow_other: bool,

    /// Auto unmount on process exit
    #[arg(long)]
    auto_unmount: bool,
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading settings file {}", path.display()))?;
            serde_json::from_str(&content).context("parsing settings file")?
        }
        None => Settings::default(),
    };

    if !args.branches.is_empty() {
        settings.branches = args.branches.clone();
    }
    if let Some(policy) = &args.policy {
        settings.search_policy = policy.clone();
    }
    if let Some(floor) = &args.min_free_space {
        settings.min_free_space = Some(floor.clone());
    }
    Ok(settings)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    info!("Starting MosaicFS FUSE Host");
    info!("Mount point: {}", args.mount_point.display());

    let settings = load_settings(&args)?;
    let config = settings.build().context("invalid mount settings")?;
    info!(
        branches = config.branches().len(),
        policy = config.search().name(),
        min_free_space = config.min_free_space(),
        "configuration loaded"
    );

    #[cfg(all(feature = "fuse", target_os = "linux"))]
    {
        use std::sync::Arc;

        let filesystem = adapter::MosaicFuse::new(Arc::new(config));

        let mut mount_options = vec![
            fuser::MountOption::FSName("mosaicfs".to_string()),
            fuser::MountOption::Subtype("mosaicfs".to_string()),
            fuser::MountOption::DefaultPermissions,
        ];

        if args.allow_other {
            mount_options.push(fuser::MountOption::AllowOther);
        }

        if args.auto_unmount {
            mount_options.push(fuser::MountOption::AutoUnmount);
        }

        info!("Mounting filesystem...");
        let session = fuser::spawn_mount2(filesystem, &args.mount_point, &mount_options)?;
        info!("MosaicFS FUSE host mounted; blocking until unmount");
        session.join();
    }

    #[cfg(not(all(feature = "fuse", target_os = "linux")))]
    {
        let _ = config;
        warn!("FUSE support not compiled in. This binary is for testing only.");
        info!("To enable FUSE support, compile with: cargo build --features fuse");
    }

    Ok(())
}
