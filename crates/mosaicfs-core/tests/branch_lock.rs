// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Reader/writer discipline on the shared branch table.

use mosaicfs_core::{Branch, BranchMode, Branches, Config, policy};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn config_with(path: &str) -> Arc<Config> {
    Arc::new(Config::new(
        Branches::new(vec![Branch::new(path, BranchMode::ReadWrite)]),
        policy::by_name("ff").unwrap(),
        0,
    ))
}

#[test]
fn readers_share_the_table_concurrently() {
    let config = config_with("/b1");
    let both_holding = Arc::new(Barrier::new(2));

    let threads: Vec<_> = (0..2)
        .map(|_| {
            let config = Arc::clone(&config);
            let both_holding = Arc::clone(&both_holding);
            thread::spawn(move || {
                let guard = config.branches();
                // Rendezvous while both guards are live: if readers
                // excluded each other this would deadlock.
                both_holding.wait();
                assert_eq!(guard.len(), 1);
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }
}

#[test]
fn writer_blocks_until_readers_release() {
    let config = config_with("/old");

    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let reader = thread::spawn({
        let config = Arc::clone(&config);
        move || {
            let guard = config.branches();
            held_tx.send(()).unwrap();
            // Hold the read guard until the main thread says otherwise,
            // standing in for a resolution still in flight.
            release_rx.recv().unwrap();
            assert_eq!(guard.iter().next().unwrap().path.as_os_str(), "/old");
        }
    });
    held_rx.recv().unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let writer = thread::spawn({
        let config = Arc::clone(&config);
        move || {
            config.replace_branches(Branches::new(vec![Branch::new(
                "/new",
                BranchMode::ReadWrite,
            )]));
            done_tx.send(()).unwrap();
        }
    });

    // The exclusive swap must not complete while the resolution holds
    // its read guard.
    assert!(
        done_rx.recv_timeout(Duration::from_millis(200)).is_err(),
        "branch table replaced mid-resolution"
    );

    release_tx.send(()).unwrap();
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("writer finished once readers released");

    reader.join().unwrap();
    writer.join().unwrap();

    assert_eq!(
        config.branches().iter().next().unwrap().path.as_os_str(),
        "/new"
    );
}

#[test]
fn replacement_is_wholesale() {
    let config = config_with("/old");
    let old = config.replace_branches(Branches::new(vec![
        Branch::new("/n1", BranchMode::ReadWrite),
        Branch::new("/n2", BranchMode::ReadOnly),
    ]));

    assert_eq!(old.len(), 1);
    let guard = config.branches();
    let paths: Vec<_> = guard.iter().map(|b| b.path.clone()).collect();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].as_os_str(), "/n1");
    assert_eq!(paths[1].as_os_str(), "/n2");
}
