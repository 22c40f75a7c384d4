// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scoped caller impersonation
//!
//! Backing-filesystem permission checks must see the requesting user,
//! not the service process. On Linux the guard switches the per-thread
//! filesystem uid/gid for its lifetime and restores the prior identity
//! on drop, on every exit path.

#[cfg(target_os = "linux")]
mod imp {
    use nix::unistd::{setfsgid, setfsuid, Gid, Uid};
    use std::marker::PhantomData;

    /// Reverts the filesystem uid/gid when dropped.
    ///
    /// Not `Send`: fsuid/fsgid are per-thread state, so the guard must
    /// die on the thread that created it.
    pub struct UgidGuard {
        prev_uid: Uid,
        prev_gid: Gid,
        _thread_bound: PhantomData<*mut ()>,
    }

    impl UgidGuard {
        pub fn new(uid: u32, gid: u32) -> Self {
            // Group first, while the thread may still be privileged
            // enough to switch it.
            let prev_gid = setfsgid(Gid::from_raw(gid));
            let prev_uid = setfsuid(Uid::from_raw(uid));
            UgidGuard {
                prev_uid,
                prev_gid,
                _thread_bound: PhantomData,
            }
        }
    }

    impl Drop for UgidGuard {
        fn drop(&mut self) {
            setfsuid(self.prev_uid);
            setfsgid(self.prev_gid);
        }
    }

    /// Current filesystem uid of this thread. Passing an out-of-range id
    /// makes setfsuid report without switching.
    pub fn current_fsuid() -> u32 {
        setfsuid(Uid::from_raw(u32::MAX)).as_raw()
    }

    /// Current filesystem gid of this thread.
    pub fn current_fsgid() -> u32 {
        setfsgid(Gid::from_raw(u32::MAX)).as_raw()
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    /// No-op stand-in for platforms without per-thread filesystem ids.
    pub struct UgidGuard;

    impl UgidGuard {
        pub fn new(_uid: u32, _gid: u32) -> Self {
            UgidGuard
        }
    }
}

pub use imp::*;
