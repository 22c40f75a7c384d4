// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! MosaicFS FUSE adapter
//!
//! Maps FUSE operations to MosaicFS core routing calls. The adapter owns
//! the inode and handle tables; everything branch-related happens in the
//! core.

#[cfg(not(all(feature = "fuse", target_os = "linux")))]
compile_error!("This module requires the 'fuse' feature on Linux");

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, Request, FUSE_ROOT_ID,
};
use libc::{c_int, c_ulong, c_void, EBADF, EIO, ENOENT, ENOTDIR};
use mosaicfs_core::{ioctl, ops, DirHandle, FileHandle, Handle};
use mosaicfs_core::{Config, RequestContext};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing::debug;

const TTL: Duration = Duration::from_secs(1);

/// Directory bit of the FUSE ioctl flags word.
const FUSE_IOCTL_DIR: u32 = 1 << 4;

pub struct MosaicFuse {
    config: Arc<Config>,
    /// inode -> union-relative path, and the reverse
    inodes: HashMap<u64, PathBuf>,
    paths: HashMap<PathBuf, u64>,
    next_ino: u64,
    handles: HashMap<u64, Handle>,
    next_fh: u64,
}

impl MosaicFuse {
    pub fn new(config: Arc<Config>) -> Self {
        let root = PathBuf::from("/");
        let mut inodes = HashMap::new();
        let mut paths = HashMap::new();
        inodes.insert(FUSE_ROOT_ID, root.clone());
        paths.insert(root, FUSE_ROOT_ID);
        Self {
            config,
            inodes,
            paths,
            next_ino: FUSE_ROOT_ID + 1,
            handles: HashMap::new(),
            next_fh: 1,
        }
    }

    fn request_context(req: &Request<'_>) -> RequestContext {
        RequestContext {
            uid: req.uid(),
            gid: req.gid(),
            pid: req.pid(),
        }
    }

    fn inode_path(&self, ino: u64) -> Option<PathBuf> {
        self.inodes.get(&ino).cloned()
    }

    fn get_or_alloc_inode(&mut self, rel: &Path) -> u64 {
        if let Some(&ino) = self.paths.get(rel) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.inodes.insert(ino, rel.to_path_buf());
        self.paths.insert(rel.to_path_buf(), ino);
        ino
    }

    fn register_handle(&mut self, handle: Handle) -> u64 {
        let fh = self.next_fh;
        self.next_fh += 1;
        self.handles.insert(fh, handle);
        fh
    }

    fn attr_for(&mut self, rel: &Path, meta: &std::fs::Metadata) -> FileAttr {
        FileAttr {
            ino: self.get_or_alloc_inode(rel),
            size: meta.len(),
            blocks: meta.blocks(),
            atime: UNIX_EPOCH
                + Duration::new(meta.atime().max(0) as u64, meta.atime_nsec() as u32),
            mtime: UNIX_EPOCH
                + Duration::new(meta.mtime().max(0) as u64, meta.mtime_nsec() as u32),
            ctime: UNIX_EPOCH
                + Duration::new(meta.ctime().max(0) as u64, meta.ctime_nsec() as u32),
            crtime: UNIX_EPOCH,
            kind: kind_of(&meta.file_type()),
            perm: (meta.mode() & 0o7777) as u16,
            nlink: meta.nlink() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev() as u32,
            blksize: meta.blksize() as u32,
            flags: 0,
        }
    }
}

fn kind_of(ft: &std::fs::FileType) -> FileType {
    if ft.is_dir() {
        FileType::Directory
    } else if ft.is_symlink() {
        FileType::Symlink
    } else if ft.is_fifo() {
        FileType::NamedPipe
    } else if ft.is_socket() {
        FileType::Socket
    } else if ft.is_char_device() {
        FileType::CharDevice
    } else if ft.is_block_device() {
        FileType::BlockDevice
    } else {
        FileType::RegularFile
    }
}

fn io_errno(e: io::Error) -> c_int {
    e.raw_os_error().unwrap_or(EIO)
}

impl Filesystem for MosaicFuse {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let parent_path = match self.inode_path(parent) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        let rel = parent_path.join(name);
        let ctx = Self::request_context(req);

        match ops::getattr(&self.config, &ctx, &rel) {
            Ok(meta) => {
                let attr = self.attr_for(&rel, &meta);
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let rel = match self.inode_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        let ctx = Self::request_context(req);

        match ops::getattr(&self.config, &ctx, &rel) {
            Ok(meta) => {
                let attr = self.attr_for(&rel, &meta);
                reply.attr(&TTL, &attr);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn open(&mut self, req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let rel = match self.inode_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        let ctx = Self::request_context(req);

        match FileHandle::open(&self.config, &ctx, &rel, flags) {
            Ok(handle) => {
                debug!("open: {} on {}", rel.display(), handle.branch().display());
                let fh = self.register_handle(Handle::File(handle));
                reply.opened(fh, 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let fd = match self.handles.get(&fh) {
            Some(Handle::File(fi)) => fi.fd(),
            _ => {
                reply.error(EBADF);
                return;
            }
        };

        let mut buf = vec![0u8; size as usize];
        let rv = unsafe {
            libc::pread(
                fd,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                offset as libc::off_t,
            )
        };
        if rv < 0 {
            reply.error(io_errno(io::Error::last_os_error()));
            return;
        }
        buf.truncate(rv as usize);
        reply.data(&buf);
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        // Dropping a file handle closes its descriptor.
        self.handles.remove(&fh);
        reply.ok();
    }

    fn opendir(&mut self, req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let rel = match self.inode_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        let ctx = Self::request_context(req);

        match ops::getattr(&self.config, &ctx, &rel) {
            Ok(meta) if meta.is_dir() => {
                // Directory handles carry only the logical path; every
                // later call re-resolves against the live branch table.
                let fh = self.register_handle(Handle::Dir(DirHandle::new(rel)));
                reply.opened(fh, 0);
            }
            Ok(_) => reply.error(ENOTDIR),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let rel = match self.handles.get(&fh) {
            Some(Handle::Dir(di)) => di.rel_path().to_path_buf(),
            _ => {
                reply.error(EBADF);
                return;
            }
        };
        let ctx = Self::request_context(req);

        match ops::readdir(&self.config, &ctx, &rel) {
            Ok(entries) => {
                for (i, (name, file_type)) in
                    entries.iter().enumerate().skip(offset as usize)
                {
                    let entry_rel = rel.join(name);
                    let entry_ino = self.get_or_alloc_inode(&entry_rel);
                    if reply.add(entry_ino, (i + 1) as i64, kind_of(file_type), name) {
                        break;
                    }
                }
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        self.handles.remove(&fh);
        reply.ok();
    }

    fn ioctl(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        flags: u32,
        cmd: u32,
        in_data: &[u8],
        out_size: u32,
        reply: fuser::ReplyIoctl,
    ) {
        debug!("ioctl: ino={}, fh={}, cmd={:#x}", ino, fh, cmd);
        let ctx = Self::request_context(req);

        let handle = match self.handles.get(&fh) {
            Some(h) => h,
            None => {
                reply.error(EBADF);
                return;
            }
        };
        // The classification bit and the handle variant were fixed
        // together at open time; disagreement is a caller defect.
        debug_assert_eq!(flags & FUSE_IOCTL_DIR != 0, handle.is_dir());

        // Untyped payload: the command code defines its size. The kernel
        // hands us the in-buffer and the expected out-size; give the
        // command one buffer large enough for both directions.
        let mut data = in_data.to_vec();
        if data.len() < out_size as usize {
            data.resize(out_size as usize, 0);
        }

        let res = unsafe {
            ioctl::ioctl(
                &self.config,
                &ctx,
                handle,
                cmd as c_ulong,
                data.as_mut_ptr() as *mut c_void,
            )
        };
        match res {
            Ok(rv) => reply.ioctl(rv, &data[..out_size as usize]),
            Err(e) => reply.error(e.errno()),
        }
    }
}
