//! The self-pipe backing the pool's monitor fd.
//!
//! A worker that exits unexpectedly (idle timeout aside — only a
//! `signal_fn` failure counts) writes one byte here so an external event
//! loop watching [`SelfPipe::monitor_fd`] learns it may need to call
//! `restart_check`.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd::{pipe2, read, write};

pub struct SelfPipe {
    read: Option<OwnedFd>,
    write: Option<OwnedFd>,
}

impl SelfPipe {
    pub fn new() -> io::Result<Self> {
        let (read, write) =
            pipe2(OFlag::O_CLOEXEC).map_err(|e| io::Error::from_raw_os_error(e as i32))?;
        // Read end blocks; write end never blocks the worker that signals
        // completion.
        set_nonblocking(write.as_raw_fd(), true)?;
        Ok(Self {
            read: Some(read),
            write: Some(write),
        })
    }

    pub fn is_open(&self) -> bool {
        self.read.is_some()
    }

    /// Close both ends. Idempotent.
    pub fn close(&mut self) {
        self.read.take();
        self.write.take();
    }

    /// One non-blocking byte write, retrying on `EINTR` once and ignoring
    /// `EAGAIN`/`EWOULDBLOCK` (the pipe already has a byte pending, which is
    /// all a reader needs to know something happened).
    pub fn notify(&self) {
        let Some(write_fd) = &self.write else {
            return;
        };
        for _ in 0..2 {
            match write(write_fd, &[0u8]) {
                Ok(_) => return,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(nix::errno::Errno::EAGAIN) => return,
                Err(_) => return,
            }
        }
    }

    /// Duplicate the read end for external monitoring: close-on-exec,
    /// non-blocking, a fresh descriptor per call.
    pub fn dup_monitor_fd(&self) -> Option<io::Result<OwnedFd>> {
        let read_fd = self.read.as_ref()?;
        Some(dup_cloexec_nonblocking(read_fd.as_raw_fd()))
    }

    /// Drain the read end until it would block. Returns an error if the
    /// pipe itself is broken.
    pub fn drain(&self) -> io::Result<()> {
        let Some(read_fd) = &self.read else {
            return Ok(());
        };
        let mut buf = [0u8; 128];
        loop {
            match read(read_fd.as_raw_fd(), &mut buf) {
                Ok(n) if n == buf.len() => continue,
                Ok(_) => return Ok(()),
                Err(nix::errno::Errno::EINTR) => continue,
                Err(nix::errno::Errno::EAGAIN) => return Ok(()),
                Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
            }
        }
    }
}

fn set_nonblocking(fd: RawFd, nonblocking: bool) -> io::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(|e| io::Error::from_raw_os_error(e as i32))?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.set(OFlag::O_NONBLOCK, nonblocking);
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(|e| io::Error::from_raw_os_error(e as i32))?;
    Ok(())
}

fn dup_cloexec_nonblocking(fd: RawFd) -> io::Result<OwnedFd> {
    let new_fd = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(0))
        .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
    set_nonblocking(new_fd, true)?;
    // SAFETY: `new_fd` was just returned by F_DUPFD_CLOEXEC and is owned
    // by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(new_fd) })
}
