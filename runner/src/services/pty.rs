//! Pseudo-terminal plumbing for supervised children
//!
//! Children get the slave side as stdin/stdout/stderr so they see a
//! terminal and line-buffer their output. The harness reads the master side
//! through [`PtyReader`], a non-blocking reader driven by the tokio reactor.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use nix::pty::{OpenptyResult, openpty};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::RunnerResult;

/// Both ends of a freshly opened pseudo-terminal
pub struct Pty {
    pub master: OwnedFd,
    pub slave: OwnedFd,
}

impl Pty {
    pub fn open() -> RunnerResult<Self> {
        let OpenptyResult { master, slave } = openpty(None, None)?;
        // Children only get the slave through their dup'ed stdio
        for fd in [&master, &slave] {
            fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        }
        Ok(Self { master, slave })
    }
}

nix::ioctl_write_int_bad!(set_controlling_terminal, nix::libc::TIOCSCTTY);

/// Make the terminal on `fd` the controlling terminal of the calling session
///
/// Only meaningful right after `setsid` in the child.
pub fn acquire_controlling_terminal(fd: RawFd) -> nix::Result<()> {
    // SAFETY: TIOCSCTTY takes an integer argument and touches no memory
    unsafe { set_controlling_terminal(fd, 0) }.map(drop)
}

/// Async reader over the master side of a pseudo-terminal
pub struct PtyReader {
    inner: AsyncFd<OwnedFd>,
}

impl PtyReader {
    pub fn new(master: OwnedFd) -> io::Result<Self> {
        let flags = fcntl(master.as_raw_fd(), FcntlArg::F_GETFL).map_err(io::Error::from)?;
        let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        fcntl(master.as_raw_fd(), FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;

        Ok(Self {
            inner: AsyncFd::new(master)?,
        })
    }
}

impl AsyncRead for PtyReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.inner.poll_read_ready(cx))?;

            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| read_master(inner.get_ref(), unfilled)) {
                Ok(Ok(read)) => {
                    buf.advance(read);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                Err(_would_block) => continue,
            }
        }
    }
}

fn read_master(fd: &OwnedFd, buf: &mut [u8]) -> io::Result<usize> {
    match nix::unistd::read(fd.as_raw_fd(), buf) {
        Ok(read) => Ok(read),
        // Linux reports EIO once every slave descriptor is closed
        Err(Errno::EIO) => Ok(0),
        Err(err) => Err(io::Error::from(err)),
    }
}
