//! Readiness registration for the engine's socket
//!
//! The engine owns its descriptor; the driver only watches it. Readiness is
//! level-triggered from the driver's point of view: a wait resolves for as
//! long as the descriptor stays readable (or writable), and readiness is
//! cleared only after a zero-timeout `poll(2)` confirms it went away.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

/// Borrowed view of the engine's descriptor. Dropping it never closes the fd.
#[derive(Debug)]
struct EngineFd(RawFd);

impl AsRawFd for EngineFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Read,
    Write,
}

impl Readiness {
    fn poll_events(self) -> libc::c_short {
        match self {
            Readiness::Read => libc::POLLIN,
            Readiness::Write => libc::POLLOUT,
        }
    }
}

/// Put a descriptor into non-blocking mode
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // Safety: plain fcntl flag manipulation; an invalid fd yields EBADF
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if flags & libc::O_NONBLOCK == 0
            && libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0
        {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Zero-timeout readiness check. Hang-up and error conditions count as ready
/// so the engine's next step gets to observe them.
fn poll_now(fd: RawFd, readiness: Readiness) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: readiness.poll_events(),
        revents: 0,
    };

    // Safety: one valid pollfd on the stack, zero timeout
    let rc = unsafe { libc::poll(&mut pollfd, 1, 0) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }

    Ok(rc > 0 && pollfd.revents != 0)
}

/// The engine socket registered with the reactor
#[derive(Debug)]
pub struct SocketRegistration {
    inner: AsyncFd<EngineFd>,
}

impl SocketRegistration {
    /// Switch the descriptor to non-blocking mode and register it for both
    /// read and write interest
    pub fn register(fd: RawFd) -> io::Result<Self> {
        set_nonblocking(fd)?;
        let inner = AsyncFd::with_interest(EngineFd(fd), Interest::READABLE | Interest::WRITABLE)?;
        Ok(Self { inner })
    }

    pub fn fd(&self) -> RawFd {
        self.inner.get_ref().0
    }

    /// Wait until the descriptor is ready in the given direction.
    ///
    /// Resolves immediately again on the next call if the descriptor is still
    /// ready, so a step that consumed only part of the pending input is
    /// followed by another step.
    pub async fn ready(&self, readiness: Readiness) -> io::Result<()> {
        loop {
            let mut guard = match readiness {
                Readiness::Read => self.inner.readable().await?,
                Readiness::Write => self.inner.writable().await?,
            };

            if poll_now(self.fd(), readiness)? {
                return Ok(());
            }
            guard.clear_ready();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    #[test]
    fn test_set_nonblocking() {
        let (a, _b) = UnixStream::pair().unwrap();
        set_nonblocking(a.as_raw_fd()).unwrap();

        let mut a = a;
        let mut buf = [0u8; 8];
        let err = a.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_set_nonblocking_rejects_bad_fd() {
        assert!(set_nonblocking(-1).is_err());
    }

    #[test]
    fn test_poll_now_tracks_pending_input() {
        let (a, mut b) = UnixStream::pair().unwrap();
        assert!(!poll_now(a.as_raw_fd(), Readiness::Read).unwrap());
        assert!(poll_now(a.as_raw_fd(), Readiness::Write).unwrap());

        b.write_all(b"x").unwrap();
        assert!(poll_now(a.as_raw_fd(), Readiness::Read).unwrap());

        let mut a = a;
        let mut buf = [0u8; 1];
        a.read_exact(&mut buf).unwrap();
        assert!(!poll_now(a.as_raw_fd(), Readiness::Read).unwrap());
    }

    #[tokio::test]
    async fn test_read_readiness_is_level_triggered() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        let registration = SocketRegistration::register(a.as_raw_fd()).unwrap();

        b.write_all(b"ab").unwrap();

        // Nothing consumed: stays ready
        registration.ready(Readiness::Read).await.unwrap();
        registration.ready(Readiness::Read).await.unwrap();

        let mut buf = [0u8; 2];
        a.read_exact(&mut buf).unwrap();

        let drained =
            tokio::time::timeout(Duration::from_millis(50), registration.ready(Readiness::Read))
                .await;
        assert!(drained.is_err(), "drained socket must not report readable");

        b.write_all(b"c").unwrap();
        tokio::time::timeout(Duration::from_secs(1), registration.ready(Readiness::Read))
            .await
            .expect("new input wakes the wait")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropping_registration_keeps_fd_open() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        let registration = SocketRegistration::register(a.as_raw_fd()).unwrap();
        registration.ready(Readiness::Write).await.unwrap();
        drop(registration);

        b.write_all(b"z").unwrap();
        let mut buf = [0u8; 1];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"z");
    }
}
