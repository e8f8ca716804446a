//! Raw syscall surface: zero-timeout `poll(2)` and a one-byte read.
//!
//! The only `unsafe` in the crate lives here. Everything else goes through
//! std's non-blocking socket and positioned-file APIs.

use std::io;
use std::os::unix::io::RawFd;

use crate::error::{DeviceError, Result};

/// Sentinel for "no descriptor": `poll(2)` ignores negative fds and reports
/// zero ready descriptors, which the stream device maps to hangup.
pub(crate) const NO_FD: RawFd = -1;

/// Polls a single descriptor with zero timeout.
///
/// Returns `None` when no descriptor is ready, `Some(revents)` when exactly
/// one is. A poll error or a return value outside {0, 1} is fatal.
pub(crate) fn poll_single(fd: RawFd, events: i16) -> Result<Option<i16>> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    // SAFETY: `pfd` is a valid, exclusively owned pollfd for the duration of
    // the call; nfds is 1; a zero timeout never blocks.
    #[allow(unsafe_code)]
    let rv = unsafe { libc::poll(&mut pfd, 1, 0) };
    match rv {
        -1 => Err(DeviceError::Syscall {
            op: "poll",
            source: io::Error::last_os_error(),
        }),
        0 => Ok(None),
        1 => Ok(Some(pfd.revents)),
        other => Err(DeviceError::PollInvariant(other)),
    }
}

/// Reads one byte from `fd`, for descriptors poll has already reported
/// readable. Returns `None` at end of file.
pub(crate) fn read_byte(fd: RawFd) -> Result<Option<u8>> {
    let mut byte = 0u8;
    // SAFETY: the destination is a valid, exclusively owned one-byte buffer.
    #[allow(unsafe_code)]
    let n = unsafe { libc::read(fd, std::ptr::addr_of_mut!(byte).cast(), 1) };
    match n {
        -1 => Err(DeviceError::Syscall {
            op: "read",
            source: io::Error::last_os_error(),
        }),
        0 => Ok(None),
        _ => Ok(Some(byte)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_the_no_fd_sentinel_reports_nothing_ready() {
        assert_eq!(poll_single(NO_FD, libc::POLLIN).unwrap(), None);
    }
}
