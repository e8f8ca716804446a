//! Byte-stream bridge over a Unix-domain rendezvous socket.
//!
//! The device listens on a filesystem path and holds at most one peer
//! connection, accepted by `tick` without blocking. Reads and writes move
//! bytes between the peer and target memory through a request descriptor;
//! would-block is reported as zero progress and a partial write rewrites the
//! descriptor in place so the target can resume where the transfer stopped.

use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

use bitflags::bitflags;
use tether_memory::TargetMemory;

use crate::command::Command;
use crate::device::{CommandTable, Device};
use crate::error::{DeviceError, Result};
use crate::request::Request;
use crate::sys;

pub const STREAM_CMD_READ: usize = 0;
pub const STREAM_CMD_WRITE: usize = 1;
pub const STREAM_CMD_POLL: usize = 2;

bitflags! {
    /// Device-local poll interest and readiness mask.
    ///
    /// Part of the wire contract with the target; deliberately not the OS
    /// `POLLIN`/`POLLOUT`/`POLLHUP` values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StreamPoll: u16 {
        const IN = 1 << 0;
        const OUT = 1 << 1;
        const HUP = 1 << 2;
    }
}

/// Byte-stream socket-bridge device.
pub struct StreamDevice {
    table: CommandTable<Self>,
    listener: UnixListener,
    conn: Option<UnixStream>,
    id: String,
}

impl StreamDevice {
    /// Binds the rendezvous socket at `path`, replacing any stale socket file,
    /// and configures it for non-blocking accept.
    pub fn bind(path: &Path) -> Result<Self> {
        let rendezvous = |op: &'static str| {
            let path = path.display().to_string();
            move |source: io::Error| DeviceError::Rendezvous { op, path, source }
        };

        let _ = fs::remove_file(path);
        let listener = UnixListener::bind(path).map_err(rendezvous("bind"))?;
        listener
            .set_nonblocking(true)
            .map_err(rendezvous("set_nonblocking"))?;

        let mut table = CommandTable::new();
        table.register(STREAM_CMD_READ, Self::cmd_read, "read");
        table.register(STREAM_CMD_WRITE, Self::cmd_write, "write");
        table.register(STREAM_CMD_POLL, Self::cmd_poll, "poll");

        tracing::debug!(path = %path.display(), "stream device listening");
        Ok(Self {
            table,
            listener,
            conn: None,
            id: format!("stream unix={}", path.display()),
        })
    }

    /// Whether a peer is currently connected.
    pub fn connected(&self) -> bool {
        self.conn.is_some()
    }

    fn teardown(&mut self) {
        tracing::debug!("stream peer disconnected");
        self.conn = None;
    }

    fn cmd_read(dev: &mut Self, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        let payload = cmd.payload();
        let mut req = Request::read_from(mem, payload)?;

        let Some(conn) = dev.conn.as_mut() else {
            // Nothing available; a defined outcome, not an error.
            req.size = 0;
            req.write_to(mem, payload)?;
            cmd.respond(req.tag);
            return Ok(());
        };

        let mut buf = vec![0u8; req.size as usize];
        let (n, closed) = match conn.read(&mut buf) {
            Ok(0) => (0, true),
            Ok(n) => (n, false),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => (0, false),
            Err(source) => return Err(DeviceError::Syscall { op: "read", source }),
        };

        if closed {
            dev.teardown();
        } else if n > 0 {
            mem.write_from(req.addr, &buf[..n])?;
        }

        // The target learns the transferred count from the rewritten
        // descriptor, not from the response value.
        req.size = n as u64;
        req.write_to(mem, payload)?;
        cmd.respond(req.tag);
        Ok(())
    }

    fn cmd_write(dev: &mut Self, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        let payload = cmd.payload();
        let mut req = Request::read_from(mem, payload)?;

        let Some(conn) = dev.conn.as_mut() else {
            cmd.respond(req.tag);
            return Ok(());
        };

        let mut buf = vec![0u8; req.size as usize];
        mem.read_into(req.addr, &mut buf)?;

        let (n, closed) = match conn.write(&buf) {
            Ok(0) => (0, true),
            Ok(n) => (n, false),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => (0, false),
            Err(source) => return Err(DeviceError::Syscall { op: "write", source }),
        };

        if closed {
            dev.teardown();
        } else if n > 0 {
            // Rewrite the descriptor so a follow-up write resumes after the
            // bytes the socket accepted. A would-block outcome leaves it
            // untouched; the target infers completion from size reaching 0.
            req.advance(n as u64);
            req.write_to(mem, payload)?;
        }

        cmd.respond(req.tag);
        Ok(())
    }

    fn cmd_poll(dev: &mut Self, _mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        let interest = StreamPoll::from_bits_truncate(cmd.payload() as u16);
        let mut events = 0i16;
        if interest.contains(StreamPoll::IN) {
            events |= libc::POLLIN;
        }
        if interest.contains(StreamPoll::OUT) {
            events |= libc::POLLOUT;
        }

        let fd = dev.conn.as_ref().map_or(sys::NO_FD, |c| c.as_raw_fd());
        let ready = match sys::poll_single(fd, events)? {
            None => StreamPoll::HUP,
            Some(revents) => {
                let mut ready = StreamPoll::empty();
                if revents & libc::POLLIN != 0 {
                    ready |= StreamPoll::IN;
                }
                if revents & libc::POLLOUT != 0 {
                    ready |= StreamPoll::OUT;
                }
                if revents & libc::POLLHUP != 0 {
                    ready |= StreamPoll::HUP;
                }
                ready
            }
        };

        cmd.respond(ready.bits() as u64);
        Ok(())
    }
}

impl Device for StreamDevice {
    fn identity(&self) -> &str {
        &self.id
    }

    fn command_name(&self, cmd: usize) -> &'static str {
        self.table.name(cmd)
    }

    fn handle_command(&mut self, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        let handler = self.table.handler(cmd.cmd());
        handler(self, mem, cmd)
    }

    fn tick(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        match self.listener.accept() {
            Ok((stream, _)) => {
                stream
                    .set_nonblocking(true)
                    .map_err(|source| DeviceError::Syscall {
                        op: "set_nonblocking",
                        source,
                    })?;
                tracing::debug!("stream peer connected");
                self.conn = Some(stream);
            }
            // No pending connection yet.
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(source) => return Err(DeviceError::Syscall { op: "accept", source }),
        }
        Ok(())
    }
}
