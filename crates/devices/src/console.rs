//! Host console device.
//!
//! Writes are synchronous byte emits. Reads can never complete synchronously:
//! they queue until an input byte is buffered, and each tick answers at most
//! one pending read with at most one consumed byte, strictly in arrival order.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::os::unix::io::RawFd;

use tether_memory::TargetMemory;

use crate::command::Command;
use crate::device::{CommandTable, Device};
use crate::error::Result;
use crate::sys;

pub const CONSOLE_CMD_READ: usize = 0;
pub const CONSOLE_CMD_WRITE: usize = 1;

/// Success framing for console responses: distinguishes "byte 0x00 delivered"
/// from a bare zero.
const BYTE_READY: u64 = 0x100;

/// The host console primitive consumed by [`ConsoleDevice`].
pub trait ConsoleBackend {
    /// Emits one byte to the host console.
    fn emit(&mut self, byte: u8);

    /// Returns one buffered input byte, or `None` if none is available yet.
    /// Must not block.
    fn poll_input(&mut self) -> Option<u8>;
}

/// Terminal device bridging target console traffic to a [`ConsoleBackend`].
pub struct ConsoleDevice {
    table: CommandTable<Self>,
    backend: Box<dyn ConsoleBackend>,
    pending_reads: VecDeque<Command>,
}

impl ConsoleDevice {
    pub fn new(backend: Box<dyn ConsoleBackend>) -> Self {
        let mut table = CommandTable::new();
        table.register(CONSOLE_CMD_READ, Self::cmd_read, "read");
        table.register(CONSOLE_CMD_WRITE, Self::cmd_write, "write");
        Self {
            table,
            backend,
            pending_reads: VecDeque::new(),
        }
    }

    fn cmd_read(dev: &mut Self, _mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        // Answered by a later tick, once input arrives.
        dev.pending_reads.push_back(cmd);
        Ok(())
    }

    fn cmd_write(dev: &mut Self, _mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        let byte = cmd.payload() as u8;
        dev.backend.emit(byte);
        cmd.respond(BYTE_READY | byte as u64);
        Ok(())
    }
}

impl Device for ConsoleDevice {
    fn identity(&self) -> &str {
        "console"
    }

    fn command_name(&self, cmd: usize) -> &'static str {
        self.table.name(cmd)
    }

    fn handle_command(&mut self, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        let handler = self.table.handler(cmd.cmd());
        handler(self, mem, cmd)
    }

    fn tick(&mut self) -> Result<()> {
        // Input is only consumed when a read is waiting for it.
        if self.pending_reads.is_empty() {
            return Ok(());
        }
        if let Some(byte) = self.backend.poll_input() {
            if let Some(cmd) = self.pending_reads.pop_front() {
                cmd.respond(BYTE_READY | byte as u64);
            }
        }
        Ok(())
    }
}

/// Console backend over the process's stdin/stdout.
///
/// Input is polled with zero timeout and read one byte at a time, so a tick
/// never blocks on the terminal.
pub struct StdioConsole {
    stdin_fd: RawFd,
}

impl StdioConsole {
    pub fn new() -> Self {
        Self {
            stdin_fd: libc::STDIN_FILENO,
        }
    }
}

impl Default for StdioConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleBackend for StdioConsole {
    fn emit(&mut self, byte: u8) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(&[byte]);
        let _ = stdout.flush();
    }

    fn poll_input(&mut self) -> Option<u8> {
        match sys::poll_single(self.stdin_fd, libc::POLLIN) {
            Ok(Some(revents)) if revents & libc::POLLIN != 0 => {
                match sys::read_byte(self.stdin_fd) {
                    Ok(byte) => byte,
                    Err(err) => {
                        tracing::warn!("stdin read failed: {err}");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!("stdin poll failed: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tether_memory::DenseMemory;

    /// Backend fed from a script of input bytes, recording emitted output.
    #[derive(Default)]
    struct Scripted {
        input: Rc<RefCell<VecDeque<u8>>>,
        output: Rc<RefCell<Vec<u8>>>,
    }

    impl ConsoleBackend for Scripted {
        fn emit(&mut self, byte: u8) {
            self.output.borrow_mut().push(byte);
        }

        fn poll_input(&mut self) -> Option<u8> {
            self.input.borrow_mut().pop_front()
        }
    }

    fn command(cmd: usize, payload: u64) -> (Command, Rc<Cell<Option<u64>>>) {
        let seen = Rc::new(Cell::new(None));
        let sink = seen.clone();
        (
            Command::new(0, cmd as u8, payload, move |v| sink.set(Some(v))),
            seen,
        )
    }

    #[test]
    fn write_emits_and_responds_with_framed_byte() {
        let backend = Scripted::default();
        let output = backend.output.clone();
        let mut dev = ConsoleDevice::new(Box::new(backend));
        let mut mem = DenseMemory::new(0);

        let (cmd, seen) = command(CONSOLE_CMD_WRITE, 0xFFFF_FF41);
        dev.handle_command(&mut mem, cmd).unwrap();

        // Only the low 8 bits of the payload reach the console.
        assert_eq!(&*output.borrow(), b"A");
        assert_eq!(seen.get(), Some(0x100 | 0x41));
    }

    #[test]
    fn queued_reads_are_answered_in_fifo_order_one_per_tick() {
        let backend = Scripted::default();
        let input = backend.input.clone();
        let mut dev = ConsoleDevice::new(Box::new(backend));
        let mut mem = DenseMemory::new(0);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let (cmd, s) = command(CONSOLE_CMD_READ, 0);
            dev.handle_command(&mut mem, cmd).unwrap();
            seen.push(s);
        }

        // Nothing buffered yet: ticks make no progress.
        dev.tick().unwrap();
        assert!(seen.iter().all(|s| s.get().is_none()));

        input.borrow_mut().extend([b'x', b'y', b'z']);

        // One byte and one response per tick, oldest read first.
        dev.tick().unwrap();
        assert_eq!(seen[0].get(), Some(0x100 | b'x' as u64));
        assert_eq!(seen[1].get(), None);

        dev.tick().unwrap();
        dev.tick().unwrap();
        assert_eq!(seen[1].get(), Some(0x100 | b'y' as u64));
        assert_eq!(seen[2].get(), Some(0x100 | b'z' as u64));
    }

    #[test]
    fn input_is_not_consumed_without_a_pending_read() {
        let backend = Scripted::default();
        let input = backend.input.clone();
        let mut dev = ConsoleDevice::new(Box::new(backend));

        input.borrow_mut().push_back(b'q');
        dev.tick().unwrap();
        assert_eq!(input.borrow().len(), 1);
    }
}
