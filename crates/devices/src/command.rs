//! Commands arriving from the target and the shared width constants.
//!
//! The transport decodes each incoming command into a device id, a command id
//! and a 64-bit payload. Both ids are a single byte on the wire, which is what
//! lets [`CommandTable`](crate::device::CommandTable) and
//! [`DeviceRegistry`](crate::registry::DeviceRegistry) index without a range
//! check: `u8` cannot name a slot outside `MAX_COMMANDS`/`MAX_DEVICES`.

use core::fmt;

/// Number of command slots per device; also the modulus of the identify
/// payload split.
pub const MAX_COMMANDS: usize = 256;

/// Registry capacity.
pub const MAX_DEVICES: usize = 256;

/// Width of an identity/name block written to target memory by identify.
pub const IDENTITY_SIZE: usize = 64;

/// One-shot response channel back to the target.
///
/// The transport supplies one per command; consuming it is the only way to
/// answer, so a command is answered at most once by construction.
pub struct Responder(Box<dyn FnOnce(u64)>);

impl Responder {
    pub fn new(f: impl FnOnce(u64) + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn send(self, value: u64) {
        (self.0)(value)
    }
}

/// A decoded command from the target.
///
/// Owned by whoever is currently responsible for answering it: the transport
/// hands it to dispatch, a handler either responds synchronously or stores it
/// (console reads) until a later tick can answer.
pub struct Command {
    device: u8,
    cmd: u8,
    payload: u64,
    responder: Responder,
}

impl Command {
    pub fn new(device: u8, cmd: u8, payload: u64, respond: impl FnOnce(u64) + 'static) -> Self {
        Self {
            device,
            cmd,
            payload,
            responder: Responder::new(respond),
        }
    }

    pub fn device(&self) -> u8 {
        self.device
    }

    pub fn cmd(&self) -> u8 {
        self.cmd
    }

    pub fn payload(&self) -> u64 {
        self.payload
    }

    /// Sends the response value back to the target, consuming the command.
    pub fn respond(self, value: u64) {
        self.responder.send(value)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("device", &self.device)
            .field("cmd", &self.cmd)
            .field("payload", &format_args!("{:#x}", self.payload))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn respond_delivers_the_value() {
        let seen = Rc::new(Cell::new(None));
        let sink = seen.clone();
        let cmd = Command::new(3, 1, 0xABCD, move |v| sink.set(Some(v)));

        assert_eq!(cmd.device(), 3);
        assert_eq!(cmd.cmd(), 1);
        assert_eq!(cmd.payload(), 0xABCD);

        cmd.respond(0x101);
        assert_eq!(seen.get(), Some(0x101));
    }
}
