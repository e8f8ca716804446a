//! Per-device command tables and the polymorphic device seam.
//!
//! A device owns a fixed-width table mapping command ids to handlers. Every
//! slot is always bound: construction installs a no-op handler everywhere and
//! the identify handler in the reserved last slot, so dispatch never has to
//! consider an empty entry. Concrete devices then register their own handlers
//! over the defaults (never over the identify slot).
//!
//! Handlers are plain function pointers over the concrete device type rather
//! than captured closures: the pointer is copied out of the table before it is
//! applied to `&mut self`, which keeps the table embeddable in the device it
//! drives.

use tether_memory::TargetMemory;

use crate::command::{Command, IDENTITY_SIZE, MAX_COMMANDS};
use crate::error::{DeviceError, Result};

/// Command id of the reserved identify slot.
pub const IDENTIFY_COMMAND: usize = MAX_COMMANDS - 1;

/// Response value of the default no-op handler.
pub const NOOP_RESPONSE: u64 = 0;

/// Response value of a successful identify.
pub const IDENTIFY_RESPONSE: u64 = 1;

/// A command handler bound to device type `D`.
pub type Handler<D> = fn(&mut D, &mut dyn TargetMemory, Command) -> Result<()>;

/// Host-side device servicing target commands.
pub trait Device {
    /// Human-readable identity, shorter than [`IDENTITY_SIZE`].
    fn identity(&self) -> &str;

    /// Registered name of a command slot (`""` if never explicitly named).
    fn command_name(&self, cmd: usize) -> &'static str;

    /// Invokes the handler bound to the command's id.
    fn handle_command(&mut self, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()>;

    /// Advances deferred work once per scheduling cycle.
    fn tick(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Fixed-size table of command handlers and names, fully populated at all
/// times.
pub struct CommandTable<D> {
    handlers: [Handler<D>; MAX_COMMANDS],
    names: [&'static str; MAX_COMMANDS],
}

impl<D: Device> CommandTable<D> {
    /// Builds a table with the no-op handler in every slot and identify in the
    /// reserved last slot.
    pub fn new() -> Self {
        let mut table = Self {
            handlers: [noop::<D> as Handler<D>; MAX_COMMANDS],
            names: [""; MAX_COMMANDS],
        };
        table.register(IDENTIFY_COMMAND, identify::<D>, "identity");
        table
    }

    /// Binds `handler` and `name` at `cmd`, replacing the previous binding.
    ///
    /// Panics if `cmd` is out of range or `name` does not fit an identity
    /// block; both are construction-time programmer errors.
    pub fn register(&mut self, cmd: usize, handler: Handler<D>, name: &'static str) {
        assert!(cmd < MAX_COMMANDS, "command id {cmd} out of range");
        assert!(
            name.len() < IDENTITY_SIZE,
            "command name {name:?} too long for an identity block"
        );
        self.handlers[cmd] = handler;
        self.names[cmd] = name;
    }

    pub fn handler(&self, cmd: u8) -> Handler<D> {
        self.handlers[cmd as usize]
    }

    pub fn name(&self, cmd: usize) -> &'static str {
        assert!(cmd < MAX_COMMANDS, "command id {cmd} out of range");
        self.names[cmd]
    }
}

impl<D: Device> Default for CommandTable<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Default handler for unbound slots: no side effects, answers with
/// [`NOOP_RESPONSE`] so the command still completes.
fn noop<D: Device>(_dev: &mut D, _mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
    cmd.respond(NOOP_RESPONSE);
    Ok(())
}

/// Shared identify handler.
///
/// The payload packs two fields with a div/mod split that is a wire contract
/// with the target: `what = payload % MAX_COMMANDS` selects either a command
/// name or (at the reserved index) the device's own identity, and
/// `addr = payload / MAX_COMMANDS` is the identity-block-aligned destination
/// in target memory. The answer is the selected string in a zero-padded
/// [`IDENTITY_SIZE`] block.
fn identify<D: Device>(dev: &mut D, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
    let what = (cmd.payload() % MAX_COMMANDS as u64) as usize;
    let addr = cmd.payload() / MAX_COMMANDS as u64;
    if addr % IDENTITY_SIZE as u64 != 0 {
        return Err(DeviceError::MisalignedIdentity {
            addr,
            align: IDENTITY_SIZE,
        });
    }

    let mut block = [0u8; IDENTITY_SIZE];
    if what == IDENTIFY_COMMAND {
        let identity = dev.identity();
        assert!(
            identity.len() < IDENTITY_SIZE,
            "device identity {identity:?} too long for an identity block"
        );
        block[..identity.len()].copy_from_slice(identity.as_bytes());
    } else {
        let name = dev.command_name(what);
        block[..name.len()].copy_from_slice(name.as_bytes());
    }

    mem.write_from(addr, &block)?;
    cmd.respond(IDENTIFY_RESPONSE);
    Ok(())
}

/// Device with no commands of its own.
///
/// Stands in for every in-range but unregistered device id, so a stray command
/// is absorbed as a no-op instead of an indexing failure. Its identify answers
/// are well-defined: the identity and every name are empty, so every identity
/// block comes back all-zero.
pub struct NullDevice {
    table: CommandTable<Self>,
}

impl NullDevice {
    pub fn new() -> Self {
        Self {
            table: CommandTable::new(),
        }
    }
}

impl Default for NullDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for NullDevice {
    fn identity(&self) -> &str {
        ""
    }

    fn command_name(&self, cmd: usize) -> &'static str {
        self.table.name(cmd)
    }

    fn handle_command(&mut self, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        let handler = self.table.handler(cmd.cmd());
        handler(self, mem, cmd)
    }
}
