//! File-backed block storage device.
//!
//! Reads and writes are single-shot and fully synchronous: the request
//! descriptor names a file offset and byte count, the whole transfer happens
//! inside the handler, and anything short of the requested count is fatal.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use tether_memory::TargetMemory;

use crate::command::Command;
use crate::device::{CommandTable, Device};
use crate::error::{DeviceError, Result};
use crate::request::Request;

pub const DISK_CMD_READ: usize = 0;
pub const DISK_CMD_WRITE: usize = 1;

/// Block device backed by a regular file.
pub struct DiskDevice {
    table: CommandTable<Self>,
    file: File,
    id: String,
}

impl DiskDevice {
    /// Opens `path` read/write and exposes its current length through the
    /// device identity.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| DeviceError::BackingFile {
                path: path.display().to_string(),
                source,
            })?;
        let len = file
            .metadata()
            .map_err(|source| DeviceError::BackingFile {
                path: path.display().to_string(),
                source,
            })?
            .len();

        let mut table = CommandTable::new();
        table.register(DISK_CMD_READ, Self::cmd_read, "read");
        table.register(DISK_CMD_WRITE, Self::cmd_write, "write");

        tracing::debug!(path = %path.display(), len, "opened disk image");
        Ok(Self {
            table,
            file,
            id: format!("disk size={len}"),
        })
    }

    fn cmd_read(dev: &mut Self, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        let req = Request::read_from(mem, cmd.payload())?;

        let mut buf = vec![0u8; req.size as usize];
        dev.file
            .read_exact_at(&mut buf, req.offset)
            .map_err(|source| DeviceError::DiskRead {
                id: dev.id.clone(),
                offset: req.offset,
                source,
            })?;

        mem.write_from(req.addr, &buf)?;
        cmd.respond(req.tag);
        Ok(())
    }

    fn cmd_write(dev: &mut Self, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        let req = Request::read_from(mem, cmd.payload())?;

        let mut buf = vec![0u8; req.size as usize];
        mem.read_into(req.addr, &mut buf)?;
        dev.file
            .write_all_at(&buf, req.offset)
            .map_err(|source| DeviceError::DiskWrite {
                id: dev.id.clone(),
                offset: req.offset,
                source,
            })?;

        cmd.respond(req.tag);
        Ok(())
    }
}

impl fmt::Debug for DiskDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskDevice")
            .field("id", &self.id)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl Device for DiskDevice {
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
}
