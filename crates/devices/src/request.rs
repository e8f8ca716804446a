//! Request descriptors resident in target memory.
//!
//! The block and stream devices receive I/O requests as a fixed 32-byte
//! little-endian record whose target-memory address rides in the command
//! payload. The field order is a wire contract with the target. The stream
//! device ignores `offset` and rewrites `size`/`addr` in place to report
//! partial progress.

use tether_memory::TargetMemory;

use crate::error::Result;

/// Serialized size of a [`Request`] in target memory.
pub const REQUEST_SIZE: usize = 32;

/// An I/O request descriptor: `{addr, offset, size, tag}`, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Target-memory address of the data buffer.
    pub addr: u64,
    /// Byte offset into the backing file (block device only).
    pub offset: u64,
    /// Requested transfer size in bytes.
    pub size: u64,
    /// Opaque completion tag echoed in the response.
    pub tag: u64,
}

impl Request {
    /// Reads a descriptor from target memory at `addr`.
    pub fn read_from(mem: &dyn TargetMemory, addr: u64) -> Result<Self> {
        let mut raw = [0u8; REQUEST_SIZE];
        mem.read_into(addr, &mut raw)?;
        Ok(Self::decode(&raw))
    }

    /// Writes the descriptor back to target memory at `addr`.
    pub fn write_to(&self, mem: &mut dyn TargetMemory, addr: u64) -> Result<()> {
        mem.write_from(addr, &self.encode())?;
        Ok(())
    }

    /// Records `n` bytes of progress: the remaining transfer starts `n` bytes
    /// further into target memory.
    pub fn advance(&mut self, n: u64) {
        self.size -= n;
        self.addr += n;
    }

    fn decode(raw: &[u8; REQUEST_SIZE]) -> Self {
        let word = |i: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&raw[i * 8..i * 8 + 8]);
            u64::from_le_bytes(bytes)
        };
        Self {
            addr: word(0),
            offset: word(1),
            size: word(2),
            tag: word(3),
        }
    }

    fn encode(&self) -> [u8; REQUEST_SIZE] {
        let mut raw = [0u8; REQUEST_SIZE];
        raw[0..8].copy_from_slice(&self.addr.to_le_bytes());
        raw[8..16].copy_from_slice(&self.offset.to_le_bytes());
        raw[16..24].copy_from_slice(&self.size.to_le_bytes());
        raw[24..32].copy_from_slice(&self.tag.to_le_bytes());
        raw
    }
}
