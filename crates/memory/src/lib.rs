//! Byte-addressable bridge into the target's memory.
//!
//! Host-side devices service target commands by moving request descriptors and
//! data buffers through this interface. The device layer never validates target
//! addresses itself; a backend rejects out-of-range accesses and the resulting
//! [`TargetMemoryError`] is fatal to the session.

use core::fmt;

/// Errors returned by [`TargetMemory`] backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetMemoryError {
    /// The requested address range is outside the target memory size.
    OutOfRange { addr: u64, len: usize, size: u64 },
}

impl fmt::Display for TargetMemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMemoryError::OutOfRange { addr, len, size } => write!(
                f,
                "target memory access out of range: addr=0x{addr:x} len={len} size=0x{size:x}"
            ),
        }
    }
}

impl std::error::Error for TargetMemoryError {}

pub type TargetMemoryResult<T> = Result<T, TargetMemoryError>;

/// Target memory storage.
///
/// Addresses are `u64` regardless of host pointer width; the target's address
/// space may exceed the host's `usize` range.
pub trait TargetMemory {
    fn size(&self) -> u64;

    /// Reads bytes from target memory into `dst`.
    fn read_into(&self, addr: u64, dst: &mut [u8]) -> TargetMemoryResult<()>;

    /// Writes bytes from `src` into target memory.
    fn write_from(&mut self, addr: u64, src: &[u8]) -> TargetMemoryResult<()>;
}

fn check_range(size: u64, addr: u64, len: usize) -> TargetMemoryResult<()> {
    let end = addr
        .checked_add(len as u64)
        .ok_or(TargetMemoryError::OutOfRange { addr, len, size })?;
    if end > size {
        return Err(TargetMemoryError::OutOfRange { addr, len, size });
    }
    Ok(())
}

/// Target memory backed by a single host allocation.
#[derive(Debug)]
pub struct DenseMemory {
    bytes: Vec<u8>,
}

impl DenseMemory {
    /// Allocates `size` zeroed bytes of target memory.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl TargetMemory for DenseMemory {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_into(&self, addr: u64, dst: &mut [u8]) -> TargetMemoryResult<()> {
        check_range(self.size(), addr, dst.len())?;
        let start = addr as usize;
        dst.copy_from_slice(&self.bytes[start..start + dst.len()]);
        Ok(())
    }

    fn write_from(&mut self, addr: u64, src: &[u8]) -> TargetMemoryResult<()> {
        check_range(self.size(), addr, src.len())?;
        let start = addr as usize;
        self.bytes[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_read_write_round_trip() {
        let mut mem = DenseMemory::new(64);
        mem.write_from(8, &[1, 2, 3, 4]).unwrap();

        let mut buf = [0u8; 4];
        mem.read_into(8, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_access_is_rejected() {
        let mut mem = DenseMemory::new(16);
        let mut buf = [0u8; 4];

        assert_eq!(
            mem.read_into(14, &mut buf),
            Err(TargetMemoryError::OutOfRange {
                addr: 14,
                len: 4,
                size: 16
            })
        );
        assert!(mem.write_from(u64::MAX, &buf).is_err());
    }

    #[test]
    fn zero_length_access_at_end_is_allowed() {
        let mem = DenseMemory::new(16);
        mem.read_into(16, &mut []).unwrap();
    }
}
