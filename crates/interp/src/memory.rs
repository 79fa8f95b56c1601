//! The interpreter's flat, bounds-checked address space.

use crate::Trap;

/// A contiguous region of little-endian memory mapped at `base`.
///
/// Everything the interpreted code touches, including the code itself, lives
/// in one `Memory`. Regions are carved out with a bump allocator.
#[derive(Clone)]
pub struct Memory {
    base: u64,
    bytes: Vec<u8>,
    next: u64,
}

impl core::fmt::Debug for Memory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Memory")
            .field("base", &format_args!("{:#x}", self.base))
            .field("len", &self.bytes.len())
            .field("next", &format_args!("{:#x}", self.next))
            .finish()
    }
}

impl Memory {
    /// Creates `len` zeroed bytes mapped at `base`.
    pub fn new(base: u64, len: usize) -> Self {
        Self {
            base,
            bytes: vec![0; len],
            next: base,
        }
    }

    /// The first mapped address.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// One past the last mapped address.
    pub fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    /// Reserves `size` bytes aligned to `align` (a power of two), returning
    /// their address, or `None` if the region is exhausted.
    pub fn alloc(&mut self, size: u64, align: u64) -> Option<u64> {
        debug_assert!(align.is_power_of_two());
        let addr = self.next.checked_add(align - 1)? & !(align - 1);
        let end = addr.checked_add(size)?;
        if end > self.end() {
            return None;
        }
        self.next = end;
        Some(addr)
    }

    fn range(&self, addr: u64, size: u64) -> Result<core::ops::Range<usize>, Trap> {
        let oob = Trap::OutOfBounds { addr, size };
        let start = addr.checked_sub(self.base).ok_or(oob)?;
        let end = start.checked_add(size).ok_or(oob)?;
        if end > self.bytes.len() as u64 {
            return Err(oob);
        }
        Ok(start as usize..end as usize)
    }

    /// The bytes at `addr..addr + len`.
    pub fn read_bytes(&self, addr: u64, len: u64) -> Result<&[u8], Trap> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    /// Copies `data` to `addr`.
    pub fn write_bytes(&mut self, addr: u64, data: &[u8]) -> Result<(), Trap> {
        let range = self.range(addr, data.len() as u64)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    fn read<const N: usize>(&self, addr: u64) -> Result<[u8; N], Trap> {
        let mut buf = [0; N];
        buf.copy_from_slice(self.read_bytes(addr, N as u64)?);
        Ok(buf)
    }

    /// Loads a 32-bit value.
    pub fn load_u32(&self, addr: u64) -> Result<u32, Trap> {
        self.read(addr).map(u32::from_le_bytes)
    }

    /// Loads a 64-bit value.
    pub fn load_u64(&self, addr: u64) -> Result<u64, Trap> {
        self.read(addr).map(u64::from_le_bytes)
    }

    /// Loads a 128-bit value.
    pub fn load_u128(&self, addr: u64) -> Result<u128, Trap> {
        self.read(addr).map(u128::from_le_bytes)
    }

    /// Stores a 32-bit value.
    pub fn store_u32(&mut self, addr: u64, value: u32) -> Result<(), Trap> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    /// Stores a 64-bit value.
    pub fn store_u64(&mut self, addr: u64, value: u64) -> Result<(), Trap> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    /// Stores a 128-bit value.
    pub fn store_u128(&mut self, addr: u64, value: u128) -> Result<(), Trap> {
        self.write_bytes(addr, &value.to_le_bytes())
    }
}
