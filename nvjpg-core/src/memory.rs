//! DMA-capable memory blocks.
//!
//! `MemoryBlock` is plain data: a kernel handle plus whichever addresses it
//! has been mapped to so far. The operations that actually allocate, map,
//! unmap and free one live on `ChannelAdapter` (see `channel.rs`) — the
//! block itself doesn't know which backend created it, so callers that want
//! RAII release wrap it together with the adapter that owns it (see
//! `DecoderOrchestrator`'s `Drop` impl in the `nvjpg` crate).

use std::ptr::NonNull;

use crate::error::{Error, Result};

/// A DMA-capable allocation: some number of bytes the NVJPG engine, not
/// just the CPU, can address.
///
/// Lifecycle: `ChannelAdapter::allocate` -> `map_cpu`/`map_device` -> use ->
/// `unmap` -> `free`. A block that was never mapped is illegal to hand to
/// `submit` (see `Error::Unmapped`).
#[derive(Debug)]
pub struct MemoryBlock {
    size: u32,
    align: u32,
    handle: u32,
    cpu_addr: Option<NonNull<u8>>,
    device_addr: Option<u64>,
}

impl MemoryBlock {
    /// Constructs a block around a freshly created kernel handle. Only
    /// `ChannelAdapter` implementations call this.
    pub(crate) fn new(handle: u32, size: u32, align: u32) -> MemoryBlock {
        MemoryBlock { size, align, handle, cpu_addr: None, device_addr: None }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn align(&self) -> u32 {
        self.align
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn is_mapped_cpu(&self) -> bool {
        self.cpu_addr.is_some()
    }

    pub fn is_mapped_device(&self) -> bool {
        self.device_addr.is_some()
    }

    pub(crate) fn set_cpu_addr(&mut self, addr: NonNull<u8>) {
        self.cpu_addr = Some(addr);
    }

    pub(crate) fn clear_cpu_addr(&mut self) {
        self.cpu_addr = None;
    }

    pub(crate) fn set_device_addr(&mut self, addr: u64) {
        self.device_addr = Some(addr);
    }

    /// The device (IO-virtual) address, if this block has been device-mapped.
    pub fn device_addr(&self) -> Option<u64> {
        self.device_addr
    }

    /// Returns the device address or `Error::Unmapped`, the check every
    /// relocation-producing call must make ("a memory block that is
    /// never mapped is illegal to pass to submit").
    pub fn require_device_addr(&self) -> Result<u64> {
        self.device_addr.ok_or(Error::Unmapped)
    }

    /// Borrows the mapping as a byte slice. Returns `Error::Unmapped` if the
    /// block has not been CPU-mapped.
    pub fn as_slice(&self) -> Result<&[u8]> {
        let ptr = self.cpu_addr.ok_or(Error::Unmapped)?;
        // Safe: `ptr` was returned by a successful `mmap`/console map of
        // exactly `size` bytes and remains valid until `unmap`.
        Ok(unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.size as usize) })
    }

    /// Borrows the mapping as a mutable byte slice. Returns
    /// `Error::Unmapped` if the block has not been CPU-mapped.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        let ptr = self.cpu_addr.ok_or(Error::Unmapped)?;
        // Safe: see `as_slice`; `&mut self` ensures exclusive access.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.size as usize) })
    }
}

// `MemoryBlock` carries no interior mutability and its raw pointer only
// ever refers to device memory the kernel mapped for us; it is fine to
// ship across threads as long as access is externally synchronized (the
// orchestrator is single-threaded cooperative).
unsafe impl Send for MemoryBlock {}
