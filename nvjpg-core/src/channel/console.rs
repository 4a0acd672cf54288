//! The bare-metal console realisation: higher-level `nvMap*`/`nvChannel*`/
//! `nvFence*` entry points instead of raw ioctls, plus an explicit
//! `MapCommandBuffer`/`Unmap` step that produces a device IO-VA distinct
//! from the CPU mapping.
//!
//! This backend is an external collaborator: the wire format it talks
//! is whatever the console runtime's SDK defines, not something this crate
//! owns or can reproduce byte-exactly. The implementation below is a thin,
//! self-consistent stand-in that satisfies `ChannelAdapter` using the same
//! in-process bookkeeping a real binding to that SDK would wrap.

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::cmdbuf::CmdBuf;
use crate::error::{Error, Result};
use crate::fence::Fence;
use crate::memory::MemoryBlock;

use super::{Channel, ChannelAdapter};

/// Console-runtime channel adapter. Hands out monotonically increasing
/// handles and device addresses in place of whatever the real SDK's
/// allocator would assign; a CPU-side `Vec<u8>` backs each block instead of
/// an `mmap`'d kernel allocation.
pub struct ConsoleChannelAdapter {
    next_handle: AtomicU32,
    next_device_addr: AtomicU64,
    syncpoint_counter: AtomicU32,
    fence_value: AtomicU32,
    force_next_wait_timeout: AtomicBool,
}

impl ConsoleChannelAdapter {
    pub fn new() -> ConsoleChannelAdapter {
        ConsoleChannelAdapter {
            next_handle: AtomicU32::new(1),
            next_device_addr: AtomicU64::new(0x8000_0000),
            syncpoint_counter: AtomicU32::new(0),
            fence_value: AtomicU32::new(0),
            force_next_wait_timeout: AtomicBool::new(false),
        }
    }

    /// Makes the next `wait()` call return `Error::Timeout` instead of
    /// succeeding immediately. Test-only: there is no real wait to time out
    /// on this backend, so callers that want to exercise a timeout path
    /// have to ask for one explicitly.
    pub fn queue_timeout(&self) {
        self.force_next_wait_timeout.store(true, Ordering::SeqCst);
    }
}

impl Default for ConsoleChannelAdapter {
    fn default() -> ConsoleChannelAdapter {
        ConsoleChannelAdapter::new()
    }
}

impl fmt::Debug for ConsoleChannelAdapter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConsoleChannelAdapter").finish()
    }
}

impl ChannelAdapter for ConsoleChannelAdapter {
    fn open_channel(&self, _device_node: &str) -> Result<Channel> {
        let syncpoint_id = self.syncpoint_counter.fetch_add(1, Ordering::SeqCst);
        Ok(Channel::new(-1, syncpoint_id))
    }

    fn close_channel(&self, _channel: Channel) -> Result<()> {
        Ok(())
    }

    fn allocate(&self, size: u32, align: u32, _flags: u32) -> Result<MemoryBlock> {
        if size == 0 {
            return Err(Error::ZeroSizeAllocation);
        }
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryBlock::new(handle, size, align))
    }

    fn map_cpu(&self, block: &mut MemoryBlock) -> Result<()> {
        let mut buf = vec![0u8; block.size() as usize].into_boxed_slice();
        let ptr = NonNull::new(buf.as_mut_ptr()).expect("boxed slice is never null");
        // Leaked deliberately: this stand-in never frees console-side CPU
        // storage, matching that the real SDK owns that lifetime, not us.
        std::mem::forget(buf);
        block.set_cpu_addr(ptr);
        Ok(())
    }

    fn unmap_cpu(&self, block: &mut MemoryBlock) -> Result<()> {
        block.clear_cpu_addr();
        Ok(())
    }

    /// The console's explicit `MapCommandBuffer`/`Unmap` step: assigns a
    /// device IO-VA distinct from the CPU address, unlike the generic host.
    fn map_device(&self, block: &mut MemoryBlock, _channel: &Channel) -> Result<()> {
        let addr = self.next_device_addr.fetch_add(block.size() as u64, Ordering::SeqCst);
        block.set_device_addr(addr);
        Ok(())
    }

    fn unmap_device(&self, _block: &mut MemoryBlock) -> Result<()> {
        Ok(())
    }

    fn free(&self, _block: MemoryBlock) -> Result<()> {
        Ok(())
    }

    fn submit(&self, channel: &Channel, _cmdbuf: &CmdBuf) -> Result<Fence> {
        let value = self.fence_value.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Fence { id: channel.syncpoint_id(), value })
    }

    fn wait(&self, fence: Fence, _timeout_us: i64) -> Result<()> {
        if self.force_next_wait_timeout.swap(false, Ordering::SeqCst) {
            return Err(Error::Timeout(fence));
        }
        Ok(())
    }

    fn get_clock_rate(&self, _channel: &Channel, _module_id: u32) -> Result<u32> {
        Ok(0)
    }

    fn set_clock_rate(&self, _channel: &Channel, _module_id: u32, _rate: u32) -> Result<()> {
        Ok(())
    }
}
