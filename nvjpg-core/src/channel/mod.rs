//! Kernel Channel Adapter: the capability set the rest of the core
//! needs from whatever is actually talking to the hardware.
//!
//! Two realisations live behind the [`ChannelAdapter`] trait: [`generic`]
//! (a Linux host driving `/dev/nvmap` and `/dev/nvhost-*` over ioctl) and
//! [`console`] (a bare-metal runtime's higher-level entry points). Neither
//! is picked by a build-time `cfg`; callers choose one at construction by
//! handing the orchestrator a boxed trait object instead.

pub mod console;
pub mod generic;

use std::fmt;

use crate::cmdbuf::CmdBuf;
use crate::error::Result;
use crate::fence::Fence;
use crate::memory::MemoryBlock;

/// A process-wide handle to the NVJPG engine device: an opaque descriptor
/// plus the syncpoint id reserved for it at open.
pub struct Channel {
    fd: i32,
    syncpoint_id: u32,
}

impl Channel {
    pub(crate) fn new(fd: i32, syncpoint_id: u32) -> Channel {
        Channel { fd, syncpoint_id }
    }

    /// The syncpoint this channel's submissions increment.
    pub fn syncpoint_id(&self) -> u32 {
        self.syncpoint_id
    }

    /// The raw descriptor, kept around for callers that want to multiplex
    /// it into their own `poll`/`epoll` loop (`NvChannel::get_fd()` in the
    /// original driver).
    pub fn fd(&self) -> i32 {
        self.fd
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Channel").field("fd", &self.fd).field("syncpoint_id", &self.syncpoint_id).finish()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Channel(fd={}, syncpt={})", self.fd, self.syncpoint_id)
    }
}

/// Which `ChannelAdapter` realisation to construct. Picked once, at
/// construction (`nvjpg::DecoderBuilder`), never by conditional compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// The generic Linux host, driving `/dev/nvmap` and `/dev/nvhost-*`.
    Generic,
    /// A bare-metal console runtime's higher-level entry points.
    Console,
}

/// The four primitives a Decoder Orchestrator needs from whatever backs
/// the engine: allocate DMA memory, map it, submit command lists, and wait
/// on the fences those submits produce.
pub trait ChannelAdapter: fmt::Debug {
    fn open_channel(&self, device_node: &str) -> Result<Channel>;
    fn close_channel(&self, channel: Channel) -> Result<()>;

    /// Creates a kernel handle and reserves `size` bytes of backing pages,
    /// aligned to `align`. Rejects `size == 0`.
    fn allocate(&self, size: u32, align: u32, flags: u32) -> Result<MemoryBlock>;

    fn map_cpu(&self, block: &mut MemoryBlock) -> Result<()>;
    fn unmap_cpu(&self, block: &mut MemoryBlock) -> Result<()>;

    /// Device mapping is a no-op identity on the generic host (the CPU
    /// address mapped by `map_cpu` already doubles as a device-visible IOVA
    /// once the kernel pins it); the console adapter performs an explicit
    /// `MapCommandBuffer`/`Unmap` step.
    fn map_device(&self, block: &mut MemoryBlock, channel: &Channel) -> Result<()>;
    fn unmap_device(&self, block: &mut MemoryBlock) -> Result<()>;

    fn free(&self, block: MemoryBlock) -> Result<()>;

    /// Posts `cmdbuf`'s accumulated command buffers and relocations to the
    /// engine. Non-blocking; returns the fence the increment will signal.
    fn submit(&self, channel: &Channel, cmdbuf: &CmdBuf) -> Result<Fence>;

    /// Blocks until `fence` signals or `timeout_us` elapses (`-1` = forever,
    /// `0` = poll). Returns `Error::Timeout` on expiry.
    fn wait(&self, fence: Fence, timeout_us: i64) -> Result<()>;

    fn get_clock_rate(&self, channel: &Channel, module_id: u32) -> Result<u32>;
    fn set_clock_rate(&self, channel: &Channel, module_id: u32, rate: u32) -> Result<()>;
}
