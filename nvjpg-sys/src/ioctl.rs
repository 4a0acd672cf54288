//! `nvmap` and `nvhost` ioctl payloads, reproduced byte-for-byte from the
//! kernel driver's wire format.
//!
//! These structs are never interpreted by this crate; they are handed to
//! `libc::ioctl` as-is by `nvjpg-core`'s generic channel adapter and must
//! keep the exact field order and width the kernel expects.

use libc::c_ulong;
use std::mem::size_of;

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// Computes a Linux ioctl request number the same way `<asm-generic/ioctl.h>`'s
/// `_IOC` macro does.
const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> c_ulong {
    ((dir << IOC_DIRSHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)) as c_ulong
}

const fn io(ty: u8, nr: u8) -> c_ulong {
    ioc(IOC_NONE, ty, nr, 0)
}

const fn iow(ty: u8, nr: u8, size: usize) -> c_ulong {
    ioc(IOC_WRITE, ty, nr, size)
}

const fn iowr(ty: u8, nr: u8, size: usize) -> c_ulong {
    ioc(IOC_READ | IOC_WRITE, ty, nr, size)
}

const NVMAP_IOCTL_MAGIC: u8 = b'N';
const NVHOST_IOCTL_MAGIC: u8 = b'H';

/// `nvmap_create_args`: request a fresh handle of the given size.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvmapCreateArgs {
    pub size: u32,
    pub handle: u32,
}

/// `nvmap_alloc_args`: back a handle with pages.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvmapAllocArgs {
    pub handle: u32,
    pub heap_mask: u32,
    pub flags: u32,
    pub align: u32,
}

/// The only heap nvjpg allocations are ever made from.
pub const NVMAP_HEAP_IOVMM: u32 = 0x4000_0000;

/// `nvmap_cache_args`: flush or invalidate CPU cache lines for a mapping.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvmapCacheArgs {
    pub addr: u64,
    pub handle: u32,
    pub len: u32,
    pub op: i32,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvmapCacheOp {
    WriteBack = 0,
    Invalidate = 1,
    WriteBackInvalidate = 2,
}

pub const NVMAP_IOCTL_CREATE: c_ulong = iowr(NVMAP_IOCTL_MAGIC, 0, size_of::<NvmapCreateArgs>());
pub const NVMAP_IOCTL_ALLOC: c_ulong = iow(NVMAP_IOCTL_MAGIC, 3, size_of::<NvmapAllocArgs>());
pub const NVMAP_IOCTL_FREE: c_ulong = io(NVMAP_IOCTL_MAGIC, 4);
pub const NVMAP_IOCTL_CACHE: c_ulong = iow(NVMAP_IOCTL_MAGIC, 12, size_of::<NvmapCacheArgs>());

/// `nvhost_ctrl_fence`: a `(syncpoint id, threshold)` pair as seen on the wire.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NvhostCtrlFence {
    pub id: u32,
    pub value: u32,
}

/// `nvhost_ctrl_syncpt_waitex_args`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvhostCtrlSyncptWaitexArgs {
    pub id: u32,
    pub thresh: u32,
    pub timeout: i32,
    pub value: u32,
}

pub const NVHOST_IOCTL_CTRL_SYNCPT_WAITEX: c_ulong =
    iowr(NVHOST_IOCTL_MAGIC, 6, size_of::<NvhostCtrlSyncptWaitexArgs>());

/// `nvhost_clk_rate_args`: get/set the module clock rate.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvhostClkRateArgs {
    pub rate: u32,
    pub moduleid: u32,
}

pub const NVHOST_IOCTL_CHANNEL_GET_CLK_RATE: c_ulong =
    iowr(NVHOST_IOCTL_MAGIC, 9, size_of::<NvhostClkRateArgs>());
pub const NVHOST_IOCTL_CHANNEL_SET_CLK_RATE: c_ulong =
    iow(NVHOST_IOCTL_MAGIC, 10, size_of::<NvhostClkRateArgs>());

/// `nvhost_get_param_args`: used to fetch the channel's assigned syncpoint id.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvhostGetParamArgs {
    pub param: u32,
    pub value: u32,
}

pub const NVHOST_IOCTL_CHANNEL_GET_SYNCPOINT: c_ulong =
    iowr(NVHOST_IOCTL_MAGIC, 16, size_of::<NvhostGetParamArgs>());

/// One command buffer entry within a submit: a byte range of a mapped handle.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvhostCmdbuf {
    pub mem: u32,
    pub offset: u32,
    pub words: u32,
}

/// Per-command-buffer extension: an optional wait-before-execute fence.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvhostCmdbufExt {
    pub pre_fence: i32,
    pub reserved: u32,
}

/// A relocation: patch `cmdbuf_mem[cmdbuf_offset]` with `target_mem`'s device VA.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvhostReloc {
    pub cmdbuf_mem: u32,
    pub cmdbuf_offset: u32,
    pub target_mem: u32,
    pub target_offset: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvhostRelocShift {
    pub shift: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvhostRelocType {
    pub reloc_type: u32,
    pub padding: u32,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocType {
    Default = 0,
    PitchLinear = 1,
    BlockLinear = 2,
    Nvlink = 3,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvhostWaitchk {
    pub mem: u32,
    pub offset: u32,
    pub syncpt_id: u32,
    pub thresh: u32,
}

/// One syncpoint increment a submit requests of the hardware.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvhostSyncptIncr {
    pub syncpt_id: u32,
    pub syncpt_incrs: u32,
}

pub const NVHOST_SUBMIT_VERSION_V2: u32 = 2;

/// `nvhost_submit_args`. Every `uintptr_t` field is a pointer to a
/// caller-owned array whose length is given by the matching `num_*` field;
/// the kernel never takes ownership of those arrays.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvhostSubmitArgs {
    pub submit_version: u32,
    pub num_syncpt_incrs: u32,
    pub num_cmdbufs: u32,
    pub num_relocs: u32,
    pub num_waitchks: u32,
    pub timeout: u32,
    pub flags: u32,
    pub fence: u32,
    pub syncpt_incrs: u64,
    pub cmdbuf_exts: u64,

    pub checksum_methods: u32,
    pub checksum_falcon_methods: u32,

    pub pad: [u64; 1],

    pub reloc_types: u64,
    pub cmdbufs: u64,
    pub relocs: u64,
    pub reloc_shifts: u64,
    pub waitchks: u64,
    pub waitbases: u64,
    pub class_ids: u64,
    pub fences: u64,
}

pub const NVHOST_IOCTL_CHANNEL_SUBMIT: c_ulong =
    iowr(NVHOST_IOCTL_MAGIC, 26, size_of::<NvhostSubmitArgs>());

/// Marker type so call sites read `ioctl(fd, REQUEST, &mut args)` without
/// sprinkling `as *mut _ as *mut c_void` everywhere.
pub type IoctlRequest = c_ulong;
