//! The generic Linux host realisation: `/dev/nvmap` and `/dev/nvhost-*`
//! driven directly over `ioctl`/`mmap`, wire-compatible with the kernel
//! driver's ABI reproduced in `nvjpg_sys::ioctl`.

use std::ffi::CString;
use std::fmt;
use std::os::unix::io::RawFd;
use std::ptr;

use libc::{c_void, O_RDWR};

use nvjpg_sys::ioctl::*;

use crate::cmdbuf::CmdBuf;
use crate::error::{Error, Result};
use crate::fence::Fence;
use crate::memory::MemoryBlock;

use super::{Channel, ChannelAdapter};

const NVMAP_DEVICE: &str = "/dev/nvmap";
const NVHOST_CTRL_DEVICE: &str = "/dev/nvhost-ctrl";

const PAGE_SHIFT: u64 = 12;

fn open_device(path: &str) -> Result<RawFd> {
    let c_path = CString::new(path).expect("device paths never contain a NUL");
    let fd = unsafe { libc::open(c_path.as_ptr(), O_RDWR) };
    if fd < 0 {
        return Err(Error::from_errno());
    }
    Ok(fd)
}

unsafe fn ioctl_call<T>(fd: RawFd, request: IoctlRequest, args: &mut T) -> Result<()> {
    let rc = libc::ioctl(fd, request as _, args as *mut T as *mut c_void);
    if rc < 0 {
        return Err(Error::from_errno());
    }
    Ok(())
}

/// The generic host's realisation of the Kernel Channel Adapter: the
/// process-wide `nvmap` and `nvhost-ctrl` descriptors, opened once and
/// shared by every `MemoryBlock`/`Channel` this adapter produces.
pub struct GenericChannelAdapter {
    nvmap_fd: RawFd,
    nvhost_ctrl_fd: RawFd,
}

impl GenericChannelAdapter {
    /// Opens `/dev/nvmap` and `/dev/nvhost-ctrl`. All-or-nothing: if the
    /// second open fails, the first descriptor is closed before returning.
    pub fn new() -> Result<GenericChannelAdapter> {
        let nvmap_fd = open_device(NVMAP_DEVICE)?;
        let nvhost_ctrl_fd = match open_device(NVHOST_CTRL_DEVICE) {
            Ok(fd) => fd,
            Err(e) => {
                unsafe { libc::close(nvmap_fd) };
                return Err(e);
            }
        };
        Ok(GenericChannelAdapter { nvmap_fd, nvhost_ctrl_fd })
    }
}

impl Drop for GenericChannelAdapter {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.nvhost_ctrl_fd);
            libc::close(self.nvmap_fd);
        }
    }
}

impl fmt::Debug for GenericChannelAdapter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("GenericChannelAdapter")
            .field("nvmap_fd", &self.nvmap_fd)
            .field("nvhost_ctrl_fd", &self.nvhost_ctrl_fd)
            .finish()
    }
}

impl ChannelAdapter for GenericChannelAdapter {
    fn open_channel(&self, device_node: &str) -> Result<Channel> {
        let fd = open_device(device_node)?;
        let mut args = NvhostGetParamArgs { param: 0, value: 0 };
        if let Err(e) = unsafe { ioctl_call(fd, NVHOST_IOCTL_CHANNEL_GET_SYNCPOINT, &mut args) } {
            unsafe { libc::close(fd) };
            return Err(e);
        }
        Ok(Channel::new(fd, args.value))
    }

    fn close_channel(&self, channel: Channel) -> Result<()> {
        let rc = unsafe { libc::close(channel.fd()) };
        if rc < 0 {
            return Err(Error::from_errno());
        }
        Ok(())
    }

    fn allocate(&self, size: u32, align: u32, flags: u32) -> Result<MemoryBlock> {
        if size == 0 {
            return Err(Error::ZeroSizeAllocation);
        }
        let mut create_args = NvmapCreateArgs { size, handle: 0 };
        unsafe { ioctl_call(self.nvmap_fd, NVMAP_IOCTL_CREATE, &mut create_args)? };

        let mut alloc_args = NvmapAllocArgs {
            handle: create_args.handle,
            heap_mask: NVMAP_HEAP_IOVMM,
            flags,
            align,
        };
        if let Err(e) = unsafe { ioctl_call(self.nvmap_fd, NVMAP_IOCTL_ALLOC, &mut alloc_args) } {
            let mut handle = create_args.handle;
            unsafe { ioctl_call(self.nvmap_fd, NVMAP_IOCTL_FREE, &mut handle).ok() };
            return Err(e);
        }

        Ok(MemoryBlock::new(create_args.handle, size, align))
    }

    fn map_cpu(&self, block: &mut MemoryBlock) -> Result<()> {
        let offset = (block.handle() as u64) << PAGE_SHIFT;
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                block.size() as usize,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.nvmap_fd,
                offset as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(Error::from_errno());
        }
        let addr = std::ptr::NonNull::new(addr as *mut u8).expect("mmap returned null on success");
        block.set_cpu_addr(addr);
        Ok(())
    }

    fn unmap_cpu(&self, block: &mut MemoryBlock) -> Result<()> {
        if let Ok(slice) = block.as_mut_slice() {
            let rc = unsafe { libc::munmap(slice.as_mut_ptr() as *mut c_void, slice.len()) };
            if rc < 0 {
                return Err(Error::from_errno());
            }
        }
        block.clear_cpu_addr();
        Ok(())
    }

    fn map_device(&self, block: &mut MemoryBlock, _channel: &Channel) -> Result<()> {
        // The generic host has no separate device address space: the
        // handle itself is what the kernel resolves relocations against.
        block.set_device_addr(block.handle() as u64);
        Ok(())
    }

    fn unmap_device(&self, _block: &mut MemoryBlock) -> Result<()> {
        Ok(())
    }

    fn free(&self, block: MemoryBlock) -> Result<()> {
        let mut handle = block.handle();
        unsafe { ioctl_call(self.nvmap_fd, NVMAP_IOCTL_FREE, &mut handle) }
    }

    fn submit(&self, channel: &Channel, cmdbuf: &CmdBuf) -> Result<Fence> {
        let (cmdbufs, exts, class_ids) = cmdbuf.cmdbufs();
        let (relocs, reloc_shifts, reloc_types) = cmdbuf.relocs();

        let mut fences = [NvhostCtrlFence::default(); 1];
        let mut syncpt_incrs = [NvhostSyncptIncr { syncpt_id: channel.syncpoint_id(), syncpt_incrs: 1 }];

        let mut args = NvhostSubmitArgs {
            submit_version: NVHOST_SUBMIT_VERSION_V2,
            num_syncpt_incrs: syncpt_incrs.len() as u32,
            num_cmdbufs: cmdbufs.len() as u32,
            num_relocs: relocs.len() as u32,
            num_waitchks: 0,
            timeout: 0,
            flags: 0,
            fence: 0,
            syncpt_incrs: syncpt_incrs.as_mut_ptr() as u64,
            cmdbuf_exts: exts.as_ptr() as u64,
            checksum_methods: 0,
            checksum_falcon_methods: 0,
            pad: [0; 1],
            reloc_types: reloc_types.as_ptr() as u64,
            cmdbufs: cmdbufs.as_ptr() as u64,
            relocs: relocs.as_ptr() as u64,
            reloc_shifts: reloc_shifts.as_ptr() as u64,
            waitchks: 0,
            waitbases: 0,
            class_ids: class_ids.as_ptr() as u64,
            fences: fences.as_mut_ptr() as u64,
        };

        unsafe { ioctl_call(channel.fd(), NVHOST_IOCTL_CHANNEL_SUBMIT, &mut args)? };

        Ok(Fence { id: channel.syncpoint_id(), value: args.fence })
    }

    fn wait(&self, fence: Fence, timeout_us: i64) -> Result<()> {
        let timeout_ms = if timeout_us < 0 {
            -1
        } else {
            (timeout_us / 1000).max(0) as i32
        };
        let mut args = NvhostCtrlSyncptWaitexArgs {
            id: fence.id,
            thresh: fence.value,
            timeout: timeout_ms,
            value: 0,
        };
        match unsafe { ioctl_call(self.nvhost_ctrl_fd, NVHOST_IOCTL_CTRL_SYNCPT_WAITEX, &mut args) } {
            Ok(()) => Ok(()),
            Err(Error::Io(e)) if e.raw_os_error() == Some(libc::ETIMEDOUT) => {
                Err(Error::Timeout(fence))
            }
            Err(e) => Err(e),
        }
    }

    fn get_clock_rate(&self, channel: &Channel, module_id: u32) -> Result<u32> {
        let mut args = NvhostClkRateArgs { rate: 0, moduleid: module_id };
        unsafe { ioctl_call(channel.fd(), NVHOST_IOCTL_CHANNEL_GET_CLK_RATE, &mut args)? };
        Ok(args.rate)
    }

    fn set_clock_rate(&self, channel: &Channel, module_id: u32, rate: u32) -> Result<()> {
        let mut args = NvhostClkRateArgs { rate, moduleid: module_id };
        unsafe { ioctl_call(channel.fd(), NVHOST_IOCTL_CHANNEL_SET_CLK_RATE, &mut args) }
    }
}
