//! Decoder Orchestrator: owns the channel and the memory blocks a
//! decode needs, turns an `Image` + output surface into a picture-info
//! descriptor and a command list, submits it, and tracks completion.
//!
//! Grounded on `Decoder`/`Decoder::initialize`/`Decoder::render` in
//! `include/nvjpg/decoder.hpp`/`lib/decoder.cpp`, generalised to an
//! optional ring of in-flight submissions.

use nvjpg_core::channel::console::ConsoleChannelAdapter;
use nvjpg_core::channel::generic::GenericChannelAdapter;
use nvjpg_core::channel::{Channel, ChannelAdapter, ChannelKind};
use nvjpg_core::{CmdBuf, Fence, MemoryBlock};
use nvjpg_sys::colorspace::Colorspace;
use nvjpg_sys::picture_info::NvjpgStatus;
use nvjpg_sys::registers::{nvjpg, thi, NVJPG_CLASS_ID};

use crate::error::{Error, Result};
use crate::image::Image;
use crate::picture;
use crate::surface::{RenderTarget, Surface, VideoSurface};

/// Default device node the generic host adapter opens: `/dev/nvhost-nvjpg`.
pub const DEFAULT_DEVICE_NODE: &str = "/dev/nvhost-nvjpg";

/// Default scan-data capacity: 5 MiB, the largest JPEG this driver expects
/// to be asked to decode unless told otherwise.
pub const DEFAULT_CAPACITY: u32 = 5 * 1024 * 1024;

const CMDBUF_SIZE: u32 = 0x8000;
const CMDBUF_ALIGN: u32 = 32;
const PIC_INFO_ALIGN: u32 = 16;
const READ_DATA_ALIGN: u32 = 16;
const SCAN_DATA_ALIGN: u32 = 0x1000;
const ALLOC_FLAGS: u32 = 0x1;

/// The result descriptor a submission writes back: used scan bytes plus
/// the MCU position and result code the original `NvjpgStatus` also
/// carries (the minimal form of this result only needs
/// `used_bytes`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStatus {
    pub used_bytes: u32,
    pub mcu_x: u32,
    pub mcu_y: u32,
    pub result: u32,
}

impl From<NvjpgStatus> for DecodeStatus {
    fn from(raw: NvjpgStatus) -> DecodeStatus {
        DecodeStatus { used_bytes: raw.used_bytes, mcu_x: raw.mcu_x, mcu_y: raw.mcu_y, result: raw.result }
    }
}

struct RingSlot {
    cmdbuf_mem: MemoryBlock,
    cmdbuf: CmdBuf,
    pic_info_mem: MemoryBlock,
    read_data_mem: MemoryBlock,
    scan_data_mem: MemoryBlock,
    pending_fence: Fence,
}

impl RingSlot {
    fn release(self, adapter: &dyn ChannelAdapter) {
        for mut block in [self.cmdbuf_mem, self.pic_info_mem, self.read_data_mem, self.scan_data_mem] {
            adapter.unmap_device(&mut block).ok();
            adapter.unmap_cpu(&mut block).ok();
            adapter.free(block).ok();
        }
    }
}

fn alloc_mapped(adapter: &dyn ChannelAdapter, channel: &Channel, size: u32, align: u32) -> nvjpg_core::Result<MemoryBlock> {
    let mut block = adapter.allocate(size, align, ALLOC_FLAGS)?;
    if let Err(e) = adapter.map_cpu(&mut block) {
        adapter.free(block).ok();
        return Err(e);
    }
    if let Err(e) = adapter.map_device(&mut block, channel) {
        adapter.unmap_cpu(&mut block).ok();
        adapter.free(block).ok();
        return Err(e);
    }
    Ok(block)
}

fn alloc_slot(adapter: &dyn ChannelAdapter, channel: &Channel, capacity: u32) -> Result<RingSlot> {
    let cmdbuf_mem = alloc_mapped(adapter, channel, CMDBUF_SIZE, CMDBUF_ALIGN)?;
    let pic_info_mem = match alloc_mapped(
        adapter,
        channel,
        std::mem::size_of::<nvjpg_sys::NvjpgPictureInfo>() as u32,
        PIC_INFO_ALIGN,
    ) {
        Ok(m) => m,
        Err(e) => {
            release_blocks(adapter, vec![cmdbuf_mem]);
            return Err(e.into());
        }
    };
    let read_data_mem = match alloc_mapped(adapter, channel, std::mem::size_of::<NvjpgStatus>() as u32, READ_DATA_ALIGN) {
        Ok(m) => m,
        Err(e) => {
            release_blocks(adapter, vec![cmdbuf_mem, pic_info_mem]);
            return Err(e.into());
        }
    };
    let scan_data_mem = match alloc_mapped(adapter, channel, capacity, SCAN_DATA_ALIGN) {
        Ok(m) => m,
        Err(e) => {
            release_blocks(adapter, vec![cmdbuf_mem, pic_info_mem, read_data_mem]);
            return Err(e.into());
        }
    };

    let cmdbuf_handle = cmdbuf_mem.handle();
    Ok(RingSlot {
        cmdbuf_mem,
        cmdbuf: CmdBuf::new(cmdbuf_handle),
        pic_info_mem,
        read_data_mem,
        scan_data_mem,
        pending_fence: Fence::empty(),
    })
}

fn release_blocks(adapter: &dyn ChannelAdapter, blocks: Vec<MemoryBlock>) {
    for mut block in blocks {
        adapter.unmap_device(&mut block).ok();
        adapter.unmap_cpu(&mut block).ok();
        adapter.free(block).ok();
    }
}

/// Picks the channel-adapter backend, the device node, the scan-data
/// capacity and the in-flight ring size at construction rather than
/// through a build-time `cfg`.
pub struct DecoderBuilder {
    channel_kind: ChannelKind,
    device_node: String,
    capacity: u32,
    ring_size: usize,
    colorspace: Colorspace,
}

impl DecoderBuilder {
    pub fn new() -> DecoderBuilder {
        DecoderBuilder {
            channel_kind: ChannelKind::Generic,
            device_node: DEFAULT_DEVICE_NODE.to_string(),
            capacity: DEFAULT_CAPACITY,
            ring_size: 1,
            colorspace: Colorspace::default(),
        }
    }

    pub fn channel_kind(mut self, kind: ChannelKind) -> DecoderBuilder {
        self.channel_kind = kind;
        self
    }

    pub fn device_node(mut self, node: impl Into<String>) -> DecoderBuilder {
        self.device_node = node.into();
        self
    }

    pub fn capacity(mut self, capacity: u32) -> DecoderBuilder {
        self.capacity = capacity;
        self
    }

    /// Number of in-flight submission slots. `1` (the default) means at
    /// most one decode in flight; a single-slot implementation is also
    /// correct.
    pub fn ring_size(mut self, ring_size: usize) -> DecoderBuilder {
        self.ring_size = ring_size.max(1);
        self
    }

    pub fn colorspace(mut self, colorspace: Colorspace) -> DecoderBuilder {
        self.colorspace = colorspace;
        self
    }

    pub fn build(self) -> Result<DecoderOrchestrator> {
        let adapter: Box<dyn ChannelAdapter> = match self.channel_kind {
            ChannelKind::Generic => Box::new(GenericChannelAdapter::new()?),
            ChannelKind::Console => Box::new(ConsoleChannelAdapter::new()),
        };
        DecoderOrchestrator::initialize(adapter, &self.device_node, self.capacity, self.ring_size, self.colorspace)
    }

    /// Builds against a caller-supplied adapter instead of constructing a
    /// generic/console one — how tests substitute a mock hardware backend.
    pub fn build_with_adapter(self, adapter: Box<dyn ChannelAdapter>) -> Result<DecoderOrchestrator> {
        DecoderOrchestrator::initialize(adapter, &self.device_node, self.capacity, self.ring_size, self.colorspace)
    }
}

impl Default for DecoderBuilder {
    fn default() -> DecoderBuilder {
        DecoderBuilder::new()
    }
}

/// Owns a [`Channel`] and a ring of `(cmdbuf, pic_info, read_data,
/// scan_data)` memory quadruples; turns renders into submits and tracks
/// their completion fences.
pub struct DecoderOrchestrator {
    adapter: Box<dyn ChannelAdapter>,
    channel: Option<Channel>,
    colorspace: Colorspace,
    ring: Vec<RingSlot>,
    ring_pos: usize,
}

impl DecoderOrchestrator {
    fn initialize(
        adapter: Box<dyn ChannelAdapter>,
        device_node: &str,
        capacity: u32,
        ring_size: usize,
        colorspace: Colorspace,
    ) -> Result<DecoderOrchestrator> {
        let channel = adapter.open_channel(device_node)?;

        let mut ring = Vec::with_capacity(ring_size);
        for _ in 0..ring_size {
            match alloc_slot(adapter.as_ref(), &channel, capacity) {
                Ok(slot) => ring.push(slot),
                Err(e) => {
                    for slot in ring {
                        slot.release(adapter.as_ref());
                    }
                    adapter.close_channel(channel).ok();
                    return Err(e);
                }
            }
        }

        Ok(DecoderOrchestrator { adapter, channel: Some(channel), colorspace, ring, ring_pos: 0 })
    }

    /// The channel-adapter backend this decoder is driving. Needed to
    /// allocate a [`Surface`]/[`VideoSurface`] against the same backend
    /// (generic host or console) the decoder itself was built with.
    pub fn adapter(&self) -> &dyn ChannelAdapter {
        self.adapter.as_ref()
    }

    /// The channel this decoder submits on. Needed, alongside
    /// [`Self::adapter`], to allocate an output surface.
    pub fn channel(&self) -> &Channel {
        self.channel.as_ref().expect("channel is only taken in Drop")
    }

    /// Frees and reallocates every ring slot's scan-data block at the new
    /// capacity, leaving `cmdbuf`/`pic_info`/`read_data` untouched.
    pub fn resize(&mut self, capacity: u32) -> Result<()> {
        let old_ring = std::mem::take(&mut self.ring);
        let mut new_ring = Vec::with_capacity(old_ring.len());
        for slot in old_ring {
            let RingSlot { cmdbuf_mem, cmdbuf, pic_info_mem, read_data_mem, mut scan_data_mem, pending_fence } = slot;
            self.adapter.unmap_device(&mut scan_data_mem).ok();
            self.adapter.unmap_cpu(&mut scan_data_mem)?;
            self.adapter.free(scan_data_mem)?;
            let scan_data_mem = alloc_mapped(self.adapter.as_ref(), self.channel(), capacity, SCAN_DATA_ALIGN)?;
            new_ring.push(RingSlot { cmdbuf_mem, cmdbuf, pic_info_mem, read_data_mem, scan_data_mem, pending_fence });
        }
        self.ring = new_ring;
        Ok(())
    }

    /// The scan-data capacity the decoder is currently configured to
    /// accept, per ring slot.
    pub fn capacity(&self) -> u32 {
        self.ring[self.ring_pos].scan_data_mem.size()
    }

    fn validate(image: &Image) -> Result<()> {
        if image.progressive {
            return Err(Error::Einval("progressive JPEGs are not supported by this engine"));
        }
        if image.width == 0 || image.height == 0 {
            return Err(Error::Einval("image has zero width or height"));
        }
        if image.num_components == 1 && (image.components[0].sampling_h != 1 || image.components[0].sampling_v != 1) {
            return Err(Error::Einval("monochrome component must have 1:1 sampling"));
        }
        Ok(())
    }

    /// Blocks on the current ring slot's pending fence (if any) before
    /// letting its buffers be overwritten, then returns it for reuse.
    fn acquire_slot(&mut self) -> Result<usize> {
        let pos = self.ring_pos;
        let pending = self.ring[pos].pending_fence;
        if !pending.is_empty() {
            self.adapter.wait(pending, -1)?;
        }
        Ok(pos)
    }

    fn advance_ring(&mut self) {
        self.ring_pos = (self.ring_pos + 1) % self.ring.len();
    }

    fn write_picture_info(&mut self, slot: usize, info: &nvjpg_sys::NvjpgPictureInfo) -> Result<()> {
        let bytes = picture::as_bytes(info);
        let dst = self.ring[slot].pic_info_mem.as_mut_slice()?;
        dst[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn write_scan_data(&mut self, slot: usize, scan: &[u8]) -> Result<()> {
        let dst = self.ring[slot].scan_data_mem.as_mut_slice()?;
        dst[..scan.len()].copy_from_slice(scan);
        Ok(())
    }

    fn flush_cmdbuf(&mut self, slot: usize) -> Result<()> {
        let words = self.ring[slot].cmdbuf.words().to_vec();
        let dst = self.ring[slot].cmdbuf_mem.as_mut_slice()?;
        for (i, word) in words.iter().enumerate() {
            dst[i * 4..i * 4 + 4].copy_from_slice(&word.to_ne_bytes());
        }
        Ok(())
    }

    fn push_footer(&mut self, slot: usize) -> Result<()> {
        let syncpt = self.channel().syncpoint_id();
        let cmdbuf = &mut self.ring[slot].cmdbuf;
        cmdbuf.begin(NVJPG_CLASS_ID, None)?;
        cmdbuf.push_raw(nvjpg_sys::host1x::non_incr(thi::INCR_SYNCPT, 1));
        cmdbuf.push_raw(syncpt | thi::INCR_SYNCPT_COND_WHEN_DONE);
        cmdbuf.end()?;
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> Result<Fence> {
        self.flush_cmdbuf(slot)?;
        let fence = self.adapter.submit(self.channel(), &self.ring[slot].cmdbuf)?;
        self.ring[slot].pending_fence = fence;
        Ok(fence)
    }

    /// Renders `image`'s scan data into a packed `Surface`, converting to
    /// RGB(A) with this decoder's colour matrix.
    pub fn render(&mut self, image: &Image, surf: &mut Surface, alpha: u8, downscale: u32) -> Result<()> {
        Self::validate(image)?;
        if surf.width() == 0 || surf.height() == 0 {
            return Err(Error::Einval("surface has zero width or height"));
        }

        let scan = &image.scan_data()[..];
        let slot = self.acquire_slot()?;
        if scan.len() as u32 > self.ring[slot].scan_data_mem.size() {
            return Err(Error::Enomem("scan data exceeds the configured capacity"));
        }
        self.write_scan_data(slot, scan)?;

        let mut info = picture::build_common(image, scan.len() as u32, downscale);
        picture::fill_packed(&mut info, image, surf, alpha, self.colorspace);
        self.write_picture_info(slot, &info)?;

        {
            let slot_ref = &mut self.ring[slot];
            slot_ref.cmdbuf.clear();
            slot_ref.cmdbuf.begin(NVJPG_CLASS_ID, None)?;
            slot_ref.cmdbuf.push_value(nvjpg::OPERATION_TYPE, nvjpg::DECODE);
            slot_ref.cmdbuf.push_reloc_default(nvjpg::PICTURE_INFO_OFFSET, &slot_ref.pic_info_mem);
            slot_ref.cmdbuf.push_reloc_default(nvjpg::READ_INFO_OFFSET, &slot_ref.read_data_mem);
            slot_ref.cmdbuf.push_reloc_default(nvjpg::SCAN_DATA_OFFSET, &slot_ref.scan_data_mem);
            slot_ref.cmdbuf.push_reloc_default(nvjpg::OUT_DATA_OFFSET, surf.map());
            slot_ref.cmdbuf.push_value(nvjpg::EXECUTE, nvjpg::EXECUTE_TRIGGER);
            slot_ref.cmdbuf.end()?;
        }
        self.push_footer(slot)?;

        let fence = self.submit(slot)?;
        surf.set_render_fence(fence);
        self.advance_ring();
        Ok(())
    }

    /// Renders `image`'s scan data into a planar `VideoSurface`, leaving
    /// it in YUV (no colour-matrix conversion happens for this variant).
    pub fn render_video(&mut self, image: &Image, surf: &mut VideoSurface, downscale: u32) -> Result<()> {
        Self::validate(image)?;
        if surf.width() == 0 || surf.height() == 0 {
            return Err(Error::Einval("surface has zero width or height"));
        }

        let scan = &image.scan_data()[..];
        let slot = self.acquire_slot()?;
        if scan.len() as u32 > self.ring[slot].scan_data_mem.size() {
            return Err(Error::Enomem("scan data exceeds the configured capacity"));
        }
        self.write_scan_data(slot, scan)?;

        let mut info = picture::build_common(image, scan.len() as u32, downscale);
        picture::fill_video(&mut info, image, surf);
        self.write_picture_info(slot, &info)?;

        {
            let chromab_offset = surf.chromab_offset();
            let chromar_offset = surf.chromar_offset();
            let slot_ref = &mut self.ring[slot];
            slot_ref.cmdbuf.clear();
            slot_ref.cmdbuf.begin(NVJPG_CLASS_ID, None)?;
            slot_ref.cmdbuf.push_value(nvjpg::OPERATION_TYPE, nvjpg::DECODE);
            slot_ref.cmdbuf.push_reloc_default(nvjpg::PICTURE_INFO_OFFSET, &slot_ref.pic_info_mem);
            slot_ref.cmdbuf.push_reloc_default(nvjpg::READ_INFO_OFFSET, &slot_ref.read_data_mem);
            slot_ref.cmdbuf.push_reloc_default(nvjpg::SCAN_DATA_OFFSET, &slot_ref.scan_data_mem);
            slot_ref.cmdbuf.push_reloc_default(nvjpg::OUT_DATA_OFFSET, surf.map());
            slot_ref.cmdbuf.push_reloc(nvjpg::OUT_DATA_2_OFFSET, surf.map(), chromab_offset, 8, nvjpg_sys::ioctl::RelocType::Default);
            slot_ref.cmdbuf.push_reloc(nvjpg::OUT_DATA_3_OFFSET, surf.map(), chromar_offset, 8, nvjpg_sys::ioctl::RelocType::Default);
            slot_ref.cmdbuf.push_value(nvjpg::EXECUTE, nvjpg::EXECUTE_TRIGGER);
            slot_ref.cmdbuf.end()?;
        }
        self.push_footer(slot)?;

        let fence = self.submit(slot)?;
        surf.set_render_fence(fence);
        self.advance_ring();
        Ok(())
    }

    /// Waits on `target`'s stored render fence and returns the decode
    /// result descriptor the engine wrote back.
    pub fn wait(&self, target: &impl RenderTarget, timeout_us: i64) -> Result<DecodeStatus> {
        let fence = target.render_fence();
        if fence.is_empty() {
            return Err(Error::Einval("surface has no pending render"));
        }
        let slot = self
            .ring
            .iter()
            .find(|s| s.pending_fence == fence)
            .ok_or(Error::Einval("render fence does not match any in-flight submission"))?;

        self.adapter.wait(fence, timeout_us)?;

        let bytes = slot.read_data_mem.as_slice()?;
        let mut raw = NvjpgStatus::default();
        let raw_bytes = unsafe {
            std::slice::from_raw_parts_mut((&mut raw as *mut NvjpgStatus) as *mut u8, std::mem::size_of::<NvjpgStatus>())
        };
        raw_bytes.copy_from_slice(&bytes[..raw_bytes.len()]);
        Ok(raw.into())
    }

    pub fn get_clock_rate(&self) -> Result<u32> {
        Ok(self.adapter.get_clock_rate(self.channel(), NVJPG_CLASS_ID)?)
    }

    pub fn set_clock_rate(&self, rate: u32) -> Result<()> {
        Ok(self.adapter.set_clock_rate(self.channel(), NVJPG_CLASS_ID, rate)?)
    }

    #[cfg(test)]
    pub(crate) fn current_picture_info(&self) -> nvjpg_sys::NvjpgPictureInfo {
        let slot = &self.ring[(self.ring_pos + self.ring.len() - 1) % self.ring.len()];
        let bytes = slot.pic_info_mem.as_slice().unwrap();
        let mut info = nvjpg_sys::NvjpgPictureInfo::default();
        let info_bytes = unsafe {
            std::slice::from_raw_parts_mut(
                (&mut info as *mut nvjpg_sys::NvjpgPictureInfo) as *mut u8,
                std::mem::size_of::<nvjpg_sys::NvjpgPictureInfo>(),
            )
        };
        info_bytes.copy_from_slice(&bytes[..info_bytes.len()]);
        info
    }

    #[cfg(test)]
    pub(crate) fn submit_count(&self) -> usize {
        self.ring.iter().filter(|s| !s.pending_fence.is_empty()).count()
    }
}

impl Drop for DecoderOrchestrator {
    fn drop(&mut self) {
        let ring = std::mem::take(&mut self.ring);
        for slot in ring {
            slot.release(self.adapter.as_ref());
        }
        if let Some(channel) = self.channel.take() {
            self.adapter.close_channel(channel).ok();
        }
    }
}
