//! Output surfaces: the GPU-addressable destination of a decode, backed by
//! a [`MemoryBlock`] the orchestrator patches a relocation against.
//!
//! Grounded on `include/nvjpg/surface.hpp`/`lib/surface.cpp`: `Surface`
//! (packed RGB/RGBA et al.) and `VideoSurface` (planar YUV) compute their
//! pitch/size the same way (`compute_pitch`/`compute_size`), just with
//! different plane counts.

use nvjpg_core::channel::{Channel, ChannelAdapter};
use nvjpg_core::{Fence, MemoryBlock};
pub use nvjpg_sys::{PixelFormat, SamplingFormat};

use crate::error::{Error, Result};

/// Smallest multiple of 256 that is `>= value`, the pitch alignment every
/// surface plane uses.
pub const PITCH_ALIGN: u32 = 0x100;

/// Smallest multiple of 128 KiB that is `>= value`, the vertical-padding
/// alignment every surface plane's byte size uses.
pub const SIZE_ALIGN: u32 = 0x2_0000;

const SURFACE_ALLOC_ALIGN: u32 = 0x400;
const SURFACE_ALLOC_FLAGS: u32 = 0x1;

fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) / align * align
}

fn bpp(fmt: PixelFormat) -> u32 {
    match fmt {
        PixelFormat::Rgb | PixelFormat::Bgr => 3,
        PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::Abgr | PixelFormat::Argb => 4,
        PixelFormat::Yuv => unreachable!("Yuv is a VideoSurface format, not a packed one"),
    }
}

/// A target a decode can be rendered into: something with a backing
/// [`MemoryBlock`] and a fence recording the most recent submit that
/// wrote to it.
pub trait RenderTarget {
    fn map(&self) -> &MemoryBlock;
    fn render_fence(&self) -> Fence;
    fn set_render_fence(&mut self, fence: Fence);
}

/// Allocates, CPU- and device-maps a block of `size` bytes through
/// `adapter`, rolling back every partial step on failure.
fn allocate_mapped(
    adapter: &dyn ChannelAdapter,
    channel: &Channel,
    size: u32,
    align: u32,
) -> nvjpg_core::Result<MemoryBlock> {
    let mut block = adapter.allocate(size, align, SURFACE_ALLOC_FLAGS)?;
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

fn release_mapped(adapter: &dyn ChannelAdapter, mut block: MemoryBlock) -> Result<()> {
    adapter.unmap_device(&mut block)?;
    adapter.unmap_cpu(&mut block)?;
    adapter.free(block)?;
    Ok(())
}

/// A packed-pixel output surface: `RGB`/`BGR`/`RGBA`/`BGRA`/`ABGR`/`ARGB`,
/// one plane, row-pitch aligned to 256 bytes.
#[derive(Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    pitch: u32,
    pixel_format: PixelFormat,
    map: MemoryBlock,
    render_fence: Fence,
}

impl Surface {
    /// `pitch = align_up(width * bpp, 256)`; allocated size
    /// `= align_up(pitch * height, 131072)`.
    pub fn allocate(
        adapter: &dyn ChannelAdapter,
        channel: &Channel,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> Result<Surface> {
        let pitch = align_up(width * bpp(pixel_format), PITCH_ALIGN);
        let size = align_up(pitch * height, SIZE_ALIGN);
        let map = allocate_mapped(adapter, channel, size, SURFACE_ALLOC_ALIGN)?;
        Ok(Surface { width, height, pitch, pixel_format, map, render_fence: Fence::empty() })
    }

    pub fn free(self, adapter: &dyn ChannelAdapter) -> Result<()> {
        release_mapped(adapter, self.map)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }
}

impl RenderTarget for Surface {
    fn map(&self) -> &MemoryBlock {
        &self.map
    }

    fn render_fence(&self) -> Fence {
        self.render_fence
    }

    fn set_render_fence(&mut self, fence: Fence) {
        self.render_fence = fence;
    }
}

/// A planar YUV output surface: independently pitch-aligned Y, Cb and Cr
/// planes within a single allocation.
#[derive(Debug)]
pub struct VideoSurface {
    width: u32,
    height: u32,
    luma_pitch: u32,
    chroma_pitch: u32,
    luma_size: u32,
    chroma_size: u32,
    sampling: SamplingFormat,
    map: MemoryBlock,
    render_fence: Fence,
}

impl VideoSurface {
    /// `luma + 2*chroma` planes, each plane's pitch aligned to 256 bytes
    /// and its byte size aligned to 131072.
    pub fn allocate(
        adapter: &dyn ChannelAdapter,
        channel: &Channel,
        width: u32,
        height: u32,
        sampling: SamplingFormat,
    ) -> Result<VideoSurface> {
        let (h_sub, v_sub) = match sampling {
            SamplingFormat::S420 => (2, 2),
            SamplingFormat::S422 => (2, 1),
            SamplingFormat::S444 => (1, 1),
            SamplingFormat::Monochrome | SamplingFormat::S440 => {
                return Err(Error::Einval("video surfaces only support 4:2:0, 4:2:2 or 4:4:4"))
            }
        };

        let luma_pitch = align_up(width, PITCH_ALIGN);
        let chroma_pitch = align_up(width / h_sub, PITCH_ALIGN);
        let luma_size = align_up(luma_pitch * height, SIZE_ALIGN);
        let chroma_size = align_up(chroma_pitch * (height / v_sub), SIZE_ALIGN);
        let total = luma_size + 2 * chroma_size;

        let map = allocate_mapped(adapter, channel, total, SURFACE_ALLOC_ALIGN)?;
        Ok(VideoSurface {
            width,
            height,
            luma_pitch,
            chroma_pitch,
            luma_size,
            chroma_size,
            sampling,
            map,
            render_fence: Fence::empty(),
        })
    }

    pub fn free(self, adapter: &dyn ChannelAdapter) -> Result<()> {
        release_mapped(adapter, self.map)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma_pitch(&self) -> u32 {
        self.luma_pitch
    }

    pub fn chroma_pitch(&self) -> u32 {
        self.chroma_pitch
    }

    pub fn sampling(&self) -> SamplingFormat {
        self.sampling
    }

    /// Byte offset of the Cb plane's first byte within the backing map.
    pub fn chromab_offset(&self) -> u32 {
        self.luma_size
    }

    /// Byte offset of the Cr plane's first byte within the backing map.
    pub fn chromar_offset(&self) -> u32 {
        self.luma_size + self.chroma_size
    }
}

impl RenderTarget for VideoSurface {
    fn map(&self) -> &MemoryBlock {
        &self.map
    }

    fn render_fence(&self) -> Fence {
        self.render_fence
    }

    fn set_render_fence(&mut self, fence: Fence) {
        self.render_fence = fence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_law_holds_for_rgba() {
        let pitch = align_up(37 * bpp(PixelFormat::Rgba), PITCH_ALIGN);
        assert_eq!(pitch, 256);
        assert!(pitch % 256 == 0 && pitch >= 37 * 4);

        let size = align_up(pitch * 37, SIZE_ALIGN);
        assert_eq!(size, 131072);
        assert!(size % 131072 == 0 && size >= pitch * 37);
    }

    #[test]
    fn plane_layout_is_contiguous() {
        let luma_size = align_up(align_up(64, PITCH_ALIGN) * 64, SIZE_ALIGN);
        let chroma_size = align_up(align_up(32, PITCH_ALIGN) * 32, SIZE_ALIGN);
        let chromab = luma_size;
        let chromar = chromab + chroma_size;
        assert_eq!(chromab, luma_size);
        assert_eq!(chromar, chromab + chroma_size);
    }
}
