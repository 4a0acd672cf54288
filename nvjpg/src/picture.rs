//! Builds the fixed-layout [`NvjpgPictureInfo`] descriptor the engine reads,
//! from a parsed [`Image`] plus whichever output surface a render targets.
//!
//! Grounded on `Decoder::build_picture_info_common`/`Decoder::render` in
//! `lib/decoder.cpp`: the table/component copy loops, the MCU math and the
//! per-surface-kind field sets are carried over field for field.

use nvjpg_sys::colorspace::Colorspace;
use nvjpg_sys::picture_info::{Component as SysComponent, HuffmanTable as SysHuffmanTable, MemoryMode, QuantizationTable};
use nvjpg_sys::{NvjpgPictureInfo, PixelFormat, SamplingFormat};

use crate::image::Image;
use crate::surface::{Surface, VideoSurface};

/// `clamp(ctz(downscale), 0, 3)` if `downscale != 0`, else `0`.
pub(crate) fn downscale_log2(downscale: u32) -> u32 {
    if downscale == 0 {
        0
    } else {
        downscale.trailing_zeros().min(3)
    }
}

/// Populates everything the picture-info descriptor needs regardless of
/// which surface kind the render targets: Huffman/quant tables,
/// components, MCU counts and the scan-data descriptor.
pub(crate) fn build_common(image: &Image, scan_len: u32, downscale: u32) -> NvjpgPictureInfo {
    let mut info = NvjpgPictureInfo::default();

    for i in 0..image.hm_ac_tables.len() {
        if !image.hm_ac_mask.has(i as u8) {
            continue;
        }
        info.hm_ac_tables[i] = to_sys_huffman(&image.hm_ac_tables[i]);
    }
    for i in 0..image.hm_dc_tables.len() {
        if !image.hm_dc_mask.has(i as u8) {
            continue;
        }
        info.hm_dc_tables[i] = to_sys_huffman(&image.hm_dc_tables[i]);
    }
    for i in 0..image.quant_tables.len() {
        if !image.quant_mask.has(i as u8) {
            continue;
        }
        info.quant_tables[i] = QuantizationTable { table: image.quant_tables[i].values };
    }

    for i in 0..image.num_components as usize {
        let c = &image.components[i];
        info.components[i] = SysComponent {
            sampling_horiz: c.sampling_h,
            sampling_vert: c.sampling_v,
            quant_table_id: c.quant_table_id,
            hm_ac_table_id: c.hm_ac_table_id,
            hm_dc_table_id: c.hm_dc_table_id,
        };
    }

    info.restart_interval = image.restart_interval as u32;
    info.width = image.width as u32;
    info.height = image.height as u32;
    info.num_mcu_h = image.num_mcu_h();
    info.num_mcu_v = image.num_mcu_v();
    info.num_components = image.num_components as u32;
    info.scan_data_offset = 0;
    info.scan_data_size = scan_len;
    info.scan_data_samp_layout = image.sampling_scheme as u32;
    info.alpha = 0;
    info.downscale_log_2 = downscale_log2(downscale);

    info
}

fn to_sys_huffman(table: &crate::image::HuffmanTable) -> SysHuffmanTable {
    let mut sys = SysHuffmanTable::default();
    for (dst, &count) in sys.codes.iter_mut().zip(table.counts.iter()) {
        *dst = count as u32;
    }
    sys.symbols = table.symbols;
    sys
}

/// Fills in the fields specific to decoding into a packed [`Surface`].
pub(crate) fn fill_packed(info: &mut NvjpgPictureInfo, image: &Image, surf: &Surface, alpha: u8, colorspace: Colorspace) {
    info.out_data_samp_layout = image.sampling_scheme as u32;
    info.out_surf_type = surf.pixel_format() as u32;
    info.out_luma_surf_pitch = surf.pitch();
    info.out_chroma_surf_pitch = 0;
    info.alpha = alpha as u32;
    info.memory_mode = MemoryMode::Planar as u32;
    info.yuv2rgb_kernel = colorspace.kernel();
}

/// Fills in the fields specific to decoding into a planar [`VideoSurface`].
pub(crate) fn fill_video(info: &mut NvjpgPictureInfo, image: &Image, surf: &VideoSurface) {
    let samp_layout = if image.num_components == 1 { SamplingFormat::Monochrome } else { surf.sampling() };
    info.out_data_samp_layout = samp_layout as u32;
    info.out_surf_type = PixelFormat::Yuv as u32;
    info.out_luma_surf_pitch = surf.luma_pitch();
    info.out_chroma_surf_pitch = surf.chroma_pitch();
    info.memory_mode = MemoryMode::Planar as u32;
}

/// Serializes a picture-info descriptor to its exact on-the-wire bytes.
///
/// Safe: `NvjpgPictureInfo` is `#[repr(C)]`, plain-old-data, and every bit
/// pattern is a valid instance of it.
pub(crate) fn as_bytes(info: &NvjpgPictureInfo) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            (info as *const NvjpgPictureInfo) as *const u8,
            std::mem::size_of::<NvjpgPictureInfo>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downscale_mapping_matches_powers_of_two() {
        assert_eq!(downscale_log2(0), 0);
        assert_eq!(downscale_log2(1), 0);
        assert_eq!(downscale_log2(2), 1);
        assert_eq!(downscale_log2(4), 2);
        assert_eq!(downscale_log2(8), 3);
    }

    #[test]
    fn common_fields_carry_over_from_image() {
        let mut image = Image { width: 33, height: 17, num_components: 1, ..Image::default() };
        image.mcu_size_h = 8;
        image.mcu_size_v = 8;
        image.components[0].sampling_h = 1;
        image.components[0].sampling_v = 1;

        let info = build_common(&image, 1024, 0);
        assert_eq!(info.width, 33);
        assert_eq!(info.height, 17);
        assert_eq!(info.num_mcu_h, 5);
        assert_eq!(info.num_mcu_v, 3);
        assert_eq!(info.scan_data_size, 1024);
        assert_eq!(info.scan_data_offset, 0);
    }
}
