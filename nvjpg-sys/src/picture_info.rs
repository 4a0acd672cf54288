//! The fixed-layout descriptors the NVJPG engine reads and writes.
//!
//! `NvjpgPictureInfo` is the input descriptor the engine decodes a picture
//! from; `NvjpgStatus` is the result descriptor it writes back. Both are
//! laid out exactly as the hardware expects — field order and padding
//! matter and must not be "cleaned up".

/// One Huffman table's code-length histogram and symbol list, as consumed
/// by the engine. 16 code counts, 80 reserved (zeroed) bytes, then up to
/// 162 symbol bytes; the whole table is 4-byte aligned, which pads its
/// total size from 306 to 308 bytes.
#[repr(C, align(4))]
#[derive(Debug, Clone, Copy)]
pub struct HuffmanTable {
    pub codes: [u32; 16],
    pub reserved: [u8; 80],
    pub symbols: [u8; 162],
}

impl Default for HuffmanTable {
    fn default() -> Self {
        HuffmanTable {
            codes: [0; 16],
            reserved: [0; 80],
            symbols: [0; 162],
        }
    }
}

/// A single scan component's sampling factors and table assignments.
#[repr(C, align(4))]
#[derive(Debug, Default, Clone, Copy)]
pub struct Component {
    pub sampling_horiz: u8,
    pub sampling_vert: u8,
    pub quant_table_id: u8,
    pub hm_ac_table_id: u8,
    pub hm_dc_table_id: u8,
}

/// A single 8x8 quantization table, in zig-zag scan order as read from the
/// bitstream.
#[repr(C, align(4))]
#[derive(Debug, Clone, Copy)]
pub struct QuantizationTable {
    pub table: [u8; 64],
}

impl Default for QuantizationTable {
    fn default() -> Self {
        QuantizationTable { table: [0; 64] }
    }
}

/// The picture-info descriptor submitted to the engine for every decode.
/// Must remain exactly `0xB2C` bytes; see the `size_is_0xb2c` assertion
/// below.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvjpgPictureInfo {
    pub hm_ac_tables: [HuffmanTable; 4],
    pub hm_dc_tables: [HuffmanTable; 4],
    pub components: [Component; 4],
    pub quant_tables: [QuantizationTable; 4],
    pub restart_interval: u32,
    pub width: u32,
    pub height: u32,
    pub num_mcu_h: u32,
    pub num_mcu_v: u32,
    pub num_components: u32,
    pub scan_data_offset: u32,
    pub scan_data_size: u32,
    pub scan_data_samp_layout: u32,
    pub out_data_samp_layout: u32,
    pub out_surf_type: u32,
    pub out_luma_surf_pitch: u32,
    pub out_chroma_surf_pitch: u32,
    pub alpha: u32,
    /// Y gain, V->R, U->G, V->G, U->B, Y offset; all 16.16 fixed-point.
    pub yuv2rgb_kernel: [u32; 6],
    /// `0` = pitch linear, `1` = block linear. This driver only ever
    /// produces pitch-linear output.
    pub tile_mode: u32,
    /// Only meaningful when `tile_mode` is block-linear.
    pub gob_height: u32,
    pub memory_mode: u32,
    pub downscale_log_2: u32,
    pub reserved_xb1c: [u32; 3],
}

impl Default for NvjpgPictureInfo {
    fn default() -> Self {
        // Safe: every field is a plain-old-data integer or array thereof,
        // and the all-zero bit pattern is a valid value for each of them.
        unsafe { core::mem::zeroed() }
    }
}

const _: [(); 1] = [(); (core::mem::size_of::<NvjpgPictureInfo>() == 0xb2c) as usize];

/// The decode-result descriptor written back by the engine. `used_bytes` is
/// the number of scan bytes actually consumed.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvjpgStatus {
    pub used_bytes: u32,
    pub mcu_x: u32,
    pub mcu_y: u32,
    pub reserved_xc: u32,
    pub result: u32,
    pub reserved_x14: [u32; 3],
}

const _: [(); 1] = [(); (core::mem::size_of::<NvjpgStatus>() == 0x20) as usize];

/// `out_surf_type` / engine pixel-format enum.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv = 0,
    Rgb = 1,
    Bgr = 2,
    Rgba = 3,
    Bgra = 4,
    Abgr = 5,
    Argb = 6,
}

/// `scan_data_samp_layout` / `out_data_samp_layout` enum.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingFormat {
    Monochrome = 0,
    S420 = 1,
    S422 = 2,
    S440 = 3,
    S444 = 4,
}

/// `memory_mode` enum.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    SemiPlanarNv12 = 0,
    SemiPlanarNv21 = 1,
    SinglyPlanar = 2,
    Planar = 3,
}
