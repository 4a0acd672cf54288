//! The Image Descriptor: parsed JPEG metadata, populated by `parser` and
//! consumed by `picture_info`.

use bitflags::bitflags;

use nvjpg_core::bitstream::ByteBuffer;
use nvjpg_sys::SamplingFormat;

/// Maximum number of colour components this driver ever decodes (the
/// engine has no use for more than three colour components).
pub const MAX_COMPONENTS: usize = 4;
pub const MAX_QUANT_TABLES: usize = 4;
pub const MAX_HUFFMAN_TABLES: usize = 4;

bitflags! {
    /// Which of the four quantization-table or Huffman-table ids a parse
    /// has populated. Bit `n` set means table id `n` is present.
    pub struct TablePresence: u8 {
        const TABLE_0 = 1 << 0;
        const TABLE_1 = 1 << 1;
        const TABLE_2 = 1 << 2;
        const TABLE_3 = 1 << 3;
    }
}

impl TablePresence {
    pub fn has(&self, id: u8) -> bool {
        self.bits() & (1 << id) != 0
    }

    pub fn set_id(&mut self, id: u8) {
        *self = *self | TablePresence::from_bits_truncate(1 << id);
    }
}

/// A single scan component: sampling factors and the three table ids it
/// references.
#[derive(Debug, Default, Clone, Copy)]
pub struct Component {
    /// 1-based id from the bitstream, stored 0-based.
    pub id: u8,
    pub sampling_h: u8,
    pub sampling_v: u8,
    pub quant_table_id: u8,
    pub hm_ac_table_id: u8,
    pub hm_dc_table_id: u8,
}

/// One quantization table: 64 coefficients in zig-zag order.
#[derive(Debug, Clone, Copy)]
pub struct QuantTable {
    pub values: [u8; 64],
}

impl Default for QuantTable {
    fn default() -> QuantTable {
        QuantTable { values: [0; 64] }
    }
}

/// One Huffman table: a 16-entry code-length histogram plus up to 162
/// symbol bytes (only the first `sum(counts)` are meaningful).
#[derive(Debug, Clone, Copy)]
pub struct HuffmanTable {
    pub counts: [u8; 16],
    pub symbols: [u8; 162],
}

impl Default for HuffmanTable {
    fn default() -> HuffmanTable {
        HuffmanTable { counts: [0; 16], symbols: [0; 162] }
    }
}

impl HuffmanTable {
    pub fn symbol_count(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }
}

/// Parsed JPEG metadata: everything the orchestrator needs to build a
/// picture-info descriptor without re-reading the bitstream.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u16,
    pub height: u16,
    pub progressive: bool,
    pub num_components: u8,
    pub sampling_precision: u8,
    pub mcu_size_h: u32,
    pub mcu_size_v: u32,
    pub sampling_scheme: SamplingFormat,
    pub restart_interval: u16,
    pub spectral_selection_lo: u8,
    pub spectral_selection_hi: u8,
    pub components: [Component; MAX_COMPONENTS],
    pub quant_tables: [QuantTable; MAX_QUANT_TABLES],
    pub quant_mask: TablePresence,
    pub hm_ac_tables: [HuffmanTable; MAX_HUFFMAN_TABLES],
    pub hm_ac_mask: TablePresence,
    pub hm_dc_tables: [HuffmanTable; MAX_HUFFMAN_TABLES],
    pub hm_dc_mask: TablePresence,
    /// Byte offset into the source buffer where the entropy-coded segment
    /// begins, set once `SOS` is reached.
    pub scan_offset: usize,
    /// The buffer the parse ran over; kept alive so `scan_data()` can hand
    /// back a slice of it without the caller needing to pass it around.
    pub(crate) data: ByteBuffer,
}

impl Default for Image {
    fn default() -> Image {
        Image {
            width: 0,
            height: 0,
            progressive: false,
            num_components: 0,
            sampling_precision: 0,
            mcu_size_h: 0,
            mcu_size_v: 0,
            sampling_scheme: SamplingFormat::Monochrome,
            restart_interval: 0,
            spectral_selection_lo: 0,
            spectral_selection_hi: 0,
            components: [Component::default(); MAX_COMPONENTS],
            quant_tables: [QuantTable::default(); MAX_QUANT_TABLES],
            quant_mask: TablePresence::empty(),
            hm_ac_tables: [HuffmanTable::default(); MAX_HUFFMAN_TABLES],
            hm_ac_mask: TablePresence::empty(),
            hm_dc_tables: [HuffmanTable::default(); MAX_HUFFMAN_TABLES],
            hm_dc_mask: TablePresence::empty(),
            scan_offset: 0,
            data: ByteBuffer::default(),
        }
    }
}

impl Image {
    /// `num_mcu_h = ceil(width / mcu_size_h)`.
    pub fn num_mcu_h(&self) -> u32 {
        (self.width as u32 + self.mcu_size_h - 1) / self.mcu_size_h
    }

    /// `num_mcu_v = ceil(height / mcu_size_v)`.
    pub fn num_mcu_v(&self) -> u32 {
        (self.height as u32 + self.mcu_size_v - 1) / self.mcu_size_v
    }

    /// The entropy-coded scan bytes: everything from `scan_offset` to the
    /// end of the buffer the parse ran over.
    pub fn scan_data(&self) -> &[u8] {
        &self.data[self.scan_offset..]
    }
}
