//! JPEG Parser: a single forward pass over a JFIF byte stream that
//! populates an [`Image`] and locates the entropy-coded scan payload.
//!
//! One marker handler per segment kind, mirroring the shape of a typical
//! hand-written JFIF parser. The DQT precision nibble is read as
//! `info >> 4 & 0xF` (the only reading possible at all for a single byte,
//! and the standard `Pq` nibble position), and a 16-bit-precision
//! quantization coefficient keeps its low byte rather than its high one.

use nvjpg_core::bitstream::ByteBuffer;
use nvjpg_core::Bitstream;
use nvjpg_sys::SamplingFormat;

use crate::error::{Error, Result};
use crate::image::{Image, MAX_COMPONENTS};

mod marker {
    pub const MAGIC: u8 = 0xff;
    pub const SOI: u8 = 0xd8;
    pub const EOI: u8 = 0xd9;
    pub const SOF0: u8 = 0xc0;
    pub const SOF1: u8 = 0xc1;
    pub const SOF2: u8 = 0xc2;
    pub const DHT: u8 = 0xc4;
    pub const DQT: u8 = 0xdb;
    pub const DRI: u8 = 0xdd;
    pub const SOS: u8 = 0xda;
    pub const APP0: u8 = 0xe0;
    pub const APP15: u8 = 0xef;
}

struct SegmentHeader {
    marker: u8,
    size: u16,
}

/// Skips bytes until a `0xff` is found (or the stream runs dry), then
/// reads the marker byte and the big-endian segment size.
fn find_next_segment(bs: &mut Bitstream) -> SegmentHeader {
    let mut magic = bs.get::<u8>();
    while magic != marker::MAGIC && !bs.empty() {
        magic = bs.get::<u8>();
    }
    let marker = bs.get::<u8>();
    let size = bs.get_be::<u16>();
    SegmentHeader { marker, size }
}

fn parse_sof(image: &mut Image, marker: u8, size: u16, bs: &mut Bitstream) -> Result<()> {
    if size < 11 {
        return Err(Error::Enodata("truncated SOF segment"));
    }

    image.progressive = marker == marker::SOF2;
    image.sampling_precision = bs.get::<u8>();
    image.height = bs.get_be::<u16>();
    image.width = bs.get_be::<u16>();

    image.num_components = bs.get::<u8>();
    if image.num_components > 3 {
        return Err(Error::Einval("more than three colour components"));
    }

    let mut max_samp_h = 0u8;
    let mut max_samp_v = 0u8;
    for _ in 0..image.num_components {
        let id = bs.get::<u8>().wrapping_sub(1);
        if id as usize >= MAX_COMPONENTS {
            return Err(Error::Einval("component id out of range"));
        }
        let sampling = bs.get::<u8>();
        let sampling_vert = sampling & 0xf;
        let sampling_horiz = (sampling >> 4) & 0xf;
        let quant_table_id = bs.get::<u8>();

        let comp = &mut image.components[id as usize];
        comp.id = id;
        comp.sampling_v = sampling_vert;
        comp.sampling_h = sampling_horiz;
        comp.quant_table_id = quant_table_id;

        max_samp_h = max_samp_h.max(sampling_horiz);
        max_samp_v = max_samp_v.max(sampling_vert);
    }

    image.mcu_size_h = 8 * max_samp_h as u32;
    image.mcu_size_v = 8 * max_samp_v as u32;

    image.sampling_scheme = if image.num_components == 3 {
        let comp0 = &image.components[0];
        match (comp0.sampling_v, comp0.sampling_h) {
            (2, 2) => SamplingFormat::S420,
            (2, _) => SamplingFormat::S422,
            (_, 2) => SamplingFormat::S440,
            _ => SamplingFormat::S444,
        }
    } else {
        SamplingFormat::Monochrome
    };

    Ok(())
}

fn parse_dqt(image: &mut Image, size: u16, bs: &mut Bitstream) -> Result<()> {
    if size < 67 {
        return Err(Error::Enodata("truncated DQT segment"));
    }

    let body_len = (size as usize).saturating_sub(2);
    let start = bs.position();
    while body_len.saturating_sub(bs.position() - start) > 63 {
        let info = bs.get::<u8>();
        let id = info & 0xf;
        let precision = (info >> 4) & 0xf;

        image.quant_mask.set_id(id);
        let table = &mut image.quant_tables[id as usize].values;
        if precision == 0 {
            for slot in table.iter_mut() {
                *slot = bs.get::<u8>();
            }
        } else {
            for slot in table.iter_mut() {
                bs.get::<u8>();
                *slot = bs.get::<u8>();
            }
        }
    }

    Ok(())
}

fn parse_dht(image: &mut Image, size: u16, bs: &mut Bitstream) -> Result<()> {
    if size < 18 {
        return Err(Error::Enodata("truncated DHT segment"));
    }

    let body_len = (size as usize).saturating_sub(2);
    let start = bs.position();
    while body_len.saturating_sub(bs.position() - start) > 14 {
        let info = bs.get::<u8>();
        let id = info & 0xf;
        let is_dc = (info >> 4) & 0x1 != 0;

        let mut counts = [0u8; 16];
        for c in counts.iter_mut() {
            *c = bs.get::<u8>();
        }
        let num_symbols: usize = counts.iter().map(|&c| c as usize).sum();
        let mut symbols = [0u8; 162];
        for s in symbols.iter_mut().take(num_symbols) {
            *s = bs.get::<u8>();
        }

        if is_dc {
            image.hm_dc_mask.set_id(id);
            image.hm_dc_tables[id as usize] = crate::image::HuffmanTable { counts, symbols };
        } else {
            image.hm_ac_mask.set_id(id);
            image.hm_ac_tables[id as usize] = crate::image::HuffmanTable { counts, symbols };
        }
    }

    Ok(())
}

fn parse_dri(image: &mut Image, size: u16, bs: &mut Bitstream) -> Result<()> {
    if size != 4 {
        return Err(Error::Enodata("malformed DRI segment"));
    }
    image.restart_interval = bs.get_be::<u16>();
    Ok(())
}

fn parse_sos(image: &mut Image, size: u16, bs: &mut Bitstream) -> Result<()> {
    if size < 8 {
        return Err(Error::Enodata("truncated SOS segment"));
    }

    let num_components = bs.get::<u8>();
    if num_components != image.num_components {
        return Err(Error::Einval("SOS component count does not match SOF"));
    }

    for _ in 0..num_components {
        let id = bs.get::<u8>().wrapping_sub(1);
        if id as usize >= MAX_COMPONENTS {
            return Err(Error::Einval("component id out of range"));
        }
        let info = bs.get::<u8>();
        let comp = &mut image.components[id as usize];
        comp.hm_ac_table_id = info & 0xf;
        comp.hm_dc_table_id = (info >> 4) & 0xf;
    }

    image.spectral_selection_lo = bs.get::<u8>();
    image.spectral_selection_hi = bs.get::<u8>();
    bs.skip(1);

    Ok(())
}

/// Parses `data` into an [`Image`], stopping at the first `SOS` segment.
///
/// Single forward pass: finds `SOI`, then dispatches each subsequent
/// marker. Returns as soon as `SOS` has been read, with `scan_offset`
/// pointing at the first byte of the entropy-coded segment.
pub fn parse(data: ByteBuffer) -> Result<Image> {
    let mut bs = Bitstream::new(data.clone());
    let mut image = Image::default();
    image.data = data;

    // Find SOI; the two bytes read as its "size" are actually the next
    // segment's FF + marker byte, so rewinding 2 bytes leaves the cursor
    // right before them, ready for the main loop to re-read that marker.
    let mut seg = find_next_segment(&mut bs);
    while !bs.empty() && seg.marker != marker::SOI {
        seg = find_next_segment(&mut bs);
    }
    bs.rewind(std::mem::size_of::<u16>());

    while !bs.empty() {
        seg = find_next_segment(&mut bs);
        if bs.empty() {
            return Err(Error::Enodata("stream ended while searching for a marker"));
        }

        match seg.marker {
            marker::SOI => return Err(Error::Einval("unexpected SOI inside the stream")),
            marker::APP0..=marker::APP15 => bs.skip(seg.size as usize - 2),
            marker::SOF0 | marker::SOF1 | marker::SOF2 => parse_sof(&mut image, seg.marker, seg.size, &mut bs)?,
            marker::DQT => parse_dqt(&mut image, seg.size, &mut bs)?,
            marker::DHT => parse_dht(&mut image, seg.size, &mut bs)?,
            marker::DRI => parse_dri(&mut image, seg.size, &mut bs)?,
            marker::SOS => {
                parse_sos(&mut image, seg.size, &mut bs)?;
                image.scan_offset = bs.position();
                return Ok(image);
            }
            marker::EOI => return Err(Error::Enodata("EOI reached before SOS")),
            _ => bs.skip(seg.size as usize - 2),
        }
    }

    Err(Error::Enodata("stream ended before SOS"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    /// Builds a minimal baseline 4:2:0 JPEG: SOI, a DQT with one table, an
    /// SOF0 with three components, a DHT with one DC and one AC table, an
    /// SOS header, and a handful of scan bytes.
    fn minimal_jpeg(scan: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0xff, 0xd8]); // SOI

        // DQT: one 8-bit table, id 0.
        buf.extend_from_slice(&[0xff, 0xdb]);
        buf.extend_from_slice(&(67u16).to_be_bytes());
        buf.push(0x00); // precision 0, id 0
        buf.extend_from_slice(&[1u8; 64]);

        // SOF0: 8x8 luma, 4:2:0 chroma.
        buf.extend_from_slice(&[0xff, 0xc0]);
        buf.extend_from_slice(&(17u16).to_be_bytes());
        buf.push(8); // precision
        buf.extend_from_slice(&(16u16).to_be_bytes()); // height
        buf.extend_from_slice(&(16u16).to_be_bytes()); // width
        buf.push(3); // num_components
        buf.extend_from_slice(&[1, 0x22, 0]); // Y: 2x2, quant 0
        buf.extend_from_slice(&[2, 0x11, 0]); // Cb: 1x1, quant 0
        buf.extend_from_slice(&[3, 0x11, 0]); // Cr: 1x1, quant 0

        // DHT: one DC table (id 0) and one AC table (id 0), both empty.
        buf.extend_from_slice(&[0xff, 0xc4]);
        buf.extend_from_slice(&(2 * 17u16 + 2).to_be_bytes());
        buf.push(0x10); // class bit 4 set (DC), id 0
        buf.extend_from_slice(&[0u8; 16]);
        buf.push(0x00); // class bit 4 clear (AC), id 0
        buf.extend_from_slice(&[0u8; 16]);

        // SOS: 3 components, all using table 0/0.
        buf.extend_from_slice(&[0xff, 0xda]);
        buf.extend_from_slice(&(6 + 2 * 3u16).to_be_bytes());
        buf.push(3);
        buf.extend_from_slice(&[1, 0x00]);
        buf.extend_from_slice(&[2, 0x00]);
        buf.extend_from_slice(&[3, 0x00]);
        buf.extend_from_slice(&[0, 63, 0]);

        buf.extend_from_slice(scan);
        buf
    }

    #[test]
    fn parses_baseline_420_and_stops_at_scan_offset() {
        let scan = [0xaa, 0xbb, 0xcc, 0xff, 0x00];
        let bytes = minimal_jpeg(&scan);
        let expected_offset = bytes.len() - scan.len();

        let image = parse(Rc::new(bytes)).unwrap();
        assert_eq!(image.width, 16);
        assert_eq!(image.height, 16);
        assert_eq!(image.num_components, 3);
        assert!(!image.progressive);
        assert_eq!(image.sampling_scheme, SamplingFormat::S420);
        assert_eq!(image.mcu_size_h, 16);
        assert_eq!(image.mcu_size_v, 16);
        assert_eq!(image.scan_offset, expected_offset);
        assert!(image.quant_mask.has(0));
        assert!(image.hm_dc_mask.has(0));
        assert!(image.hm_ac_mask.has(0));
    }

    #[test]
    fn truncating_before_sos_yields_enodata() {
        let mut bytes = minimal_jpeg(&[1, 2, 3]);
        let sos_pos = bytes.windows(2).rposition(|w| w == [0xff, 0xda]).unwrap();
        bytes.truncate(sos_pos + 4);
        assert!(matches!(parse(Rc::new(bytes)), Err(Error::Enodata(_))));
    }

    #[test]
    fn progressive_marker_is_recorded() {
        let mut bytes = minimal_jpeg(&[0]);
        let sof_pos = bytes.windows(2).position(|w| w == [0xff, 0xc0]).unwrap();
        bytes[sof_pos + 1] = 0xc2;
        let image = parse(Rc::new(bytes)).unwrap();
        assert!(image.progressive);
    }

    #[test]
    fn eoi_before_sos_yields_enodata() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0xff, 0xd8]);
        buf.extend_from_slice(&[0xff, 0xd9]);
        assert!(matches!(parse(Rc::new(buf)), Err(Error::Enodata(_))));
    }

    #[test]
    fn missing_soi_yields_enodata() {
        let buf = vec![0x00, 0x01, 0x02, 0x03];
        assert!(matches!(parse(Rc::new(buf)), Err(Error::Enodata(_))));
    }
}
