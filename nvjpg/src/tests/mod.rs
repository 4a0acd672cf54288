//! End-to-end scenarios driving `DecoderOrchestrator` against
//! [`ConsoleChannelAdapter`], the hardware-free backend, instead of a real
//! engine.

use std::rc::Rc;

use nvjpg_core::channel::console::ConsoleChannelAdapter;
use nvjpg_core::channel::ChannelKind;
use nvjpg_sys::{PixelFormat, SamplingFormat};

use crate::error::Error;
use crate::image::{Component, Image};
use crate::orchestrator::DecoderBuilder;
use crate::surface::{RenderTarget, Surface, VideoSurface};

/// A minimal baseline 4:2:0, one-scan JFIF buffer: enough markers for
/// `parser::parse` to produce a usable `Image`, with `n` bytes of filler
/// entropy-coded data after `SOS`.
fn minimal_jpeg_420(scan_len: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&[0xFF, 0xD8]); // SOI

    // DQT: one 8-bit table, id 0, all-ones.
    buf.extend_from_slice(&[0xFF, 0xDB]);
    buf.extend_from_slice(&(67u16).to_be_bytes());
    buf.push(0x00); // precision 0, id 0
    buf.extend_from_slice(&[1u8; 64]);

    // SOF0: 8-bit, 32x16, 3 components (Y 2x2, Cb 1x1, Cr 1x1 -> 4:2:0).
    buf.extend_from_slice(&[0xFF, 0xC0]);
    buf.extend_from_slice(&(17u16).to_be_bytes());
    buf.push(8); // precision
    buf.extend_from_slice(&(16u16).to_be_bytes()); // height
    buf.extend_from_slice(&(32u16).to_be_bytes()); // width
    buf.push(3);
    buf.extend_from_slice(&[1, 0x22, 0]); // Y: 2x2, quant 0
    buf.extend_from_slice(&[2, 0x11, 0]); // Cb: 1x1, quant 0
    buf.extend_from_slice(&[3, 0x11, 0]); // Cr: 1x1, quant 0

    // DHT: one DC table (id 0) and one AC table (id 0), both empty. Class
    // bit 4 set means DC, clear means AC.
    buf.extend_from_slice(&[0xFF, 0xC4]);
    buf.extend_from_slice(&(2 * 17u16 + 2).to_be_bytes());
    buf.push(0x10); // DC, id 0
    buf.extend_from_slice(&[0u8; 16]);
    buf.push(0x00); // AC, id 0
    buf.extend_from_slice(&[0u8; 16]);

    // SOS: 3 components, all using table 0/0.
    buf.extend_from_slice(&[0xFF, 0xDA]);
    buf.extend_from_slice(&(6 + 2 * 3u16).to_be_bytes());
    buf.push(3);
    buf.extend_from_slice(&[1, 0x00]);
    buf.extend_from_slice(&[2, 0x00]);
    buf.extend_from_slice(&[3, 0x00]);
    buf.extend_from_slice(&[0, 63, 0]);

    buf.extend(std::iter::repeat(0xABu8).take(scan_len));
    buf
}

fn parse_420(scan_len: usize) -> Image {
    crate::parser::parse(Rc::new(minimal_jpeg_420(scan_len))).expect("minimal JPEG parses")
}

fn monochrome_image(scan_len: usize) -> Image {
    let mut image = Image { width: 16, height: 16, num_components: 1, ..Image::default() };
    image.mcu_size_h = 8;
    image.mcu_size_v = 8;
    image.components[0] = Component { id: 0, sampling_h: 1, sampling_v: 1, ..Component::default() };
    image.sampling_scheme = SamplingFormat::Monochrome;
    image.data = Rc::new(vec![0xAB; scan_len]);
    image.scan_offset = 0;
    image
}

#[test]
fn renders_4_2_0_image_into_packed_rgba_surface() {
    let adapter = ConsoleChannelAdapter::new();
    let mut decoder =
        DecoderBuilder::new().channel_kind(ChannelKind::Console).capacity(4096).build_with_adapter(Box::new(adapter)).unwrap();

    let image = parse_420(128);
    let mut surf = Surface::allocate(decoder.adapter(), decoder.channel(), 32, 16, PixelFormat::Rgba).unwrap();

    decoder.render(&image, &mut surf, 0xFF, 0).unwrap();
    assert!(!surf.render_fence().is_empty());

    let info = decoder.current_picture_info();
    assert_eq!(info.width, 32);
    assert_eq!(info.height, 16);
    assert_eq!(info.scan_data_size, 128);
    assert_eq!(info.num_components, 3);
    assert_eq!(decoder.submit_count(), 1);

    let status = decoder.wait(&surf, -1).unwrap();
    assert_eq!(status, crate::DecodeStatus::default());
}

#[test]
fn renders_monochrome_image_into_video_surface() {
    let adapter = ConsoleChannelAdapter::new();
    let mut decoder =
        DecoderBuilder::new().channel_kind(ChannelKind::Console).capacity(4096).build_with_adapter(Box::new(adapter)).unwrap();

    let image = monochrome_image(64);
    let mut surf =
        VideoSurface::allocate(decoder.adapter(), decoder.channel(), 16, 16, SamplingFormat::S420).unwrap();

    // A mono source forces `Monochrome` output layout regardless of the
    // surface's own (4:2:0) sampling.
    decoder.render_video(&image, &mut surf, 0).unwrap();
    let info = decoder.current_picture_info();
    assert_eq!(info.out_data_samp_layout, SamplingFormat::Monochrome as u32);
    assert_eq!(info.scan_data_samp_layout, SamplingFormat::Monochrome as u32);
    assert_eq!(info.num_components, 1);
}

#[test]
fn renders_into_video_surface_with_downscale() {
    let adapter = ConsoleChannelAdapter::new();
    let mut decoder =
        DecoderBuilder::new().channel_kind(ChannelKind::Console).capacity(4096).build_with_adapter(Box::new(adapter)).unwrap();

    let image = parse_420(256);
    let mut surf = VideoSurface::allocate(decoder.adapter(), decoder.channel(), 32, 16, SamplingFormat::S420).unwrap();

    decoder.render_video(&image, &mut surf, 4).unwrap();
    let info = decoder.current_picture_info();
    assert_eq!(info.downscale_log_2, 2);
    assert_eq!(info.out_surf_type, PixelFormat::Yuv as u32);
    assert!(!surf.render_fence().is_empty());
}

#[test]
fn progressive_image_is_rejected_before_any_submit() {
    let adapter = ConsoleChannelAdapter::new();
    let mut decoder =
        DecoderBuilder::new().channel_kind(ChannelKind::Console).capacity(4096).build_with_adapter(Box::new(adapter)).unwrap();

    let mut image = parse_420(32);
    image.progressive = true;
    let mut surf = Surface::allocate(decoder.adapter(), decoder.channel(), 32, 16, PixelFormat::Rgba).unwrap();

    let err = decoder.render(&image, &mut surf, 0, 0).unwrap_err();
    assert!(matches!(err, Error::Einval(_)));
    assert_eq!(decoder.submit_count(), 0);
}

#[test]
fn scan_data_over_capacity_is_rejected_with_enomem() {
    let adapter = ConsoleChannelAdapter::new();
    let mut decoder =
        DecoderBuilder::new().channel_kind(ChannelKind::Console).capacity(64).build_with_adapter(Box::new(adapter)).unwrap();

    let image = parse_420(128);
    let mut surf = Surface::allocate(decoder.adapter(), decoder.channel(), 32, 16, PixelFormat::Rgba).unwrap();

    let err = decoder.render(&image, &mut surf, 0, 0).unwrap_err();
    assert!(matches!(err, Error::Enomem(_)));
}

#[test]
fn resize_raises_capacity_so_a_previously_rejected_scan_now_fits() {
    let adapter = ConsoleChannelAdapter::new();
    let mut decoder =
        DecoderBuilder::new().channel_kind(ChannelKind::Console).capacity(64).build_with_adapter(Box::new(adapter)).unwrap();

    let image = parse_420(128);
    let mut surf = Surface::allocate(decoder.adapter(), decoder.channel(), 32, 16, PixelFormat::Rgba).unwrap();
    assert!(decoder.render(&image, &mut surf, 0, 0).is_err());

    decoder.resize(4096).unwrap();
    assert_eq!(decoder.capacity(), 4096);
    decoder.render(&image, &mut surf, 0, 0).unwrap();
}

#[test]
fn concurrent_submissions_use_distinct_ring_slots() {
    let adapter = ConsoleChannelAdapter::new();
    let mut decoder = DecoderBuilder::new()
        .channel_kind(ChannelKind::Console)
        .capacity(4096)
        .ring_size(2)
        .build_with_adapter(Box::new(adapter))
        .unwrap();

    let image = parse_420(64);
    let mut surf_a = Surface::allocate(decoder.adapter(), decoder.channel(), 32, 16, PixelFormat::Rgba).unwrap();
    let mut surf_b = Surface::allocate(decoder.adapter(), decoder.channel(), 32, 16, PixelFormat::Rgba).unwrap();

    decoder.render(&image, &mut surf_a, 0, 0).unwrap();
    decoder.render(&image, &mut surf_b, 0, 0).unwrap();

    assert_ne!(surf_a.render_fence(), surf_b.render_fence());
    assert_eq!(decoder.submit_count(), 2);
    decoder.wait(&surf_a, -1).unwrap();
    decoder.wait(&surf_b, -1).unwrap();
}

#[test]
fn wait_surfaces_a_timeout_from_the_channel_adapter() {
    let adapter = ConsoleChannelAdapter::new();
    adapter.queue_timeout();
    let mut decoder =
        DecoderBuilder::new().channel_kind(ChannelKind::Console).capacity(4096).build_with_adapter(Box::new(adapter)).unwrap();

    let image = parse_420(32);
    let mut surf = Surface::allocate(decoder.adapter(), decoder.channel(), 32, 16, PixelFormat::Rgba).unwrap();
    decoder.render(&image, &mut surf, 0, 0).unwrap();

    let err = decoder.wait(&surf, 1_000).unwrap_err();
    assert!(matches!(err, Error::Core(nvjpg_core::Error::Timeout(_))));
}

#[test]
fn wait_on_surface_with_no_pending_render_is_rejected() {
    let adapter = ConsoleChannelAdapter::new();
    let decoder =
        DecoderBuilder::new().channel_kind(ChannelKind::Console).capacity(4096).build_with_adapter(Box::new(adapter)).unwrap();
    let surf = Surface::allocate(decoder.adapter(), decoder.channel(), 32, 16, PixelFormat::Rgba).unwrap();

    let err = decoder.wait(&surf, -1).unwrap_err();
    assert!(matches!(err, Error::Einval(_)));
}

#[test]
fn video_surface_rejects_unsupported_sampling() {
    let adapter = ConsoleChannelAdapter::new();
    let decoder =
        DecoderBuilder::new().channel_kind(ChannelKind::Console).capacity(4096).build_with_adapter(Box::new(adapter)).unwrap();

    let err = VideoSurface::allocate(decoder.adapter(), decoder.channel(), 16, 16, SamplingFormat::Monochrome)
        .unwrap_err();
    assert!(matches!(err, Error::Einval(_)));
}

