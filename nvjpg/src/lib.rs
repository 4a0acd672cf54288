//! JPEG Parser, Image/Surface domain types, Picture-Info builder and
//! Decoder Orchestrator for the Tegra NVJPG engine.
//!
//! Built on `nvjpg-core`'s channel adapter, bitstream reader, memory blocks
//! and command-buffer builder. A typical user parses a JFIF buffer with
//! [`parser::parse`], allocates an output [`surface::Surface`] or
//! [`surface::VideoSurface`], and drives both through a
//! [`orchestrator::DecoderOrchestrator`] built via
//! [`orchestrator::DecoderBuilder`].

pub mod error;
pub mod image;
pub mod orchestrator;
pub mod parser;
pub mod surface;

mod picture;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use image::Image;
pub use orchestrator::{DecodeStatus, DecoderBuilder, DecoderOrchestrator};
pub use parser::parse;
pub use surface::{RenderTarget, Surface, VideoSurface};

pub use nvjpg_core::channel::ChannelKind;
pub use nvjpg_sys::colorspace::Colorspace;
pub use nvjpg_sys::{PixelFormat, SamplingFormat};
