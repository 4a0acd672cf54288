//! Kernel Channel Adapter, Bitstream Reader, Memory Block/Fence primitives
//! and Command-Buffer Builder for the Tegra NVJPG engine.
//!
//! This crate issues the actual ioctls (or calls the console entry points)
//! and owns the safe-ish resource types everything above it is built from.
//! See the `nvjpg` crate for the JPEG parser, surface types and decoder
//! orchestrator built on top of this layer.

pub mod bitstream;
pub mod channel;
pub mod cmdbuf;
pub mod error;
pub mod fence;
pub mod memory;

pub use bitstream::{Bitstream, ByteBuffer};
pub use channel::{Channel, ChannelAdapter, ChannelKind};
pub use cmdbuf::CmdBuf;
pub use error::{Error, Result};
pub use fence::Fence;
pub use memory::MemoryBlock;
