//! Raw wire types for the Tegra X1 NVJPG engine: `nvmap`/`nvhost` ioctl
//! payloads, Host1x opcode encoders, engine/THI register offsets, and the
//! picture-info/status descriptors the hardware reads and writes.
//!
//! Nothing in this crate allocates, opens a file, or issues a syscall; it
//! only describes the shapes those operations push bytes through. See
//! `nvjpg-core` for the channel adapter that actually drives the device
//! nodes, and `nvjpg` for the JPEG parser and decoder orchestrator built on
//! top of it.

pub mod colorspace;
pub mod host1x;
pub mod ioctl;
pub mod picture_info;
pub mod registers;

pub use colorspace::Colorspace;
pub use picture_info::{NvjpgPictureInfo, NvjpgStatus, PixelFormat, SamplingFormat, MemoryMode};
pub use registers::NVJPG_CLASS_ID;
