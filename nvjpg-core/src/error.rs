//! Standard error type for `nvjpg-core`.

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the channel adapter, memory blocks, fences and the
/// command-buffer builder.
///
/// Kernel I/O failures (a failing `ioctl`, `mmap`, `open`, ...) surface
/// their originating `std::io::Error` unchanged, matching "the raw
/// errno / result code from the failing ioctl or syscall is returned
/// unchanged".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("kernel I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("allocation of size 0 is not permitted")]
    ZeroSizeAllocation,

    #[error("memory block was never mapped before use")]
    Unmapped,

    #[error("waiting on fence {0:?} timed out")]
    Timeout(crate::fence::Fence),

    #[error("command buffer `end()` called without a matching `begin()`")]
    NoOpenCommandBuffer,
}

impl Error {
    /// Constructs an `Error::Io` from the last `errno`, the way every
    /// ioctl/mmap call site in the generic channel adapter does on failure.
    pub fn from_errno() -> Error {
        Error::Io(io::Error::last_os_error())
    }
}
