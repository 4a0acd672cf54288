//! Public error type for the JPEG parser, surface/picture-info builders and
//! the decoder orchestrator.

pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy: parse/validation failures
/// (`Einval`/`Enodata`), resource failures (`Enomem`), and anything the
/// channel adapter surfaced unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unsupported feature, bad dimensions, SOS/SOF mismatch, progressive.
    #[error("invalid input: {0}")]
    Einval(&'static str),

    /// A mandatory segment was truncated or missing entirely.
    #[error("truncated or missing segment: {0}")]
    Enodata(&'static str),

    /// The scan is larger than the configured capacity, or an underlying
    /// allocation failed.
    #[error("out of memory: {0}")]
    Enomem(&'static str),

    /// A channel-adapter failure (kernel I/O, a failing ioctl, a timed-out
    /// fence wait) propagated unchanged from `nvjpg-core`.
    #[error(transparent)]
    Core(#[from] nvjpg_core::Error),
}
