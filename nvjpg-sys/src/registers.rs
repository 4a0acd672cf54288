//! NVJPG engine-class and THI register offsets, in 32-bit words.
//!
//! These are the offsets `Host1x::incr`/`non_incr` opcodes address, not byte
//! offsets. They're pushed through the THI's `method_0`/`method_1`
//! indirection register rather than addressed directly (see
//! `CmdBuf::push_value` in `nvjpg-core`).

/// The Host1x class id identifying the NVJPG engine.
pub const NVJPG_CLASS_ID: u32 = 0xc0;

/// NVJPG engine-class register file, word offsets.
pub mod nvjpg {
    /// `1` = decode, `2` = encode (unsupported by this driver).
    pub const OPERATION_TYPE: u32 = 128;
    pub const DECODE: u32 = 1;

    /// Write `0x100` here to kick off a submitted descriptor.
    pub const EXECUTE: u32 = 192;
    pub const EXECUTE_TRIGGER: u32 = 0x100;

    /// Debug/profiling bitflags register; always left at zero by this driver.
    pub const CONTROL_PARAMS: u32 = 446;
    /// Index of the picture being decoded within a batch; always zero here
    /// since this driver only ever submits one picture per command list.
    pub const PICTURE_INDEX: u32 = 447;

    pub const PICTURE_INFO_OFFSET: u32 = 448;
    pub const READ_INFO_OFFSET: u32 = 449;
    pub const SCAN_DATA_OFFSET: u32 = 450;
    pub const OUT_DATA_OFFSET: u32 = 451;
    pub const OUT_DATA_2_OFFSET: u32 = 452;
    pub const OUT_DATA_3_OFFSET: u32 = 453;
}

/// THI (Tegra Host Interface) register file, word offsets. The THI sits in
/// front of every engine class and is how syncpoint increments and
/// indirect register writes are issued.
pub mod thi {
    pub const INCR_SYNCPT: u32 = 0;
    pub const METHOD_0: u32 = 16;
    pub const METHOD_1: u32 = 17;

    /// Bit set in the `incr_syncpt` condition byte meaning "increment when
    /// the engine's work is actually done", as opposed to immediately.
    pub const INCR_SYNCPT_COND_WHEN_DONE: u32 = 1 << 8;
}

pub const NVHOST_RELOC_SHIFT_DEFAULT: u32 = 8;
pub const NVHOST_RELOC_PLACEHOLDER: u32 = 0xdead_beef;
