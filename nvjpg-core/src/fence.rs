//! Syncpoint fences.

use std::fmt;

/// A sentinel threshold meaning "no submission has used this fence yet".
/// A ring slot whose fence carries this value needs no wait before reuse.
pub const SENTINEL: u32 = u32::MAX;

/// `(syncpoint_id, threshold_value)`: the event "syncpoint `id` reached
/// `value`". Produced by every submit, consumed by `wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fence {
    pub id: u32,
    pub value: u32,
}

impl Fence {
    /// A fence that is not waiting on anything — the initial state of a
    /// freshly allocated ring slot or surface.
    pub const fn empty() -> Fence {
        Fence { id: 0, value: SENTINEL }
    }

    pub fn is_empty(&self) -> bool {
        self.value == SENTINEL
    }
}

impl Default for Fence {
    fn default() -> Fence {
        Fence::empty()
    }
}

impl fmt::Display for Fence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Fence(none)")
        } else {
            write!(f, "Fence(syncpt={}, value={})", self.id, self.value)
        }
    }
}

impl From<nvjpg_sys::ioctl::NvhostCtrlFence> for Fence {
    fn from(raw: nvjpg_sys::ioctl::NvhostCtrlFence) -> Fence {
        Fence { id: raw.id, value: raw.value }
    }
}
