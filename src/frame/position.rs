// Structural address of one readout chip within one event

use serde::Serialize;
use std::fmt;

/// Unique position of one VFAT chip in the readout chain.
///
/// Ordering and equality are by tuple value; this is the sole key into a
/// [`FrameCollection`](crate::frame::FrameCollection). The unpacker fills
/// `sub_system` and `station` with zero; those coordinates belong to the
/// detector mapping applied downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FramePosition {
    pub sub_system: u8,
    pub station: u8,
    /// OptoRx / optical-link id (12 bits).
    pub link: u16,
    /// Group-of-hybrids index within the link (4 bits).
    pub goh: u8,
    /// Fiber (chip) index within the GOH group (4 bits).
    pub fiber: u8,
}

impl FramePosition {
    pub fn new(sub_system: u8, station: u8, link: u16, goh: u8, fiber: u8) -> Self {
        Self {
            sub_system,
            station,
            link,
            goh,
            fiber,
        }
    }
}

impl fmt::Display for FramePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.sub_system, self.station, self.link, self.goh, self.fiber
        )
    }
}
