// One chip's decoded readout: 12 16-bit words plus bookkeeping flags

use serde::Serialize;

/// Presence bit: bunch counter stored in word 11.
pub const PRESENT_BC: u8 = 0x1;
/// Presence bit: event counter and flags stored in word 10.
pub const PRESENT_EC: u8 = 0x2;
/// Presence bit: chip id stored in word 9.
pub const PRESENT_ID: u8 = 0x4;
/// Presence bit: CRC stored in word 0.
pub const PRESENT_CRC: u8 = 0x8;

/// Number of logical channels on one VFAT chip.
pub const CHANNEL_COUNT: u8 = 128;

/// One decoded VFAT frame.
///
/// The frame is always exactly 12 words: words 1..=8 carry the 128 channel
/// bits, word 9 the chip id, word 10 the event counter and flags, word 11
/// the bunch counter, word 0 the CRC. Optional words absent on the wire are
/// left at zero and cleared in `presence_flags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VfatFrame {
    words: [u16; 12],
    /// Which optional metadata words were present on the wire (PRESENT_*).
    pub presence_flags: u8,
    /// Error nibble copied verbatim from the record trailer.
    pub daq_error_flags: u8,
}

impl VfatFrame {
    /// A zeroed frame with no optional words present.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn words(&self) -> &[u16; 12] {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut [u16; 12] {
        &mut self.words
    }

    /// Bunch counter (12 bits), if the BC word was present.
    pub fn bc(&self) -> Option<u16> {
        (self.presence_flags & PRESENT_BC != 0).then(|| self.words[11] & 0x0FFF)
    }

    /// Event counter (8 bits), if the EC word was present.
    pub fn ec(&self) -> Option<u8> {
        (self.presence_flags & PRESENT_EC != 0).then(|| (self.words[10] >> 4) as u8)
    }

    /// Chip status flags (4 bits), if the EC word was present.
    pub fn flags(&self) -> Option<u8> {
        (self.presence_flags & PRESENT_EC != 0).then(|| (self.words[10] & 0xF) as u8)
    }

    /// Chip id (12 bits), if the ID word was present.
    pub fn chip_id(&self) -> Option<u16> {
        (self.presence_flags & PRESENT_ID != 0).then(|| self.words[9] & 0x0FFF)
    }

    /// Payload CRC, if present (raw-mode records only).
    pub fn crc(&self) -> Option<u16> {
        (self.presence_flags & PRESENT_CRC != 0).then(|| self.words[0])
    }

    /// Whether channel `channel` (0..=127) fired.
    pub fn channel_active(&self, channel: u8) -> bool {
        debug_assert!(channel < CHANNEL_COUNT);
        let wi = (channel / 16) as usize + 1;
        let bi = channel % 16;
        self.words[wi] & (1 << bi) != 0
    }

    /// Mark channel `channel` (0..=127) as fired.
    pub fn set_channel(&mut self, channel: u8) {
        debug_assert!(channel < CHANNEL_COUNT);
        let wi = (channel / 16) as usize + 1;
        let bi = channel % 16;
        self.words[wi] |= 1 << bi;
    }

    /// All fired channels, ascending.
    pub fn active_channels(&self) -> Vec<u8> {
        (0..CHANNEL_COUNT).filter(|&c| self.channel_active(c)).collect()
    }
}
