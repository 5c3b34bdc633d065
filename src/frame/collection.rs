// Keyed store for the frames decoded from one raw buffer

use super::{FramePosition, VfatFrame};
use std::collections::BTreeMap;

/// Collection of decoded frames for one buffer, keyed by position.
///
/// Created empty, filled by one decode pass, then handed to the consumer.
/// Iteration order follows position ordering, so two decodes of the same
/// buffer yield identical collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCollection {
    frames: BTreeMap<FramePosition, VfatFrame>,
}

impl FrameCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a zeroed frame at `position` and return a handle to fill it.
    ///
    /// Any frame already stored at that position is discarded. Used by the
    /// serial decoder, which sets channel bits incrementally while walking
    /// the transposed payload.
    pub fn reserve(&mut self, position: FramePosition) -> &mut VfatFrame {
        let slot = self.frames.entry(position).or_default();
        *slot = VfatFrame::new();
        slot
    }

    /// Insert or overwrite a complete frame at `position`.
    pub fn insert(&mut self, position: FramePosition, frame: VfatFrame) {
        self.frames.insert(position, frame);
    }

    pub fn get(&self, position: &FramePosition) -> Option<&VfatFrame> {
        self.frames.get(position)
    }

    pub fn contains(&self, position: &FramePosition) -> bool {
        self.frames.contains_key(position)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FramePosition, &VfatFrame)> {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(goh: u8, fiber: u8) -> FramePosition {
        FramePosition::new(0, 0, 1, goh, fiber)
    }

    #[test]
    fn test_reserve_returns_zeroed_slot() {
        let mut coll = FrameCollection::new();
        let frame = coll.reserve(pos(0, 3));
        assert_eq!(*frame, VfatFrame::new());
        frame.set_channel(5);

        assert_eq!(coll.len(), 1);
        assert!(coll.get(&pos(0, 3)).map(|f| f.channel_active(5)).unwrap_or(false));
    }

    #[test]
    fn test_reserve_discards_previous_frame() {
        let mut coll = FrameCollection::new();
        coll.reserve(pos(1, 0)).set_channel(7);
        let fresh = coll.reserve(pos(1, 0));
        assert!(!fresh.channel_active(7));
    }

    #[test]
    fn test_insert_overwrites() {
        let mut coll = FrameCollection::new();
        let mut a = VfatFrame::new();
        a.set_channel(1);
        let mut b = VfatFrame::new();
        b.set_channel(2);

        coll.insert(pos(2, 2), a);
        coll.insert(pos(2, 2), b);

        assert_eq!(coll.len(), 1);
        let stored = coll.get(&pos(2, 2)).copied().unwrap_or_default();
        assert!(!stored.channel_active(1));
        assert!(stored.channel_active(2));
    }
}
