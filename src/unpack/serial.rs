// Serial wire format: fixed 194-word rows carrying bit-transposed GOH blocks

use super::{Defect, RawDataUnpacker};
use crate::frame::{FrameCollection, FramePosition};

/// Words per row: one header word, 192 payload words, one footer word.
const ROW_WORDS: usize = 194;
/// 16-bit lanes per row word, one per GOH slot.
const LANES: usize = 4;
/// Fibers multiplexed on one GOH lane.
const FIBERS: usize = 16;
/// Serialized cycles per row, 12 frame words of 16 bits each.
const CYCLES: usize = 192;

/// Expected top nibble of an active lane header.
const LANE_HEADER_TAG: u16 = 0x4;
/// Expected top nibble of an active lane footer.
const LANE_FOOTER_TAG: u16 = 0xB;

impl RawDataUnpacker<'_> {
    /// Decode the serial payload of one OptoRx frame.
    ///
    /// `words` is the full frame including envelope; rows start at word 1.
    /// Rows beyond the last whole one are hardware padding and ignored.
    pub(super) fn process_serial(
        &mut self,
        words: &[u64],
        link: u16,
        coll: &mut FrameCollection,
    ) {
        let rows = (words.len() - 2) / ROW_WORDS;

        for row in 0..rows {
            let base = 1 + ROW_WORDS * row;
            for lane in 0..LANES {
                let shift = 16 * lane;
                let head = (words[base] >> shift) as u16;
                let foot = (words[base + ROW_WORDS - 1] >> shift) as u16;

                // inactive lane: channel not connected, nothing to decode
                if head & 0x1 == 0 {
                    continue;
                }

                if let Err(detail) = check_lane(head, foot) {
                    self.report.lane_errors += 1;
                    self.defect(Defect::LaneStructure {
                        link,
                        row,
                        lane,
                        detail,
                    });
                    continue;
                }

                // one pass over the row extracts this lane's 192 cycles
                let goh = ((head >> 8) & 0xF) as u8;
                let mut cycles = [0u16; CYCLES];
                for (i, cycle) in cycles.iter_mut().enumerate() {
                    *cycle = (words[base + 1 + i] >> shift) as u16;
                }

                self.transpose_lane(link, goh, &cycles, coll);
            }
        }
    }

    /// Demultiplex one lane's 192 cycles into 16 parallel frames.
    ///
    /// Cycle i carries bit `15 - i%16` of word `11 - i/16` for every fiber;
    /// fiber f reads bit f of the cycle value.
    fn transpose_lane(
        &mut self,
        link: u16,
        goh: u8,
        cycles: &[u16; CYCLES],
        coll: &mut FrameCollection,
    ) {
        for fiber in 0..FIBERS {
            let position = FramePosition::new(0, 0, link, goh, fiber as u8);
            let frame = coll.reserve(position);
            let fd = frame.words_mut();

            for (i, &w) in cycles.iter().enumerate() {
                if w & (1 << fiber) != 0 {
                    let wi = 11 - i / 16;
                    let bi = 15 - i % 16;
                    fd[wi] |= 1 << bi;
                }
            }
        }
    }
}

fn check_lane(head: u16, foot: u16) -> Result<(), String> {
    if head >> 12 != LANE_HEADER_TAG {
        return Err(format!("header tag is not 0x4 as expected ({head:#06x})"));
    }
    if foot >> 12 != LANE_FOOTER_TAG {
        return Err(format!("footer tag is not 0xB as expected ({foot:#06x})"));
    }
    let head_goh = (head >> 8) & 0xF;
    let foot_goh = (foot >> 8) & 0xF;
    if head_goh != foot_goh {
        return Err(format!(
            "incompatible GOH ids in header ({head_goh:#x}) and footer ({foot_goh:#x})"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{footer, header, to_bytes};
    use super::super::{DefectReport, RawDataUnpacker, RecordingSink};
    use super::*;
    use crate::frame::FrameCollection;

    const LINK: u16 = 33;

    /// Build a one-row serial frame. `lanes[c]` supplies, for an active
    /// lane, its GOH id and the 192 cycle values; `None` leaves the lane
    /// inactive.
    fn build_frame(lanes: [Option<(u8, [u16; CYCLES])>; LANES]) -> Vec<u8> {
        build_frame_with(lanes, |head, foot| (head, foot))
    }

    fn build_frame_with(
        lanes: [Option<(u8, [u16; CYCLES])>; LANES],
        tweak: impl Fn(u16, u16) -> (u16, u16),
    ) -> Vec<u8> {
        let size = 2 + ROW_WORDS;
        let mut words = vec![0u64; size];
        words[0] = header(LINK, 1);
        words[size - 1] = footer(size);

        for (c, lane) in lanes.iter().enumerate() {
            let Some((goh, cycles)) = lane else { continue };
            let head = (LANE_HEADER_TAG << 12) | ((*goh as u16) << 8) | 0x1;
            let foot = (LANE_FOOTER_TAG << 12) | ((*goh as u16) << 8);
            let (head, foot) = tweak(head, foot);
            let shift = 16 * c;
            words[1] |= (head as u64) << shift;
            words[1 + ROW_WORDS - 1] |= (foot as u64) << shift;
            for (i, &w) in cycles.iter().enumerate() {
                words[2 + i] |= (w as u64) << shift;
            }
        }

        to_bytes(&words)
    }

    fn run(data: &[u8]) -> (FrameCollection, DefectReport, Vec<Defect>) {
        let mut sink = RecordingSink::default();
        let mut coll = FrameCollection::new();
        let report = RawDataUnpacker::new(&mut sink)
            .run(0, data, &mut coll)
            .expect("valid plumbing");
        (coll, report, sink.defects)
    }

    #[test]
    fn test_inactive_lanes_produce_nothing() {
        let buf = build_frame([None, None, None, None]);
        let (coll, report, _) = run(&buf);
        assert!(coll.is_empty());
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_transpose_round_trip() {
        // fiber f's serial stream: bit f of every cycle. Pick a pattern
        // where fiber f sees cycle i active iff (i + f) % 5 == 0.
        let mut cycles = [0u16; CYCLES];
        for (i, cycle) in cycles.iter_mut().enumerate() {
            for f in 0..FIBERS {
                if (i + f) % 5 == 0 {
                    *cycle |= 1 << f;
                }
            }
        }

        let buf = build_frame([Some((7, cycles)), None, None, None]);
        let (coll, report, defects) = run(&buf);

        assert_eq!(report.total(), 0);
        assert!(defects.is_empty());
        assert_eq!(coll.len(), FIBERS);

        for f in 0..FIBERS {
            let pos = FramePosition::new(0, 0, LINK, 7, f as u8);
            let frame = coll.get(&pos).copied().unwrap_or_default();
            for i in 0..CYCLES {
                let wi = 11 - i / 16;
                let bi = 15 - i % 16;
                let expected = (i + f) % 5 == 0;
                assert_eq!(
                    frame.words()[wi] & (1 << bi) != 0,
                    expected,
                    "fiber {f} cycle {i}"
                );
            }
        }
    }

    #[test]
    fn test_all_four_lanes_decode_independently() {
        let cycles = [0xFFFFu16; CYCLES];
        let buf = build_frame([
            Some((0, cycles)),
            Some((1, cycles)),
            Some((2, cycles)),
            Some((3, cycles)),
        ]);
        let (coll, report, _) = run(&buf);
        assert_eq!(report.total(), 0);
        assert_eq!(coll.len(), 4 * FIBERS);
    }

    #[test]
    fn test_bad_lane_header_skips_only_that_lane() {
        let cycles = [0u16; CYCLES];
        let buf = build_frame_with(
            [Some((2, cycles)), Some((3, cycles)), None, None],
            |head, foot| {
                // corrupt the header tag of GOH 2 only
                if (head >> 8) & 0xF == 2 {
                    ((head & 0x0FFF) | (0x7 << 12), foot)
                } else {
                    (head, foot)
                }
            },
        );
        let (coll, report, defects) = run(&buf);

        assert_eq!(report.lane_errors, 1);
        assert_eq!(coll.len(), FIBERS); // only GOH 3's block survived
        assert!(matches!(
            defects[0],
            Defect::LaneStructure { link: LINK, row: 0, lane: 0, .. }
        ));
        assert!(coll.contains(&FramePosition::new(0, 0, LINK, 3, 0)));
    }

    #[test]
    fn test_goh_mismatch_is_a_lane_error() {
        let cycles = [0u16; CYCLES];
        let buf = build_frame_with([Some((4, cycles)), None, None, None], |head, foot| {
            (head, (foot & 0xF0FF) | (0x5 << 8))
        });
        let (_, report, defects) = run(&buf);
        assert_eq!(report.lane_errors, 1);
        match &defects[0] {
            Defect::LaneStructure { detail, .. } => assert!(detail.contains("GOH")),
            other => panic!("unexpected defect {other:?}"),
        }
    }

    #[test]
    fn test_row_remainder_is_ignored() {
        // one whole row plus 3 trailing words that do not form a row
        let size = 2 + ROW_WORDS + 3;
        let mut words = vec![0u64; size];
        words[0] = header(LINK, 1);
        words[size - 1] = footer(size);
        let (coll, report, _) = run(&to_bytes(&words));
        assert!(coll.is_empty());
        assert_eq!(report.total(), 0);
    }
}
