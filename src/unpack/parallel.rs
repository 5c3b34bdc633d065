// Parallel wire format: self-delimiting per-chip records in a 16-bit stream

use super::{Defect, RawDataUnpacker};
use crate::frame::vfat::{PRESENT_BC, PRESENT_CRC, PRESENT_EC, PRESENT_ID};
use crate::frame::{FrameCollection, FramePosition, VfatFrame};
use crate::words::WordReader;

/// Inter-record padding word.
const PAD_WORD: u16 = 0xFFFF;
/// Header tag byte for cluster-mode (sparse) records.
const TAG_CLUSTER: u16 = 0x80;
/// Header tag byte for raw-mode (dense) records.
const TAG_RAW: u16 = 0x90;
/// Top nibble of the optional bunch-counter word.
const TAG_BC: u16 = 0xA;
/// Top nibble of the optional event-counter/flags word.
const TAG_EC: u16 = 0xC;
/// Top nibble of the optional chip-id word.
const TAG_ID: u16 = 0xE;
/// Top nibble of the record trailer.
const TAG_TRAILER: u16 = 0xF;

/// Raw-mode payload: 8 channel words plus one CRC word, unconditionally.
const RAW_PAYLOAD_WORDS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordMode {
    Cluster,
    Raw,
}

impl RawDataUnpacker<'_> {
    /// Decode the parallel payload of one OptoRx frame.
    ///
    /// The payload is viewed as 16-bit words; the 4 envelope-header lanes
    /// and the 2-word orbit-counter block are skipped up front. Each record
    /// consumes at least one word, so the walk is bounded by input size.
    pub(super) fn process_parallel(
        &mut self,
        reader: &WordReader,
        link: u16,
        coll: &mut FrameCollection,
    ) {
        let halfwords = reader.halfwords();
        let n_words = ((reader.len() - 2) * 4).saturating_sub(2);
        let stream = &halfwords[6..6 + n_words];

        let mut offset = 0;
        while offset < stream.len() {
            offset += self.process_record(&stream[offset..], link, coll);
        }
    }

    /// Decode one record starting at `buf[0]`; returns words consumed (>= 1).
    fn process_record(
        &mut self,
        buf: &[u16],
        link: u16,
        coll: &mut FrameCollection,
    ) -> usize {
        if buf[0] == PAD_WORD {
            return 1;
        }

        let tag = buf[0] >> 8;
        let mode = match tag {
            TAG_CLUSTER => RecordMode::Cluster,
            TAG_RAW => RecordMode::Raw,
            _ => {
                self.report.unknown_format += 1;
                self.defect(Defect::UnknownRecordTag {
                    link,
                    tag: tag as u8,
                });
                return 1;
            }
        };

        let goh = ((buf[0] >> 4) & 0xF) as u8;
        let fiber = (buf[0] & 0xF) as u8;
        let position = FramePosition::new(0, 0, link, goh, fiber);

        let mut frame = VfatFrame::new();
        let mut wp = 1;

        // optional preamble words, each announced by its own top nibble
        if let Some(&w) = buf.get(wp) {
            if w >> 12 == TAG_BC {
                frame.words_mut()[11] = w;
                frame.presence_flags |= PRESENT_BC;
                wp += 1;
            }
        }
        if let Some(&w) = buf.get(wp) {
            if w >> 12 == TAG_EC {
                frame.words_mut()[10] = w;
                frame.presence_flags |= PRESENT_EC;
                wp += 1;
            }
        }
        if let Some(&w) = buf.get(wp) {
            if w >> 12 == TAG_ID {
                frame.words_mut()[9] = w;
                frame.presence_flags |= PRESENT_ID;
                wp += 1;
            }
        }

        let data_offset = wp;

        // find the trailer
        match mode {
            RecordMode::Cluster => loop {
                match buf.get(wp) {
                    Some(&w) if w >> 12 != TAG_TRAILER => wp += 1,
                    Some(_) => break,
                    None => return self.truncated_record(position, buf.len()),
                }
            },
            RecordMode::Raw => wp += RAW_PAYLOAD_WORDS,
        }

        let Some(&trailer) = buf.get(wp) else {
            return self.truncated_record(position, buf.len());
        };

        let t_sig = (trailer >> 12) as u8;
        let t_err_flags = ((trailer >> 8) & 0xF) as u8;
        let t_size = (trailer & 0xFF) as usize;

        frame.daq_error_flags = t_err_flags;

        let mut skip_frame = false;
        let mut suppress_channel_errors = false;

        if t_sig != TAG_TRAILER as u8 {
            self.report.record_errors += 1;
            self.defect(Defect::TrailerSignature {
                position,
                signature: t_sig,
            });
            skip_frame = true;
        }

        if t_err_flags != 0 {
            // hardware already flagged this record; keep it, mute the
            // per-cluster diagnostics that would only repeat the news
            self.defect(Defect::DaqErrorFlags {
                position,
                flags: t_err_flags,
            });
            suppress_channel_errors = true;
        }

        wp += 1;

        if t_size != wp {
            self.report.record_errors += 1;
            self.defect(Defect::TrailerSize {
                position,
                declared: t_size as u16,
                consumed: wp as u16,
            });
            skip_frame = true;
        }

        if skip_frame {
            return wp;
        }

        match mode {
            RecordMode::Cluster => {
                self.decode_clusters(&buf[data_offset..], position, suppress_channel_errors, &mut frame)
            }
            RecordMode::Raw => decode_raw(&buf[data_offset..], &mut frame),
        }

        coll.insert(position, frame);
        wp
    }

    /// Apply cluster descriptors up to the trailer word.
    ///
    /// Each descriptor activates channels [end-size+1, end]; size 0 stands
    /// for 128, the whole chip. Out-of-range descriptors are dropped one by
    /// one; the record itself survives.
    fn decode_clusters(
        &mut self,
        buf: &[u16],
        position: FramePosition,
        suppress: bool,
        frame: &mut VfatFrame,
    ) {
        for &w in buf.iter().take_while(|&&w| w >> 12 != TAG_TRAILER) {
            let mut size = ((w >> 8) & 0x7F) as i32;
            if size == 0 {
                size = 128;
            }
            let end = (w & 0xFF) as i32;
            let start = end - size + 1;

            if start < 0 || end > 127 {
                if suppress {
                    self.report.channel_range_suppressed += 1;
                } else {
                    self.report.channel_range_reported += 1;
                    self.defect(Defect::ChannelRange {
                        position,
                        end: end as u8,
                        size: size as u8,
                    });
                }
                continue;
            }

            for ch in start..=end {
                frame.set_channel(ch as u8);
            }
        }
    }

    fn truncated_record(&mut self, position: FramePosition, rest: usize) -> usize {
        self.report.record_errors += 1;
        self.defect(Defect::TruncatedRecord { position });
        rest
    }
}

/// Copy the dense payload: 8 channel words (stored high word first) and
/// the trailing CRC.
fn decode_raw(buf: &[u16], frame: &mut VfatFrame) {
    let fd = frame.words_mut();
    for i in 0..8 {
        fd[8 - i] = buf[i];
    }
    fd[0] = buf[8];
    frame.presence_flags |= PRESENT_CRC;
}
