// Raw-data unpacking: OptoRx envelope validation and wire-format dispatch
pub mod parallel;
pub mod serial;

use crate::frame::{FrameCollection, FramePosition};
use crate::words::{WordError, WordReader};
use serde::Serialize;
use thiserror::Error;

/// Begin-of-event marker expected in the header's top nibble.
const BOE_MARKER: u64 = 0x5;
/// End-of-event marker expected in the footer's top nibble.
const EOE_MARKER: u64 = 0xA;

/// Errors fatal to one `run` call. These mean the caller handed over a
/// buffer that is not even plumbed correctly; everything recoverable is a
/// [`Defect`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnpackError {
    #[error("Bad raw buffer: {0}")]
    BadBuffer(#[from] WordError),

    #[error("Buffer holds {0} words, need at least header and footer")]
    TooShort(usize),
}

pub type Result<T> = std::result::Result<T, UnpackError>;

/// One recoverable decoding problem, with enough structure for a log line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Defect {
    #[error("Wrong structure of OptoRx header/footer (fed {fed}): {detail}. Skipping frame")]
    Envelope { fed: u16, detail: String },

    #[error("Unknown OptoRx format version {version} (fed {fed}, link {link}). Skipping frame")]
    UnknownFormat { fed: u16, link: u16, version: u8 },

    #[error("Wrong GOH block structure in row {row} lane {lane} (link {link}): {detail}. Block omitted")]
    LaneStructure {
        link: u16,
        row: usize,
        lane: usize,
        detail: String,
    },

    #[error("Unknown record tag {tag:#04x} (link {link}). Skipping this word")]
    UnknownRecordTag { link: u16, tag: u8 },

    #[error("Record at {position} runs past the end of the stream. Rest of stream dropped")]
    TruncatedRecord { position: FramePosition },

    #[error("Wrong trailer signature {signature:#x} at {position}. Record skipped")]
    TrailerSignature {
        position: FramePosition,
        signature: u8,
    },

    #[error("Trailer size {declared} does not match {consumed} words consumed at {position}. Record skipped")]
    TrailerSize {
        position: FramePosition,
        declared: u16,
        consumed: u16,
    },

    #[error("DAQ error flags {flags:#x} at {position}. Channel diagnostics suppressed")]
    DaqErrorFlags { position: FramePosition, flags: u8 },

    #[error("Invalid cluster (end={end}, size={size}) at {position}. Cluster skipped")]
    ChannelRange {
        position: FramePosition,
        end: u8,
        size: u8,
    },
}

/// Destination for recoverable decoding diagnostics.
///
/// The decoder never writes to a log directly; the caller injects whatever
/// sink fits the run (forward to `tracing`, collect for a report, drop).
pub trait DiagnosticSink {
    fn emit(&mut self, defect: &Defect);
}

/// Sink that forwards every defect to `tracing::error!`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, defect: &Defect) {
        tracing::error!("{defect}");
    }
}

/// Sink that keeps every defect, for tests and offline inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub defects: Vec<Defect>,
}

impl DiagnosticSink for RecordingSink {
    fn emit(&mut self, defect: &Defect) {
        self.defects.push(defect.clone());
    }
}

/// Per-buffer defect counters, returned by every `run` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DefectReport {
    /// Bad outer envelope; the whole buffer was skipped.
    pub structural: u32,
    /// Unknown format version or record tag.
    pub unknown_format: u32,
    /// GOH lanes skipped in the serial format.
    pub lane_errors: u32,
    /// Records rejected in the parallel format.
    pub record_errors: u32,
    /// Invalid cluster descriptors that were logged.
    pub channel_range_reported: u32,
    /// Invalid cluster descriptors silenced by nonzero DAQ error flags.
    pub channel_range_suppressed: u32,
}

impl DefectReport {
    pub fn total(&self) -> u32 {
        self.structural
            + self.unknown_format
            + self.lane_errors
            + self.record_errors
            + self.channel_range_reported
            + self.channel_range_suppressed
    }
}

/// Wire encoding of one OptoRx frame, chosen once from the version field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    /// Bit-transposed GOH blocks (format version 1).
    Serial,
    /// Self-delimiting per-chip record stream (format version 2).
    Parallel,
}

impl WireFormat {
    fn from_version(version: u8) -> Option<Self> {
        match version {
            1 => Some(WireFormat::Serial),
            2 => Some(WireFormat::Parallel),
            _ => None,
        }
    }
}

/// Unpacks one raw OptoRx buffer into a [`FrameCollection`].
///
/// One instance decodes one buffer; buffers are independent, so separate
/// instances may run on separate threads, each owning its own collection.
pub struct RawDataUnpacker<'a> {
    sink: &'a mut dyn DiagnosticSink,
    fed: u16,
    report: DefectReport,
}

impl<'a> RawDataUnpacker<'a> {
    pub fn new(sink: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            sink,
            fed: 0,
            report: DefectReport::default(),
        }
    }

    /// Decode `data` (one OptoRx frame from source `fed`) into `coll`.
    ///
    /// Recoverable problems are counted in the returned report and emitted
    /// to the sink; only malformed buffer plumbing is an `Err`.
    pub fn run(
        mut self,
        fed: u16,
        data: &[u8],
        coll: &mut FrameCollection,
    ) -> Result<DefectReport> {
        self.fed = fed;
        let reader = WordReader::new(data)?;
        if reader.len() < 2 {
            return Err(UnpackError::TooShort(reader.len()));
        }

        self.process_optorx_frame(&reader, coll);
        Ok(self.report)
    }

    fn defect(&mut self, defect: Defect) {
        self.sink.emit(&defect);
    }

    fn process_optorx_frame(&mut self, reader: &WordReader, coll: &mut FrameCollection) {
        let words = reader.words();
        let size = words.len();
        let head = words[0];
        let foot = words[size - 1];

        let boe = (head >> 60) & 0xF;
        let h0 = head & 0xF;
        let link = ((head >> 8) & 0xFFF) as u16;
        let version = ((head >> 4) & 0xF) as u8;

        let eoe = (foot >> 60) & 0xF;
        let f0 = foot & 0xF;
        let declared_size = (foot >> 32) & 0x3FF;

        let mut bad = Vec::new();
        if boe != BOE_MARKER {
            bad.push(format!("BOE={boe:#x}, expected {BOE_MARKER:#x}"));
        }
        if h0 != 0 {
            bad.push(format!("H0={h0:#x}, expected 0"));
        }
        if eoe != EOE_MARKER {
            bad.push(format!("EOE={eoe:#x}, expected {EOE_MARKER:#x}"));
        }
        if f0 != 0 {
            bad.push(format!("F0={f0:#x}, expected 0"));
        }
        if declared_size != size as u64 {
            bad.push(format!("size (OptoRx)={declared_size}, size (buffer)={size}"));
        }

        if !bad.is_empty() {
            self.report.structural += 1;
            self.defect(Defect::Envelope {
                fed: self.fed,
                detail: bad.join(", "),
            });
            return;
        }

        match WireFormat::from_version(version) {
            Some(WireFormat::Serial) => self.process_serial(words, link, coll),
            Some(WireFormat::Parallel) => self.process_parallel(reader, link, coll),
            None => {
                self.report.unknown_format += 1;
                self.defect(Defect::UnknownFormat {
                    fed: self.fed,
                    link,
                    version,
                });
            }
        }
    }
}
