// 64-bit word view over a raw front-end buffer
// Pure addressing and bookkeeping; structural validation lives in `unpack`

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WordError {
    #[error("Buffer is empty")]
    Empty,

    #[error("Buffer length {0} is not a multiple of 8 bytes")]
    Misaligned(usize),
}

pub type Result<T> = std::result::Result<T, WordError>;

/// A raw readout buffer reinterpreted as little-endian 64-bit words.
///
/// The front-end byte stream is defined little-endian; `new` performs the
/// one length-validated conversion, after which all access is through the
/// typed word slice. No byte-level aliasing happens anywhere else.
#[derive(Debug, Clone)]
pub struct WordReader {
    words: Vec<u64>,
}

impl WordReader {
    /// Build a word view over a byte buffer.
    ///
    /// The buffer must be non-empty and a whole number of 64-bit words.
    pub fn new(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(WordError::Empty);
        }
        if data.len() % 8 != 0 {
            return Err(WordError::Misaligned(data.len()));
        }

        let words = data
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();

        Ok(Self { words })
    }

    /// Number of 64-bit words in the buffer.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The buffer as 64-bit words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// The buffer flattened to 16-bit lanes, low lane of each word first.
    ///
    /// The parallel wire format addresses its payload at this granularity;
    /// lane `i` of the stream is bits `16*(i%4) ..` of word `i/4`.
    pub fn halfwords(&self) -> Vec<u16> {
        let mut out = Vec::with_capacity(self.words.len() * 4);
        for &w in &self.words {
            for lane in 0..4 {
                out.push((w >> (16 * lane)) as u16);
            }
        }
        out
    }
}
