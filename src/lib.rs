// VFAT-UNPACK: decoder for raw OptoRx frames from VFAT front-end electronics

pub mod frame;
pub mod unpack;
pub mod words;

// Re-export commonly used types
pub use frame::{FrameCollection, FramePosition, VfatFrame};
pub use unpack::{
    Defect, DefectReport, DiagnosticSink, RawDataUnpacker, RecordingSink, TracingSink,
    UnpackError,
};
pub use words::WordReader;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
