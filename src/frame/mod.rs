// Decoded VFAT frame data structures
pub mod collection;
pub mod position;
pub mod vfat;

// Re-export commonly used types
pub use collection::FrameCollection;
pub use position::FramePosition;
pub use vfat::VfatFrame;
