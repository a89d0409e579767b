pub mod bitpack;
pub mod compress;
pub mod delta;
pub mod vbyte;

pub use bitpack::{accounted_bytes, grow_capacity, BitPackedBlock, GROWTH_FACTOR};
pub use compress::{CompressedBlock, CompressionPriority, CompressionType};
