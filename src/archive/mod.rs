//! Compressed frame archives and random-access playback.
//!
//! A simulation run is stored as two files:
//!
//! ```text
//! data.bin  - concatenated zlib/DEFLATE blocks, one per frame
//! index.bin - one little-endian u64 per frame: cumulative end offset
//!             of that frame's block (frame count = file size / 8)
//!
//! Decompressed block (capacity * 32 bytes):
//!   capacity records of eight little-endian f32 fields
//!   [type, id, posX, posY, posZ, oriX, oriY, oriZ]
//!   Unused slots carry id -1.
//! ```
//!
//! Frames are read through an aligned window (multiples of
//! [`READ_GRANULARITY`]) so the archive never has to be loaded whole.

mod format;
mod index;
mod store;
mod writer;

pub use format::{
    INDEX_ENTRY_SIZE, READ_GRANULARITY, RECORD_SIZE, compress_block, decode_frame, encode_frame,
};
pub use index::FrameIndex;
pub use store::{FrameIterator, FrameSource, FrameStore, WindowRead};
pub use writer::{ArchiveStats, ArchiveWriter, WriterConfig, pack_directory, parse_frame_text};
