//! Cumulative byte-offset table locating each frame inside the archive.

use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

use super::format::INDEX_ENTRY_SIZE;
use crate::error::{ReplayError, Result};

/// Per-frame end offsets into the archive.
///
/// Entry `n` is the end of frame `n`'s compressed block; the block starts at
/// entry `n - 1`, or at byte 0 for the first frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameIndex {
    offsets: Vec<u64>,
}

impl FrameIndex {
    /// Build an index from end offsets, rejecting a decreasing sequence.
    pub fn from_offsets(offsets: Vec<u64>) -> Result<Self> {
        if let Some(i) = offsets.windows(2).position(|w| w[1] < w[0]) {
            return Err(ReplayError::malformed(format!(
                "frame index decreases at frame {}: {} after {}",
                i + 1,
                offsets[i + 1],
                offsets[i]
            )));
        }
        Ok(Self { offsets })
    }

    /// Decode an index from little-endian u64 entries.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % INDEX_ENTRY_SIZE != 0 {
            return Err(ReplayError::malformed(format!(
                "index size {} is not a multiple of {}",
                bytes.len(),
                INDEX_ENTRY_SIZE
            )));
        }
        let offsets = bytes
            .chunks_exact(INDEX_ENTRY_SIZE)
            .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect();
        Self::from_offsets(offsets)
    }

    /// Load an index file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let index = Self::from_bytes(&bytes)?;
        log::debug!(
            "Loaded frame index {} ({} frames, {} archive bytes)",
            path.display(),
            index.frame_count(),
            index.archive_len()
        );
        Ok(index)
    }

    /// Encode as little-endian u64 entries.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.offsets.iter().flat_map(|o| o.to_le_bytes()).collect()
    }

    /// Write the index to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(&self.to_bytes())?;
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Total archive bytes covered by the index.
    pub fn archive_len(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Byte range of frame `n`'s compressed block.
    pub fn block_range(&self, frame: usize) -> Result<Range<u64>> {
        let end = *self.offsets.get(frame).ok_or_else(|| {
            ReplayError::range(format!(
                "frame {} out of range ({} frames)",
                frame,
                self.frame_count()
            ))
        })?;
        let start = if frame == 0 { 0 } else { self.offsets[frame - 1] };
        Ok(start..end)
    }

    /// Append a frame whose compressed block has `size` bytes.
    pub fn push_block(&mut self, size: u64) {
        let end = self.archive_len() + size;
        self.offsets.push(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_block_ranges() {
        let index = FrameIndex::from_offsets(vec![10, 25, 40]).unwrap();
        assert_eq!(index.frame_count(), 3);
        assert_eq!(index.block_range(0).unwrap(), 0..10);
        assert_eq!(index.block_range(1).unwrap(), 10..25);
        assert_eq!(index.block_range(2).unwrap(), 25..40);
        assert!(matches!(index.block_range(3), Err(ReplayError::Range(_))));
    }

    #[test]
    fn test_rejects_decreasing_offsets() {
        assert!(matches!(
            FrameIndex::from_offsets(vec![10, 9]),
            Err(ReplayError::MalformedData(_))
        ));
    }

    #[test]
    fn test_rejects_ragged_file() {
        assert!(FrameIndex::from_bytes(&[0u8; 12]).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.bin");

        let mut index = FrameIndex::default();
        index.push_block(100);
        index.push_block(0);
        index.push_block(7);
        index.save(&path).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 24);
        let loaded = FrameIndex::load(&path).unwrap();
        assert_eq!(loaded.offsets(), &[100, 100, 107]);
    }

    proptest! {
        #[test]
        fn prop_blocks_tile_the_archive(sizes in prop::collection::vec(0u64..100_000, 1..64)) {
            let mut index = FrameIndex::default();
            for &size in &sizes {
                index.push_block(size);
            }

            prop_assert_eq!(index.block_range(0).unwrap().start, 0);
            for n in 0..sizes.len() {
                let range = index.block_range(n).unwrap();
                prop_assert_eq!(range.end - range.start, sizes[n]);
                if n + 1 < sizes.len() {
                    prop_assert_eq!(range.end, index.block_range(n + 1).unwrap().start);
                }
            }
            prop_assert!(FrameIndex::from_bytes(&index.to_bytes()).is_ok());
        }
    }
}
