//! Random-access frame reader over a compressed archive.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use flate2::Decompress;

use super::format::{READ_GRANULARITY, RECORD_SIZE, decode_frame, inflate_block};
use super::index::FrameIndex;
use crate::error::{ReplayError, Result};
use crate::schema::{ParticleFrame, SpaceTransform};

/// Anything that can hand out decoded frames by number.
pub trait FrameSource {
    /// Number of frames available.
    fn frame_count(&self) -> usize;

    /// Decode frame `frame`.
    fn load_frame(&mut self, frame: usize) -> Result<ParticleFrame>;
}

/// In-memory frame lists, used by tools that already hold decoded frames.
impl FrameSource for Vec<ParticleFrame> {
    fn frame_count(&self) -> usize {
        self.len()
    }

    fn load_frame(&mut self, frame: usize) -> Result<ParticleFrame> {
        self.get(frame).cloned().ok_or_else(|| {
            ReplayError::range(format!("frame {} out of range ({} frames)", frame, self.len()))
        })
    }
}

/// Geometry of the most recent aligned archive read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRead {
    /// Archive offset the window was read from, a multiple of the granularity.
    pub window_start: u64,
    /// Bytes read into the scratch buffer.
    pub window_size: usize,
    /// Start of the compressed block inside the window.
    pub local_offset: usize,
    /// Archive byte range of the compressed block.
    pub block: Range<u64>,
}

/// Frame reader for an archive plus its index.
///
/// Usage:
/// ```ignore
/// let index = FrameIndex::load("viz_data/index.bin")?;
/// let mut store = FrameStore::open("viz_data/data.bin", index, 4000, SpaceTransform::default())?;
/// let frame = store.load_frame(100)?;
/// ```
///
/// A store owns its scratch buffers and file handle. It is not meant to be
/// shared between threads, but separate stores over the same archive can run
/// side by side since the archive is only ever read.
pub struct FrameStore {
    file: File,
    path: PathBuf,
    index: FrameIndex,
    capacity: usize,
    transform: SpaceTransform,
    /// Aligned read window. Grows to the largest window seen, never shrinks.
    window: Vec<u8>,
    /// Decompressed block, always `capacity * RECORD_SIZE` bytes.
    block: Vec<u8>,
    inflater: Decompress,
    last_read: Option<WindowRead>,
}

impl FrameStore {
    /// Open an archive for random access.
    pub fn open<P: AsRef<Path>>(
        path: P,
        index: FrameIndex,
        capacity: usize,
        transform: SpaceTransform,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReplayError::MissingFile {
                role: "archive",
                path: path.to_path_buf(),
            });
        }
        if capacity == 0 {
            return Err(ReplayError::range("particle capacity must be non-zero"));
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if index.archive_len() > file_len {
            return Err(ReplayError::malformed(format!(
                "index addresses {} bytes but {} holds only {}",
                index.archive_len(),
                path.display(),
                file_len
            )));
        }

        log::info!(
            "Opened archive {} ({} frames, capacity {} particles)",
            path.display(),
            index.frame_count(),
            capacity
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            index,
            capacity,
            transform,
            window: Vec::new(),
            block: vec![0u8; capacity * RECORD_SIZE],
            inflater: Decompress::new(true),
            last_read: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &FrameIndex {
        &self.index
    }

    /// Records per decompressed frame.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn transform(&self) -> SpaceTransform {
        self.transform
    }

    /// Current size of the read scratch buffer.
    pub fn scratch_len(&self) -> usize {
        self.window.len()
    }

    /// Geometry of the last archive read, if any.
    pub fn last_read(&self) -> Option<&WindowRead> {
        self.last_read.as_ref()
    }

    /// Read the aligned window containing frame `frame`'s compressed block.
    fn read_window(&mut self, frame: usize) -> Result<WindowRead> {
        let block = self.index.block_range(frame)?;
        let compressed_size = (block.end - block.start) as usize;

        let window_start = (block.start / READ_GRANULARITY) * READ_GRANULARITY;
        let local_offset = (block.start - window_start) as usize;
        let window_size = local_offset + compressed_size;

        if self.window.len() < window_size {
            self.window.resize(window_size, 0);
        }

        self.file.seek(SeekFrom::Start(window_start))?;
        self.file.read_exact(&mut self.window[..window_size])?;

        let read = WindowRead {
            window_start,
            window_size,
            local_offset,
            block,
        };
        self.last_read = Some(read.clone());
        Ok(read)
    }

    /// Read and inflate frame `frame`, returning the raw decompressed bytes.
    pub fn load_block(&mut self, frame: usize) -> Result<&[u8]> {
        let read = self.read_window(frame)?;
        let compressed = &self.window[read.local_offset..read.window_size];

        inflate_block(&mut self.inflater, compressed, &mut self.block).map_err(|e| {
            log::error!("Frame {} in {}: {}", frame, self.path.display(), e);
            e
        })?;

        Ok(&self.block)
    }

    /// Decode frame `frame` into particles in output space.
    pub fn load_frame(&mut self, frame: usize) -> Result<ParticleFrame> {
        let transform = self.transform;
        let mut records = decode_frame(self.load_block(frame)?)?;
        for record in records.iter_mut() {
            transform.apply(record);
        }
        ParticleFrame::from_records(frame, records)
    }

    /// Iterate over all frames in order.
    pub fn frames(&mut self) -> FrameIterator<'_> {
        FrameIterator {
            store: self,
            current: 0,
        }
    }
}

impl FrameSource for FrameStore {
    fn frame_count(&self) -> usize {
        self.index.frame_count()
    }

    fn load_frame(&mut self, frame: usize) -> Result<ParticleFrame> {
        FrameStore::load_frame(self, frame)
    }
}

/// Iterator over archive frames.
pub struct FrameIterator<'a> {
    store: &'a mut FrameStore,
    current: usize,
}

impl<'a> Iterator for FrameIterator<'a> {
    type Item = Result<ParticleFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.store.frame_count() {
            return None;
        }

        let result = self.store.load_frame(self.current);
        self.current += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.store.frame_count() - self.current;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for FrameIterator<'a> {}
