//! Archive writer for packing particle frames into an indexed archive.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use cgmath::Vector3;

use super::format::{RECORD_SIZE, compress_block, encode_frame};
use super::index::FrameIndex;
use crate::error::{ReplayError, Result};
use crate::schema::{DEFAULT_PARTICLE_CAPACITY, ParticleRecord};

/// Configuration for archive packing.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Records per frame block.
    pub capacity: usize,
    /// Frames past this count are ignored (0 = unlimited).
    pub max_frames: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PARTICLE_CAPACITY,
            max_frames: 0,
        }
    }
}

/// Writes compressed frame blocks and their cumulative index.
///
/// Usage:
/// ```ignore
/// let mut writer = ArchiveWriter::create("data.bin", "index.bin", Default::default())?;
/// for frame in frames {
///     writer.write_frame(&frame)?;
/// }
/// writer.finalize()?;
/// ```
pub struct ArchiveWriter {
    writer: BufWriter<File>,
    index_path: PathBuf,
    index: FrameIndex,
    config: WriterConfig,
    raw_bytes: u64,
}

impl ArchiveWriter {
    /// Create the archive file. The index is written on finalize.
    pub fn create<P: AsRef<Path>, Q: AsRef<Path>>(
        data_path: P,
        index_path: Q,
        config: WriterConfig,
    ) -> Result<Self> {
        if config.capacity == 0 {
            return Err(ReplayError::range("particle capacity must be non-zero"));
        }
        let file = File::create(data_path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            index_path: index_path.as_ref().to_path_buf(),
            index: FrameIndex::default(),
            config,
            raw_bytes: 0,
        })
    }

    /// Pack one frame.
    ///
    /// Returns false once `max_frames` blocks have been written.
    pub fn write_frame(&mut self, records: &[ParticleRecord]) -> Result<bool> {
        let limit = self.config.max_frames;
        if limit > 0 && self.frames_written() >= limit {
            return Ok(false);
        }

        let raw = encode_frame(records, self.config.capacity)?;
        let compressed = compress_block(&raw)?;
        self.writer.write_all(&compressed)?;
        self.index.push_block(compressed.len() as u64);
        self.raw_bytes += raw.len() as u64;

        let written = self.frames_written();
        if written % 100 == 0 {
            log::info!("Packed frame {}", written);
        }

        Ok(true)
    }

    /// Flush the archive and write the index file.
    pub fn finalize(mut self) -> Result<ArchiveStats> {
        self.writer.flush()?;
        self.index.save(&self.index_path)?;

        let stats = ArchiveStats {
            frame_count: self.frames_written(),
            compressed_bytes: self.index.archive_len(),
            raw_bytes: self.raw_bytes,
        };
        log::info!("Archive finalized: {}", stats);
        Ok(stats)
    }

    /// Get number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.index.frame_count() as u64
    }
}

/// Statistics from a packing session.
#[derive(Debug, Clone)]
pub struct ArchiveStats {
    /// Total frames packed.
    pub frame_count: u64,
    /// Archive size in bytes.
    pub compressed_bytes: u64,
    /// Uncompressed frame bytes.
    pub raw_bytes: u64,
}

impl ArchiveStats {
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_bytes == 0 {
            return 0.0;
        }
        self.raw_bytes as f64 / self.compressed_bytes as f64
    }
}

impl std::fmt::Display for ArchiveStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes compressed, {:.2}x ratio",
            self.frame_count,
            self.compressed_bytes,
            self.compression_ratio()
        )
    }
}

/// Parse a text frame: one particle per line, `type id x y z [ox oy oz]`.
pub fn parse_frame_text(text: &str) -> Result<Vec<ParticleRecord>> {
    let mut records = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != 5 && fields.len() != 8 {
            return Err(ReplayError::malformed(format!(
                "line {}: expected 5 or 8 fields, found {}",
                line_no + 1,
                fields.len()
            )));
        }

        let int = |s: &str| {
            s.parse::<i32>()
                .map_err(|e| ReplayError::malformed(format!("line {}: {}: {}", line_no + 1, s, e)))
        };
        let float = |s: &str| {
            s.parse::<f32>()
                .map_err(|e| ReplayError::malformed(format!("line {}: {}: {}", line_no + 1, s, e)))
        };

        let mut record = ParticleRecord::new(
            int(fields[0])?,
            int(fields[1])?,
            Vector3::new(float(fields[2])?, float(fields[3])?, float(fields[4])?),
        );
        if fields.len() == 8 {
            record.orientation =
                Vector3::new(float(fields[5])?, float(fields[6])?, float(fields[7])?);
        }
        records.push(record);
    }

    Ok(records)
}

/// Pack every `.dat` frame file in `src_dir` (sorted by name) into an archive.
pub fn pack_directory<P: AsRef<Path>>(
    src_dir: P,
    data_path: &Path,
    index_path: &Path,
    config: WriterConfig,
) -> Result<ArchiveStats> {
    let src_dir = src_dir.as_ref();
    if !src_dir.is_dir() {
        return Err(ReplayError::MissingFile {
            role: "frame directory",
            path: src_dir.to_path_buf(),
        });
    }

    let mut frame_files: Vec<PathBuf> = fs::read_dir(src_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e == "dat"))
        .collect();
    frame_files.sort();

    log::info!(
        "Packing {} frame files from {} ({} bytes per frame)",
        frame_files.len(),
        src_dir.display(),
        config.capacity * RECORD_SIZE
    );

    let mut writer = ArchiveWriter::create(data_path, index_path, config)?;
    for path in &frame_files {
        let records = parse_frame_text(&fs::read_to_string(path)?)?;
        writer.write_frame(&records)?;
    }
    writer.finalize()
}
