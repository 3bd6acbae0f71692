//! Binary format definitions for frame archives.

use std::io::Write;

use cgmath::Vector3;
use flate2::{Compression, Decompress, FlushDecompress, Status, write::ZlibEncoder};

use crate::error::{ReplayError, Result};
use crate::schema::ParticleRecord;

/// Size of one encoded particle record in bytes (eight f32 fields).
pub const RECORD_SIZE: usize = 32;

/// Alignment of archive read windows, matching the platform mapping granularity.
pub const READ_GRANULARITY: u64 = 65536;

/// Size of one index entry in bytes.
pub const INDEX_ENTRY_SIZE: usize = 8;

/// Encode one record as `[type, id, posX, posY, posZ, oriX, oriY, oriZ]`.
pub fn encode_record(record: &ParticleRecord, out: &mut [u8]) {
    let fields = [
        record.kind as f32,
        record.id as f32,
        record.position.x,
        record.position.y,
        record.position.z,
        record.orientation.x,
        record.orientation.y,
        record.orientation.z,
    ];
    for (i, v) in fields.iter().enumerate() {
        out[i * 4..(i + 1) * 4].copy_from_slice(&v.to_le_bytes());
    }
}

/// Encode a full frame of `capacity` records, padding unused slots.
pub fn encode_frame(records: &[ParticleRecord], capacity: usize) -> Result<Vec<u8>> {
    if records.len() > capacity {
        return Err(ReplayError::range(format!(
            "frame holds {} particles, capacity is {}",
            records.len(),
            capacity
        )));
    }

    let mut bytes = vec![0u8; capacity * RECORD_SIZE];
    let padding = ParticleRecord::padding();
    for (slot, chunk) in bytes.chunks_exact_mut(RECORD_SIZE).enumerate() {
        encode_record(records.get(slot).unwrap_or(&padding), chunk);
    }
    Ok(bytes)
}

#[inline]
fn read_f32(bytes: &[u8], field: usize) -> f32 {
    let b = &bytes[field * 4..field * 4 + 4];
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// Decode one 32-byte record.
pub fn decode_record(bytes: &[u8]) -> ParticleRecord {
    ParticleRecord {
        kind: read_f32(bytes, 0) as i32,
        id: read_f32(bytes, 1) as i32,
        position: Vector3::new(read_f32(bytes, 2), read_f32(bytes, 3), read_f32(bytes, 4)),
        orientation: Vector3::new(read_f32(bytes, 5), read_f32(bytes, 6), read_f32(bytes, 7)),
    }
}

/// Decode a decompressed frame block into records.
pub fn decode_frame(bytes: &[u8]) -> Result<Vec<ParticleRecord>> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(ReplayError::malformed(format!(
            "frame block of {} bytes is not a whole number of {}-byte records",
            bytes.len(),
            RECORD_SIZE
        )));
    }
    Ok(bytes.chunks_exact(RECORD_SIZE).map(decode_record).collect())
}

/// Compress a frame block with zlib-wrapped DEFLATE.
pub fn compress_block(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflate one compressed block into `output`, which must be filled exactly.
///
/// The inflater is reset before use so it can be shared across frames.
pub fn inflate_block(inflater: &mut Decompress, input: &[u8], output: &mut [u8]) -> Result<()> {
    inflater.reset(true);

    let status = inflater
        .decompress(input, output, FlushDecompress::Finish)
        .map_err(|e| ReplayError::malformed(format!("inflate failed: {}", e)))?;

    let produced = inflater.total_out() as usize;
    match status {
        Status::StreamEnd if produced == output.len() => Ok(()),
        Status::StreamEnd => Err(ReplayError::malformed(format!(
            "block inflated to {} bytes, expected {}",
            produced,
            output.len()
        ))),
        Status::Ok | Status::BufError => Err(ReplayError::malformed(format!(
            "block did not fit in {} bytes or was truncated ({} bytes produced)",
            output.len(),
            produced
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<ParticleRecord> {
        vec![
            ParticleRecord::new(1, 10, Vector3::new(0.5, -1.25, 3.0)),
            ParticleRecord::new(2, 11, Vector3::new(0.0, 0.0, 0.0))
                .with_orientation(Vector3::new(0.0, 1.0, 0.0)),
        ]
    }

    #[test]
    fn test_frame_encoding_pads_to_capacity() {
        let bytes = encode_frame(&sample_records(), 4).unwrap();
        assert_eq!(bytes.len(), 4 * RECORD_SIZE);

        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(&decoded[..2], &sample_records()[..]);
        assert!(decoded[2].is_padding());
        assert!(decoded[3].is_padding());
    }

    #[test]
    fn test_encode_rejects_overfull_frame() {
        assert!(matches!(
            encode_frame(&sample_records(), 1),
            Err(ReplayError::Range(_))
        ));
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        assert!(decode_frame(&[0u8; RECORD_SIZE + 3]).is_err());
    }

    #[test]
    fn test_inflate_exact_size() {
        let raw = encode_frame(&sample_records(), 8).unwrap();
        let compressed = compress_block(&raw).unwrap();

        let mut inflater = Decompress::new(true);
        let mut out = vec![0u8; raw.len()];
        inflate_block(&mut inflater, &compressed, &mut out).unwrap();
        assert_eq!(out, raw);

        // Inflater is reusable after reset.
        let mut again = vec![0u8; raw.len()];
        inflate_block(&mut inflater, &compressed, &mut again).unwrap();
        assert_eq!(again, raw);
    }

    #[test]
    fn test_inflate_rejects_size_mismatch() {
        let raw = encode_frame(&sample_records(), 8).unwrap();
        let compressed = compress_block(&raw).unwrap();
        let mut inflater = Decompress::new(true);

        let mut too_small = vec![0u8; raw.len() - RECORD_SIZE];
        assert!(inflate_block(&mut inflater, &compressed, &mut too_small).is_err());

        let mut too_large = vec![0u8; raw.len() + RECORD_SIZE];
        assert!(inflate_block(&mut inflater, &compressed, &mut too_large).is_err());
    }

    #[test]
    fn test_inflate_rejects_garbage() {
        let mut inflater = Decompress::new(true);
        let mut out = vec![0u8; 64];
        assert!(matches!(
            inflate_block(&mut inflater, b"definitely not zlib", &mut out),
            Err(ReplayError::MalformedData(_))
        ));
    }
}
