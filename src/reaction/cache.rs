//! Persisted reaction tables keyed by the content of their inputs.
//!
//! Reconstruction decompresses two frames per reacting frame, so its result is
//! stored and reused. An entry is only reused when the SHA-256 of the index,
//! archive, log and reconstruction parameters matches the key it was stored
//! under; any change to the inputs produces a new key and a fresh
//! reconstruction.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::reconstruct::{ReactionReconstructor, Reconstruction};
use crate::archive::FrameSource;
use crate::error::{ReplayError, Result};
use crate::schema::{RawReaction, ReactionRecord, SpaceTransform};

/// Cache entry format version (increment on breaking changes).
pub const CACHE_VERSION: u32 = 1;

const ENTRY_PREFIX: &str = "reactions-";
const ENTRY_EXTENSION: &str = "json";

/// Hex SHA-256 identifying one set of reconstruction inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

/// Parameters that change the reconstructed table besides the input files.
#[derive(Debug, Clone, Serialize)]
pub struct KeyParams {
    pub particle_capacity: usize,
    pub catalyst_type: i32,
    pub transform: SpaceTransform,
}

impl CacheKey {
    /// Hash the input files and parameters.
    pub fn compute(
        index_path: &Path,
        archive_path: &Path,
        log_path: &Path,
        params: &KeyParams,
    ) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(CACHE_VERSION.to_le_bytes());

        for (label, path) in [("index", index_path), ("archive", archive_path), ("log", log_path)] {
            hasher.update(label.as_bytes());
            hash_file(&mut hasher, path)?;
        }

        let params =
            serde_json::to_vec(params).map_err(|e| ReplayError::Cache(e.to_string()))?;
        hasher.update(&params);

        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stream a file into the hasher, prefixed by its length.
fn hash_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut file = File::open(path)?;
    hasher.update(file.metadata()?.len().to_le_bytes());

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    version: u32,
    key: CacheKey,
    reactions: Vec<ReactionRecord>,
}

/// Whether a table came from disk or was just computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// Directory of reconstructed reaction tables.
#[derive(Debug, Clone)]
pub struct ReactionCache {
    dir: PathBuf,
}

impl ReactionCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File an entry for `key` lives in.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", ENTRY_PREFIX, key, ENTRY_EXTENSION))
    }

    /// Load the table stored under `key`.
    ///
    /// Unreadable or mismatched entries are treated as absent.
    pub fn load(&self, key: &CacheKey) -> Result<Option<Vec<ReactionRecord>>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path)?;
        let entry: CacheEntry = match serde_json::from_str(&text) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        if entry.version != CACHE_VERSION || &entry.key != key {
            log::warn!(
                "Ignoring stale cache entry {} (version {}, key {})",
                path.display(),
                entry.version,
                entry.key
            );
            return Ok(None);
        }

        log::info!(
            "Loaded {} reactions from cache {}",
            entry.reactions.len(),
            path.display()
        );
        Ok(Some(entry.reactions))
    }

    /// Store a table under `key`, replacing any previous entry.
    pub fn store(&self, key: &CacheKey, reactions: &[ReactionRecord]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let entry = CacheEntry {
            version: CACHE_VERSION,
            key: key.clone(),
            reactions: reactions.to_vec(),
        };
        let json =
            serde_json::to_string_pretty(&entry).map_err(|e| ReplayError::Cache(e.to_string()))?;

        // Write then rename so a reader never sees a half-written entry.
        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        log::info!("Stored {} reactions in cache {}", reactions.len(), path.display());
        Ok(path)
    }

    /// Remove the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        log::info!("Invalidated cache entry {}", path.display());
        Ok(true)
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_entry = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ENTRY_PREFIX))
                && path.extension().is_some_and(|e| e == ENTRY_EXTENSION);
            if is_entry {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Reuse the table for `key` or reconstruct and store it.
    pub fn load_or_reconstruct<S>(
        &self,
        key: &CacheKey,
        raw: &[RawReaction],
        source: &mut S,
        reconstructor: &ReactionReconstructor,
    ) -> Result<(Reconstruction, CacheStatus)>
    where
        S: FrameSource + ?Sized,
    {
        if let Some(reactions) = self.load(key)? {
            let reconstruction = Reconstruction {
                reactions,
                diagnostics: Vec::new(),
            };
            return Ok((reconstruction, CacheStatus::Hit));
        }

        let reconstruction = reconstructor.reconstruct(raw, source)?;
        self.store(key, &reconstruction.reactions)?;
        Ok((reconstruction, CacheStatus::Miss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParticleFrame, ParticleRecord};
    use cgmath::Vector3;
    use tempfile::tempdir;

    fn params() -> KeyParams {
        KeyParams {
            particle_capacity: 8,
            catalyst_type: 2,
            transform: SpaceTransform::Identity,
        }
    }

    fn write_inputs(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
        let index = dir.join("index.bin");
        let data = dir.join("data.bin");
        let log = dir.join("reactions.txt");
        fs::write(&index, 3u64.to_le_bytes()).unwrap();
        fs::write(&data, [1u8, 2, 3]).unwrap();
        fs::write(&log, "1 0.1 0 0 0 AB\n").unwrap();
        (index, data, log)
    }

    fn key_for(paths: &(PathBuf, PathBuf, PathBuf), params: &KeyParams) -> CacheKey {
        CacheKey::compute(&paths.0, &paths.1, &paths.2, params).unwrap()
    }

    fn frames() -> Vec<ParticleFrame> {
        let before = vec![
            ParticleRecord::new(1, 1, Vector3::new(0.0, 0.0, 0.0)),
            ParticleRecord::new(2, 2, Vector3::new(0.1, 0.0, 0.0)),
        ];
        let after = vec![
            ParticleRecord::new(2, 2, Vector3::new(0.1, 0.0, 0.0)),
            ParticleRecord::new(3, 3, Vector3::new(0.0, 0.0, 0.0)),
        ];
        vec![
            ParticleFrame::from_records(0, before).unwrap(),
            ParticleFrame::from_records(1, after).unwrap(),
        ]
    }

    fn raw() -> Vec<RawReaction> {
        vec![RawReaction {
            frame: 1,
            time: 0.1,
            position: Vector3::new(0.0, 0.0, 0.0),
            type_tag: "AB".to_string(),
        }]
    }

    #[test]
    fn test_key_depends_on_every_input() {
        let dir = tempdir().unwrap();
        let paths = write_inputs(dir.path());
        let base = key_for(&paths, &params());

        assert_eq!(base, key_for(&paths, &params()));
        assert_eq!(base.as_str().len(), 64);

        let other_params = KeyParams {
            catalyst_type: 5,
            ..params()
        };
        assert_ne!(base, key_for(&paths, &other_params));

        fs::write(&paths.2, "1 0.1 0 0 0 CD\n").unwrap();
        let log_changed = key_for(&paths, &params());
        assert_ne!(base, log_changed);

        fs::write(&paths.1, [1u8, 2, 4]).unwrap();
        assert_ne!(log_changed, key_for(&paths, &params()));
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempdir().unwrap();
        let paths = write_inputs(dir.path());
        let key = key_for(&paths, &params());
        let cache = ReactionCache::new(dir.path().join("cache"));
        let reconstructor = ReactionReconstructor::new(2);

        let (first, status) = cache
            .load_or_reconstruct(&key, &raw(), &mut frames(), &reconstructor)
            .unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert!(cache.entry_path(&key).exists());

        // A hit must not touch the frames at all.
        let mut no_frames: Vec<ParticleFrame> = Vec::new();
        let (second, status) = cache
            .load_or_reconstruct(&key, &raw(), &mut no_frames, &reconstructor)
            .unwrap();
        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(first.reactions, second.reactions);
        assert_eq!(second.reactions[0].reactants, [Some(1), Some(2)]);
    }

    #[test]
    fn test_changed_inputs_miss() {
        let dir = tempdir().unwrap();
        let paths = write_inputs(dir.path());
        let cache = ReactionCache::new(dir.path().join("cache"));
        let reconstructor = ReactionReconstructor::new(2);

        let key = key_for(&paths, &params());
        cache
            .load_or_reconstruct(&key, &raw(), &mut frames(), &reconstructor)
            .unwrap();

        fs::write(&paths.2, "1 0.2 0 0 0 AB\n").unwrap();
        let new_key = key_for(&paths, &params());
        assert!(cache.load(&new_key).unwrap().is_none());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = tempdir().unwrap();
        let paths = write_inputs(dir.path());
        let cache = ReactionCache::new(dir.path().join("cache"));
        let key = key_for(&paths, &params());

        assert!(!cache.invalidate(&key).unwrap());
        cache.store(&key, &[]).unwrap();
        assert!(cache.load(&key).unwrap().is_some());
        assert!(cache.invalidate(&key).unwrap());
        assert!(cache.load(&key).unwrap().is_none());

        cache.store(&key, &[]).unwrap();
        fs::write(cache.dir().join("unrelated.txt"), "keep").unwrap();
        assert_eq!(cache.clear().unwrap(), 1);
        assert!(cache.dir().join("unrelated.txt").exists());
    }

    #[test]
    fn test_corrupt_entry_is_ignored() {
        let dir = tempdir().unwrap();
        let paths = write_inputs(dir.path());
        let cache = ReactionCache::new(dir.path().join("cache"));
        let key = key_for(&paths, &params());

        fs::create_dir_all(cache.dir()).unwrap();
        fs::write(cache.entry_path(&key), "{ not json").unwrap();
        assert!(cache.load(&key).unwrap().is_none());
    }

    #[test]
    fn test_entry_under_wrong_key_is_ignored() {
        let dir = tempdir().unwrap();
        let paths = write_inputs(dir.path());
        let cache = ReactionCache::new(dir.path().join("cache"));
        let key = key_for(&paths, &params());
        let other = CacheKey("0".repeat(64));

        cache.store(&other, &[]).unwrap();
        fs::rename(cache.entry_path(&other), cache.entry_path(&key)).unwrap();
        assert!(cache.load(&key).unwrap().is_none());
    }
}
