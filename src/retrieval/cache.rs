//! Binary embeddings cache for the corpus index.
//!
//! File format: corpus.bin
//!
//! Header (79 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 of model name)
//! - fingerprint: [u8; 32] (SHA256 of corpus file bytes)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated, source row order):
//! - embedding: [f32; dimensions] (little-endian)
//!
//! Records themselves are not stored; they are cheap to re-read from the
//! CSV, and only the embeddings are expensive to recompute. A mismatch in
//! version, model, fingerprint, dimensions, or entry count is a cache miss
//! (full rebuild), never an error.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size: version(1) + model_id(32) + fingerprint(32) + dimensions(2) + entry_count(8) + checksum(4)
const HEADER_SIZE: usize = 79;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid cache file: {0}")]
    InvalidFormat(String),
}

/// Reasons a cache read did not produce a usable index.
#[derive(Debug, PartialEq, Eq)]
pub enum CacheMiss {
    NoFile,
    VersionMismatch,
    ModelMismatch,
    /// The corpus file bytes changed since the cache was written.
    StaleFingerprint,
    DimensionMismatch,
    CountMismatch,
    Corrupted,
}

/// Expected identity of a cache file: which model produced the embeddings
/// and which exact corpus bytes they were derived from.
#[derive(Debug, Clone, Copy)]
pub struct CacheKey {
    pub model_id: [u8; 32],
    pub fingerprint: [u8; 32],
}

pub struct EmbeddingCache {
    path: PathBuf,
}

impl EmbeddingCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// SHA256 of the corpus file bytes; the cache-invalidation key.
    pub fn fingerprint(source: &Path) -> std::io::Result<[u8; 32]> {
        use sha2::{Digest, Sha256};
        let bytes = std::fs::read(source)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hasher.finalize().into())
    }

    /// Load cached embeddings if they match `key`, `dimensions`, and
    /// `expected_count` exactly.
    ///
    /// Returns `Err(miss)` for every way the cache can fail to apply; the
    /// caller treats all of them as "rebuild", distinguishing them only for
    /// logging.
    pub fn load(
        &self,
        key: &CacheKey,
        dimensions: usize,
        expected_count: usize,
    ) -> Result<Vec<Vec<f32>>, CacheMiss> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return Err(CacheMiss::NoFile),
        };
        let mut reader = BufReader::new(file);

        let header = match self.read_header(&mut reader) {
            Ok(header) => header,
            Err(miss) => return Err(miss),
        };

        if header.model_id != key.model_id {
            return Err(CacheMiss::ModelMismatch);
        }
        if header.fingerprint != key.fingerprint {
            return Err(CacheMiss::StaleFingerprint);
        }
        if header.dimensions as usize != dimensions {
            return Err(CacheMiss::DimensionMismatch);
        }
        if header.entry_count as usize != expected_count {
            return Err(CacheMiss::CountMismatch);
        }

        let mut embeddings = Vec::with_capacity(expected_count);
        for _ in 0..expected_count {
            match self.read_embedding(&mut reader, dimensions) {
                Ok(embedding) => embeddings.push(embedding),
                Err(_) => return Err(CacheMiss::Corrupted),
            }
        }

        Ok(embeddings)
    }

    /// Save embeddings atomically: temp file -> flush -> sync -> rename.
    pub fn save(
        &self,
        key: &CacheKey,
        dimensions: usize,
        embeddings: &[Vec<f32>],
    ) -> Result<(), CacheError> {
        let temp_path = self.path.with_extension("tmp");

        let result = self.write_to_file(&temp_path, key, dimensions, embeddings);
        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    pub fn delete(&self) -> Result<(), CacheError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn write_to_file(
        &self,
        path: &Path,
        key: &CacheKey,
        dimensions: usize,
        embeddings: &[Vec<f32>],
    ) -> Result<(), CacheError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes[0] = FORMAT_VERSION;
        header_bytes[1..33].copy_from_slice(&key.model_id);
        header_bytes[33..65].copy_from_slice(&key.fingerprint);
        header_bytes[65..67].copy_from_slice(&(dimensions as u16).to_le_bytes());
        header_bytes[67..75].copy_from_slice(&(embeddings.len() as u64).to_le_bytes());

        let checksum = crc32fast::hash(&header_bytes[0..75]);
        header_bytes[75..79].copy_from_slice(&checksum.to_le_bytes());

        writer.write_all(&header_bytes)?;

        for embedding in embeddings {
            if embedding.len() != dimensions {
                return Err(CacheError::InvalidFormat(format!(
                    "refusing to write embedding of length {} into a {}-dimension cache",
                    embedding.len(),
                    dimensions
                )));
            }
            for &value in embedding {
                writer.write_all(&value.to_le_bytes())?;
            }
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        file.sync_all()?;

        Ok(())
    }

    fn read_header(&self, reader: &mut BufReader<File>) -> Result<Header, CacheMiss> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        if reader.read_exact(&mut header_bytes).is_err() {
            return Err(CacheMiss::Corrupted);
        }

        let version = header_bytes[0];
        if version != FORMAT_VERSION {
            return Err(CacheMiss::VersionMismatch);
        }

        let stored_checksum = u32::from_le_bytes([
            header_bytes[75],
            header_bytes[76],
            header_bytes[77],
            header_bytes[78],
        ]);
        if stored_checksum != crc32fast::hash(&header_bytes[0..75]) {
            return Err(CacheMiss::Corrupted);
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&header_bytes[1..33]);

        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&header_bytes[33..65]);

        let dimensions = u16::from_le_bytes([header_bytes[65], header_bytes[66]]);

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header_bytes[67..75]);
        let entry_count = u64::from_le_bytes(count_bytes);

        Ok(Header {
            model_id,
            fingerprint,
            dimensions,
            entry_count,
        })
    }

    fn read_embedding(
        &self,
        reader: &mut BufReader<File>,
        dimensions: usize,
    ) -> std::io::Result<Vec<f32>> {
        let mut embedding = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            let mut float_bytes = [0u8; 4];
            reader.read_exact(&mut float_bytes)?;
            embedding.push(f32::from_le_bytes(float_bytes));
        }
        Ok(embedding)
    }
}

#[derive(Debug)]
struct Header {
    model_id: [u8; 32],
    fingerprint: [u8; 32],
    dimensions: u16,
    entry_count: u64,
}

impl std::fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CacheMiss::NoFile => "no cache file",
            CacheMiss::VersionMismatch => "cache format version changed",
            CacheMiss::ModelMismatch => "embedding model changed",
            CacheMiss::StaleFingerprint => "corpus file changed",
            CacheMiss::DimensionMismatch => "embedding dimensions changed",
            CacheMiss::CountMismatch => "record count changed",
            CacheMiss::Corrupted => "cache file corrupted",
        };
        f.write_str(reason)
    }
}
