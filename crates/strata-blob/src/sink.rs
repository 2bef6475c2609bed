use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use strata_types::ContentHash;

use crate::error::{BlobError, BlobResult};

/// Physical storage for blob bytes, keyed by content digest.
///
/// The sink is injectable: the default deployment uses a chunked document
/// store, tests use [`InMemoryByteSink`], and [`DirectoryByteSink`] persists
/// to a local directory. The sink never interprets content and never tracks
/// references — lifecycle decisions belong to the index.
pub trait ByteSink: Send + Sync {
    /// Persist bytes under the given digest. Idempotent: writing a digest
    /// that already exists is a no-op.
    fn put(&self, hash: &ContentHash, data: &[u8]) -> BlobResult<()>;

    /// Open a reader positioned at the start of the content.
    ///
    /// Fails [`BlobError::NotFound`] if the digest is unknown.
    fn open(&self, hash: &ContentHash) -> BlobResult<Box<dyn Read + Send>>;

    /// Returns `true` if bytes exist for the digest.
    fn contains(&self, hash: &ContentHash) -> BlobResult<bool>;

    /// Stored byte length for the digest.
    fn length(&self, hash: &ContentHash) -> BlobResult<u64>;

    /// Erase the bytes for a digest. Returns `true` if bytes existed.
    fn delete(&self, hash: &ContentHash) -> BlobResult<bool>;
}

/// In-memory byte sink for tests and embedding.
pub struct InMemoryByteSink {
    blobs: RwLock<HashMap<ContentHash, Vec<u8>>>,
}

impl InMemoryByteSink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Total bytes currently held.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("sink lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("sink lock poisoned").len()
    }

    /// Returns `true` if the sink holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryByteSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSink for InMemoryByteSink {
    fn put(&self, hash: &ContentHash, data: &[u8]) -> BlobResult<()> {
        let mut map = self.blobs.write().expect("sink lock poisoned");
        map.entry(*hash).or_insert_with(|| data.to_vec());
        Ok(())
    }

    fn open(&self, hash: &ContentHash) -> BlobResult<Box<dyn Read + Send>> {
        let map = self.blobs.read().expect("sink lock poisoned");
        let bytes = map.get(hash).ok_or(BlobError::NotFound(*hash))?.clone();
        Ok(Box::new(io::Cursor::new(bytes)))
    }

    fn contains(&self, hash: &ContentHash) -> BlobResult<bool> {
        let map = self.blobs.read().expect("sink lock poisoned");
        Ok(map.contains_key(hash))
    }

    fn length(&self, hash: &ContentHash) -> BlobResult<u64> {
        let map = self.blobs.read().expect("sink lock poisoned");
        map.get(hash)
            .map(|b| b.len() as u64)
            .ok_or(BlobError::NotFound(*hash))
    }

    fn delete(&self, hash: &ContentHash) -> BlobResult<bool> {
        let mut map = self.blobs.write().expect("sink lock poisoned");
        Ok(map.remove(hash).is_some())
    }
}

/// Directory-backed byte sink.
///
/// Blobs are laid out git-style under a two-character fanout directory:
/// `<root>/ab/<full hex>`. Writes go through a temporary file followed by a
/// rename so a crash never leaves a partial blob at its final path.
pub struct DirectoryByteSink {
    root: PathBuf,
}

impl DirectoryByteSink {
    /// Open (or create) a sink rooted at the given directory.
    pub fn open(root: impl AsRef<Path>) -> BlobResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(&hex[..2]).join(&hex)
    }
}

impl ByteSink for DirectoryByteSink {
    fn put(&self, hash: &ContentHash, data: &[u8]) -> BlobResult<()> {
        let path = self.blob_path(hash);
        if path.exists() {
            return Ok(());
        }
        let parent = path.parent().expect("blob path has a fanout parent");
        fs::create_dir_all(parent)?;
        let tmp = parent.join(format!(".{}.tmp", hash.short_hex()));
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn open(&self, hash: &ContentHash) -> BlobResult<Box<dyn Read + Send>> {
        let path = self.blob_path(hash);
        match fs::File::open(&path) {
            Ok(f) => Ok(Box::new(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlobError::NotFound(*hash)),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, hash: &ContentHash) -> BlobResult<bool> {
        Ok(self.blob_path(hash).exists())
    }

    fn length(&self, hash: &ContentHash) -> BlobResult<u64> {
        match fs::metadata(self.blob_path(hash)) {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlobError::NotFound(*hash)),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, hash: &ContentHash) -> BlobResult<bool> {
        match fs::remove_file(self.blob_path(hash)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
