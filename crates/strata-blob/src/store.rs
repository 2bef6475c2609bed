use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use tracing::debug;

use strata_types::{ContentHash, NodeId, ShareId, UserId};

use crate::entry::{BlobEntry, BlobRef, OwnerRef, ShareRef};
use crate::error::{BlobError, BlobResult};
use crate::index::{BlobIndex, RefOutcome, ReleaseOutcome};
use crate::sink::ByteSink;

/// Spool buffer chunk size for streamed uploads.
const CHUNK: usize = 64 * 1024;

/// The blob store façade: dedup index plus physical byte sink.
///
/// `store` follows write-then-link: bytes are persisted (idempotently)
/// before the reference is registered, so a concurrently registered
/// reference can always be resolved. Erasure is driven by the index: the
/// single caller whose release drains both reference sets deletes the
/// bytes. `write_serial` keeps the erase decision and the sink delete in
/// one critical section, so a registration can never land on an entry
/// whose bytes are about to vanish.
pub struct BlobStore {
    index: Arc<dyn BlobIndex>,
    sink: Arc<dyn ByteSink>,
    write_serial: Mutex<()>,
}

impl BlobStore {
    pub fn new(index: Arc<dyn BlobIndex>, sink: Arc<dyn ByteSink>) -> Self {
        Self {
            index,
            sink,
            write_serial: Mutex::new(()),
        }
    }

    /// Store content for a file node, deduplicating by digest.
    ///
    /// The stream is drained once, hashing while spooling. If the digest is
    /// already present only a new reference is registered; novel content is
    /// persisted to the sink first.
    pub fn store(
        &self,
        content: &mut dyn Read,
        node: NodeId,
        owner: UserId,
    ) -> BlobResult<BlobRef> {
        let mut hasher = ContentHash::hasher();
        let mut spool = Vec::new();
        let mut buf = [0u8; CHUNK];
        loop {
            let n = content.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            spool.extend_from_slice(&buf[..n]);
        }
        let hash = hasher.finalize();
        let size = spool.len() as u64;

        // Write-then-link. `put` is idempotent, so a concurrent upload of
        // the same content is harmless. A release draining the last
        // reference erases bytes under the same guard, so the dedup check
        // cannot go stale before our reference lands.
        let outcome = {
            let _guard = self.write_serial.lock().expect("blob store lock poisoned");
            if !self.sink.contains(&hash)? {
                self.sink.put(&hash, &spool)?;
            }
            self.index
                .upsert_ref(&hash, size, OwnerRef::new(node, owner))?
        };

        debug!(
            blob = %hash.short_hex(),
            node = %node.short(),
            size,
            dedup = matches!(outcome, RefOutcome::Deduplicated),
            "blob stored"
        );
        Ok(BlobRef { hash, size })
    }

    /// Open a reader over the full content of a blob.
    ///
    /// Fails `NotFound` when the digest is unknown, and
    /// [`BlobError::DanglingReference`] when the index knows the digest but
    /// the sink does not — the latter must never occur if reference
    /// counting is correct.
    pub fn retrieve(&self, hash: &ContentHash) -> BlobResult<Box<dyn Read + Send>> {
        let entry = self.index.get(hash)?.ok_or(BlobError::NotFound(*hash))?;
        match self.sink.open(hash) {
            Ok(reader) => Ok(reader),
            Err(BlobError::NotFound(_)) => {
                debug!(blob = %entry.hash.short_hex(), "index entry without sink bytes");
                Err(BlobError::DanglingReference(*hash))
            }
            Err(e) => Err(e),
        }
    }

    /// Open a reader over `range` (half-open, byte offsets) of a blob.
    ///
    /// Fails [`BlobError::InvalidRange`] when the range is empty, inverted,
    /// or extends past the end of the content.
    pub fn retrieve_range(
        &self,
        hash: &ContentHash,
        range: std::ops::Range<u64>,
    ) -> BlobResult<Box<dyn Read + Send>> {
        let entry = self.index.get(hash)?.ok_or(BlobError::NotFound(*hash))?;
        if range.start >= range.end || range.end > entry.size {
            return Err(BlobError::InvalidRange {
                start: range.start,
                end: range.end,
                size: entry.size,
            });
        }
        let mut reader = self.retrieve(hash)?;
        io::copy(&mut reader.by_ref().take(range.start), &mut io::sink())?;
        Ok(Box::new(reader.take(range.end - range.start)))
    }

    /// Register a strong reference to already-stored content by digest,
    /// without re-streaming the bytes. Used when a file is copied or
    /// restored: the new node shares the blob instead of duplicating it.
    ///
    /// Fails `NotFound` if the digest is unknown.
    pub fn reference(&self, hash: &ContentHash, node: NodeId, owner: UserId) -> BlobResult<BlobRef> {
        let _guard = self.write_serial.lock().expect("blob store lock poisoned");
        let entry = self.index.get(hash)?.ok_or(BlobError::NotFound(*hash))?;
        self.index
            .upsert_ref(hash, entry.size, OwnerRef::new(node, owner))?;
        Ok(BlobRef {
            hash: *hash,
            size: entry.size,
        })
    }

    /// Release a strong `(node, owner)` reference.
    ///
    /// Physically erases the bytes if (and only if) this release drained
    /// both reference sets; the index hands the erase to exactly one caller.
    pub fn release(
        &self,
        hash: &ContentHash,
        node: &NodeId,
        owner: &UserId,
    ) -> BlobResult<ReleaseOutcome> {
        let _guard = self.write_serial.lock().expect("blob store lock poisoned");
        let outcome = self.index.release_ref(hash, node, owner)?;
        if outcome == ReleaseOutcome::Erased {
            self.sink.delete(hash)?;
            debug!(blob = %hash.short_hex(), "blob erased");
        }
        Ok(outcome)
    }

    /// Register a secondary share reference for a shared file copy.
    pub fn add_share_ref(&self, hash: &ContentHash, node: NodeId, share: ShareId) -> BlobResult<()> {
        self.index.add_share_ref(hash, ShareRef::new(node, share))
    }

    /// Remove a secondary share reference, erasing the bytes when drained.
    pub fn remove_share_ref(
        &self,
        hash: &ContentHash,
        node: &NodeId,
        share: &ShareId,
    ) -> BlobResult<ReleaseOutcome> {
        let _guard = self.write_serial.lock().expect("blob store lock poisoned");
        let outcome = self.index.remove_share_ref(hash, node, share)?;
        if outcome == ReleaseOutcome::Erased {
            self.sink.delete(hash)?;
        }
        Ok(outcome)
    }

    /// Read the index entry for a digest (reference inspection).
    pub fn entry(&self, hash: &ContentHash) -> BlobResult<Option<BlobEntry>> {
        self.index.get(hash)
    }
}
