//! Object-store-backed git object cache (§4.2).
//!
//! `fetch` is the only read path and is authoritative (it verifies the
//! recomputed SHA against the request); `cached` is a sync, cache-only
//! fast-path for callers that can tolerate a false negative on an uncached
//! object. `add`/`flush` implement the two-phase write-back: `add` only
//! touches the in-memory cache, `flush` is what actually durably writes.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::git::hash::Sha;
use crate::git::object::GitObject;
use crate::store_adapter::StoreAdapter;

pub struct GitObjectStore {
    adapter: StoreAdapter,
    prefix: String,
    cache: RwLock<HashMap<Sha, Arc<GitObject>>>,
    dirty: RwLock<HashSet<Sha>>,
}

impl GitObjectStore {
    pub fn new(adapter: StoreAdapter, prefix: impl Into<String>) -> Self {
        Self {
            adapter,
            prefix: prefix.into(),
            cache: RwLock::new(HashMap::new()),
            dirty: RwLock::new(HashSet::new()),
        }
    }

    /// Cache-only lookup. A `None` here does not mean the object is absent
    /// from storage; callers that need an authoritative answer use `fetch`.
    pub async fn cached(&self, sha: &Sha) -> Option<Arc<GitObject>> {
        self.cache.read().await.get(sha).cloned()
    }

    pub async fn fetch(&self, sha: &Sha) -> Result<Option<Arc<GitObject>>, AppError> {
        if let Some(object) = self.cached(sha).await {
            return Ok(Some(object));
        }

        let key = sha.object_key(&self.prefix);
        let Some(compressed) = self.adapter.get(&key).await? else {
            return Ok(None);
        };

        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut canonical = Vec::new();
        decoder
            .read_to_end(&mut canonical)
            .map_err(|e| AppError::Internal(format!("zlib decode failed for {sha}: {e}")))?;

        let object = GitObject::parse_canonical(&canonical)?;
        let actual = object.sha();
        if actual != *sha {
            tracing::warn!(requested = %sha, actual = %actual, "object sha mismatch on fetch, treating as absent");
            return Ok(None);
        }

        let object = Arc::new(object);
        self.cache.write().await.insert(*sha, object.clone());
        Ok(Some(object))
    }

    /// Inserts `object` into the cache and marks it dirty. Does not write to
    /// storage; call `flush` to persist. Returns the object's SHA.
    pub async fn add(&self, object: GitObject) -> Sha {
        let sha = object.sha();
        self.cache.write().await.insert(sha, Arc::new(object));
        self.dirty.write().await.insert(sha);
        sha
    }

    /// Writes every dirty object whose key is not already present in
    /// storage. Objects are immutable, so a pre-existing key is left
    /// untouched. Calling `flush` twice writes storage at most once per SHA.
    pub async fn flush(&self) -> Result<usize, AppError> {
        let dirty: Vec<Sha> = self.dirty.read().await.iter().copied().collect();
        let mut written = 0;
        for sha in dirty {
            let key = sha.object_key(&self.prefix);
            if self.adapter.exists(&key).await? {
                continue;
            }
            let object = self
                .cached(&sha)
                .await
                .expect("dirty sha missing from cache");

            let canonical = object.canonical();
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&canonical)
                .map_err(|e| AppError::R2WriteFailed(format!("zlib encode failed for {sha}: {e}")))?;
            let compressed = encoder
                .finish()
                .map_err(|e| AppError::R2WriteFailed(format!("zlib finish failed for {sha}: {e}")))?;

            self.adapter.put(&key, Bytes::from(compressed)).await?;
            written += 1;
        }
        self.dirty.write().await.clear();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::object::empty_tree;
    use object_store::memory::InMemory;

    fn store() -> GitObjectStore {
        GitObjectStore::new(StoreAdapter::new(Arc::new(InMemory::new())), "repos/x/")
    }

    #[tokio::test]
    async fn add_then_flush_then_fetch_round_trips() {
        let store = store();
        let blob = GitObject::Blob(b"hi\n".to_vec());
        let sha = store.add(blob.clone()).await;
        store.flush().await.unwrap();

        // Clearing the cache forces `fetch` to read back through the
        // adapter, proving the write actually landed in storage.
        store.cache.write().await.clear();
        let fetched = store.fetch(&sha).await.unwrap().unwrap();
        assert_eq!(*fetched, blob);
    }

    #[tokio::test]
    async fn flush_is_idempotent_per_sha() {
        let store = store();
        let sha = store.add(empty_tree()).await;
        let written_first = store.flush().await.unwrap();
        assert_eq!(written_first, 1);

        // re-mark dirty and flush again: the key already exists, so no write happens.
        store.dirty.write().await.insert(sha);
        let written_second = store.flush().await.unwrap();
        assert_eq!(written_second, 0);
    }

    #[tokio::test]
    async fn fetch_of_absent_sha_is_none() {
        let store = store();
        let sha = GitObject::Blob(b"nope".to_vec()).sha();
        assert!(store.fetch(&sha).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_detects_sha_mismatch_and_treats_as_absent() {
        let store = store();
        let real = GitObject::Blob(b"real".to_vec());
        let real_sha = store.add(real).await;
        store.flush().await.unwrap();

        let wrong_sha = GitObject::Blob(b"not real".to_vec()).sha();
        let key = wrong_sha.object_key("repos/x/");
        // Copy the bytes stored under real_sha's key to wrong_sha's key, so
        // the content's recomputed SHA no longer matches the requested one.
        let real_key = real_sha.object_key("repos/x/");
        let bytes = store.adapter.get(&real_key).await.unwrap().unwrap();
        store.adapter.put(&key, bytes).await.unwrap();

        assert!(store.fetch(&wrong_sha).await.unwrap().is_none());
    }
}
