//! Thin wrapper over the `object_store` crate's `ObjectStore` trait, exposing
//! exactly the five operations the rest of the core needs: `get`, `put`,
//! `copy`, and cursor-paginated `list`. Nothing above this module touches
//! `object_store` types directly (§4.1, §9 "duck-typed list responses").

use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::{ObjectStore, path::Path as StorePath};

use crate::error::AppError;

fn store_err(e: object_store::Error) -> AppError {
    AppError::Storage(e.to_string())
}

fn non_empty_path(prefix: &str) -> Option<StorePath> {
    if prefix.is_empty() {
        None
    } else {
        Some(StorePath::from(prefix))
    }
}

/// One page of a prefix listing, with an opaque cursor for the next page.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_cursor: Option<String>,
    pub truncated: bool,
}

#[derive(Clone)]
pub struct StoreAdapter {
    inner: Arc<dyn ObjectStore>,
}

impl StoreAdapter {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        match self.inner.get(&StorePath::from(key)).await {
            Ok(result) => Ok(Some(result.bytes().await.map_err(store_err)?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    pub async fn put(&self, key: &str, data: Bytes) -> Result<(), AppError> {
        self.inner
            .put(&StorePath::from(key), data.into())
            .await
            .map(|_| ())
            .map_err(store_err)
    }

    /// Server-side copy; callers needing a get+put fallback (e.g. against a
    /// backend without native copy support) can compose `get` and `put`
    /// themselves. `object_store`'s S3 backend always implements `copy`.
    pub async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), AppError> {
        self.inner
            .copy(&StorePath::from(src_key), &StorePath::from(dst_key))
            .await
            .map_err(store_err)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, AppError> {
        match self.inner.head(&StorePath::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(store_err(e)),
        }
    }

    /// One paginated listing step. `cursor`, when present, is the last key
    /// returned by a previous call; listing resumes strictly after it via
    /// `list_with_offset`.
    pub async fn list(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, AppError> {
        let store_prefix = non_empty_path(prefix);
        let mut stream = match cursor {
            Some(c) => self
                .inner
                .list_with_offset(store_prefix.as_ref(), &StorePath::from(c)),
            None => self.inner.list(store_prefix.as_ref()),
        };

        let mut keys = Vec::with_capacity(limit.min(1024));
        while keys.len() < limit {
            match stream.try_next().await.map_err(store_err)? {
                Some(meta) => keys.push(meta.location.to_string()),
                None => return Ok(ListPage { keys, next_cursor: None, truncated: false }),
            }
        }
        let truncated = stream.try_next().await.map_err(store_err)?.is_some();
        let next_cursor = if truncated { keys.last().cloned() } else { None };
        Ok(ListPage { keys, next_cursor, truncated })
    }

    /// Lists every key under `prefix`, driving `list` to exhaustion.
    pub async fn list_all(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let mut keys = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.list(prefix, cursor.as_deref(), 1000).await?;
            keys.extend(page.keys);
            if !page.truncated {
                break;
            }
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn adapter() -> StoreAdapter {
        StoreAdapter::new(Arc::new(InMemory::new()))
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let adapter = adapter();
        adapter.put("repos/x/objects/ab/cd", Bytes::from_static(b"hello")).await.unwrap();
        let got = adapter.get("repos/x/objects/ab/cd").await.unwrap();
        assert_eq!(got.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn get_of_missing_key_is_none() {
        let adapter = adapter();
        assert!(adapter.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn copy_duplicates_value_under_new_key() {
        let adapter = adapter();
        adapter.put("src/a", Bytes::from_static(b"v")).await.unwrap();
        adapter.copy("src/a", "dst/a").await.unwrap();
        assert_eq!(adapter.get("dst/a").await.unwrap().unwrap(), Bytes::from_static(b"v"));
        assert!(adapter.get("src/a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_all_paginates_past_small_pages() {
        let adapter = adapter();
        for i in 0..25 {
            adapter.put(&format!("p/{i:02}"), Bytes::from_static(b"x")).await.unwrap();
        }
        let page = adapter.list("p/", None, 10).await.unwrap();
        assert_eq!(page.keys.len(), 10);
        assert!(page.truncated);

        let all = adapter.list_all("p/").await.unwrap();
        assert_eq!(all.len(), 25);
    }

    #[tokio::test]
    async fn list_not_truncated_when_fewer_than_limit() {
        let adapter = adapter();
        adapter.put("q/1", Bytes::from_static(b"x")).await.unwrap();
        let page = adapter.list("q/", None, 1).await.unwrap();
        assert!(!page.truncated);
        assert!(page.next_cursor.is_none());
    }
}
