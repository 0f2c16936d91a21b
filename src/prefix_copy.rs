//! Guards that a destination prefix is empty, and copies a base prefix's
//! keys into it (§4.4).

use futures::stream::{self, StreamExt};

use crate::error::AppError;
use crate::store_adapter::StoreAdapter;

/// Bound on concurrent in-flight copies; a soft cap, not a correctness
/// requirement (§5: copy order and parallelism are unspecified).
const COPY_CONCURRENCY: usize = 16;

pub async fn ensure_empty(adapter: &StoreAdapter, prefix: &str) -> Result<(), AppError> {
    let page = adapter.list(prefix, None, 1).await?;
    if !page.keys.is_empty() {
        return Err(AppError::NewRepoNotEmpty(prefix.to_string()));
    }
    Ok(())
}

/// Copies every key under `src_prefix` to the same suffix under `dst_prefix`.
/// Not transactional: a failure partway through leaves the destination
/// partially populated (§4.4).
pub async fn copy_prefix(
    adapter: &StoreAdapter,
    src_prefix: &str,
    dst_prefix: &str,
) -> Result<usize, AppError> {
    let keys = adapter
        .list_all(src_prefix)
        .await
        .map_err(|e| AppError::RepoCopyFailed(e.to_string()))?;

    let results: Vec<Result<(), AppError>> = stream::iter(keys.into_iter().map(|key| {
        let suffix = key.strip_prefix(src_prefix).unwrap_or(&key).to_string();
        let dst_key = format!("{dst_prefix}{suffix}");
        async move { adapter.copy(&key, &dst_key).await }
    }))
    .buffer_unordered(COPY_CONCURRENCY)
    .collect()
    .await;

    let mut count = 0;
    for result in results {
        result.map_err(|e| AppError::RepoCopyFailed(e.to_string()))?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use object_store::memory::InMemory;
    use std::sync::Arc;

    fn adapter() -> StoreAdapter {
        StoreAdapter::new(Arc::new(InMemory::new()))
    }

    #[tokio::test]
    async fn empty_prefix_passes_guard() {
        let adapter = adapter();
        assert!(ensure_empty(&adapter, "repos/new/").await.is_ok());
    }

    #[tokio::test]
    async fn non_empty_prefix_fails_guard() {
        let adapter = adapter();
        adapter.put("repos/new/HEAD", Bytes::from_static(b"ref: refs/heads/main\n")).await.unwrap();
        let err = ensure_empty(&adapter, "repos/new/").await.unwrap_err();
        assert!(matches!(err, AppError::NewRepoNotEmpty(_)));
    }

    #[tokio::test]
    async fn copies_every_key_preserving_suffix() {
        let adapter = adapter();
        adapter.put("repos/base/objects/ab/cd", Bytes::from_static(b"1")).await.unwrap();
        adapter.put("repos/base/refs/heads/main", Bytes::from_static(b"deadbeef\n")).await.unwrap();

        let count = copy_prefix(&adapter, "repos/base/", "repos/new/").await.unwrap();
        assert_eq!(count, 2);

        assert_eq!(
            adapter.get("repos/new/objects/ab/cd").await.unwrap().unwrap(),
            Bytes::from_static(b"1")
        );
        assert_eq!(
            adapter.get("repos/new/refs/heads/main").await.unwrap().unwrap(),
            Bytes::from_static(b"deadbeef\n")
        );
    }

    #[tokio::test]
    async fn copy_of_empty_prefix_copies_nothing() {
        let adapter = adapter();
        let count = copy_prefix(&adapter, "repos/empty/", "repos/new/").await.unwrap();
        assert_eq!(count, 0);
    }
}
