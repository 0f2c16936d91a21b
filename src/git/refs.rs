//! Ref store: loads `HEAD`, loose refs under `refs/**`, and `packed-refs`;
//! persists updates back as loose-ref files (§4.3).

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::AppError;
use crate::git::hash::Sha;
use crate::store_adapter::StoreAdapter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    Direct(Sha),
    Symbolic(String),
}

pub struct RefStore {
    adapter: StoreAdapter,
    prefix: String,
    refs: HashMap<String, RefValue>,
}

impl RefStore {
    pub fn new(adapter: StoreAdapter, prefix: impl Into<String>) -> Self {
        Self {
            adapter,
            prefix: prefix.into(),
            refs: HashMap::new(),
        }
    }

    pub async fn load(&mut self) -> Result<(), AppError> {
        if let Some(bytes) = self.adapter.get(&format!("{}packed-refs", self.prefix)).await? {
            self.load_packed_refs(&bytes);
        }

        let refs_prefix = format!("{}refs/", self.prefix);
        for key in self.adapter.list_all(&refs_prefix).await? {
            if let Some(bytes) = self.adapter.get(&key).await? {
                let name = key.strip_prefix(&self.prefix).unwrap_or(&key);
                if let Some(value) = parse_ref_value(&bytes) {
                    self.refs.insert(name.to_string(), value);
                }
            }
        }

        if let Some(bytes) = self.adapter.get(&format!("{}HEAD", self.prefix)).await? {
            if let Some(value) = parse_ref_value(&bytes) {
                self.refs.insert("HEAD".to_string(), value);
            }
        }

        Ok(())
    }

    /// `packed-refs` lines: `#`-comments and blanks ignored; peeled-tag lines
    /// (`^<sha>`) ignored in v1; everything else is `<hex-sha> <ref-name>`.
    fn load_packed_refs(&mut self, bytes: &Bytes) {
        let text = String::from_utf8_lossy(bytes);
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
                continue;
            }
            if let Some((sha_str, name)) = line.split_once(' ') {
                if let Ok(sha) = sha_str.parse::<Sha>() {
                    self.refs.insert(name.trim().to_string(), RefValue::Direct(sha));
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RefValue> {
        self.refs.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: RefValue) {
        self.refs.insert(name.into(), value);
    }

    /// Resolves `name` to a direct SHA, following symbolic refs up to a
    /// bounded number of hops. Returns `None` if `name` is absent or the
    /// chain doesn't bottom out in a direct ref within the hop limit.
    pub fn resolve(&self, name: &str) -> Option<Sha> {
        let mut current = name;
        let mut owned;
        for _ in 0..10 {
            match self.refs.get(current)? {
                RefValue::Direct(sha) => return Some(*sha),
                RefValue::Symbolic(target) => {
                    owned = target.clone();
                    current = &owned;
                }
            }
        }
        None
    }

    /// Writes every ref held in memory as a loose-ref file. `packed-refs` is
    /// never rewritten. When `write_last` names a ref, it is written after
    /// every other ref, minimising the window in which a ref points to an
    /// object that might not yet be durable.
    pub async fn store(&self, write_last: Option<&str>) -> Result<(), AppError> {
        let mut names: Vec<&String> = self.refs.keys().collect();
        if let Some(last) = write_last {
            names.sort_by_key(|name| name.as_str() == last);
        }
        for name in names {
            let value = &self.refs[name];
            let key = format!("{}{}", self.prefix, name);
            let contents = match value {
                RefValue::Direct(sha) => format!("{sha}\n"),
                RefValue::Symbolic(target) => format!("ref: {target}\n"),
            };
            self.adapter
                .put(&key, Bytes::from(contents.into_bytes()))
                .await
                .map_err(|e| AppError::R2WriteFailed(e.to_string()))?;
        }
        Ok(())
    }
}

fn parse_ref_value(bytes: &Bytes) -> Option<RefValue> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if let Some(target) = text.strip_prefix("ref: ") {
        Some(RefValue::Symbolic(target.trim().to_string()))
    } else {
        text.parse::<Sha>().ok().map(RefValue::Direct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::object::GitObject;
    use object_store::memory::InMemory;
    use std::sync::Arc;

    fn adapter() -> StoreAdapter {
        StoreAdapter::new(Arc::new(InMemory::new()))
    }

    #[tokio::test]
    async fn loads_loose_ref_and_symbolic_head() {
        let adapter = adapter();
        let sha = GitObject::Blob(b"x".to_vec()).sha();
        adapter
            .put("repos/x/refs/heads/main", Bytes::from(format!("{sha}\n")))
            .await
            .unwrap();
        adapter
            .put("repos/x/HEAD", Bytes::from_static(b"ref: refs/heads/main\n"))
            .await
            .unwrap();

        let mut store = RefStore::new(adapter, "repos/x/");
        store.load().await.unwrap();

        assert_eq!(store.get("refs/heads/main"), Some(&RefValue::Direct(sha)));
        assert_eq!(store.resolve("HEAD"), Some(sha));
    }

    #[tokio::test]
    async fn loose_ref_overrides_packed_entry_of_same_name() {
        let adapter = adapter();
        let packed_sha = GitObject::Blob(b"packed".to_vec()).sha();
        let loose_sha = GitObject::Blob(b"loose".to_vec()).sha();

        adapter
            .put(
                "repos/x/packed-refs",
                Bytes::from(format!("# comment\n{packed_sha} refs/tags/v1\n")),
            )
            .await
            .unwrap();
        adapter
            .put("repos/x/refs/tags/v1", Bytes::from(format!("{loose_sha}\n")))
            .await
            .unwrap();

        let mut store = RefStore::new(adapter, "repos/x/");
        store.load().await.unwrap();

        assert_eq!(store.get("refs/tags/v1"), Some(&RefValue::Direct(loose_sha)));
    }

    #[tokio::test]
    async fn peeled_tag_lines_are_ignored() {
        let adapter = adapter();
        let sha = GitObject::Blob(b"tag".to_vec()).sha();
        adapter
            .put(
                "repos/x/packed-refs",
                Bytes::from(format!("{sha} refs/tags/v1\n^{sha}\n")),
            )
            .await
            .unwrap();

        let mut store = RefStore::new(adapter, "repos/x/");
        store.load().await.unwrap();
        assert_eq!(store.refs.len(), 1);
    }

    #[tokio::test]
    async fn store_writes_target_ref_last() {
        let adapter = adapter();
        let mut store = RefStore::new(adapter.clone(), "repos/x/");
        let sha_a = GitObject::Blob(b"a".to_vec()).sha();
        let sha_b = GitObject::Blob(b"b".to_vec()).sha();
        store.set("refs/heads/a", RefValue::Direct(sha_a));
        store.set("refs/heads/b", RefValue::Direct(sha_b));
        store.store(Some("refs/heads/b")).await.unwrap();

        let a = adapter.get("repos/x/refs/heads/a").await.unwrap().unwrap();
        assert_eq!(a, Bytes::from(format!("{sha_a}\n")));
        let b = adapter.get("repos/x/refs/heads/b").await.unwrap().unwrap();
        assert_eq!(b, Bytes::from(format!("{sha_b}\n")));
    }

    #[tokio::test]
    async fn resolve_returns_none_for_unknown_ref() {
        let store = RefStore::new(adapter(), "repos/x/");
        assert_eq!(store.resolve("refs/heads/missing"), None);
    }
}
