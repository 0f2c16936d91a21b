//! Tree reconstruction from a parent tree plus a set of path edits (§4.6).
//!
//! The algorithm in four passes: flatten the parent tree to full paths,
//! apply edits on top (purging any path that collides across the file/
//! directory boundary), group by parent directory, then build bottom-up so
//! every child tree exists before its parent references it.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt};

use crate::error::AppError;
use crate::git::hash::Sha;
use crate::git::object::{GitObject, MODE_TREE, Tree, TreeEntry};
use crate::git::store::GitObjectStore;
use crate::tar_extract::PathEdit;

/// Builds a new root tree from an optional parent tree plus a list of edits,
/// writing every new blob and tree into `store` (via `add`, not yet flushed).
/// Returns the root tree's SHA.
pub async fn build_tree(
    store: &GitObjectStore,
    base_tree: Option<Sha>,
    edits: Vec<PathEdit>,
) -> Result<Sha, AppError> {
    let mut flat: HashMap<String, (u32, Sha)> = HashMap::new();
    if let Some(root) = base_tree {
        flatten_tree(store, root, String::new(), &mut flat).await?;
    }

    for edit in edits {
        let blob_sha = store.add(GitObject::Blob(edit.data)).await;
        apply_edit(&mut flat, edit.path, edit.mode, blob_sha);
    }

    let children = group_by_parent(&flat);
    let dirs_deepest_first = order_deepest_first(&children);

    let mut built: HashMap<String, Sha> = HashMap::new();
    for dir in dirs_deepest_first {
        let mut tree = Tree::default();

        if let Some(leaves) = children.get(&dir) {
            for (name, (mode, sha)) in leaves {
                tree.entries.push(TreeEntry { name: name.clone(), mode: *mode, sha: *sha });
            }
        }
        for (child_dir, child_sha) in &built {
            if !child_dir.is_empty() && parent_of(child_dir) == dir {
                let name = child_dir.rsplit('/').next().unwrap_or(child_dir).to_string();
                tree.entries.push(TreeEntry { name, mode: MODE_TREE, sha: *child_sha });
            }
        }

        tree.sort();
        let sha = store.add(GitObject::Tree(tree)).await;
        built.insert(dir, sha);
    }

    Ok(*built.get("").expect("root directory is always built"))
}

/// Applies one edit to the flattened path map, resolving both collision
/// directions: a file edit at `path` demotes any subtree previously rooted
/// there (forward collision, §4.6 edge case 3), and promotes every ancestor
/// of `path` out of file-hood since it must now be a directory (reverse
/// collision, §4.6 edge case 4 — the source's known bug this corrects).
fn apply_edit(flat: &mut HashMap<String, (u32, Sha)>, path: String, mode: u32, sha: Sha) {
    let nested_prefix = format!("{path}/");
    flat.retain(|p, _| !p.starts_with(&nested_prefix));

    let mut ancestor = path.as_str();
    while let Some(idx) = ancestor.rfind('/') {
        ancestor = &ancestor[..idx];
        flat.remove(ancestor);
    }

    flat.insert(path, (mode, sha));
}

/// Recursively walks `tree_sha`, inserting `(full_path, (mode, sha))` for
/// every blob reached and recursing into every subtree (entries with the
/// directory mode bit set, §3).
fn flatten_tree<'a>(
    store: &'a GitObjectStore,
    tree_sha: Sha,
    prefix: String,
    out: &'a mut HashMap<String, (u32, Sha)>,
) -> BoxFuture<'a, Result<(), AppError>> {
    async move {
        let object = store
            .fetch(&tree_sha)
            .await?
            .ok_or_else(|| AppError::ParentTreeNotFound(tree_sha.to_hex()))?;
        let GitObject::Tree(tree) = object.as_ref() else {
            return Err(AppError::TreeBuildFailed(format!(
                "{tree_sha} is not a tree object"
            )));
        };

        for entry in &tree.entries {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{prefix}/{}", entry.name)
            };
            if entry.is_dir() {
                flatten_tree(store, entry.sha, path, out).await?;
            } else {
                out.insert(path, (entry.mode, entry.sha));
            }
        }
        Ok(())
    }
    .boxed()
}

/// Splits `path` into `(parent_dir, leaf_name)`; the root directory is `""`.
fn split_parent(path: &str) -> (String, String) {
    match path.rfind('/') {
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => (String::new(), path.to_string()),
    }
}

fn parent_of(dir: &str) -> String {
    match dir.rfind('/') {
        Some(idx) => dir[..idx].to_string(),
        None => String::new(),
    }
}

/// Groups flattened paths by parent directory, and ensures every ancestor
/// directory of every path is present as a key (even with no direct leaf
/// entries), so intermediate directories always get built (§4.6 step 3).
fn group_by_parent(flat: &HashMap<String, (u32, Sha)>) -> HashMap<String, HashMap<String, (u32, Sha)>> {
    let mut children: HashMap<String, HashMap<String, (u32, Sha)>> = HashMap::new();
    children.entry(String::new()).or_default();

    for (path, (mode, sha)) in flat {
        let (dir, leaf) = split_parent(path);
        children.entry(dir.clone()).or_default().insert(leaf, (*mode, *sha));

        let mut ancestor = dir;
        loop {
            children.entry(ancestor.clone()).or_default();
            if ancestor.is_empty() {
                break;
            }
            ancestor = parent_of(&ancestor);
        }
    }
    children
}

/// Orders every directory key deepest-first (by path-component count
/// descending), so a directory is always built only after every directory
/// nested inside it.
fn order_deepest_first(children: &HashMap<String, HashMap<String, (u32, Sha)>>) -> Vec<String> {
    let mut dirs: Vec<String> = children.keys().cloned().collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(depth(d)));
    dirs
}

fn depth(dir: &str) -> usize {
    if dir.is_empty() {
        0
    } else {
        dir.matches('/').count() + 1
    }
}
