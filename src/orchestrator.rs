//! Sequences the pipeline end to end (§4.8): validate, guard the
//! destination, copy the base repo, load refs, resolve the parent, extract
//! the tar, build the tree, assemble the commit, then flush objects before
//! persisting the ref update.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::commit::{NewCommit, assemble_commit};
use crate::error::AppError;
use crate::git::hash::Sha;
use crate::git::object::GitObject;
use crate::git::refs::{RefStore, RefValue};
use crate::git::store::GitObjectStore;
use crate::prefix_copy::{copy_prefix, ensure_empty};
use crate::request::{CommitRequest, CommitResponse, TouchedPaths, normalize_prefix};
use crate::store_adapter::StoreAdapter;
use crate::tar_extract::extract_edits;
use crate::tree_builder::build_tree;

/// Per-process handles to the two object-store buckets this service talks
/// to: the git-object repository bucket, and the file-transfer bucket tar
/// uploads land in.
#[derive(Clone)]
pub struct AppContext {
    pub repos: StoreAdapter,
    pub file_transfer: StoreAdapter,
}

/// Attempts to resolve `base_ref` as a full ref name, trying `refs/tags/`,
/// then `refs/heads/`, then the raw name, in that order (§4.8 step 5, §9).
fn resolve_base_ref(ref_store: &RefStore, base_ref: &str) -> Option<Sha> {
    [
        format!("refs/tags/{base_ref}"),
        format!("refs/heads/{base_ref}"),
        base_ref.to_string(),
    ]
    .iter()
    .find_map(|name| ref_store.resolve(name))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub async fn run_commit(ctx: &AppContext, req: CommitRequest) -> Result<CommitResponse, AppError> {
    req.validate()?;

    let new_prefix = normalize_prefix(&req.new_repo.prefix);
    let base_prefix = normalize_prefix(&req.base_repo.prefix);

    ensure_empty(&ctx.repos, &new_prefix).await?;
    copy_prefix(&ctx.repos, &base_prefix, &new_prefix).await?;

    let mut ref_store = RefStore::new(ctx.repos.clone(), new_prefix.clone());
    ref_store.load().await?;

    let parent_sha = resolve_base_ref(&ref_store, &req.base_repo.ref_name)
        .ok_or_else(|| AppError::BaseRepoTagNotFound(req.base_repo.ref_name.clone()))?;

    let object_store = GitObjectStore::new(ctx.repos.clone(), new_prefix.clone());

    let parent_commit_object = object_store
        .fetch(&parent_sha)
        .await?
        .ok_or_else(|| AppError::ParentCommitNotFound(parent_sha.to_hex()))?;
    let GitObject::Commit(parent_commit) = parent_commit_object.as_ref() else {
        return Err(AppError::ParentCommitNotFound(parent_sha.to_hex()));
    };
    let parent_tree_sha = parent_commit.tree;

    if object_store.fetch(&parent_tree_sha).await?.is_none() {
        return Err(AppError::ParentTreeNotFound(parent_tree_sha.to_hex()));
    }

    let tar_bytes = ctx
        .file_transfer
        .get(&req.tar)
        .await?
        .ok_or_else(|| AppError::TarNotFound(req.tar.clone()))?;
    let edits = extract_edits(&tar_bytes)?;
    let touched_paths: Vec<String> = edits.iter().map(|e| e.path.clone()).collect();

    let root_tree = build_tree(&object_store, Some(parent_tree_sha), edits).await?;

    let commit_sha = assemble_commit(
        &object_store,
        NewCommit {
            tree: root_tree,
            parent: Some(parent_sha),
            author_name: &req.author.name,
            author_email: &req.author.email,
            message: &req.message,
            timestamp: now_unix(),
        },
    )
    .await;

    ref_store.set(req.new_repo.ref_name.clone(), RefValue::Direct(commit_sha));

    // All new objects must be durable before the ref that makes the new
    // commit reachable is persisted (write-before-publish, §3, §4.8).
    object_store.flush().await?;
    ref_store.store(Some(&req.new_repo.ref_name)).await?;

    Ok(CommitResponse {
        parent_commit_oid: Some(parent_sha.to_hex()),
        new_commit_oid: commit_sha.to_hex(),
        new_repo_prefix: new_prefix,
        new_repo_ref: req.new_repo.ref_name,
        touched: TouchedPaths { added_or_updated: touched_paths, deleted: Vec::new() },
    })
}
