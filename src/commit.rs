//! Commit assembly: produces a commit object referencing a tree and an
//! optional parent, and returns its SHA (§4.7). Updating the ref table is
//! the orchestrator's job, not this module's — this module only ever
//! constructs and stores the commit object itself.

use crate::git::hash::Sha;
use crate::git::object::{Commit, GitObject, Identity};
use crate::git::store::GitObjectStore;

pub struct NewCommit<'a> {
    pub tree: Sha,
    pub parent: Option<Sha>,
    pub author_name: &'a str,
    pub author_email: &'a str,
    pub message: &'a str,
    pub timestamp: i64,
}

/// Assembles and stores a commit object. Author and committer identity are
/// set equal to the supplied author; timezone is always `+0000`. The
/// message is normalized to end in exactly one `\n`.
pub async fn assemble_commit(store: &GitObjectStore, new_commit: NewCommit<'_>) -> Sha {
    let identity = Identity {
        name: new_commit.author_name.to_string(),
        email: new_commit.author_email.to_string(),
        timestamp: new_commit.timestamp,
        tz_offset_minutes: 0,
    };

    let trimmed = new_commit.message.trim_end_matches('\n');
    let message = format!("{trimmed}\n").into_bytes();

    let commit = Commit {
        tree: new_commit.tree,
        parents: new_commit.parent.into_iter().collect(),
        author: identity.clone(),
        committer: identity,
        message,
    };

    store.add(GitObject::Commit(commit)).await
}
