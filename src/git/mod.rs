//! Git object model and storage: canonical encoding, the object-store-backed
//! object cache, and the ref store.

pub mod hash;
pub mod object;
pub mod refs;
pub mod store;

pub use hash::Sha;
pub use object::{Commit, GitObject, Identity, ObjectKind, Tree, TreeEntry};
pub use refs::{RefStore, RefValue};
pub use store::GitObjectStore;
