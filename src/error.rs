//! Error types for the commit pipeline, and their HTTP mapping.
//!
//! Every variant here corresponds to one of the stable error codes in the
//! external interface: lower-level components return one of these, the
//! orchestrator propagates it unchanged, and `IntoResponse` below is the only
//! place that turns it into a status code and JSON body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing x-internal-secret header")]
    MissingAuth,
    #[error("x-internal-secret header does not match configured secret")]
    Unauthorized,

    #[error("base_repo.prefix must not be empty")]
    EmptyRepoPrefix,
    #[error("{0}.ref must not be empty")]
    EmptyRepoRef(&'static str),
    #[error("tar must not be empty")]
    EmptyTarPath,
    #[error("invalid author: {0}")]
    InvalidAuthor(String),
    #[error("message must not be empty")]
    EmptyCommitMessage,
    #[error("invalid tar archive: {0}")]
    InvalidTar(String),
    #[error("tar archive contains no regular files")]
    EmptyTar,
    #[error("invalid path in tar archive: {0}")]
    InvalidPath(String),
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("base repo ref {0:?} did not resolve under refs/tags, refs/heads, or as a raw ref")]
    BaseRepoTagNotFound(String),
    #[error("parent commit {0} not found")]
    ParentCommitNotFound(String),
    #[error("parent tree {0} not found")]
    ParentTreeNotFound(String),
    #[error("tar object {0:?} not found")]
    TarNotFound(String),

    #[error("destination prefix {0:?} is not empty")]
    NewRepoNotEmpty(String),

    #[error("required object-store buckets are not configured")]
    MissingR2Buckets,
    #[error("failed to copy base repository: {0}")]
    RepoCopyFailed(String),
    #[error("failed to build tree: {0}")]
    TreeBuildFailed(String),
    #[error("failed to create commit: {0}")]
    CommitCreationFailed(String),
    #[error("object-store write failed: {0}")]
    R2WriteFailed(String),
    #[error("object-store read failed: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            MissingAuth | Unauthorized => StatusCode::UNAUTHORIZED,

            EmptyRepoPrefix
            | EmptyRepoRef(_)
            | EmptyTarPath
            | InvalidAuthor(_)
            | EmptyCommitMessage
            | InvalidTar(_)
            | EmptyTar
            | InvalidPath(_)
            | BadRequest(_) => StatusCode::BAD_REQUEST,

            BaseRepoTagNotFound(_) | ParentCommitNotFound(_) | ParentTreeNotFound(_)
            | TarNotFound(_) => StatusCode::NOT_FOUND,

            NewRepoNotEmpty(_) => StatusCode::CONFLICT,

            MissingR2Buckets
            | RepoCopyFailed(_)
            | TreeBuildFailed(_)
            | CommitCreationFailed(_)
            | R2WriteFailed(_)
            | Storage(_)
            | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        use AppError::*;
        match self {
            MissingAuth => "missing_auth",
            Unauthorized => "unauthorized",
            EmptyRepoPrefix => "empty_repo_prefix",
            EmptyRepoRef(_) => "empty_repo_ref",
            EmptyTarPath => "empty_tar_path",
            InvalidAuthor(_) => "invalid_author",
            EmptyCommitMessage => "empty_commit_message",
            InvalidTar(_) => "invalid_tar",
            EmptyTar => "empty_tar",
            InvalidPath(_) => "invalid_path",
            BadRequest(_) => "bad_request",
            BaseRepoTagNotFound(_) => "base_repo_tag_not_found",
            ParentCommitNotFound(_) => "parent_commit_not_found",
            ParentTreeNotFound(_) => "parent_tree_not_found",
            TarNotFound(_) => "tar_not_found",
            NewRepoNotEmpty(_) => "new_repo_not_empty",
            MissingR2Buckets => "missing_r2_buckets",
            RepoCopyFailed(_) => "repo_copy_failed",
            TreeBuildFailed(_) => "tree_build_failed",
            CommitCreationFailed(_) => "commit_creation_failed",
            R2WriteFailed(_) | Storage(_) => "r2_write_failed",
            Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, code = self.code(), "request failed");
        } else {
            tracing::warn!(error = %self, code = self.code(), "request rejected");
        }
        let body = ErrorBody {
            error: self.code(),
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
