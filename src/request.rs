//! HTTP request/response JSON shapes (§6). No component below the HTTP
//! layer ever constructs or parses these — the orchestrator works in terms
//! of plain Rust values.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct RepoRef {
    pub prefix: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorInfo {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRequest {
    pub base_repo: RepoRef,
    pub new_repo: RepoRef,
    pub tar: String,
    pub author: AuthorInfo,
    pub message: String,
}

impl CommitRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.base_repo.prefix.trim().is_empty() || self.new_repo.prefix.trim().is_empty() {
            return Err(AppError::EmptyRepoPrefix);
        }
        if self.base_repo.ref_name.trim().is_empty() {
            return Err(AppError::EmptyRepoRef("base_repo"));
        }
        if self.new_repo.ref_name.trim().is_empty() {
            return Err(AppError::EmptyRepoRef("new_repo"));
        }
        if self.tar.trim().is_empty() {
            return Err(AppError::EmptyTarPath);
        }
        if self.author.name.trim().is_empty() || self.author.email.trim().is_empty() {
            return Err(AppError::InvalidAuthor(
                "author.name and author.email are required".to_string(),
            ));
        }
        if self.message.trim().is_empty() {
            return Err(AppError::EmptyCommitMessage);
        }
        Ok(())
    }
}

/// Ensures a repo-store prefix ends in `/`, per §6's key-layout invariant.
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TouchedPaths {
    pub added_or_updated: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitResponse {
    pub parent_commit_oid: Option<String>,
    pub new_commit_oid: String,
    pub new_repo_prefix: String,
    pub new_repo_ref: String,
    pub touched: TouchedPaths,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CommitRequest {
        CommitRequest {
            base_repo: RepoRef { prefix: "repos/base/".into(), ref_name: "main".into() },
            new_repo: RepoRef { prefix: "repos/new/".into(), ref_name: "refs/heads/main".into() },
            tar: "uploads/abc.tar".into(),
            author: AuthorInfo { name: "Ada".into(), email: "ada@example.com".into() },
            message: "init".into(),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn empty_tar_path_is_rejected() {
        let mut req = valid_request();
        req.tar = "  ".into();
        assert!(matches!(req.validate(), Err(AppError::EmptyTarPath)));
    }

    #[test]
    fn empty_message_is_rejected() {
        let mut req = valid_request();
        req.message = "".into();
        assert!(matches!(req.validate(), Err(AppError::EmptyCommitMessage)));
    }

    #[test]
    fn missing_author_email_is_rejected() {
        let mut req = valid_request();
        req.author.email = "".into();
        assert!(matches!(req.validate(), Err(AppError::InvalidAuthor(_))));
    }

    #[test]
    fn normalize_prefix_appends_trailing_slash() {
        assert_eq!(normalize_prefix("repos/x"), "repos/x/");
        assert_eq!(normalize_prefix("repos/x/"), "repos/x/");
    }
}
