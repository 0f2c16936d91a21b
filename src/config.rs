//! Process configuration, loaded once from the environment at startup
//! (§10.2). A missing or unparsable variable is a startup failure, not a
//! per-request error: `main` calls `Config::from_env()` before the server
//! ever accepts a connection.

use std::sync::Arc;

use anyhow::{Context, Result};
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;

fn required_var(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing required env var {name}"))
}

/// Resolves the bucket's endpoint: an explicit `{prefix}_ENDPOINT` override
/// takes precedence, otherwise it's derived from the account id, mirroring
/// the teacher's own `LIBRA_STORAGE_ENDPOINT` override-with-fallback pattern
/// (`client_storage.rs`'s `create_storage_backend`).
fn resolve_endpoint(bucket_env_prefix: &str, account_id: &str) -> String {
    std::env::var(format!("{bucket_env_prefix}_ENDPOINT"))
        .unwrap_or_else(|_| format!("https://{account_id}.r2.cloudflarestorage.com"))
}

fn build_r2_client(bucket_env_prefix: &str) -> Result<Arc<dyn ObjectStore>> {
    let account_id = required_var(&format!("{bucket_env_prefix}_ACCOUNT_ID"))?;
    let bucket = required_var(&format!("{bucket_env_prefix}_BUCKET"))?;
    let access_key = required_var(&format!("{bucket_env_prefix}_ACCESS_KEY"))?;
    let secret_key = required_var(&format!("{bucket_env_prefix}_SECRET_KEY"))?;
    let region = std::env::var(format!("{bucket_env_prefix}_REGION")).unwrap_or_else(|_| "auto".to_string());
    let endpoint = resolve_endpoint(bucket_env_prefix, &account_id);

    let client = AmazonS3Builder::new()
        .with_bucket_name(&bucket)
        .with_endpoint(endpoint)
        .with_region(region)
        .with_access_key_id(access_key)
        .with_secret_access_key(secret_key)
        .build()
        .with_context(|| format!("failed to build R2 client for {bucket_env_prefix}"))?;

    Ok(Arc::new(client))
}

pub struct Config {
    pub bind_addr: String,
    pub internal_shared_secret: String,
    pub repos_store: Arc<dyn ObjectStore>,
    pub file_transfer_store: Arc<dyn ObjectStore>,
}

impl Config {
    /// Loads configuration from the process environment. Both R2 buckets are
    /// constructed eagerly so a bad credential is a boot-time failure rather
    /// than surfacing on the first request (§10.2).
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let internal_shared_secret = required_var("INTERNAL_SHARED_SECRET")?;

        let repos_store = build_r2_client("R2_REPOS_BUCKET")?;
        let file_transfer_store = build_r2_client("R2_FILE_TRANSFER_BUCKET")?;

        Ok(Self {
            bind_addr,
            internal_shared_secret,
            repos_store,
            file_transfer_store,
        })
    }
}
