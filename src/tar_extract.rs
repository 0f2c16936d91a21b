//! Streams a tar archive into an ordered list of `PathEdit`s (§4.5).

use std::io::Read;

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::error::AppError;
use crate::git::object::{MODE_EXEC, MODE_FILE};

/// One file to write into the new tree: a normalized path, its bytes, and a
/// git file mode (`MODE_FILE` or `MODE_EXEC`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEdit {
    pub path: String,
    pub data: Vec<u8>,
    pub mode: u32,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Streams `bytes` as a tar archive (transparently gunzipping if it starts
/// with the gzip magic), producing one `PathEdit` per regular-file member in
/// archive order. Non-regular entries (directories, symlinks, hardlinks,
/// devices, fifos) are skipped. Rejects a tar with zero regular-file members.
pub fn extract_edits(bytes: &[u8]) -> Result<Vec<PathEdit>, AppError> {
    let reader: Box<dyn Read + '_> = if bytes.len() >= 2 && bytes[0..2] == GZIP_MAGIC {
        Box::new(GzDecoder::new(bytes))
    } else {
        Box::new(bytes)
    };

    let mut archive = Archive::new(reader);
    let mut edits = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| AppError::InvalidTar(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| AppError::InvalidTar(e.to_string()))?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }

        let raw_path = entry
            .path()
            .map_err(|e| AppError::InvalidTar(e.to_string()))?
            .to_string_lossy()
            .into_owned();
        let path = normalize_tar_path(&raw_path)?;

        let unix_mode = entry.header().mode().unwrap_or(0o644);
        let mode = if unix_mode & 0o111 != 0 { MODE_EXEC } else { MODE_FILE };

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| AppError::InvalidTar(e.to_string()))?;

        edits.push(PathEdit { path, data, mode });
    }

    if edits.is_empty() {
        return Err(AppError::EmptyTar);
    }
    Ok(edits)
}

/// Normalizes a tar member path: strips a leading `./`, collapses `//` and
/// `.` components, and rejects anything with a `..` component, an absolute
/// prefix, or a trailing `/`.
fn normalize_tar_path(raw: &str) -> Result<String, AppError> {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(AppError::InvalidPath(raw.to_string()));
    }
    if raw.ends_with('/') {
        return Err(AppError::InvalidPath(raw.to_string()));
    }

    let stripped = raw.strip_prefix("./").unwrap_or(raw);
    let mut components = Vec::new();
    for part in stripped.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(AppError::InvalidPath(raw.to_string())),
            other => components.push(other),
        }
    }
    if components.is_empty() {
        return Err(AppError::InvalidPath(raw.to_string()));
    }
    Ok(components.join("/"))
}
