//! Canonical git object encoding: blobs, trees, commits.
//!
//! Every object's SHA is computed over `"<type> <len>\0" + payload`; this
//! module owns that canonical form in both directions (encode and parse).

use std::fmt;

use crate::error::AppError;
use crate::git::hash::Sha;

/// Directory bit for tree entry modes (`0o040000` and above set it).
pub const MODE_DIR_BIT: u32 = 0o40000;

pub const MODE_FILE: u32 = 0o100644;
pub const MODE_EXEC: u32 = 0o100755;
pub const MODE_TREE: u32 = 0o040000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(AppError::Internal(format!("unknown object type {other}"))),
        }
    }
}

/// One entry in a tree object: a path component, its mode, and the object it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub mode: u32,
    pub sha: Sha,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.mode & MODE_DIR_BIT != 0
    }

    /// Key used for git's canonical tree ordering: byte-lexicographic on the
    /// name, with subtree names compared as if they had a trailing `/`.
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        if self.is_dir() {
            key.push(b'/');
        }
        key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Sorts entries into git's canonical order. Idempotent.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
    /// Signed minutes offset from UTC, e.g. 0 for `+0000`.
    pub tz_offset_minutes: i32,
}

impl Identity {
    fn encode(&self) -> String {
        let sign = if self.tz_offset_minutes < 0 { '-' } else { '+' };
        let abs = self.tz_offset_minutes.unsigned_abs();
        format!(
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.timestamp,
            sign,
            abs / 60,
            abs % 60
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: Sha,
    pub parents: Vec<Sha>,
    pub author: Identity,
    pub committer: Identity,
    /// Bytes ending in exactly one `\n`.
    pub message: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitObject {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
    /// Tag objects are never produced by this service; raw bytes are kept so
    /// they can pass through read paths unharmed (see Non-goals).
    Tag(Vec<u8>),
}

impl GitObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            GitObject::Blob(_) => ObjectKind::Blob,
            GitObject::Tree(_) => ObjectKind::Tree,
            GitObject::Commit(_) => ObjectKind::Commit,
            GitObject::Tag(_) => ObjectKind::Tag,
        }
    }

    /// The payload bytes, without the `"<type> <len>\0"` header.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            GitObject::Blob(data) => data.clone(),
            GitObject::Tree(tree) => encode_tree(tree),
            GitObject::Commit(commit) => encode_commit(commit),
            GitObject::Tag(raw) => raw.clone(),
        }
    }

    /// The canonical form (`"<type> <len>\0" + payload`) whose SHA-1 is the object id.
    pub fn canonical(&self) -> Vec<u8> {
        let payload = self.payload();
        let header = format!("{} {}\0", self.kind(), payload.len());
        let mut out = Vec::with_capacity(header.len() + payload.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&payload);
        out
    }

    pub fn sha(&self) -> Sha {
        Sha::of(&self.canonical())
    }

    /// Parses a canonical-form buffer (header + payload) back into an object,
    /// without verifying its hash (callers that need the write-path invariant
    /// verify separately; see `GitObjectStore::fetch`).
    pub fn parse_canonical(buf: &[u8]) -> Result<Self, AppError> {
        let nul = buf
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| AppError::Internal("git object missing header terminator".into()))?;
        let header = std::str::from_utf8(&buf[..nul])
            .map_err(|_| AppError::Internal("git object header is not utf8".into()))?;
        let mut parts = header.splitn(2, ' ');
        let kind: ObjectKind = parts
            .next()
            .ok_or_else(|| AppError::Internal("git object header missing type".into()))?
            .parse()?;
        let len: usize = parts
            .next()
            .ok_or_else(|| AppError::Internal("git object header missing length".into()))?
            .parse()
            .map_err(|_| AppError::Internal("git object header length not a number".into()))?;
        let payload = &buf[nul + 1..];
        if payload.len() != len {
            return Err(AppError::Internal(format!(
                "git object length mismatch: header says {len}, payload is {}",
                payload.len()
            )));
        }
        match kind {
            ObjectKind::Blob => Ok(GitObject::Blob(payload.to_vec())),
            ObjectKind::Tree => Ok(GitObject::Tree(decode_tree(payload)?)),
            ObjectKind::Commit => Ok(GitObject::Commit(decode_commit(payload)?)),
            ObjectKind::Tag => Ok(GitObject::Tag(payload.to_vec())),
        }
    }
}

fn encode_tree(tree: &Tree) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in &tree.entries {
        out.extend_from_slice(format!("{:o} {}\0", entry.mode, entry.name).as_bytes());
        out.extend_from_slice(&entry.sha.0);
    }
    out
}

fn decode_tree(payload: &[u8]) -> Result<Tree, AppError> {
    let mut entries = Vec::new();
    let mut i = 0;
    while i < payload.len() {
        let space = payload[i..]
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| AppError::Internal("tree entry missing mode separator".into()))?
            + i;
        let mode_str = std::str::from_utf8(&payload[i..space])
            .map_err(|_| AppError::Internal("tree entry mode not utf8".into()))?;
        let mode = u32::from_str_radix(mode_str, 8)
            .map_err(|_| AppError::Internal("tree entry mode not octal".into()))?;

        let nul = payload[space + 1..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| AppError::Internal("tree entry missing name terminator".into()))?
            + space
            + 1;
        let name = std::str::from_utf8(&payload[space + 1..nul])
            .map_err(|_| AppError::Internal("tree entry name not utf8".into()))?
            .to_string();

        let sha_start = nul + 1;
        let sha_end = sha_start + Sha::LEN;
        if sha_end > payload.len() {
            return Err(AppError::Internal("tree entry truncated sha".into()));
        }
        let mut sha_bytes = [0u8; 20];
        sha_bytes.copy_from_slice(&payload[sha_start..sha_end]);

        entries.push(TreeEntry {
            name,
            mode,
            sha: Sha(sha_bytes),
        });
        i = sha_end;
    }
    Ok(Tree { entries })
}

fn encode_commit(commit: &Commit) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&format!("tree {}\n", commit.tree));
    for parent in &commit.parents {
        out.push_str(&format!("parent {parent}\n"));
    }
    out.push_str(&format!("author {}\n", commit.author.encode()));
    out.push_str(&format!("committer {}\n", commit.committer.encode()));
    out.push('\n');
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(&commit.message);
    bytes
}

fn decode_commit(payload: &[u8]) -> Result<Commit, AppError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| AppError::Internal("commit payload not utf8".into()))?;
    let (header, message) = text
        .split_once("\n\n")
        .ok_or_else(|| AppError::Internal("commit missing header/message separator".into()))?;

    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = None;
    let mut committer = None;

    for line in header.lines() {
        if let Some(rest) = line.strip_prefix("tree ") {
            tree = Some(
                rest.parse::<Sha>()
                    .map_err(|e| AppError::Internal(format!("commit tree sha: {e}")))?,
            );
        } else if let Some(rest) = line.strip_prefix("parent ") {
            parents.push(
                rest.parse::<Sha>()
                    .map_err(|e| AppError::Internal(format!("commit parent sha: {e}")))?,
            );
        } else if let Some(rest) = line.strip_prefix("author ") {
            author = Some(parse_identity(rest)?);
        } else if let Some(rest) = line.strip_prefix("committer ") {
            committer = Some(parse_identity(rest)?);
        }
    }

    Ok(Commit {
        tree: tree.ok_or_else(|| AppError::Internal("commit missing tree".into()))?,
        parents,
        author: author.ok_or_else(|| AppError::Internal("commit missing author".into()))?,
        committer: committer.ok_or_else(|| AppError::Internal("commit missing committer".into()))?,
        message: message.as_bytes().to_vec(),
    })
}

fn parse_identity(line: &str) -> Result<Identity, AppError> {
    let gt = line
        .find('>')
        .ok_or_else(|| AppError::Internal("identity line missing '>'".into()))?;
    let (name_email, rest) = line.split_at(gt + 1);
    let (name, email) = name_email
        .split_once('<')
        .ok_or_else(|| AppError::Internal("identity line missing '<'".into()))?;
    let name = name.trim().to_string();
    let email = email.trim_end_matches('>').to_string();

    let rest = rest.trim();
    let mut parts = rest.split_whitespace();
    let timestamp: i64 = parts
        .next()
        .ok_or_else(|| AppError::Internal("identity line missing timestamp".into()))?
        .parse()
        .map_err(|_| AppError::Internal("identity timestamp not a number".into()))?;
    let tz = parts
        .next()
        .ok_or_else(|| AppError::Internal("identity line missing tz offset".into()))?;
    let (sign, digits) = tz.split_at(1);
    let sign = if sign == "-" { -1 } else { 1 };
    if digits.len() != 4 {
        return Err(AppError::Internal("identity tz offset malformed".into()));
    }
    let hours: i32 = digits[0..2]
        .parse()
        .map_err(|_| AppError::Internal("identity tz hours not a number".into()))?;
    let minutes: i32 = digits[2..4]
        .parse()
        .map_err(|_| AppError::Internal("identity tz minutes not a number".into()))?;

    Ok(Identity {
        name,
        email,
        timestamp,
        tz_offset_minutes: sign * (hours * 60 + minutes),
    })
}

/// The canonical empty tree, `SHA1("tree 0\0")`.
pub fn empty_tree() -> GitObject {
    GitObject::Tree(Tree::default())
}
