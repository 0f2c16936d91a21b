//! SHA-1 object identifiers.

use std::fmt;
use std::str::FromStr;

use sha1::{Digest, Sha1};

/// 20-byte SHA-1 digest identifying a git object.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha(pub [u8; 20]);

impl Sha {
    pub const LEN: usize = 20;

    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest);
        Sha(out)
    }

    /// The key suffix used for loose-object storage: `<xx>/<rest>`.
    pub fn object_key(&self, prefix: &str) -> String {
        let hex = self.to_hex();
        format!("{prefix}objects/{}/{}", &hex[0..2], &hex[2..])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha({})", self.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid sha1 hex string: {0}")]
pub struct ParseShaError(pub String);

impl FromStr for Sha {
    type Err = ParseShaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(ParseShaError(s.to_string()));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(s, &mut out).map_err(|_| ParseShaError(s.to_string()))?;
        Ok(Sha(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha_of_known_blob_header() {
        // `git hash-object` for a blob containing "hi\n" is
        // 45b983be36b73c0788dc9cbcb76cbb80fc7bb057
        let header = b"blob 3\0hi\n";
        let sha = Sha::of(header);
        assert_eq!(sha.to_hex(), "45b983be36b73c0788dc9cbcb76cbb80fc7bb057");
    }

    #[test]
    fn round_trip_hex() {
        let sha = Sha::of(b"blob 0\0");
        let parsed: Sha = sha.to_hex().parse().unwrap();
        assert_eq!(sha, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("deadbeef".parse::<Sha>().is_err());
    }

    #[test]
    fn object_key_splits_first_two_chars() {
        let sha = Sha::of(b"blob 3\0hi\n");
        let key = sha.object_key("repos/x/");
        assert_eq!(key, "repos/x/objects/45/b983be36b73c0788dc9cbcb76cbb80fc7bb057");
    }
}
