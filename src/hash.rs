//! The 20-byte content-addressed object id.
//!
//! Grounded on `store::Sha` from the teacher: equality and ordering are
//! byte-wise (first byte most significant), and the textual form is the
//! lowercase hex expansion used throughout the pack index and pack file
//! formats.

use std::fmt;

#[derive(Clone, Copy, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct Sha {
    contents: [u8; 20],
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeShaError {
    #[error("invalid hex character")]
    InvalidChar,
    #[error("invalid sha length: {0}")]
    InvalidLength(usize),
}

impl From<faster_hex::Error> for DecodeShaError {
    fn from(error: faster_hex::Error) -> Self {
        match error {
            faster_hex::Error::InvalidChar => DecodeShaError::InvalidChar,
            faster_hex::Error::InvalidLength(u) => DecodeShaError::InvalidLength(u),
        }
    }
}

impl Sha {
    pub fn from_hex(hex: &[u8]) -> Result<Self, DecodeShaError> {
        use faster_hex::hex_decode;

        if hex.len() != 40 {
            return Err(DecodeShaError::InvalidLength(hex.len()));
        }
        let mut contents = [0u8; 20];
        hex_decode(hex, &mut contents)?;
        Ok(Self { contents })
    }

    pub fn from_hex_str(hex: &str) -> Result<Self, DecodeShaError> {
        Self::from_hex(hex.as_bytes())
    }

    pub fn compute_from_bytes(bytes: &[u8]) -> Self {
        use sha1::{Digest, Sha1};

        let contents: [u8; 20] = Sha1::digest(bytes).into();
        Self { contents }
    }

    /// Computes the id of an object the way git does: the SHA-1 of the
    /// `"<type> <len>\0"` header followed by the content bytes. This is
    /// the round-trip property tests in §8 hinge on.
    pub fn compute_object(type_name: &str, content: &[u8]) -> Self {
        use sha1::{Digest, Sha1};

        let mut hasher = Sha1::new();
        hasher.update(type_name.as_bytes());
        hasher.update(b" ");
        hasher.update(content.len().to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(content);
        let contents: [u8; 20] = hasher.finalize().into();
        Self { contents }
    }

    pub fn from_array(bytes: [u8; 20]) -> Self {
        Self { contents: bytes }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeShaError> {
        if bytes.len() != 20 {
            return Err(DecodeShaError::InvalidLength(bytes.len()));
        }
        let mut contents = [0u8; 20];
        contents.copy_from_slice(bytes);
        Ok(Self { contents })
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.contents
    }

    /// First byte of the id; selects the fanout bucket.
    pub fn fanout_byte(&self) -> u8 {
        self.contents[0]
    }

    pub fn hex(&self) -> String {
        faster_hex::hex_string(&self.contents)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex())
    }
}

impl fmt::Debug for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha({})", self.hex())
    }
}
