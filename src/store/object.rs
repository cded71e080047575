//! The Git object model: a typed, content-addressed blob of bytes.
//!
//! Generalized from the teacher's `Object`, which hashed and patched
//! objects the same way but used its own ad hoc `Sha`/panic-on-error
//! style and a broken `crate::delta` dependency. `ObjectType` only ever
//! names a plain object; a delta entry is resolved into one of these
//! four before it is ever handed to a caller (§3 "Object type").

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str;

use flate2::read::ZlibDecoder;

use crate::error::{Error, Result};
use crate::hash::Sha;
use crate::store::commit::Commit;
use crate::store::tree::Tree;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjectType {
    Tree,
    Commit,
    Tag,
    Blob,
}

impl ObjectType {
    pub fn name(self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::Tree => "tree",
            ObjectType::Blob => "blob",
            ObjectType::Tag => "tag",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "commit" => Ok(ObjectType::Commit),
            "tree" => Ok(ObjectType::Tree),
            "blob" => Ok(ObjectType::Blob),
            "tag" => Ok(ObjectType::Tag),
            _ => Err(Error::BadPackFile(format!("unknown object type {name}"))),
        }
    }
}

/// A fully resolved Git object: its type and its final (never delta)
/// content.
#[derive(Clone)]
pub struct PackedObject {
    pub obj_type: ObjectType,
    pub content: Vec<u8>,
}

impl PackedObject {
    pub fn new(obj_type: ObjectType, content: Vec<u8>) -> Self {
        PackedObject { obj_type, content }
    }

    /// Applies a delta stream against this object's content, producing
    /// the patched object. Used by chain resolution one link at a time;
    /// prefer `packfile::materialize::ResolvedChain` for a whole chain.
    pub fn patch(&self, patch: &[u8]) -> Result<Self> {
        let content = crate::packfile::delta::apply(&self.content, patch)?;
        Ok(PackedObject {
            obj_type: self.obj_type,
            content,
        })
    }

    /// Opens a loose object (`<repo>/objects/xx/yyyy...`) from disk.
    /// Read-only: writing new loose objects is out of scope.
    pub fn open(repo_root: &Path, id: &Sha) -> Result<Self> {
        let path = loose_object_path(repo_root, id);
        let file = File::open(&path)?;
        let mut inflated = Vec::new();
        ZlibDecoder::new(file).read_to_end(&mut inflated)?;

        let split_idx = inflated
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::BadPackFile("loose object missing header terminator".into()))?;
        let header = str::from_utf8(&inflated[..split_idx])
            .map_err(|_| Error::BadPackFile("loose object header is not utf8".into()))?;
        let mut parts = header.splitn(2, ' ');
        let (type_name, size_str) = (
            parts.next().unwrap_or(""),
            parts.next().ok_or_else(|| Error::BadPackFile("loose object header malformed".into()))?,
        );
        let obj_type = ObjectType::from_name(type_name)?;
        let size: usize = size_str
            .parse()
            .map_err(|_| Error::BadPackFile("loose object size is not a number".into()))?;

        let content = inflated[split_idx + 1..].to_vec();
        if content.len() != size {
            return Err(Error::BadPackFile(
                "loose object content length does not match header".into(),
            ));
        }

        Ok(PackedObject { obj_type, content })
    }

    /// Encodes the `"<type> <len>\0"` header followed by content, the
    /// form that's actually hashed and stored.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = self.header();
        encoded.extend_from_slice(&self.content);
        encoded
    }

    fn header(&self) -> Vec<u8> {
        format!("{} {}\0", self.obj_type.name(), self.content.len()).into_bytes()
    }

    /// The object id: SHA-1 of `header ++ content`.
    pub fn sha(&self) -> Sha {
        Sha::compute_object(self.obj_type.name(), &self.content)
    }

    pub fn as_tree(&self) -> Option<Tree> {
        match self.obj_type {
            ObjectType::Tree => Tree::parse(&self.content).ok(),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<Commit> {
        match self.obj_type {
            ObjectType::Commit => Commit::parse(&self.content).ok(),
            _ => None,
        }
    }
}

fn loose_object_path(repo_root: &Path, id: &Sha) -> PathBuf {
    let hex = id.hex();
    let mut path = repo_root.to_path_buf();
    path.push("objects");
    path.push(&hex[..2]);
    path.push(&hex[2..]);
    path
}
