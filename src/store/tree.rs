//! Tree object parsing: `<mode> <path>\0<20-byte-id>` records, repeated
//! to end of content.
//!
//! Rewritten against nom 7's combinator style; the teacher's version
//! used the `named!`/`chain!` macros nom dropped well before the
//! `nom = "7.1.0"` the rest of the crate already depends on.

use nom::bytes::complete::{tag, take, take_till1};
use nom::multi::many1;
use nom::IResult;

use crate::error::{Error, Result};
use crate::hash::Sha;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    Normal,
    Executable,
    Symlink,
    Gitlink,
    SubDirectory,
}

impl EntryMode {
    fn from_bytes(mode: &[u8]) -> Result<Self> {
        match mode {
            b"100644" | b"644" => Ok(EntryMode::Normal),
            b"100755" | b"755" => Ok(EntryMode::Executable),
            b"120000" => Ok(EntryMode::Symlink),
            b"160000" => Ok(EntryMode::Gitlink),
            b"40000" | b"040000" => Ok(EntryMode::SubDirectory),
            other => Err(Error::BadPackFile(format!(
                "unsupported tree entry mode: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub path: String,
    pub sha: Sha,
}

#[derive(Debug, Clone)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn parse(content: &[u8]) -> Result<Self> {
        let (_, raw_entries) = many1(parse_raw_entry)(content)
            .map_err(|_| Error::BadPackFile("malformed tree object".into()))?;

        let mut entries = Vec::with_capacity(raw_entries.len());
        for (mode, path, sha) in raw_entries {
            let mode = EntryMode::from_bytes(mode)?;
            let path = String::from_utf8(path.to_vec())
                .map_err(|_| Error::BadPackFile("tree entry path is not utf8".into()))?;
            let sha = Sha::from_bytes(sha)
                .map_err(|e| Error::BadPackFile(format!("tree entry id: {e}")))?;
            entries.push(TreeEntry { mode, path, sha });
        }
        Ok(Tree { entries })
    }
}

fn parse_raw_entry(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8], &[u8])> {
    let (input, mode) = take_till1(|b| b == b' ')(input)?;
    let (input, _) = tag(" ")(input)?;
    let (input, path) = take_till1(|b| b == 0)(input)?;
    let (input, _) = tag([0u8])(input)?;
    let (input, sha) = take(20usize)(input)?;
    Ok((input, (mode, path, sha)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_entry(mode: &str, path: &str, sha: [u8; 20]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(mode.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(path.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&sha);
        buf
    }

    #[test]
    fn parses_multiple_entries() {
        let mut content = raw_entry("100644", ".ghci", [1u8; 20]);
        content.extend(raw_entry("100755", "run.sh", [2u8; 20]));
        content.extend(raw_entry("40000", "src", [3u8; 20]));

        let tree = Tree::parse(&content).unwrap();
        assert_eq!(tree.entries.len(), 3);
        assert_eq!(tree.entries[0].mode, EntryMode::Normal);
        assert_eq!(tree.entries[0].path, ".ghci");
        assert_eq!(tree.entries[1].mode, EntryMode::Executable);
        assert_eq!(tree.entries[2].mode, EntryMode::SubDirectory);
    }

    #[test]
    fn rejects_unsupported_mode() {
        let content = raw_entry("999999", "weird", [9u8; 20]);
        assert!(Tree::parse(&content).is_err());
    }
}
