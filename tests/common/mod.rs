//! Shared fixture builders for the integration suite: hand-assembled
//! pack/index bytes and loose objects, so these tests exercise the
//! on-disk formats directly without needing a real `git` checkout.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use packtree::hash::Sha;

const HEADER_LENGTH: u64 = 12;

pub fn zlib(bytes: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

pub fn varint(mut n: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (n & 0x7f) as u8;
        n >>= 7;
        if n != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if n == 0 {
            break;
        }
    }
    out
}

/// A single-op insert delta: declares `base_len`/`content.len()` and
/// inserts `content` verbatim, ignoring the base entirely. `content`
/// must be <= 127 bytes (the insert opcode's single-byte length limit).
pub fn insert_only_delta(base_len: usize, content: &[u8]) -> Vec<u8> {
    assert!(content.len() <= 127);
    let mut delta = varint(base_len as u64);
    delta.extend(varint(content.len() as u64));
    delta.push(content.len() as u8);
    delta.extend_from_slice(content);
    delta
}

fn pack_obj_header(type_id: u8, size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut c = ((type_id & 7) << 4) | (size as u8 & 0x0f);
    let mut rest = size >> 4;
    if rest > 0 {
        c |= 0x80;
    }
    out.push(c);
    while rest > 0 {
        let mut byte = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
    out
}

/// Encodes a negative pack offset the way `OFS_DELTA` entries store it:
/// base-128 groups, each non-final group implicitly `+= 1` before the
/// next shift, matching `EntryReader::read_offset`'s decode.
fn encode_ofs_delta_offset(mut ofs: u64) -> Vec<u8> {
    let mut out = vec![(ofs & 0x7f) as u8];
    ofs >>= 7;
    while ofs > 0 {
        ofs -= 1;
        out.push(0x80 | (ofs & 0x7f) as u8);
        ofs >>= 7;
    }
    out.reverse();
    out
}

pub fn encode_tree(entries: &[(&str, &str, [u8; 20])]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (mode, path, sha) in entries {
        buf.extend_from_slice(mode.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(path.as_bytes());
        buf.push(0);
        buf.extend_from_slice(sha);
    }
    buf
}

pub fn encode_commit(tree_hex: &str, parents_hex: &[&str], message: &str) -> Vec<u8> {
    let mut s = format!("tree {tree_hex}\n");
    for p in parents_hex {
        s += &format!("parent {p}\n");
    }
    s += "author Test Author <test@example.com> 1700000000 +0000\n";
    s += "committer Test Author <test@example.com> 1700000000 +0000\n";
    s += "\n";
    s += message;
    s.into_bytes()
}

/// Accumulates pack entries, tracking each one's file offset, then
/// produces the final `"PACK"`-framed bytes plus trailer SHA.
pub struct PackBuilder {
    entries: Vec<u8>,
    count: u32,
}

impl PackBuilder {
    pub fn new() -> Self {
        PackBuilder {
            entries: Vec::new(),
            count: 0,
        }
    }

    fn current_offset(&self) -> u64 {
        HEADER_LENGTH + self.entries.len() as u64
    }

    /// type_id: 1=commit, 2=tree, 3=blob, 4=tag.
    pub fn add_plain(&mut self, type_id: u8, content: &[u8]) -> u64 {
        let offset = self.current_offset();
        self.entries.extend(pack_obj_header(type_id, content.len()));
        self.entries.extend(zlib(content));
        self.count += 1;
        offset
    }

    pub fn add_ofs_delta(&mut self, base_offset: u64, patch: &[u8]) -> u64 {
        let offset = self.current_offset();
        self.entries.extend(pack_obj_header(6, patch.len()));
        self.entries.extend(encode_ofs_delta_offset(offset - base_offset));
        self.entries.extend(zlib(patch));
        self.count += 1;
        offset
    }

    pub fn add_ref_delta(&mut self, base_sha: &Sha, patch: &[u8]) -> u64 {
        let offset = self.current_offset();
        self.entries.extend(pack_obj_header(7, patch.len()));
        self.entries.extend_from_slice(base_sha.as_bytes());
        self.entries.extend(zlib(patch));
        self.count += 1;
        offset
    }

    pub fn finish(self) -> (Vec<u8>, Sha) {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"PACK");
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&self.count.to_be_bytes());
        buf.extend_from_slice(&self.entries);
        let sha = Sha::compute_from_bytes(&buf);
        buf.extend_from_slice(sha.as_bytes());
        (buf, sha)
    }
}

pub fn build_index_bytes(mut ids_offsets: Vec<(Sha, u64)>, pack_sha: Sha) -> Vec<u8> {
    use byteorder::{BigEndian, WriteBytesExt};

    ids_offsets.sort_by_key(|(id, _)| *id);
    let mut fanout = [0u32; 256];
    for (id, _) in &ids_offsets {
        for slot in &mut fanout[id.fanout_byte() as usize..] {
            *slot += 1;
        }
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(&[0xff, 0x74, 0x4f, 0x63]);
    buf.write_u32::<BigEndian>(2).unwrap();
    for f in &fanout {
        buf.write_u32::<BigEndian>(*f).unwrap();
    }
    for (id, _) in &ids_offsets {
        buf.extend_from_slice(id.as_bytes());
    }
    for _ in &ids_offsets {
        buf.write_u32::<BigEndian>(0).unwrap();
    }
    for (_, offset) in &ids_offsets {
        buf.write_u32::<BigEndian>(*offset as u32).unwrap();
    }
    buf.extend_from_slice(pack_sha.as_bytes());
    let checksum = Sha::compute_from_bytes(&buf);
    buf.extend_from_slice(checksum.as_bytes());
    buf
}

/// Writes `pack_bytes`/`index_bytes` under `<repo>/objects/pack/pack-<sha>.{pack,idx}`.
pub fn write_pack(repo_root: &Path, pack_bytes: &[u8], index_bytes: &[u8], pack_sha: &Sha) {
    let dir = repo_root.join("objects").join("pack");
    fs::create_dir_all(&dir).unwrap();
    let stem = format!("pack-{}", pack_sha.hex());
    fs::write(dir.join(format!("{stem}.pack")), pack_bytes).unwrap();
    fs::write(dir.join(format!("{stem}.idx")), index_bytes).unwrap();
}

/// Writes a loose object the way `PackedObject::open` expects to read
/// it: zlib-compressed `"<type> <len>\0<content>"` under `objects/xx/yyyy...`.
pub fn write_loose_object(repo_root: &Path, type_name: &str, content: &[u8]) -> Sha {
    let sha = Sha::compute_object(type_name, content);
    let header = format!("{type_name} {}\0", content.len());
    let mut full = header.into_bytes();
    full.extend_from_slice(content);
    let compressed = zlib(&full);

    let hex = sha.hex();
    let dir = repo_root.join("objects").join(&hex[..2]);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(&hex[2..]), compressed).unwrap();
    sha
}

pub fn init_bare_layout(repo_root: &Path) {
    fs::create_dir_all(repo_root.join("objects").join("pack")).unwrap();
    fs::create_dir_all(repo_root.join("refs").join("heads")).unwrap();
}

pub fn write_head(repo_root: &Path, commit: &Sha) {
    fs::write(repo_root.join("refs").join("heads").join("main"), format!("{}\n", commit.hex())).unwrap();
    fs::write(repo_root.join("HEAD"), "ref: refs/heads/main\n").unwrap();
}

#[allow(dead_code)]
pub fn pack_object_count(pack_bytes: &[u8]) -> u32 {
    u32::from_be_bytes(pack_bytes[8..12].try_into().unwrap())
}

#[allow(dead_code)]
pub fn tmp_repo() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    init_bare_layout(&root);
    (dir, root)
}
