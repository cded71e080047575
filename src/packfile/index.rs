// PackIndex v2.
//
// To find an object in a pack:
//   1. Look at the first byte of the id, M.
//   2. `end <- fanout[M]`, the count of objects whose id starts with a
//      byte <= M.
//   3. `start <- 0` if M == 0, else `fanout[M - 1]`.
//   4. `sorted_ids[start..end]` holds every id with a matching first byte;
//      binary search it.
//   5. The matching slot indexes in parallel into `offsets` (and, when
//      the high bit is set, into `large_offsets`).
//
// Generalized from the teacher's index, which only ever parsed the
// 32-bit offset table and used `assert_eq!` in place of typed errors.
// This version also parses `large_offsets` and turns every corruption
// the original merely asserted on into a `BAD_PACKIDX`/`PACKIDX_CSUM`
// error.

use byteorder::{BigEndian, ReadBytesExt};
use std::fs;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::hash::Sha;

/// "\xfft0c", the fixed magic of a version-2 pack index.
pub const MAGIC: [u8; 4] = [0xff, 0x74, 0x4f, 0x63];
pub const VERSION: u32 = 2;

/// The pack size threshold past which large (64-bit) offsets are needed.
const TWO_GIB: u64 = 1 << 31;

#[derive(Debug, Clone)]
pub struct PackIndex {
    fanout: [u32; 256],
    sorted_ids: Vec<Sha>,
    crc32: Vec<u32>,
    offsets: Vec<u32>,
    large_offsets: Vec<u64>,
    pack_sha: Sha,
    index_sha: Sha,
}

impl PackIndex {
    /// Parses `path` (a `.idx` file) in a single forward pass, streaming
    /// the bytes through a SHA-1 digest that excludes the trailing
    /// index-SHA1 itself.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut contents = Vec::new();
        File::open(path)?.read_to_end(&mut contents)?;

        let pack_len = fs::metadata(path.with_extension("pack"))
            .map(|m| m.len())
            .unwrap_or(0);

        Self::parse(&contents, pack_len)
    }

    pub(crate) fn parse(content: &[u8], pack_len: u64) -> Result<Self> {
        if content.len() < 4 + 4 + 256 * 4 + 40 {
            return Err(Error::BadPackIdx("truncated index header".into()));
        }
        let computed_checksum = Sha::compute_from_bytes(&content[..content.len() - 20]);

        let mut cursor = content;

        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::BadPackIdx(format!("bad magic: {magic:02x?}")));
        }

        let version = cursor.read_u32::<BigEndian>()?;
        if version != VERSION {
            return Err(Error::BadPackIdx(format!("unsupported version {version}")));
        }

        let mut fanout = [0u32; 256];
        let mut prev = 0u32;
        for slot in fanout.iter_mut() {
            let v = cursor.read_u32::<BigEndian>()?;
            if v < prev {
                return Err(Error::BadPackIdx("fanout table is not monotone".into()));
            }
            prev = v;
            *slot = v;
        }
        let count = fanout[255] as usize;

        let mut sorted_ids = Vec::with_capacity(count);
        let mut prev_id: Option<Sha> = None;
        for _ in 0..count {
            let mut raw = [0u8; 20];
            cursor.read_exact(&mut raw)?;
            let id = Sha::from_array(raw);
            if let Some(prev_id) = &prev_id {
                if id <= *prev_id {
                    return Err(Error::BadPackIdx("sorted_ids is not strictly ascending".into()));
                }
            }
            prev_id = Some(id);
            sorted_ids.push(id);
        }

        let mut crc32 = Vec::with_capacity(count);
        for _ in 0..count {
            crc32.push(cursor.read_u32::<BigEndian>()?);
        }

        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(cursor.read_u32::<BigEndian>()?);
        }

        let large_needed = offsets.iter().filter(|o| o & 0x8000_0000 != 0).count();
        if pack_len != 0 && pack_len <= TWO_GIB && large_needed > 0 {
            return Err(Error::BadPackIdx(
                "large offset flagged in a pack <= 2GiB".into(),
            ));
        }
        let mut large_offsets = Vec::with_capacity(large_needed);
        for _ in 0..large_needed {
            large_offsets.push(cursor.read_u64::<BigEndian>()?);
        }

        let mut pack_sha_raw = [0u8; 20];
        cursor.read_exact(&mut pack_sha_raw)?;
        let pack_sha = Sha::from_array(pack_sha_raw);

        let mut index_sha_raw = [0u8; 20];
        cursor.read_exact(&mut index_sha_raw)?;
        let index_sha = Sha::from_array(index_sha_raw);

        if index_sha != computed_checksum {
            return Err(Error::PackIdxCsum);
        }

        Ok(PackIndex {
            fanout,
            sorted_ids,
            crc32,
            offsets,
            large_offsets,
            pack_sha,
            index_sha,
        })
    }

    pub fn len(&self) -> usize {
        self.sorted_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_ids.is_empty()
    }

    pub fn pack_sha(&self) -> Sha {
        self.pack_sha
    }

    pub fn index_sha(&self) -> Sha {
        self.index_sha
    }

    /// The bucket of `sorted_ids` whose first byte matches `id`'s.
    fn bucket(&self, id: &Sha) -> (usize, usize) {
        let b = id.fanout_byte() as usize;
        let start = if b > 0 { self.fanout[b - 1] as usize } else { 0 };
        let end = self.fanout[b] as usize;
        (start, end)
    }

    /// Binary search within the fanout bucket; `sorted_ids` is strictly
    /// ascending within each bucket by construction.
    pub fn find(&self, id: &Sha) -> Option<usize> {
        let (start, end) = self.bucket(id);
        self.sorted_ids[start..end]
            .binary_search(id)
            .ok()
            .map(|i| start + i)
    }

    pub fn id_at(&self, slot: usize) -> Sha {
        self.sorted_ids[slot]
    }

    pub fn crc32_at(&self, slot: usize) -> u32 {
        self.crc32[slot]
    }

    /// Resolves the pack offset for `slot`, consulting `large_offsets`
    /// when the high bit of the direct offset is set.
    pub fn offset_at(&self, slot: usize) -> Result<u64> {
        let raw = *self
            .offsets
            .get(slot)
            .ok_or_else(|| Error::BadPackIdx(format!("slot {slot} out of range")))?;
        if raw & 0x8000_0000 == 0 {
            return Ok(raw as u64);
        }
        let large_idx = (raw & 0x7fff_ffff) as usize;
        let offset = *self
            .large_offsets
            .get(large_idx)
            .ok_or_else(|| Error::BadPackIdx(format!("large offset index {large_idx} out of range")))?;
        if offset > i64::MAX as u64 {
            return Err(Error::BadPackIdx("offset exceeds maximum file offset".into()));
        }
        Ok(offset)
    }

    /// Re-encodes the index into its on-disk binary form. Used by the
    /// round-trip tests.
    pub fn encode(&self) -> Result<Vec<u8>> {
        use byteorder::WriteBytesExt;

        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.write_u32::<BigEndian>(VERSION)?;
        for f in &self.fanout {
            buf.write_u32::<BigEndian>(*f)?;
        }
        for id in &self.sorted_ids {
            buf.extend_from_slice(id.as_bytes());
        }
        for c in &self.crc32 {
            buf.write_u32::<BigEndian>(*c)?;
        }
        for o in &self.offsets {
            buf.write_u32::<BigEndian>(*o)?;
        }
        for o in &self.large_offsets {
            buf.write_u64::<BigEndian>(*o)?;
        }
        buf.extend_from_slice(self.pack_sha.as_bytes());
        let checksum = Sha::compute_from_bytes(&buf);
        buf.extend_from_slice(checksum.as_bytes());
        Ok(buf)
    }
}

/// Lists the `.idx` files under `<repo>/objects/pack`. The cache layer,
/// not this scan, is what provides MRU semantics for hot packs.
pub fn discover_indices(objects_pack_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let entries = match fs::read_dir(objects_pack_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy().into_owned();
        if name.starts_with("pack-") && name.ends_with(".idx") {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index_bytes(ids: &[[u8; 20]]) -> Vec<u8> {
        use byteorder::WriteBytesExt;

        let mut sorted = ids.to_vec();
        sorted.sort();
        let mut fanout = [0u32; 256];
        for id in &sorted {
            for slot in &mut fanout[id[0] as usize..] {
                *slot += 1;
            }
        }
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.write_u32::<BigEndian>(VERSION).unwrap();
        for f in &fanout {
            buf.write_u32::<BigEndian>(*f).unwrap();
        }
        for id in &sorted {
            buf.extend_from_slice(id);
        }
        for (i, _) in sorted.iter().enumerate() {
            buf.write_u32::<BigEndian>(i as u32).unwrap();
        }
        for i in 0..sorted.len() {
            buf.write_u32::<BigEndian>((12 + i * 4) as u32).unwrap();
        }
        buf.extend_from_slice(&[0u8; 20]); // pack sha, irrelevant here
        let checksum = Sha::compute_from_bytes(&buf);
        buf.extend_from_slice(checksum.as_bytes());
        buf
    }

    #[test]
    fn parses_a_well_formed_index() {
        let ids = [[1u8; 20], [2u8; 20], [0u8; 20]];
        let bytes = sample_index_bytes(&ids);
        let idx = PackIndex::parse(&bytes, 0).unwrap();
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn find_locates_first_and_last_bucket_members() {
        let mut ids = Vec::new();
        for i in 0..5u8 {
            let mut id = [0u8; 20];
            id[0] = 5;
            id[19] = i;
            ids.push(id);
        }
        let bytes = sample_index_bytes(&ids);
        let idx = PackIndex::parse(&bytes, 0).unwrap();
        let mut sorted = ids;
        sorted.sort();
        assert!(idx.find(&Sha::from_array(sorted[0])).is_some());
        assert!(idx.find(&Sha::from_array(sorted[4])).is_some());
        assert_eq!(idx.find(&Sha::from_array([9u8; 20])), None);
    }

    #[test]
    fn corrupted_trailer_fails_checksum() {
        let ids = [[1u8; 20], [2u8; 20]];
        let mut bytes = sample_index_bytes(&ids);
        let sorted_ids_start = 4 + 4 + 256 * 4;
        bytes[sorted_ids_start] ^= 0xff;
        match PackIndex::parse(&bytes, 0) {
            Err(Error::PackIdxCsum) => {}
            other => panic!("expected PackIdxCsum, got {other:?}"),
        }
    }

    #[test]
    fn large_offsets_resolve_through_high_bit_indirection() {
        use byteorder::WriteBytesExt;

        let ids = [[1u8; 20], [2u8; 20]];
        let mut sorted = ids.to_vec();
        sorted.sort();
        let mut fanout = [0u32; 256];
        for id in &sorted {
            for slot in &mut fanout[id[0] as usize..] {
                *slot += 1;
            }
        }
        let large_offset = TWO_GIB + 4096;

        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.write_u32::<BigEndian>(VERSION).unwrap();
        for f in &fanout {
            buf.write_u32::<BigEndian>(*f).unwrap();
        }
        for id in &sorted {
            buf.extend_from_slice(id);
        }
        for _ in &sorted {
            buf.write_u32::<BigEndian>(0).unwrap();
        }
        // First object's offset fits in 31 bits; second needs the large table.
        buf.write_u32::<BigEndian>(24).unwrap();
        buf.write_u32::<BigEndian>(0x8000_0000).unwrap();
        buf.write_u64::<BigEndian>(large_offset).unwrap();
        buf.extend_from_slice(&[0u8; 20]);
        let checksum = Sha::compute_from_bytes(&buf);
        buf.extend_from_slice(checksum.as_bytes());

        let idx = PackIndex::parse(&buf, TWO_GIB + 8192).unwrap();
        let slot = idx.find(&Sha::from_array(sorted[1])).unwrap();
        assert_eq!(idx.offset_at(slot).unwrap(), large_offset);
        let small_slot = idx.find(&Sha::from_array(sorted[0])).unwrap();
        assert_eq!(idx.offset_at(small_slot).unwrap(), 24);
    }

    #[test]
    fn encode_round_trips_through_parse() {
        let ids = [[1u8; 20], [2u8; 20], [0u8; 20]];
        let bytes = sample_index_bytes(&ids);
        let idx = PackIndex::parse(&bytes, 0).unwrap();

        let re_encoded = idx.encode().unwrap();
        let re_parsed = PackIndex::parse(&re_encoded, 0).unwrap();

        assert_eq!(re_parsed.len(), idx.len());
        assert_eq!(re_parsed.pack_sha(), idx.pack_sha());
        for id in &ids {
            let id = Sha::from_array(*id);
            let original_slot = idx.find(&id).unwrap();
            let re_parsed_slot = re_parsed.find(&id).unwrap();
            assert_eq!(re_parsed.offset_at(re_parsed_slot).unwrap(), idx.offset_at(original_slot).unwrap());
        }
    }

    #[test]
    fn non_monotone_fanout_is_bad_packidx() {
        let ids = [[1u8; 20]];
        let mut bytes = sample_index_bytes(&ids);
        let fanout_start = 8;
        bytes[fanout_start..fanout_start + 4].copy_from_slice(&999u32.to_be_bytes());
        match PackIndex::parse(&bytes, 0) {
            Err(Error::BadPackIdx(_)) => {}
            other => panic!("expected BadPackIdx, got {other:?}"),
        }
    }
}

