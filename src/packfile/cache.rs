//! MRU caches for open pack handles and inflated delta instructions.
//!
//! Neither cache existed in the teacher: `PackFile::open` was called
//! fresh on every lookup and delta patches were recomputed on every
//! access. Both caches here use the same discipline: insertion and hits
//! promote an entry to the front; eviction drops from the back. A
//! `Vec`-backed ring is plenty at the suggested capacities (>= 4).

use crate::error::Result;
use crate::hash::Sha;
use std::path::{Path, PathBuf};

use super::PackFile;

/// Caches open `PackFile` handles, keyed by the `.pack` path.
pub struct PackCache {
    capacity: usize,
    entries: Vec<(PathBuf, PackFile)>,
}

impl PackCache {
    pub fn new(capacity: usize) -> Self {
        PackCache {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// Returns the cached pack for `path`, promoting it to the front.
    pub fn get(&mut self, path: &std::path::Path) -> Option<&PackFile> {
        let pos = self.entries.iter().position(|(p, _)| p == path)?;
        if pos != 0 {
            let entry = self.entries.remove(pos);
            self.entries.insert(0, entry);
        }
        Some(&self.entries[0].1)
    }

    /// Inserts a freshly opened pack at the front, evicting the least
    /// recently used entry if at capacity.
    pub fn insert(&mut self, path: PathBuf, pack: PackFile) {
        if self.entries.len() >= self.capacity {
            let evicted = self.entries.pop();
            if let Some((p, _)) = &evicted {
                tracing::debug!(path = %p.display(), "evicting pack from cache");
            }
        }
        self.entries.insert(0, (path, pack));
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|(p, _)| p == path)
    }

    /// Removes and returns the entry for `path`, if cached, so its
    /// `PackFile` can be borrowed without holding a mutable borrow of
    /// the cache itself. Callers are expected to `insert` it back.
    pub fn take(&mut self, path: &Path) -> Option<(PathBuf, PackFile)> {
        let pos = self.entries.iter().position(|(p, _)| p == path)?;
        Some(self.entries.remove(pos))
    }

    /// Scans every cached pack's index for `id`, MRU-first, promoting
    /// the owning pack to the front on a hit.
    pub fn find(&mut self, id: &Sha) -> Result<Option<(PathBuf, u64)>> {
        let hit = self
            .entries
            .iter()
            .enumerate()
            .find_map(|(pos, (_, pack))| pack.index.find(id).map(|slot| (pos, slot)));
        let (pos, slot) = match hit {
            Some(found) => found,
            None => return Ok(None),
        };
        let offset = self.entries[pos].1.index.offset_at(slot)?;
        if pos != 0 {
            let entry = self.entries.remove(pos);
            self.entries.insert(0, entry);
        }
        Ok(Some((self.entries[0].0.clone(), offset)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Caches inflated delta instruction streams as a two-level MRU
/// structure, matching spec §4.5: an outer MRU array keyed by the pack
/// they came from (its trailer SHA), each holding its own inner MRU
/// array of `(data_offset, inflated_bytes)`. Inserting evicts the LRU
/// pack when a new pack doesn't fit, then the LRU delta within a pack
/// when that pack's own array is full.
pub struct DeltaCache {
    pack_capacity: usize,
    per_pack_capacity: usize,
    packs: Vec<(Sha, Vec<(u64, Vec<u8>)>)>,
}

impl DeltaCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        DeltaCache {
            pack_capacity: capacity,
            per_pack_capacity: capacity,
            packs: Vec::new(),
        }
    }

    pub fn get(&mut self, pack_sha: &Sha, offset: u64) -> Option<&[u8]> {
        let pack_pos = self.packs.iter().position(|(s, _)| s == pack_sha)?;
        let deltas = &self.packs[pack_pos].1;
        let delta_pos = deltas.iter().position(|(o, _)| *o == offset)?;

        if pack_pos != 0 {
            let entry = self.packs.remove(pack_pos);
            self.packs.insert(0, entry);
        }
        let deltas = &mut self.packs[0].1;
        if delta_pos != 0 {
            let entry = deltas.remove(delta_pos);
            deltas.insert(0, entry);
        }
        Some(&self.packs[0].1[0].1)
    }

    pub fn insert(&mut self, pack_sha: Sha, offset: u64, content: Vec<u8>) {
        let pack_pos = self.packs.iter().position(|(s, _)| *s == pack_sha);
        let pack_pos = match pack_pos {
            Some(pos) => pos,
            None => {
                if self.packs.len() >= self.pack_capacity {
                    self.packs.pop();
                }
                self.packs.insert(0, (pack_sha, Vec::new()));
                0
            }
        };
        if pack_pos != 0 {
            let entry = self.packs.remove(pack_pos);
            self.packs.insert(0, entry);
        }

        let deltas = &mut self.packs[0].1;
        if let Some(existing) = deltas.iter().position(|(o, _)| *o == offset) {
            deltas.remove(existing);
        } else if deltas.len() >= self.per_pack_capacity {
            deltas.pop();
        }
        deltas.insert(0, (offset, content));
    }

    pub fn len(&self) -> usize {
        self.packs.iter().map(|(_, deltas)| deltas.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.iter().all(|(_, deltas)| deltas.is_empty())
    }
}
