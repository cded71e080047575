//! The repository handle: ties together the two caches from
//! `packfile::cache` and the pack-scanning Object Locator into the
//! public operation table (`open_repo`/`close_repo`/`open_object`/
//! `object_type`/`extract_object`/`extract_object_to_mem`/
//! `close_object`), plus the loose-object and ref-resolution support
//! those operations and the CLI front-ends need.
//!
//! Generalized from the teacher's `Repo`, which only ever opened a
//! single packfile found by directory listing and used a hand-rolled
//! `Sha`/panic-on-missing-repo style. This version scans every pack
//! under `objects/pack`, keeps an MRU pack cache and delta cache per
//! repository (§5 "Shared resources: ... per-repository"), and
//! resolves cross-pack ref-deltas by recursing back through itself.

mod commit;
mod object;
mod tree;

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub use self::commit::{Commit, Person};
pub use self::object::{ObjectType, PackedObject};
pub use self::tree::{EntryMode, Tree, TreeEntry};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::hash::Sha;
use crate::packfile::materialize::ResolvedChain;
use crate::packfile::{self, ChainStep, DeltaCache, PackCache, PackFile};

/// Where a resolved object's bytes ultimately come from. Kept on the
/// descriptor so `extract_object`/`extract_object_to_mem` don't have
/// to re-locate or re-walk the delta chain.
enum Location {
    Loose(PackedObject),
    Packed { pack_path: PathBuf, chain: ResolvedChain },
}

/// The result of `Repository::open_object`: a type and enough state to
/// materialise the bytes exactly once. Dropping it releases whatever
/// it owns (an inflated base plus unapplied patches, or a loose
/// object's bytes) — Rust's ownership model makes `close_object` a
/// formality rather than a tracked resource.
pub struct ObjectDescriptor {
    pub id: Sha,
    pub obj_type: ObjectType,
    pub pack_path: Option<PathBuf>,
    location: Location,
}

pub struct Repository {
    root: PathBuf,
    pack_cache: PackCache,
    delta_cache: DeltaCache,
}

impl Repository {
    /// Opens `path` as a repository root (the directory containing
    /// `objects/`, i.e. a `.git` directory or a bare repo). Fails with
    /// `BAD_PATH` if `objects/` doesn't exist.
    pub fn open_repo<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.join("objects").is_dir() {
            return Err(Error::BadPath(root));
        }
        let config = CacheConfig::from_env();
        tracing::debug!(root = %root.display(), pack_cache = config.pack_cache_capacity, delta_cache = config.delta_cache_capacity, "opening repository");
        Ok(Repository {
            root,
            pack_cache: PackCache::new(config.pack_cache_capacity),
            delta_cache: DeltaCache::new(config.delta_cache_capacity),
        })
    }

    /// Recursively searches the current directory and its ancestors
    /// for a `.git` directory, the way `git` itself locates a repo from
    /// anywhere inside a worktree.
    pub fn discover() -> Result<Self> {
        let mut dir = std::env::current_dir()?;
        loop {
            let git_dir = dir.join(".git");
            if git_dir.is_dir() {
                return Self::open_repo(git_dir);
            }
            if !dir.pop() {
                return Err(Error::BadPath(std::env::current_dir()?));
            }
        }
    }

    /// Releases both caches and every file handle they hold. A plain
    /// consuming drop: `PackCache`/`DeltaCache` own no resources beyond
    /// what their `Drop` impls (inherited from `File`/`Vec`) already
    /// release.
    pub fn close_repo(self) {}

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Looks up `id`'s type and location without materialising its
    /// bytes. For a packed object this walks the delta chain (to learn
    /// the type of its ultimate base) but applies no patches.
    pub fn open_object(&mut self, id: &Sha) -> Result<ObjectDescriptor> {
        if let Ok(obj) = PackedObject::open(&self.root, id) {
            return Ok(ObjectDescriptor {
                id: *id,
                obj_type: obj.obj_type,
                pack_path: None,
                location: Location::Loose(obj),
            });
        }

        let (pack_path, offset) = self.locate(id)?;
        let chain = self.resolve_in_pack(&pack_path, offset, &mut 0)?;
        Ok(ObjectDescriptor {
            id: *id,
            obj_type: chain.obj_type,
            pack_path: Some(pack_path.clone()),
            location: Location::Packed { pack_path, chain },
        })
    }

    pub fn object_type(&mut self, id: &Sha) -> Result<ObjectType> {
        Ok(self.open_object(id)?.obj_type)
    }

    /// Applies the descriptor's chain (if any) and returns the object's
    /// bytes along with their length.
    pub fn extract_object_to_mem(&mut self, descriptor: ObjectDescriptor) -> Result<(Vec<u8>, usize)> {
        let content = match descriptor.location {
            Location::Loose(obj) => obj.content,
            Location::Packed { chain, .. } => chain.extract_to_memory()?.content,
        };
        let len = content.len();
        Ok((content, len))
    }

    /// Same as `extract_object_to_mem` but returns a rewound file
    /// handle, choosing the Object Materialiser's file-backed path for
    /// chains past the in-memory threshold.
    pub fn extract_object(&mut self, descriptor: ObjectDescriptor) -> Result<File> {
        match descriptor.location {
            Location::Loose(obj) => {
                let mut file = tempfile::tempfile()?;
                file.write_all(&obj.content)?;
                file.seek(SeekFrom::Start(0))?;
                Ok(file)
            }
            Location::Packed { chain, .. } => {
                let (_, file) = chain.extract_to_file()?;
                Ok(file)
            }
        }
    }

    /// Releases the descriptor's chain/content. A no-op beyond the
    /// implicit drop; kept to mirror the operation table.
    pub fn close_object(&mut self, _descriptor: ObjectDescriptor) {}

    /// Fully resolves `id` to its bytes in one call, recursing through
    /// `Repository` itself when a ref-delta's base escapes the pack it
    /// was found in.
    fn read_object(&mut self, id: &Sha) -> Result<PackedObject> {
        self.read_object_with_depth(id, &mut 0)
    }

    /// `depth` is shared with `resolve_in_pack`/`PackFile::resolve_chain`
    /// across however many packs a ref-delta chain escapes through, so
    /// two packs whose deltas reference each other still trip
    /// `MAX_DELTA_DEPTH` instead of resetting the counter on re-entry.
    fn read_object_with_depth(&mut self, id: &Sha, depth: &mut usize) -> Result<PackedObject> {
        if let Ok(obj) = PackedObject::open(&self.root, id) {
            return Ok(obj);
        }
        let (pack_path, offset) = self.locate(id)?;
        self.resolve_in_pack(&pack_path, offset, depth)?.extract_to_memory()
    }

    /// The Object Locator (§4.2): checks every cached pack MRU-first,
    /// falling back to a directory scan of `objects/pack` on a miss.
    fn locate(&mut self, id: &Sha) -> Result<(PathBuf, u64)> {
        if let Some(found) = self.pack_cache.find(id)? {
            return Ok(found);
        }

        let pack_dir = self.root.join("objects").join("pack");
        for idx_path in packfile::discover_indices(&pack_dir)? {
            let pack_path = idx_path.with_extension("pack");
            if self.pack_cache.contains(&pack_path) {
                continue;
            }
            let pack = PackFile::open(&pack_path)?;
            let slot = pack.index.find(id);
            match slot {
                Some(slot) => {
                    let offset = pack.index.offset_at(slot)?;
                    self.pack_cache.insert(pack_path.clone(), pack);
                    return Ok((pack_path, offset));
                }
                None => drop(pack),
            }
        }
        Err(Error::NoObj(*id))
    }

    /// Removes `pack_path`'s handle from the cache for the duration of
    /// the chain walk (so the pack being read doesn't alias a borrow of
    /// `self`) and reinserts it after. If the chain escapes to a ref-delta
    /// base outside this pack, resolves that base through the full
    /// Object Locator (`self.read_object_with_depth`, which may open yet
    /// another pack) once the borrow of this pack has ended. `depth` is
    /// shared with that call so a chain bouncing between packs still
    /// counts against the same budget.
    fn resolve_in_pack(&mut self, pack_path: &Path, offset: u64, depth: &mut usize) -> Result<ResolvedChain> {
        if !self.pack_cache.contains(pack_path) {
            let pack = PackFile::open(pack_path)?;
            self.pack_cache.insert(pack_path.to_path_buf(), pack);
        }
        let (path, pack) = self.pack_cache.take(pack_path).expect("just inserted");
        let step = pack.resolve_chain(offset, &mut self.delta_cache, depth);
        self.pack_cache.insert(path, pack);

        match step? {
            ChainStep::Resolved(chain) => Ok(chain),
            ChainStep::Escaped { base, mut patches } => {
                let base_object = self.read_object_with_depth(&base, depth)?;
                patches.reverse();
                Ok(ResolvedChain {
                    obj_type: base_object.obj_type,
                    base: base_object.content,
                    patches,
                })
            }
        }
    }

    /// Resolves HEAD (or any ref/sha) to a tree and materialises it
    /// into `worktree`, creating directories as needed. Shared by the
    /// `checkout` and `update` binaries; `only_if_stale` makes it the
    /// latter's incremental variant, consulting the `.packtree/index`
    /// tracking file instead of unconditionally overwriting.
    pub fn checkout_tree(&mut self, tree: &Tree, worktree: &Path, only_if_stale: bool) -> Result<()> {
        let mut tracked = if only_if_stale {
            read_tracking_file(worktree)
        } else {
            Vec::new()
        };
        self.checkout_tree_at(tree, worktree, &mut tracked)?;
        if only_if_stale {
            write_tracking_file(worktree, &tracked)?;
        }
        Ok(())
    }

    fn checkout_tree_at(&mut self, tree: &Tree, dir: &Path, tracked: &mut Vec<(String, Sha)>) -> Result<()> {
        fs::create_dir_all(dir)?;
        for entry in &tree.entries {
            let full_path = dir.join(&entry.path);
            match entry.mode {
                EntryMode::SubDirectory => {
                    let sub_tree = self.read_tree(&entry.sha)?;
                    self.checkout_tree_at(&sub_tree, &full_path, tracked)?;
                }
                EntryMode::Normal | EntryMode::Executable => {
                    if let Some((_, existing)) = tracked.iter().find(|(p, _)| p == &entry.path) {
                        if *existing == entry.sha {
                            continue;
                        }
                    }
                    let descriptor = self.open_object(&entry.sha)?;
                    let (content, _) = self.extract_object_to_mem(descriptor)?;
                    File::create(&full_path)?.write_all(&content)?;
                    set_executable(&full_path, entry.mode == EntryMode::Executable)?;
                    tracked.retain(|(p, _)| p != &entry.path);
                    tracked.push((entry.path.clone(), entry.sha));
                }
                EntryMode::Symlink | EntryMode::Gitlink => {
                    tracing::debug!(path = %full_path.display(), "skipping unsupported tree entry mode");
                }
            }
        }
        Ok(())
    }

    pub fn read_tree(&mut self, sha: &Sha) -> Result<Tree> {
        let descriptor = self.open_object(sha)?;
        let (content, _) = self.extract_object_to_mem(descriptor)?;
        Tree::parse(&content)
    }

    pub fn read_commit(&mut self, sha: &Sha) -> Result<Commit> {
        let descriptor = self.open_object(sha)?;
        let (content, _) = self.extract_object_to_mem(descriptor)?;
        Commit::parse(&content)
    }

    /// The tree a commit points at, following the `tree` field.
    pub fn commit_tree(&mut self, commit: &Commit) -> Result<Tree> {
        self.read_tree(&commit.tree)
    }

    /// First-parent history from `sha`, oldest last.
    pub fn first_parent_history(&mut self, sha: &Sha, limit: Option<usize>) -> Result<Vec<(Sha, Commit)>> {
        let mut history = Vec::new();
        let mut current = *sha;
        loop {
            if let Some(limit) = limit {
                if history.len() >= limit {
                    break;
                }
            }
            let commit = self.read_commit(&current)?;
            let parent = commit.parents.first().copied();
            history.push((current, commit));
            match parent {
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(history)
    }

    /// Resolves `name` to a commit id: a ref name, `HEAD`, or an
    /// already-hex object id. Reference resolution is an external
    /// collaborator per spec, but the CLI front-ends need at least
    /// this much to turn `-c <commit>`/`HEAD` into an id.
    pub fn resolve_ref(&self, name: &str) -> Result<Sha> {
        resolve_ref(&self.root, name)
    }
}

fn set_executable(path: &Path, executable: bool) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let meta = fs::metadata(path)?;
        let mut perms = meta.permissions();
        perms.set_mode(if executable { 0o755 } else { 0o644 });
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, executable);
    }
    Ok(())
}

const TRACKING_FILE: &str = ".packtree/index";

/// Reads the `update` binary's tracking file: `<path>\0<40-hex-sha>\n`
/// records. Deliberately not Git-index-compatible (no ctime/mtime/
/// inode/mode bookkeeping) — it exists only to tell `update` which
/// blobs in the worktree are already current, per SPEC_FULL.md §6.
fn read_tracking_file(worktree: &Path) -> Vec<(String, Sha)> {
    let path = worktree.join(TRACKING_FILE);
    let Ok(contents) = fs::read(&path) else {
        return Vec::new();
    };
    let mut entries = Vec::new();
    for line in contents.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let Some(nul) = line.iter().position(|&b| b == 0) else {
            continue;
        };
        let (path_bytes, rest) = line.split_at(nul);
        let hex = &rest[1..];
        let (Ok(path), Ok(sha)) = (String::from_utf8(path_bytes.to_vec()), Sha::from_hex(hex)) else {
            continue;
        };
        entries.push((path, sha));
    }
    entries
}

fn write_tracking_file(worktree: &Path, entries: &[(String, Sha)]) -> Result<()> {
    let dir = worktree.join(".packtree");
    fs::create_dir_all(&dir)?;
    let mut buf = Vec::new();
    for (path, sha) in entries {
        buf.extend_from_slice(path.as_bytes());
        buf.push(0);
        buf.extend_from_slice(sha.hex().as_bytes());
        buf.push(b'\n');
    }
    fs::write(dir.join("index"), buf)?;
    Ok(())
}

/// Resolves the given ref to a valid SHA: either a 40-hex id directly,
/// or a symbolic ref (`HEAD`, `refs/heads/<branch>`, ...) read off
/// disk and followed to its target.
fn resolve_ref(repo_root: &Path, name: &str) -> Result<Sha> {
    let trimmed = name.trim();
    if is_hex_sha(trimmed) {
        return Sha::from_hex(trimmed.as_bytes()).map_err(|e| Error::BadPath(PathBuf::from(e.to_string())));
    }
    read_sym_ref(repo_root, trimmed)
}

fn is_hex_sha(id: &str) -> bool {
    id.len() == 40 && id.chars().all(|c| c.is_ascii_hexdigit())
}

fn read_sym_ref(repo_root: &Path, name: &str) -> Result<Sha> {
    let mut path = repo_root.to_path_buf();
    if name != "HEAD" {
        if !name.contains('/') {
            path.push("refs/heads");
        } else if !name.starts_with("refs/") {
            path.push("refs/remotes");
        }
    }
    path.push(name);

    let mut contents = String::new();
    File::open(&path)?.read_to_string(&mut contents)?;

    if let Some(target) = contents.strip_prefix("ref: ") {
        resolve_ref(repo_root, target.trim())
    } else {
        Sha::from_hex(contents.trim().as_bytes())
            .map_err(|e| Error::BadPackFile(format!("malformed ref {}: {e}", path.display())))
    }
}
