//! Shared plumbing for the `[[bin]]` front-ends: repo/commit resolution,
//! path-qualified tree lookups, and a small unified-diff renderer.
//!
//! Grounded on the teacher's `command/mod.rs`, which holds exactly this
//! kind of helper (`parse_git_url`, `create_client`) shared across its
//! subcommands. Split out here because each front-end is its own
//! `[[bin]]` rather than a subcommand of one `main`.

use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::Sha;
use crate::store::{EntryMode, Repository, Tree, TreeEntry};

/// Opens `repo` if given, otherwise discovers the enclosing `.git` from
/// the current directory, the way `Repo::from_enclosing` does in the
/// teacher.
pub fn open_repo(repo: Option<&str>) -> Result<Repository> {
    match repo {
        Some(path) => Repository::open_repo(path),
        None => Repository::discover(),
    }
}

/// Resolves `commit` (a ref, `HEAD`, or hex id), defaulting to `HEAD`.
pub fn resolve_commit(repo: &Repository, commit: Option<&str>) -> Result<Sha> {
    repo.resolve_ref(commit.unwrap_or("HEAD"))
}

/// Descends `tree` along `path`'s components, reading subtrees through
/// `repo` as needed. Returns the tree and entry the path names, or
/// `NoObj` if any component is missing.
pub fn find_entry(repo: &mut Repository, tree: &Tree, path: &str) -> Result<TreeEntry> {
    let mut current = tree.clone();
    let mut components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let last = components.pop().ok_or_else(|| Error::NoObj(Sha::from_array([0u8; 20])))?;

    for name in components {
        let entry = current
            .entries
            .iter()
            .find(|e| e.path == name && e.mode == EntryMode::SubDirectory)
            .cloned()
            .ok_or_else(|| Error::NoObj(Sha::from_array([0u8; 20])))?;
        current = repo.read_tree(&entry.sha)?;
    }

    current
        .entries
        .iter()
        .find(|e| e.path == last)
        .cloned()
        .ok_or_else(|| Error::NoObj(Sha::from_array([0u8; 20])))
}

/// Same descent as `find_entry`, but returns the subtree itself (for a
/// directory path) rather than the entry naming it. An empty path
/// returns `tree` unchanged.
pub fn find_subtree(repo: &mut Repository, tree: &Tree, path: &str) -> Result<Tree> {
    let mut current = tree.clone();
    for name in path.split('/').filter(|c| !c.is_empty()) {
        let entry = current
            .entries
            .iter()
            .find(|e| e.path == name && e.mode == EntryMode::SubDirectory)
            .cloned()
            .ok_or_else(|| Error::NoObj(Sha::from_array([0u8; 20])))?;
        current = repo.read_tree(&entry.sha)?;
    }
    Ok(current)
}

/// Lists `tree`'s entries under `prefix`, recursing into subdirectories
/// when `recursive` is set, yielding `(relative_path, entry)` pairs in
/// tree order.
pub fn list_tree(repo: &mut Repository, tree: &Tree, prefix: &str, recursive: bool) -> Result<Vec<(String, TreeEntry)>> {
    let mut out = Vec::new();
    for entry in &tree.entries {
        let rel = if prefix.is_empty() {
            entry.path.clone()
        } else {
            format!("{prefix}/{}", entry.path)
        };
        if entry.mode == EntryMode::SubDirectory && recursive {
            let sub_tree = repo.read_tree(&entry.sha)?;
            out.extend(list_tree(repo, &sub_tree, &rel, recursive)?);
        } else {
            out.push((rel, entry.clone()));
        }
    }
    Ok(out)
}

/// A minimal Myers-style line diff, good enough for the `log -p`/`diff`
/// front-ends; not exposed as a core operation since textual diffing is
/// explicitly outside the packfile store's scope.
pub fn unified_diff(path: &Path, before: &str, after: &str, context: usize) -> String {
    let a: Vec<&str> = before.lines().collect();
    let b: Vec<&str> = after.lines().collect();
    let ops = diff_lines(&a, &b);

    let mut out = String::new();
    out.push_str(&format!("--- a/{}\n", path.display()));
    out.push_str(&format!("+++ b/{}\n", path.display()));

    let mut i = 0;
    while i < ops.len() {
        if let DiffOp::Equal(_, _) = ops[i] {
            i += 1;
            continue;
        }
        let hunk_start = i.saturating_sub(context);
        let mut hunk_end = i;
        while hunk_end < ops.len() {
            if matches!(ops[hunk_end], DiffOp::Equal(_, _)) {
                let run_start = hunk_end;
                while hunk_end < ops.len() && matches!(ops[hunk_end], DiffOp::Equal(_, _)) {
                    hunk_end += 1;
                }
                if hunk_end - run_start > context && hunk_end < ops.len() {
                    hunk_end = run_start + context;
                    break;
                }
                if hunk_end == ops.len() {
                    hunk_end = (run_start + context).min(ops.len());
                    break;
                }
            } else {
                hunk_end += 1;
            }
        }

        render_hunk(&mut out, &ops[hunk_start..hunk_end]);
        i = hunk_end;
    }
    out
}

#[derive(Clone)]
enum DiffOp {
    Equal(String, String),
    Delete(String),
    Insert(String),
}

fn render_hunk(out: &mut String, ops: &[DiffOp]) {
    let old_count = ops
        .iter()
        .filter(|o| !matches!(o, DiffOp::Insert(_)))
        .count();
    let new_count = ops
        .iter()
        .filter(|o| !matches!(o, DiffOp::Delete(_)))
        .count();
    out.push_str(&format!("@@ -{},{} +{},{} @@\n", 1, old_count, 1, new_count));
    for op in ops {
        match op {
            DiffOp::Equal(l, _) => out.push_str(&format!(" {l}\n")),
            DiffOp::Delete(l) => out.push_str(&format!("-{l}\n")),
            DiffOp::Insert(l) => out.push_str(&format!("+{l}\n")),
        }
    }
}

/// Plain O(n*m) LCS-backed diff; the inputs here are single files, not
/// whole trees, so quadratic behaviour is acceptable.
fn diff_lines(a: &[&str], b: &[&str]) -> Vec<DiffOp> {
    let n = a.len();
    let m = b.len();
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(DiffOp::Equal(a[i].to_string(), b[j].to_string()));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(DiffOp::Delete(a[i].to_string()));
            i += 1;
        } else {
            ops.push(DiffOp::Insert(b[j].to_string()));
            j += 1;
        }
    }
    while i < n {
        ops.push(DiffOp::Delete(a[i].to_string()));
        i += 1;
    }
    while j < m {
        ops.push(DiffOp::Insert(b[j].to_string()));
        j += 1;
    }
    ops
}

/// Reads a blob's content as (possibly lossy) UTF-8 text, for feeding
/// into `unified_diff`.
fn blob_text(repo: &mut Repository, sha: &Sha) -> Result<String> {
    let descriptor = repo.open_object(sha)?;
    let (content, _) = repo.extract_object_to_mem(descriptor)?;
    Ok(String::from_utf8_lossy(&content).into_owned())
}

/// Diffs two optional blob ids (`None` meaning "didn't exist on this
/// side"), returning an empty string if they're equal or both absent.
pub fn diff_blob(
    repo: &mut Repository,
    before: Option<&Sha>,
    after: Option<&Sha>,
    display_path: &Path,
    context: usize,
) -> Result<String> {
    if before == after {
        return Ok(String::new());
    }
    let before_text = match before {
        Some(sha) => blob_text(repo, sha)?,
        None => String::new(),
    };
    let after_text = match after {
        Some(sha) => blob_text(repo, sha)?,
        None => String::new(),
    };
    Ok(unified_diff(display_path, &before_text, &after_text, context))
}

/// Recursively diffs two (optional) trees, appending one unified-diff
/// hunk set per changed blob to `out`. `path_filter`, if given,
/// restricts the walk to paths under (or containing) that prefix,
/// matching `log -p <path>`/`diff <path>`'s restriction.
pub fn diff_trees(
    repo: &mut Repository,
    before: Option<&Tree>,
    after: Option<&Tree>,
    prefix: &str,
    path_filter: Option<&str>,
    context: usize,
    out: &mut String,
) -> Result<()> {
    let before_entries: Vec<TreeEntry> = before.map(|t| t.entries.clone()).unwrap_or_default();
    let after_entries: Vec<TreeEntry> = after.map(|t| t.entries.clone()).unwrap_or_default();

    let mut names: Vec<String> = before_entries
        .iter()
        .chain(after_entries.iter())
        .map(|e| e.path.clone())
        .collect();
    names.sort();
    names.dedup();

    for name in names {
        let rel = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        if let Some(filter) = path_filter {
            if !rel.starts_with(filter) && !filter.starts_with(&rel) {
                continue;
            }
        }

        let b_entry = before_entries.iter().find(|e| e.path == name);
        let a_entry = after_entries.iter().find(|e| e.path == name);
        let either_is_dir = b_entry.is_some_and(|e| e.mode == EntryMode::SubDirectory)
            || a_entry.is_some_and(|e| e.mode == EntryMode::SubDirectory);

        if either_is_dir {
            let before_tree = match b_entry {
                Some(e) if e.mode == EntryMode::SubDirectory => Some(repo.read_tree(&e.sha)?),
                _ => None,
            };
            let after_tree = match a_entry {
                Some(e) if e.mode == EntryMode::SubDirectory => Some(repo.read_tree(&e.sha)?),
                _ => None,
            };
            diff_trees(repo, before_tree.as_ref(), after_tree.as_ref(), &rel, path_filter, context, out)?;
        } else {
            let before_sha = b_entry.map(|e| e.sha);
            let after_sha = a_entry.map(|e| e.sha);
            let diff = diff_blob(repo, before_sha.as_ref(), after_sha.as_ref(), Path::new(&rel), context)?;
            out.push_str(&diff);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_diff_marks_changed_line() {
        let diff = unified_diff(Path::new("f.txt"), "a\nb\nc\n", "a\nx\nc\n", 1);
        assert!(diff.contains("-b"));
        assert!(diff.contains("+x"));
        assert!(diff.contains(" a"));
    }

    #[test]
    fn unified_diff_of_identical_text_has_no_hunks() {
        let diff = unified_diff(Path::new("f.txt"), "same\n", "same\n", 3);
        assert!(!diff.contains("@@"));
    }
}
