//! Builds a tiny repository by hand (one packed blob, one loose tree,
//! one loose commit) and exercises the public operation table end to
//! end: open, resolve, read, checkout.

mod common;

use packtree::hash::Sha;
use packtree::store::{EntryMode, ObjectType, Repository};

#[test]
fn open_resolve_checkout_round_trip() {
    let (_dir, root) = common::tmp_repo();

    let blob_content = b"hello from a packed blob\n";

    let mut pack = common::PackBuilder::new();
    let blob_offset = pack.add_plain(3, blob_content);
    let (pack_bytes, pack_sha) = pack.finish();
    let blob_sha = Sha::compute_object("blob", blob_content);
    let index_bytes = common::build_index_bytes(vec![(blob_sha, blob_offset)], pack_sha);
    common::write_pack(&root, &pack_bytes, &index_bytes, &pack_sha);

    let tree_bytes = common::encode_tree(&[("100644", "hello.txt", *blob_sha.as_bytes())]);
    let tree_sha = common::write_loose_object(&root, "tree", &tree_bytes);

    let commit_bytes = common::encode_commit(&tree_sha.hex(), &[], "initial commit\n");
    let commit_sha = common::write_loose_object(&root, "commit", &commit_bytes);

    common::write_head(&root, &commit_sha);

    let mut repo = Repository::open_repo(&root).expect("open repo");

    let resolved = repo.resolve_ref("HEAD").expect("resolve HEAD");
    assert_eq!(resolved, commit_sha);

    assert_eq!(repo.object_type(&commit_sha).unwrap(), ObjectType::Commit);
    assert_eq!(repo.object_type(&tree_sha).unwrap(), ObjectType::Tree);
    assert_eq!(repo.object_type(&blob_sha).unwrap(), ObjectType::Blob);

    let commit = repo.read_commit(&resolved).expect("read commit");
    assert_eq!(commit.tree, tree_sha);
    assert!(commit.parents.is_empty());
    assert_eq!(commit.message.trim(), "initial commit");

    let tree = repo.commit_tree(&commit).expect("commit tree");
    assert_eq!(tree.entries.len(), 1);
    assert_eq!(tree.entries[0].path, "hello.txt");
    assert_eq!(tree.entries[0].mode, EntryMode::Normal);
    assert_eq!(tree.entries[0].sha, blob_sha);

    let descriptor = repo.open_object(&blob_sha).expect("open blob");
    let (content, _) = repo.extract_object_to_mem(descriptor).expect("extract blob");
    assert_eq!(content, blob_content);

    let history = repo.first_parent_history(&resolved, None).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].0, commit_sha);

    let worktree = tempfile::tempdir().unwrap();
    repo.checkout_tree(&tree, worktree.path(), false).expect("checkout");
    let on_disk = std::fs::read(worktree.path().join("hello.txt")).expect("read checked out file");
    assert_eq!(on_disk, blob_content);
}
