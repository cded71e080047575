//! Materialises HEAD's tree (or a subtree under `-p prefix`) into a
//! worktree, always overwriting whatever is already there.

use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;

use packtree::cli;

#[derive(StructOpt)]
#[structopt(name = "checkout", about = "materialise a repository's HEAD tree into a worktree")]
struct Opt {
    /// Restrict checkout to the subtree rooted at this path.
    #[structopt(short = "p", long = "prefix")]
    prefix: Option<String>,

    /// Repository root (the directory containing `objects/`).
    repo: String,

    /// Destination directory; defaults to the current directory.
    worktree: Option<PathBuf>,
}

fn main() {
    packtree::logging::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        eprintln!("checkout: {e:#}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let mut repo = cli::open_repo(Some(&opt.repo)).context("open repository")?;
    let commit_id = cli::resolve_commit(&repo, None).context("resolve HEAD")?;
    let commit = repo.read_commit(&commit_id).context("read commit")?;
    let tree = repo.commit_tree(&commit).context("read commit tree")?;
    let tree = match &opt.prefix {
        Some(prefix) => cli::find_subtree(&mut repo, &tree, prefix).context("resolve prefix")?,
        None => tree,
    };

    let worktree = opt
        .worktree
        .unwrap_or(std::env::current_dir().context("current directory")?);
    repo.checkout_tree(&tree, &worktree, false)
        .context("checkout tree")?;
    Ok(())
}
