//! Incrementally refreshes an already-checked-out worktree: unlike
//! `checkout`, only rewrites a blob when its content has actually
//! changed, consulting the `.packtree/index` tracking file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;

use packtree::cli;

#[derive(StructOpt)]
#[structopt(name = "update", about = "incrementally refresh a worktree")]
struct Opt {
    /// Commit to update to; defaults to HEAD.
    #[structopt(short = "c", long = "commit")]
    commit: Option<String>,

    /// Worktree to update; defaults to the current directory.
    worktree: Option<PathBuf>,
}

fn main() {
    packtree::logging::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        eprintln!("update: {e:#}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let mut repo = cli::open_repo(None).context("discover repository")?;
    let commit_id = cli::resolve_commit(&repo, opt.commit.as_deref()).context("resolve commit")?;
    let commit = repo.read_commit(&commit_id).context("read commit")?;
    let tree = repo.commit_tree(&commit).context("read commit tree")?;

    let worktree = opt
        .worktree
        .unwrap_or(std::env::current_dir().context("current directory")?);
    repo.checkout_tree(&tree, &worktree, true)
        .context("update tree")?;
    Ok(())
}
