//! Lists a tree's entries at a path, recursively with `-i`.

use anyhow::Context;
use anyhow::Result;
use structopt::StructOpt;

use packtree::cli;
use packtree::store::EntryMode;

#[derive(StructOpt)]
#[structopt(name = "tree", about = "list tree entries")]
struct Opt {
    #[structopt(short = "c", long = "commit")]
    commit: Option<String>,

    #[structopt(short = "r", long = "repo")]
    repo: Option<String>,

    /// Recurse into subdirectories, printing full relative paths.
    #[structopt(short = "i", long = "recursive")]
    recursive: bool,

    path: String,
}

fn main() {
    packtree::logging::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        eprintln!("tree: {e:#}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let mut repo = cli::open_repo(opt.repo.as_deref()).context("open repository")?;
    let commit_id = cli::resolve_commit(&repo, opt.commit.as_deref()).context("resolve commit")?;
    let commit = repo.read_commit(&commit_id).context("read commit")?;
    let root = repo.commit_tree(&commit).context("read commit tree")?;
    let subtree = cli::find_subtree(&mut repo, &root, &opt.path).context("resolve path")?;

    for (rel_path, entry) in cli::list_tree(&mut repo, &subtree, "", opt.recursive).context("list tree")? {
        let kind = match entry.mode {
            EntryMode::SubDirectory => "tree",
            EntryMode::Gitlink => "commit",
            _ => "blob",
        };
        println!("{:<6} {} {}", kind, entry.sha.hex(), rel_path);
    }
    Ok(())
}
