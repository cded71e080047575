//! Walks first-parent history from a commit, printing author/date/
//! message, optionally with a unified diff of each commit's changes.

use anyhow::{Context, Result};
use structopt::StructOpt;

use packtree::cli;

#[derive(StructOpt)]
#[structopt(name = "log", about = "show commit logs")]
struct Opt {
    /// Show a unified diff of each commit against its first parent.
    #[structopt(short = "p")]
    patch: bool,

    /// Commit to start history from; defaults to HEAD.
    #[structopt(short = "c", long = "commit")]
    commit: Option<String>,

    /// Context lines around each diff hunk.
    #[structopt(short = "C", long = "context", default_value = "3")]
    context: usize,

    /// Stop after this many commits.
    #[structopt(short = "l", long = "limit")]
    limit: Option<usize>,

    /// Accepted for compatibility; rename-following is out of scope, so
    /// this degrades to plain path filtering.
    #[structopt(short = "f", long = "follow")]
    follow: bool,

    #[structopt(short = "r", long = "repo")]
    repo: Option<String>,

    /// Restrict `-p` diffs to this path.
    path: Option<String>,
}

fn main() {
    packtree::logging::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        eprintln!("log: {e:#}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    if opt.follow {
        tracing::debug!("-f/--follow requested: falling back to plain path filtering, renames are not tracked");
    }

    let mut repo = cli::open_repo(opt.repo.as_deref()).context("open repository")?;
    let start = cli::resolve_commit(&repo, opt.commit.as_deref()).context("resolve commit")?;
    let history = repo
        .first_parent_history(&start, opt.limit)
        .context("walk history")?;

    for (i, (sha, commit)) in history.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("commit {}", sha.hex());
        print!("{commit}");

        if opt.patch {
            let tree = repo.commit_tree(commit).context("read commit tree")?;
            let parent_tree = match commit.parents.first() {
                Some(parent_sha) => {
                    let parent_commit = repo.read_commit(parent_sha).context("read parent commit")?;
                    Some(repo.commit_tree(&parent_commit).context("read parent tree")?)
                }
                None => None,
            };
            let mut diff_text = String::new();
            cli::diff_trees(
                &mut repo,
                parent_tree.as_ref(),
                Some(&tree),
                "",
                opt.path.as_deref(),
                opt.context,
                &mut diff_text,
            )
            .context("diff commit against parent")?;
            print!("{diff_text}");
        }
    }
    Ok(())
}
