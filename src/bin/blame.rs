//! Naive per-line blame: walks first-parent history and attributes
//! each line of a file to the oldest ancestor still showing that exact
//! line content at the same position. Not a diff-based blame — a
//! content-match annotator, since real blame is outside the core's
//! scope.

use anyhow::{anyhow, Context, Result};
use structopt::StructOpt;

use packtree::cli;
use packtree::store::EntryMode;

#[derive(StructOpt)]
#[structopt(name = "blame", about = "annotate each line of a file with its origin commit")]
struct Opt {
    #[structopt(short = "c", long = "commit")]
    commit: Option<String>,

    #[structopt(short = "r", long = "repo")]
    repo: Option<String>,

    path: String,
}

fn main() {
    packtree::logging::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        eprintln!("blame: {e:#}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let mut repo = cli::open_repo(opt.repo.as_deref()).context("open repository")?;
    let start = cli::resolve_commit(&repo, opt.commit.as_deref()).context("resolve commit")?;
    let history = repo.first_parent_history(&start, None).context("walk history")?;

    let mut lines_per_commit: Vec<Option<Vec<String>>> = Vec::with_capacity(history.len());
    for (_, commit) in &history {
        let tree = repo.commit_tree(commit).context("read commit tree")?;
        let lines = match cli::find_entry(&mut repo, &tree, &opt.path) {
            Ok(entry) if entry.mode != EntryMode::SubDirectory => {
                let descriptor = repo.open_object(&entry.sha).context("open blob")?;
                let (content, _) = repo.extract_object_to_mem(descriptor).context("extract blob")?;
                Some(
                    String::from_utf8_lossy(&content)
                        .lines()
                        .map(str::to_string)
                        .collect::<Vec<_>>(),
                )
            }
            _ => None,
        };
        lines_per_commit.push(lines);
    }

    let current_lines = lines_per_commit[0]
        .clone()
        .ok_or_else(|| anyhow!("{} does not exist at {}", opt.path, history[0].0.hex()))?;

    for (line_idx, line) in current_lines.iter().enumerate() {
        let mut origin = 0;
        for (commit_idx, lines) in lines_per_commit.iter().enumerate().skip(1) {
            match lines {
                Some(older) if older.get(line_idx) == Some(line) => origin = commit_idx,
                _ => break,
            }
        }
        println!("{} {}", &history[origin].0.hex()[..8], line);
    }
    Ok(())
}
