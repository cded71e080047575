//! Resolves two objects (commit, tree, or blob ids) and prints a
//! unified diff of their blob contents, recursing into matching tree
//! paths.

use anyhow::{anyhow, Context, Result};
use structopt::StructOpt;

use packtree::cli;
use packtree::hash::Sha;
use packtree::store::{ObjectType, Repository, Tree};

#[derive(StructOpt)]
#[structopt(name = "diff", about = "diff two objects")]
struct Opt {
    #[structopt(short = "C", long = "context", default_value = "3")]
    context: usize,

    /// `[repo] o1 o2`, or just `o1 o2` to use the discovered repository.
    #[structopt(required = true, min_values = 2, max_values = 3)]
    args: Vec<String>,
}

fn main() {
    packtree::logging::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        eprintln!("diff: {e:#}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let (repo_arg, o1, o2) = match opt.args.as_slice() {
        [repo, o1, o2] => (Some(repo.as_str()), o1.as_str(), o2.as_str()),
        [o1, o2] => (None, o1.as_str(), o2.as_str()),
        _ => return Err(anyhow!("expected `[repo] <object1> <object2>`")),
    };

    let mut repo = cli::open_repo(repo_arg).context("open repository")?;
    let id1 = Sha::from_hex_str(o1).map_err(|e| anyhow!("object1: {e}"))?;
    let id2 = Sha::from_hex_str(o2).map_err(|e| anyhow!("object2: {e}"))?;

    let type1 = repo.object_type(&id1).context("resolve object1 type")?;
    let type2 = repo.object_type(&id2).context("resolve object2 type")?;

    let as_tree = |repo: &mut Repository, id: &Sha, ty: ObjectType| -> Result<Option<Tree>> {
        match ty {
            ObjectType::Tree => Ok(Some(repo.read_tree(id)?)),
            ObjectType::Commit => {
                let commit = repo.read_commit(id)?;
                Ok(Some(repo.commit_tree(&commit)?))
            }
            _ => Ok(None),
        }
    };

    let tree1 = as_tree(&mut repo, &id1, type1).context("resolve object1")?;
    let tree2 = as_tree(&mut repo, &id2, type2).context("resolve object2")?;

    let mut out = String::new();
    if tree1.is_some() || tree2.is_some() {
        cli::diff_trees(&mut repo, tree1.as_ref(), tree2.as_ref(), "", None, opt.context, &mut out)
            .context("diff trees")?;
    } else {
        out = cli::diff_blob(&mut repo, Some(&id1), Some(&id2), std::path::Path::new(o1), opt.context)
            .context("diff blobs")?;
    }
    print!("{out}");
    Ok(())
}
