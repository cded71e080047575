//! Applies a single delta stream against a base file and writes the
//! reconstructed object to stdout. Used by the patch-round-trip test
//! scenario; grounded on the teacher's `test-delta` subcommand.

use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result};
use structopt::StructOpt;

use packtree::packfile::delta;

#[derive(StructOpt)]
#[structopt(name = "patch", about = "reconstruct an object from a base file and a delta stream")]
struct Opt {
    base: String,
    delta: String,
}

fn main() {
    packtree::logging::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        eprintln!("patch: {e:#}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let base = fs::read(&opt.base).with_context(|| format!("read {}", opt.base))?;
    let patch = fs::read(&opt.delta).with_context(|| format!("read {}", opt.delta))?;
    let result = delta::apply(&base, &patch).context("apply delta")?;
    io::stdout().write_all(&result).context("write result")?;
    Ok(())
}
