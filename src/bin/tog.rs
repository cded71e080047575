//! A small terminal history browser: one scrollable list over `log`'s
//! commit stream. Not a full TUI framework — `crossterm` raw mode plus
//! a manual render loop is all one screen of commits needs.

use std::io::{stdout, Write};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType};
use crossterm::{cursor, queue, style};
use structopt::StructOpt;

use packtree::cli;

#[derive(StructOpt)]
#[structopt(name = "tog", about = "browse commit history in the terminal")]
struct Opt {
    #[structopt(short = "c", long = "commit")]
    commit: Option<String>,

    #[structopt(short = "r", long = "repo")]
    repo: Option<String>,
}

fn main() {
    packtree::logging::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        eprintln!("tog: {e:#}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let mut repo = cli::open_repo(opt.repo.as_deref()).context("open repository")?;
    let start = cli::resolve_commit(&repo, opt.commit.as_deref()).context("resolve commit")?;
    let history = repo.first_parent_history(&start, None).context("walk history")?;

    let lines: Vec<String> = history
        .iter()
        .map(|(sha, commit)| {
            let summary = commit.message.lines().next().unwrap_or("");
            format!("{} {}", &sha.hex()[..8], summary)
        })
        .collect();

    if lines.is_empty() {
        println!("(no commits)");
        return Ok(());
    }

    enable_raw_mode().context("enable raw mode")?;
    let result = browse(&lines);
    disable_raw_mode().context("disable raw mode")?;
    result
}

fn browse(lines: &[String]) -> Result<()> {
    let mut out = stdout();
    let (_, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let page = rows.saturating_sub(1).max(1) as usize;
    let mut top = 0usize;

    loop {
        render(&mut out, lines, top, page)?;
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => {
                    if top + 1 < lines.len() {
                        top += 1;
                    }
                }
                KeyCode::Up | KeyCode::Char('k') => top = top.saturating_sub(1),
                _ => {}
            }
        }
    }
    Ok(())
}

fn render(out: &mut impl Write, lines: &[String], top: usize, page: usize) -> Result<()> {
    queue!(out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    for line in lines.iter().skip(top).take(page) {
        queue!(out, style::Print(line), style::Print("\r\n"))?;
    }
    out.flush()?;
    Ok(())
}
