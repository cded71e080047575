//! A read-oriented implementation of the Git object and repository
//! model: pack index/pack file parsing, delta chain resolution, and
//! the small set of operations (`open_repo`, `open_object`,
//! `extract_object`, ...) the `[[bin]]` front-ends are built on.

pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod logging;
pub mod packfile;
pub mod store;
