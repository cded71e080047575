//! The error taxonomy raised by the core pack store.
//!
//! Every kind here corresponds to a row in the error table of the core
//! design: no error is silently swallowed, and every fallible operation
//! in `packfile`/`store` returns one of these through `Result`.

use std::path::PathBuf;

use crate::hash::Sha;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a repository (no objects/ directory): {0}")]
    BadPath(PathBuf),

    #[error("object not found: {0}")]
    NoObj(Sha),

    #[error("object {0} is not stored in a pack")]
    ObjNotPacked(Sha),

    #[error("bad pack index: {0}")]
    BadPackIdx(String),

    #[error("pack index checksum mismatch")]
    PackIdxCsum,

    #[error("bad pack file: {0}")]
    BadPackFile(String),

    #[error("delta chain is empty or never reaches a plain base")]
    BadDeltaChain,

    #[error("unhandled object type byte: {0}")]
    NotImpl(u8),

    #[error("variable-length integer would exceed 64 bits")]
    NoSpace,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The stable, machine-checkable name used in tests and `-v` output,
    /// matching the kind column of the error table.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::BadPath(_) => "BAD_PATH",
            Error::NoObj(_) => "NO_OBJ",
            Error::ObjNotPacked(_) => "OBJ_NOT_PACKED",
            Error::BadPackIdx(_) => "BAD_PACKIDX",
            Error::PackIdxCsum => "PACKIDX_CSUM",
            Error::BadPackFile(_) => "BAD_PACKFILE",
            Error::BadDeltaChain => "BAD_DELTA_CHAIN",
            Error::NotImpl(_) => "NOT_IMPL",
            Error::NoSpace => "NO_SPACE",
            Error::Io(_) => "IO",
        }
    }
}
