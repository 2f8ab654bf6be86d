use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read cipher table: {0}")]
    CipherTable(#[from] csv::Error),

    #[error("Malformed report {path:?}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// tshark could not be started at all
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// tshark ran but exited non-zero
    #[error("{program} exited with {status}: {stderr}")]
    Tshark {
        program: String,
        status: String,
        stderr: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
