use std::io;
use std::path::PathBuf;
use texlipse_log::TraceError;
use thiserror::Error;

/// Why a single runner invocation did not complete.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The process could not be started or waited for.
    #[error("cannot launch {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The tool ran, but its output reported errors in the document.
    #[error("{runner} reported {count} error(s)")]
    Document { runner: String, count: usize },
    /// The run was cancelled and the process terminated.
    #[error("{0} was stopped")]
    Stopped(String),
    /// The runner is not usable with the current configuration.
    #[error("{runner} is not usable: {reason}")]
    Invalid { runner: String, reason: String },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("cannot read file trace: {0}")]
    Trace(#[from] TraceError),
    #[error("cannot scan {path}: {source}")]
    Tracking {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot move {from} to {to}: {source}")]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
