//! Error types for the acr-mcp crate.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to run an external toolchain command.
///
/// Every variant is terminal: the client never retries.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("OpenACR bin dir not found: {}", .0.display())]
    BinDirMissing(PathBuf),

    #[error("Invalid project directory: missing {missing} at {}", .dir.display())]
    InvalidProject { dir: PathBuf, missing: &'static str },

    #[error("Command not found: {program}")]
    CommandNotFound { program: String },

    #[error("Command timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Generated-header lookup failures.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Header not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Header path escapes the work dir: {}", .path.display())]
    OutsideWorkDir { path: PathBuf },

    #[error("No generated headers found for namespace '{namespace}'")]
    NoHeaders { namespace: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced to the agent from a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {name}")]
    NotFound { name: String },

    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("{0}")]
    Failed(String),
}
