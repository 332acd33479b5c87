//! Error types for the mgit core.
//!
//! Every failure mode of the store, SSH config engine, and Git binder maps
//! onto one of these variants so the CLI boundary can decide how to present
//! it. `anyhow` is still used at the command layer for context chaining.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core library.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: bad profile name, bad email, missing required field.
    #[error("{0}")]
    Validation(String),

    /// An account with the same name already exists.
    #[error("account '{0}' already exists")]
    Duplicate(String),

    /// Unknown profile name, host alias, or key file.
    #[error("{0}")]
    NotFound(String),

    /// A shelled-out command failed or its binary could not be resolved.
    #[error("command `{command}` failed: {detail}")]
    ExternalTool { command: String, detail: String },

    /// A local-scope operation was attempted outside a Git working tree.
    #[error("'{}' is not a Git repository", .0.display())]
    RepositoryState(PathBuf),

    /// A persisted document or managed text region could not be parsed.
    #[error("{0}")]
    Parse(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an I/O error with a human-readable context line.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn external(command: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ExternalTool {
            command: command.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::Duplicate("work".into());
        assert_eq!(e.to_string(), "account 'work' already exists");

        let e = Error::external("ssh-keygen", "exit status 1");
        assert_eq!(e.to_string(), "command `ssh-keygen` failed: exit status 1");

        let e = Error::RepositoryState(PathBuf::from("/tmp/x"));
        assert!(e.to_string().contains("/tmp/x"));
    }
}
