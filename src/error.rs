use thiserror::Error;

/// Everything that can go wrong while loading or running a chain.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The document has a shape no chain can be built from.
    #[error("malformed chain document: {0}")]
    Compile(String),

    #[error("failed to parse chain document: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("command '{command}' failed on {target}: {reason}")]
    Exec {
        target: String,
        command: String,
        reason: String,
    },

    /// A command reached execution without an enclosing session.
    #[error("command '{0}' has no session bound")]
    Binding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChainError {
    pub fn exec(target: impl Into<String>, command: impl Into<String>, reason: impl ToString) -> Self {
        Self::Exec {
            target: target.into(),
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    pub fn connect(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
