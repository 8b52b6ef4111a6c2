use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt index artifact {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error on {path}: {source}")]
    Serde {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io { path: path.as_ref().display().to_string(), source }
    }

    pub fn serde(path: impl AsRef<std::path::Path>, source: serde_json::Error) -> Self {
        Self::Serde { path: path.as_ref().display().to_string(), source }
    }

    pub fn corrupt(path: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        Self::Corrupt { path: path.as_ref().display().to_string(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
