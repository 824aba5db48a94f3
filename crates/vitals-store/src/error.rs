use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The shared-store mechanism could not be brought up. Fatal at process
    /// startup; there is no private fallback.
    #[error("shared store unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out waiting for store lock at {path}")]
    LockTimeout { path: PathBuf },

    #[error("store i/o failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store document encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}
