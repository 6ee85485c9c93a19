use thiserror::Error;

pub type DeployResult<T> = Result<T, DeployError>;

/// The four error kinds from the synchronization protocol, plus the usual
/// I/O and catch-all passthroughs.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Local root not found, invalid job specification, bad config file.
    /// Fatal before any remote contact.
    #[error("config error: {0}")]
    Config(String),

    /// Any failure of the Server abstraction. Fatal in upload/rename/job
    /// phases; logged-and-continued per entry in the delete phase.
    #[error("server error during {operation} on {path}: {source}")]
    Server {
        operation: &'static str,
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// A pre- or post-job reported failure. Fatal.
    #[error("job failed: {0}")]
    Job(String),

    /// Decode failure on the remote manifest. Callers recover by treating
    /// the manifest as empty rather than propagating this.
    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeployError {
    pub fn server(operation: &'static str, path: impl Into<String>, source: anyhow::Error) -> Self {
        DeployError::Server {
            operation,
            path: path.into(),
            source,
        }
    }
}
