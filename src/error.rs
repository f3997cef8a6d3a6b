use std::path::PathBuf;

use thiserror::Error;

use crate::api::ErrorEnvelope;
use crate::context::ValidationError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{} is not valid JSON ({source}); delete or repair the file", path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to determine configuration directory")]
    MissingConfigDir,

    #[error("authentication failed: {reason}. Run `apicr login` to log in again")]
    AuthenticationFailed { reason: String },

    #[error("not logged in. Run `apicr login` to authenticate")]
    Unauthenticated,

    #[error("session rejected: {0}. Run `apicr login` to authenticate again")]
    Unauthorized(ErrorEnvelope),

    #[error("not found: {0}")]
    NotFound(ErrorEnvelope),

    #[error("already exists: {0}")]
    Conflict(ErrorEnvelope),

    #[error("permission denied: {0}")]
    Forbidden(ErrorEnvelope),

    #[error("invalid input: {0}")]
    InvalidInput(ErrorEnvelope),

    #[error("request failed with status {}", cause.status)]
    Unknown {
        #[source]
        cause: ErrorEnvelope,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("context '{0}' not found")]
    ContextNotFound(String),

    #[error("no current context set. Run `apicr context use --name <name>` to select one")]
    ContextNotSet,

    #[error("no registry instance selected. Use `--instance-id` or `apicr registry use`")]
    RegistryNotSet,

    #[error("registry '{0}' has no URL yet; it may still be provisioning")]
    RegistryUnavailable(String),

    #[error("{} already exists; pass --overwrite to replace it", .0.display())]
    FileExists(PathBuf),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid URL '{input}': {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
