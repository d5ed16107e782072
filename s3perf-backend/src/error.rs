use thiserror::Error;

/// Errors returned by a [`Backend`](crate::Backend) operation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The storage service answered, but reported a failure.
    ///
    /// `code` and `message` are the provider's error code and message, for example
    /// `NoSuchKey` and `The specified key does not exist.`.
    #[error("{code}: {message}")]
    Service {
        /// HTTP status code of the response.
        status: u16,
        /// Provider specific error code.
        code: String,
        /// Human readable error message sent by the provider.
        message: String,
    },

    /// The request did not produce an answer from the service, e.g. connection or signing errors.
    #[error("transport error: {context}")]
    Transport {
        /// What was being attempted when the error occurred.
        context: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// IO errors related to payload streaming.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend could not be constructed from its configuration.
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// Creates a [`BackendError::Transport`] from any error.
    pub fn transport<E>(context: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            context: context.into(),
            cause: Box::new(cause),
        }
    }

    /// Returns the provider error code, if the service reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
