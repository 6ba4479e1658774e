use crate::JsonRpcError;
use std::error::Error;
use thiserror::Error;

#[derive(Debug, Error)]
/// An error thrown when making a call to the provider
pub enum ProviderError {
    /// The node answered with a JSON-RPC error object
    #[error(transparent)]
    JsonRpc(#[from] JsonRpcError),

    /// The request could not be delivered or its answer could not be matched
    #[error("transport error: {0}")]
    Transport(String),

    /// Error in underlying lib `reqwest`
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The response was not a valid JSON-RPC envelope
    #[error("deserialization error: {err}. response: {text}")]
    MalformedResponse {
        /// Underlying error
        err: serde_json::Error,
        /// The contents of the response that could not be deserialized
        text: String,
    },

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context cancelled")]
    Cancelled,

    /// Every attempt of a retried call failed
    #[error("failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ProviderError>,
    },

    /// An error raised by a middleware layer
    #[error("{0}")]
    Middleware(Box<dyn Error + Send + Sync>),

    /// Error in underlying lib `serde_json`
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// The operation is not supported by this provider
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("batch must contain at least one element")]
    EmptyBatch,
}

impl ProviderError {
    /// Returns `true` for transport-level failures that may succeed when the
    /// call is issued again.
    ///
    /// JSON-RPC errors and cancellation are never retryable. Middleware errors
    /// are retryable only if a retryable [`ProviderError`] caused them.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) |
            ProviderError::Http(_) |
            ProviderError::MalformedResponse { .. } |
            ProviderError::DeadlineExceeded => true,
            ProviderError::Middleware(err) => {
                let root: &(dyn Error + 'static) = &**err;
                let mut source = Some(root);
                while let Some(err) = source {
                    if let Some(err) = err.downcast_ref::<ProviderError>() {
                        return err.is_retryable()
                    }
                    source = err.source();
                }
                false
            }
            _ => false,
        }
    }

    /// Access an underlying JSON-RPC error (if any), looking through retry and
    /// middleware wrappers
    pub fn as_error_response(&self) -> Option<&JsonRpcError> {
        match self {
            ProviderError::JsonRpc(err) => Some(err),
            ProviderError::RetriesExhausted { source, .. } => source.as_error_response(),
            ProviderError::Middleware(err) => {
                let root: &(dyn Error + 'static) = &**err;
                let mut source = Some(root);
                while let Some(err) = source {
                    if let Some(err) = err.downcast_ref::<ProviderError>() {
                        return err.as_error_response()
                    }
                    source = err.source();
                }
                None
            }
            _ => None,
        }
    }

    /// Wraps any middleware error
    pub fn middleware<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ProviderError::Middleware(Box::new(err))
    }
}
