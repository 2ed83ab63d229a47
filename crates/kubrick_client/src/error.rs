use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response from {endpoint} is missing `{field}`")]
    MissingField {
        endpoint: String,
        field: &'static str,
    },
}

/// Failure of one of the two remote steps of a video submission.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("video transfer failed: {0}")]
    Transfer(#[source] ApiError),

    #[error("processing request for {remote_path} failed: {source}")]
    ProcessingStart {
        remote_path: String,
        #[source]
        source: ApiError,
    },
}
