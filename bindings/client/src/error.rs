/// Errors from talking to the Kasm API.
#[derive(Debug, thiserror::Error)]
pub enum KasmApiError {
    #[error("Invalid API host {host}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Error sending request to {endpoint}: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API request to {endpoint} failed with status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} returned an error: {message}")]
    Api { endpoint: String, message: String },

    #[error("Failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{endpoint} response is missing {field}")]
    MissingField {
        endpoint: String,
        field: &'static str,
    },

    #[error("Unexpected response from {endpoint}: {body}")]
    UnexpectedResponse { endpoint: String, body: String },

    #[error("Failed to destroy session after {attempts} attempts: {last}")]
    DestroyAttemptsExhausted {
        attempts: u32,
        #[source]
        last: Box<KasmApiError>,
    },
}

impl KasmApiError {
    /// The service reports a session that is still waiting for capacity as an error rather than
    /// as a status.
    pub(crate) fn is_currently_requested(&self) -> bool {
        const MARKER: &str = "currently requested";
        match self {
            KasmApiError::Api { message, .. } => message.contains(MARKER),
            KasmApiError::Status { body, .. } => body.contains(MARKER),
            _ => false,
        }
    }

    /// Failures worth trying again, as opposed to the service rejecting the request.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(
            self,
            KasmApiError::Http { .. } | KasmApiError::Status { .. }
        )
    }
}
