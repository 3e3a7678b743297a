use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {service}: {reason}")]
    MalformedResponse {
        service: &'static str,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("input exceeds maximum size: {len} bytes (limit: {limit} bytes)")]
    InputTooLarge { len: usize, limit: usize },
}

impl VoiceError {
    /// Reads a non-success response into an [`VoiceError::Upstream`].
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        VoiceError::Upstream {
            service,
            status,
            body,
        }
    }
}
