use thiserror::Error;

#[derive(Debug, Error)]
/// Failures surfaced by the platform transport.
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed with status {status}: {detail}")]
    Api {
        operation: &'static str,
        status: u16,
        detail: String,
    },
    #[error("{operation} returned an unusable payload: {detail}")]
    Payload {
        operation: &'static str,
        detail: String,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
