use thiserror::Error;

/// Errors from the session store.
///
/// A missing key is not an error -- the store reports it as `None` and the
/// callers absorb it into default-object creation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Backend(String),

    #[error("malformed record under '{key}': {detail}")]
    Deserialization { key: String, detail: String },
}

/// Errors from delivering a message over the transport.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);
