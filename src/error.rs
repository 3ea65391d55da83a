use thiserror::Error;

pub type APIResult<T> = Result<T, APIError>;

/// Every way a call through this crate can fail.
///
/// Transport, status, and token faults come straight from the HTTP layer and
/// are passed through without translation or retry. The remaining variants
/// are data-shape faults raised by this crate itself.
#[derive(Debug, Error)]
pub enum APIError {
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),
    #[error("could not build request: {0}")]
    Http(#[from] ureq::http::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing environment variable: {0}")]
    EnvVar(#[from] std::env::VarError),
    #[error("request failed with status {status}: {body}")]
    BadRequest { status: u16, body: String },
    #[error("token request rejected: {0}")]
    BadTokenRequest(String),
    #[error("unknown time zone name: {0}")]
    UnknownTimeZone(String),
    #[error("{0} does not exist in the account time zone")]
    NonexistentLocalTime(String),
    #[error("no records returned from {0}")]
    NoRecords(String),
    #[error("record is missing expected field `{0}`")]
    MissingField(&'static str),
}
