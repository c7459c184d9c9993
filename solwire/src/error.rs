use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolwireError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP error: status {status}, body: {body}")]
    Http { status: u16, body: String },

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid transaction encoding: {0}")]
    InvalidTransaction(String),

    #[error("signer unreachable: {0}")]
    SignerUnreachable(String),

    #[error("signer rejected request: {0}")]
    SignerRejected(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for SolwireError {
    fn from(e: reqwest::Error) -> Self {
        SolwireError::Network(e.to_string())
    }
}
