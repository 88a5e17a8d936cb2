//! Error types for KSQL setup.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KsqlError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("KSQL server returned status {status}: {body}")]
    Status { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, KsqlError>;
