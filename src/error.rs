// src/error.rs
use std::fmt;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Quote service error: {0}")]
    Quote(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("No holdings in portfolio")]
    NoHoldings,
}

pub type Result<T> = std::result::Result<T, PortfolioError>;

/// Rejection carried through warp filters; the recover handler turns it
/// into a plain-text response.
#[derive(Debug)]
pub struct ShellError {
    pub status: StatusCode,
    pub message: String,
}

impl ShellError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<PortfolioError> for ShellError {
    fn from(e: PortfolioError) -> Self {
        match e {
            PortfolioError::NoHoldings => Self::not_found(e.to_string()),
            PortfolioError::InvalidData(_) | PortfolioError::Csv(_) => {
                Self::bad_request(e.to_string())
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ShellError {}

impl Reject for ShellError {}
