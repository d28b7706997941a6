#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Io error while reading response body: {0}")]
    Io(reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Exchange failed: {0}")]
    Exchange(#[from] reqwest::Error),
}

pub type StdResult<T, E> = std::result::Result<T, E>;

pub type Result<T> = std::result::Result<T, Error>;
