use thiserror::Error;

pub type LerzoResult<T> = Result<T, LerzoError>;

#[derive(Debug, Error)]
pub enum LerzoError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
