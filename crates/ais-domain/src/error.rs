use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid region polygon: {0}")]
    InvalidRegion(String),

    #[error("Feed authentication rejected: {0}")]
    FeedAuthRejected(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
