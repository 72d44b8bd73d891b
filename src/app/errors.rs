use crate::{
    classify::ClassifyError, patterns::PatternError, semantic::EmbeddingError,
    storage::StoreError,
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("history entry not found")]
    NotFound,

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("classifier error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("reqwest error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl From<PatternError> for AppError {
    fn from(err: PatternError) -> Self {
        match err {
            PatternError::Store(err) => AppError::Store(err),
            err => AppError::MalformedInput(err.to_string()),
        }
    }
}
