//! Store error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("asset root not found: {0}")]
    RootMissing(PathBuf),

    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("upload exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
