// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid queue item: {0}")]
    InvalidQueueItem(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
