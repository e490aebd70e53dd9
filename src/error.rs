use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task not found: {0}")]
    NotFound(u32),

    #[error("No task ids left to assign")]
    IdsExhausted,

    #[error("Could not access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt task file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, TodoError>;
