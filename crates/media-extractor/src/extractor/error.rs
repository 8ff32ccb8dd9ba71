use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    #[error("failed to spawn extractor: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("extractor exited with status {status:?}: {diagnostic}")]
    Failed {
        status: Option<i32>,
        diagnostic: String,
    },
    #[error("unparseable extractor output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
    #[error("extractor timed out after {0:?}")]
    Timeout(Duration),
}

impl ExtractorError {
    /// Diagnostic text suitable for reporting to a caller.
    pub fn diagnostic(&self) -> String {
        match self {
            ExtractorError::Failed { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}
