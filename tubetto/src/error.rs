//! Application-wide error types.

use media_extractor::ExtractorError;
use thiserror::Error;

use crate::resolver::StreamType;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Extraction failed for {item_id}: {diagnostic}")]
    ExtractionFailed { item_id: String, diagnostic: String },

    #[error("Invalid item id: {0}")]
    InvalidItemId(String),

    #[error("No playable format available for {0}")]
    NoPlayableFormat(String),

    #[error("No audio-only stream available for {0}")]
    NoAudioStream(String),

    #[error("Upstream request timed out: {url}")]
    UpstreamTimeout { url: String },

    #[error("Upstream request failed for {url}: {message}")]
    UpstreamError { url: String, message: String },

    #[error("Upstream URL rejected: {0}")]
    InvalidUpstreamUrl(String),

    #[error("Expected a {expected} stream for {item_id}, resolved {actual}")]
    UnexpectedStreamType {
        item_id: String,
        expected: StreamType,
        actual: StreamType,
    },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Wraps an adapter failure for `item_id`, keeping only its diagnostic.
    /// An id the adapter refuses to look up is the caller's error.
    pub fn extraction(item_id: impl Into<String>, err: &ExtractorError) -> Self {
        match err {
            ExtractorError::InvalidId(id) => Self::InvalidItemId(id.clone()),
            _ => Self::ExtractionFailed {
                item_id: item_id.into(),
                diagnostic: err.diagnostic(),
            },
        }
    }

    /// Classifies a transport failure talking to `url`.
    pub fn upstream(url: impl Into<String>, err: &reqwest::Error) -> Self {
        let url = url.into();
        if err.is_timeout() {
            Self::UpstreamTimeout { url }
        } else {
            Self::UpstreamError {
                url,
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_keeps_adapter_diagnostic() {
        let err = Error::extraction(
            "abc",
            &ExtractorError::Failed {
                status: Some(1),
                diagnostic: "Video unavailable".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "Extraction failed for abc: Video unavailable"
        );
    }

    #[test]
    fn rejected_id_is_not_an_extraction_failure() {
        let err = Error::extraction("a b", &ExtractorError::InvalidId("a b".to_string()));
        assert!(matches!(err, Error::InvalidItemId(ref id) if id == "a b"));
    }

    #[test]
    fn unexpected_stream_type_names_both_kinds() {
        let err = Error::UnexpectedStreamType {
            item_id: "abc".to_string(),
            expected: StreamType::Hls,
            actual: StreamType::Progressive,
        };
        assert_eq!(
            err.to_string(),
            "Expected a hls stream for abc, resolved progressive"
        );
    }
}
