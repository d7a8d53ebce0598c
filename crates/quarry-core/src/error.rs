//! Error types for the retrieval engine.

use thiserror::Error;

/// Result type alias using QuarryError.
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Errors that can occur in the retrieval engine.
#[derive(Error, Debug)]
pub enum QuarryError {
    /// The search request could not be compiled into an engine query.
    #[error("Query build error: {message}")]
    QueryBuild { message: String },

    /// The index engine timed out after all retry attempts.
    #[error("Retrieval timed out after {attempts} attempts: {message}")]
    RetrievalTimeout { attempts: usize, message: String },

    /// Non-timeout index engine or transport failure.
    #[error("Index engine error: {message}")]
    IndexEngine { message: String },

    /// A stored vector's dimension did not match the query embedding.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    EmbeddingDimensionMismatch { expected: usize, got: usize },

    /// Embedding service call failed.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Rerank model service call failed.
    #[error("Rerank model unavailable: {message}")]
    RerankModelUnavailable { message: String },

    /// Sub-query generator call failed.
    #[error("Sub-query generation error: {message}")]
    SubQueryGeneration { message: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl QuarryError {
    /// Create a query build error.
    pub fn query_build(message: impl Into<String>) -> Self {
        Self::QueryBuild {
            message: message.into(),
        }
    }

    /// Create a retrieval timeout error.
    pub fn retrieval_timeout(attempts: usize, message: impl Into<String>) -> Self {
        Self::RetrievalTimeout {
            attempts,
            message: message.into(),
        }
    }

    /// Create an index engine error.
    pub fn index_engine(message: impl Into<String>) -> Self {
        Self::IndexEngine {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a rerank model error.
    pub fn rerank_unavailable(message: impl Into<String>) -> Self {
        Self::RerankModelUnavailable {
            message: message.into(),
        }
    }

    /// Create a sub-query generation error.
    pub fn sub_query(message: impl Into<String>) -> Self {
        Self::SubQueryGeneration {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the failure may succeed on retry (timeout-class only).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RetrievalTimeout { .. })
    }

    /// Get the stable error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::QueryBuild { .. } => "QUERY_BUILD_ERROR",
            Self::RetrievalTimeout { .. } => "RETRIEVAL_TIMEOUT",
            Self::IndexEngine { .. } => "INDEX_ENGINE_ERROR",
            Self::EmbeddingDimensionMismatch { .. } => "EMBEDDING_DIMENSION_MISMATCH",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::RerankModelUnavailable { .. } => "RERANK_MODEL_UNAVAILABLE",
            Self::SubQueryGeneration { .. } => "SUB_QUERY_GENERATION_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuarryError::query_build("bad filter value");
        assert!(err.to_string().contains("bad filter value"));

        let err = QuarryError::EmbeddingDimensionMismatch {
            expected: 1024,
            got: 768,
        };
        assert!(err.to_string().contains("1024"));
        assert!(err.to_string().contains("768"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            QuarryError::query_build("x").error_code(),
            "QUERY_BUILD_ERROR"
        );
        assert_eq!(
            QuarryError::retrieval_timeout(2, "x").error_code(),
            "RETRIEVAL_TIMEOUT"
        );
        assert_eq!(
            QuarryError::rerank_unavailable("x").error_code(),
            "RERANK_MODEL_UNAVAILABLE"
        );
    }

    #[test]
    fn test_is_timeout() {
        assert!(QuarryError::retrieval_timeout(2, "slow").is_timeout());
        assert!(!QuarryError::index_engine("boom").is_timeout());
    }
}
