use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GrmError>;

/// Errors surfaced by builders, mappers and the model facade.
#[derive(Debug, Error)]
pub enum GrmError {
    /// Missing resolver, unknown connection or similar wiring problem.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A caller supplied an argument the operation cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Comparison operator outside the supported set.
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),
    /// Relation accessor not declared in the model's relation schema.
    #[error("relation '{relation}' is not declared on label '{label}'")]
    MissingRelation {
        /// Accessor name that was requested.
        relation: String,
        /// Canonical label of the model that was asked.
        label: String,
    },
    /// Failure reported by the graph client, passed through untouched.
    #[error("query execution failed: {0}")]
    Client(#[source] ClientError),
    /// A record did not carry the expected column.
    #[error("record has no field '{0}'")]
    MissingField(String),
    /// A record column held a value of the wrong shape.
    #[error("field '{field}' holds {found}, expected {expected}")]
    UnexpectedValue {
        /// Column or property name.
        field: String,
        /// Shape the mapper needed.
        expected: &'static str,
        /// Shape that was found.
        found: &'static str,
    },
    /// The statement returned no rows where one was required.
    #[error("query returned no rows")]
    EmptyResult,
    /// Settings file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// JSON view of an entity could not be produced.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GrmError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        GrmError::InvalidArgument(message.into())
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        GrmError::Configuration(message.into())
    }

    pub(crate) fn unexpected(
        field: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        GrmError::UnexpectedValue {
            field: field.into(),
            expected,
            found,
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            GrmError::Configuration(_) => "Configuration",
            GrmError::InvalidArgument(_) => "InvalidArgument",
            GrmError::UnsupportedOperator(_) => "UnsupportedOperator",
            GrmError::MissingRelation { .. } => "MissingRelation",
            GrmError::Client(_) => "QueryExecution",
            GrmError::MissingField(_) => "MalformedRecord",
            GrmError::UnexpectedValue { .. } => "MalformedRecord",
            GrmError::EmptyResult => "EmptyResult",
            GrmError::Config(_) => "Configuration",
            GrmError::Serialization(_) => "Serialization",
        }
    }
}
