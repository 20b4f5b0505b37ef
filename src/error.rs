//! Error types for the generank library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum GeneRankError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing column '{0}' in table")]
    MissingColumn(String),

    #[error("Unknown organism '{0}'")]
    UnknownOrganism(String),

    #[error("Unknown identifier namespace '{namespace}' for organism '{organism}'")]
    UnknownNamespace { organism: String, namespace: String },

    #[error("Unresolved metadata: {0}")]
    Unresolved(&'static str),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, GeneRankError>;
