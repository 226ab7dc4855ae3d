use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TuneconfError {
    #[error("Malformed name '{0}': expected '<token>-<version>'")]
    MalformedName(String),

    #[error("Catalog unavailable at {path}: {reason}")]
    CatalogUnavailable { path: PathBuf, reason: String },

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Copy into {destination} did not complete: {reason}")]
    CopyIncomplete { destination: PathBuf, reason: String },

    #[error("Failed to parse {document}: {reason}")]
    Parse { document: String, reason: String },

    #[error("Unrecognized selection '{selection}' ({available} entries available)")]
    UnrecognizedSelection { selection: String, available: usize },

    #[error("Dataset could not be resolved: {0}")]
    DatasetUnresolved(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    YamlSerialization(#[from] serde_yaml_ng::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CLI error: {0}")]
    Cli(String),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl TuneconfError {
    /// Errors raised before anything is written to the destination root
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            TuneconfError::MalformedName(_)
                | TuneconfError::CatalogUnavailable { .. }
                | TuneconfError::DestinationExists(_)
                | TuneconfError::UnrecognizedSelection { .. }
                | TuneconfError::DatasetUnresolved(_)
        )
    }

    pub(crate) fn catalog_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TuneconfError::CatalogUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TuneconfError>;
