//! Error types for swma-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in swma-core
#[derive(Debug, Error)]
pub enum Error {
    /// Restore requested for a file that was never baselined
    #[error("no pristine baseline recorded for '{file_id}'")]
    BaselineMissing { file_id: String },

    /// Directive value outside its declared numeric domain
    #[error("invalid directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    /// Named attribute is neither defined nor inherited by the entity
    #[error("attribute '{attribute}' not found on '{entity}' in '{file_id}'")]
    AttributeNotFound {
        file_id: String,
        entity: String,
        attribute: String,
    },

    /// Unit (or template/hardpoint) entry does not exist in the store
    #[error("unit '{unit}' not found in '{file_id}'")]
    UnitNotFound { unit: String, file_id: String },

    /// Market weight outside [0, 100]
    #[error("probability {value} for ship '{ship}' is outside 0..=100")]
    InvalidProbability { ship: String, value: i32 },

    /// Market event references a ship that has no base entry
    #[error("market event '{event}' references unknown ship '{ship}'")]
    UnknownMarketShip { event: String, ship: String },

    /// Attribute text that should be numeric is not
    #[error("value '{value}' of '{entity}/{attribute}' is not numeric")]
    InvalidAttributeValue {
        entity: String,
        attribute: String,
        value: String,
    },

    /// Malformed game XML
    #[error("XML error in '{file_id}' at line {line}: {message}")]
    Xml {
        file_id: String,
        line: usize,
        message: String,
    },

    /// Script content is not UTF-8
    #[error("'{file_id}' is not valid UTF-8")]
    Encoding { file_id: String },

    /// File id is not usable as a baseline key
    #[error("invalid file id '{0}'")]
    InvalidFileId(String),

    /// File id is not present in the file table
    #[error("unknown file id '{0}'")]
    UnknownFile(String),

    /// No managed file is configured for the role a directive needs
    #[error("no managed file configured for role {0}")]
    NoFileForRole(String),

    /// Configuration is inconsistent
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Text rendering error
    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// Text pattern failed to compile
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// Stable name of the error class, used in run reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::BaselineMissing { .. } => "BaselineMissing",
            Error::InvalidDirective { .. } => "InvalidDirective",
            Error::AttributeNotFound { .. } => "AttributeNotFound",
            Error::UnitNotFound { .. } => "UnitNotFound",
            Error::InvalidProbability { .. } => "InvalidProbability",
            Error::UnknownMarketShip { .. } => "UnknownMarketShip",
            Error::InvalidAttributeValue { .. } => "InvalidAttributeValue",
            Error::Xml { .. } => "Xml",
            Error::Encoding { .. } => "Encoding",
            Error::InvalidFileId(_) => "InvalidFileId",
            Error::UnknownFile(_) => "UnknownFile",
            Error::NoFileForRole(_) => "NoFileForRole",
            Error::Config(_) => "Config",
            Error::FileRead { .. } | Error::FileWrite { .. } | Error::Io(_) => "Io",
            Error::WalkDir(_) => "WalkDir",
            Error::Json(_) => "Json",
            Error::Yaml(_) => "Yaml",
            Error::Csv(_) => "Csv",
            Error::Fmt(_) => "Fmt",
            Error::Pattern(_) => "Pattern",
        }
    }

    pub(crate) fn invalid_directive(directive: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidDirective {
            directive: directive.to_string(),
            reason: reason.into(),
        }
    }
}
