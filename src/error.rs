use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HmdbError {
    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("<{record}> is missing required element <{element}>")]
    MissingElement {
        record: String,
        element: &'static str,
    },

    #[error("<{record}> has an empty <{element}> element")]
    EmptyElement {
        record: String,
        element: &'static str,
    },

    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("missing config file hmdb-assoc.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("failed to write output: {0}")]
    Output(String),
}

impl HmdbError {
    /// Structural errors are the ones the malformed-record policy may skip.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            HmdbError::MissingElement { .. } | HmdbError::EmptyElement { .. }
        )
    }
}
