use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OkavangoError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("server returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("failed to download {url} after {attempts} attempts")]
    #[diagnostic(help("check network access, or re-run with --force once the source is reachable"))]
    Retrieval {
        url: String,
        attempts: u32,
        #[source]
        source: Box<OkavangoError>,
    },

    #[error("required file not found: {0}")]
    #[diagnostic(help("run `okavango fetch` first"))]
    MissingFile(PathBuf),

    #[error("{dataset} is missing columns {missing:?}; found {found:?}")]
    MissingColumns {
        dataset: String,
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("could not infer value column for {dataset}; columns found: {columns:?}")]
    ValueColumn {
        dataset: String,
        columns: Vec<String>,
    },

    #[error("world map has no ISO_A3 field; fields found: {found:?}")]
    MissingCodeField { found: Vec<String> },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("shapefile error: {0}")]
    Shapefile(String),

    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl OkavangoError {
    /// Data-shape problems; never worth retrying.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            OkavangoError::MissingColumns { .. }
                | OkavangoError::ValueColumn { .. }
                | OkavangoError::MissingCodeField { .. }
                | OkavangoError::Csv(_)
                | OkavangoError::Shapefile(_)
        )
    }
}
