//! Typed failures raised while loading and selecting incident data

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the loader and selection layer.
///
/// Everything else (polars, plotters, IO) travels through `anyhow`.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("dataset file '{}' does not exist", .0.display())]
    MissingFile(PathBuf),
    #[error("dataset is missing required column '{0}'")]
    MissingColumn(String),
    #[error("row {row}: missing value for required column '{column}'")]
    MissingValue { row: usize, column: String },
    #[error("'{0}' is not one of the configured region countries")]
    UnknownCountry(String),
    #[error("dataset contains no incidents for the configured region")]
    EmptyRegion,
}
