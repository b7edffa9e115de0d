use backoffice_core::TableError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Input not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("Sheet '{sheet}' not found in {}", .path.display())]
    MissingSheet { path: PathBuf, sheet: String },
    #[error("Workbook has no sheets: {}", .0.display())]
    NoSheets(PathBuf),
    #[error("No valid dates in column '{0}'")]
    NoDates(String),
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(#[from] TableError),
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),
}

impl ImportError {
    /// Missing inputs abort the whole run; everything else only skips the
    /// file or group that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImportError::MissingInput(_) | ImportError::MissingSheet { .. } | ImportError::NoSheets(_)
        )
    }
}
