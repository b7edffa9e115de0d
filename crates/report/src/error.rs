use backoffice_core::TableError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Workbook write failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(#[from] TableError),
    #[error("Amount out of range: {0}")]
    AmountOverflow(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
