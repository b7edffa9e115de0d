pub mod aggregate;
pub mod error;
pub mod paths;
pub mod statement;
pub mod xlsx;

pub use aggregate::{aggregate, aging_sheet, AgingPivot, AgingSpec, ColumnTotals, PivotRow, TOTAL_COLUMN, ZERO_PLACEHOLDER};
pub use error::ExportError;
pub use paths::{archive_destination, archive_file, sanitize_component, unique_path};
pub use statement::{format_rate, split_statements, statement_sheet, SplitOutcome, SplitSpec, SplitWarning, StatementGroup};
pub use xlsx::{write_workbook, Hint, PrintSetup, SheetLayout, SheetOutput, StyleHint};
