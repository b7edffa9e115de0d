pub mod aged;
pub mod error;
pub mod ledger;
pub mod match_engine;
pub mod parse;
pub mod receipts;
pub mod repair;
pub mod workbook;

pub use aged::{normalize_aged_sheet, AgedLayout, AgedSheetReport};
pub use error::ImportError;
pub use ledger::{clean_bank, clean_gl, BankEntry, BankLayout, Direction, GlLayout, LedgerEntry};
pub use match_engine::{
    FirstAvailable, MatchPair, MatchableEntry, NearestDate, ReconcileEngine, ReconcileSummary,
    ReconciliationResult, TieBreak, TieBreakKind,
};
pub use receipts::{prepare_receipts, ReceiptLayout, Receipts};
pub use repair::{ColumnRepair, RepairReport, RepairRule};
pub use workbook::{read_rows, read_table, SheetSpec};
