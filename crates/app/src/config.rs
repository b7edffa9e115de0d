use anyhow::Context;
use backoffice_import::{AgedLayout, BankLayout, GlLayout, ReceiptLayout, TieBreakKind};
use backoffice_report::{AgingSpec, SplitSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a run needs, built once and passed down explicitly. Every
/// field has a default, so an empty or missing file is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub aging: AgingConfig,
    pub reconcile: ReconcileConfig,
    pub statements: StatementsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgingConfig {
    pub input_dir: PathBuf,
    /// Glob, relative to `input_dir`, used when no files are named.
    pub pattern: String,
    pub output_dir: PathBuf,
    pub sheets: Vec<String>,
    pub skip_rows: usize,
    pub title: String,
    pub layout: AgedLayout,
    pub pivot: AgingSpec,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("import"),
            pattern: "*.xlsm".to_string(),
            output_dir: PathBuf::from("."),
            sheets: vec!["Aged Reports".to_string()],
            skip_rows: 2,
            title: "AP Aging Report by Suppliers".to_string(),
            layout: AgedLayout::default(),
            pivot: AgingSpec::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Folder searched with `gl_pattern` and `bank_pattern`.
    pub input_dir: PathBuf,
    /// Explicit GL extract; otherwise the first match of `gl_pattern`.
    pub gl_file: Option<PathBuf>,
    pub gl_pattern: String,
    pub gl_sheet: String,
    pub gl_skip_rows: usize,
    pub bank_file: Option<PathBuf>,
    pub bank_pattern: String,
    pub bank_skip_rows: usize,
    pub output: PathBuf,
    pub tie_break: TieBreakKind,
    /// Matched pairs further apart than this many days are logged.
    pub flag_gap_days: Option<i64>,
    pub gl: GlLayout,
    pub bank: BankLayout,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            gl_file: None,
            gl_pattern: "gl*.xlsx".to_string(),
            gl_sheet: "sheet1".to_string(),
            gl_skip_rows: 1,
            bank_file: None,
            bank_pattern: "bank*.xls".to_string(),
            bank_skip_rows: 8,
            output: PathBuf::from("Combined_Data.xlsx"),
            tie_break: TieBreakKind::First,
            flag_gap_days: Some(31),
            gl: GlLayout::default(),
            bank: BankLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementsConfig {
    pub output_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub letterhead: PathBuf,
    pub letterhead_rows: usize,
    pub receipts: ReceiptLayout,
    pub split: SplitSpec,
}

impl Default for StatementsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("export"),
            archive_dir: PathBuf::from("archive"),
            letterhead: PathBuf::from("header.xlsx"),
            letterhead_rows: 5,
            receipts: ReceiptLayout::default(),
            split: SplitSpec::default(),
        }
    }
}

impl RunConfig {
    /// Reads `path` when given; defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
