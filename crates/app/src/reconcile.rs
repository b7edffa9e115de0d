use anyhow::Context;
use backoffice_core::{Table, Value};
use backoffice_import::ledger::entries_table;
use backoffice_import::{
    clean_bank, clean_gl, read_table, BankEntry, ImportError, LedgerEntry, ReconcileEngine,
    ReconcileSummary, ReconciliationResult, SheetSpec,
};
use backoffice_report::{write_workbook, Hint, SheetOutput};
use std::path::{Path, PathBuf};

use crate::config::ReconcileConfig;
use crate::inputs;
use crate::worker::Reporter;

const MATCHED_HEADER: [&str; 12] = [
    "Date",
    "Payee",
    "Purpose",
    "Serial",
    "Direction",
    "Amount",
    "GL Reference",
    "",
    "Check with Bank",
    "Trans Date",
    "Description",
    "Base Amount",
];
const MATCHED_WIDTHS: [f64; 12] = [
    22.92, 42.26, 42.26, 13.46, 13.46, 13.46, 17.0, 1.0, 17.0, 22.92, 42.26, 13.46,
];
const SPACER_COLUMN: u16 = 7;

const UNMATCHED_GL_HEADER: [&str; 4] = ["Trans Date", "Description", "Base Amount", "Reference"];
const UNMATCHED_BANK_HEADER: [&str; 6] = ["Date", "Payee", "Purpose", "Direction", "Amount", "Serial"];

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub output: PathBuf,
    pub summary: ReconcileSummary,
}

fn locate(explicit: Option<&PathBuf>, dir: &Path, pattern: &str) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }
    inputs::first_match(dir, pattern)?.ok_or_else(|| ImportError::MissingInput(dir.join(pattern)).into())
}

/// Matches the bank export against the GL extract and writes the combined
/// workbook: matched pairs, both unmatched lists and the cleaned sources.
pub fn run(cfg: &ReconcileConfig, log: &Reporter) -> anyhow::Result<ReconcileOutcome> {
    let gl_path = locate(cfg.gl_file.as_ref(), &cfg.input_dir, &cfg.gl_pattern)?;
    let bank_path = locate(cfg.bank_file.as_ref(), &cfg.input_dir, &cfg.bank_pattern)?;
    log.info(format!("GL extract: {}", gl_path.display()));
    log.info(format!("Bank export: {}", bank_path.display()));

    let ledger = load_ledger(cfg, &gl_path, log)?;

    let raw_bank = read_table(&bank_path, &SheetSpec::first(cfg.bank_skip_rows))?;
    let (bank, missing) = clean_bank(&raw_bank, &cfg.bank);
    if !missing.is_empty() {
        log.warn(format!(
            "{}: missing columns {}, read as empty",
            bank_path.display(),
            missing.join(", ")
        ));
    }
    log.info(format!("{} GL lines, {} bank lines", ledger.len(), bank.len()));

    let bank_keys: Vec<_> = bank.iter().enumerate().map(|(i, e)| e.matchable(i)).collect();
    let ledger_keys: Vec<_> = ledger.iter().enumerate().map(|(i, e)| e.matchable(i)).collect();
    let result = ReconcileEngine::new(cfg.tie_break.strategy()).reconcile(&bank_keys, &ledger_keys);

    if let Some(days) = cfg.flag_gap_days {
        for pair in result.distant_matches(days) {
            log.warn(format!(
                "Bank line {} matched GL line {} ({}) with dates {} days apart",
                pair.bank_row + 1,
                pair.ledger_row + 1,
                pair.amount,
                pair.date_gap_days.unwrap_or_default()
            ));
        }
    }

    let sheets = [
        matched_sheet(&result, &bank, &ledger),
        unmatched_bank_sheet(&result, &bank),
        unmatched_gl_sheet(&result, &ledger),
        source_sheet(
            "GL Data",
            entries_table(&LedgerEntry::COLUMNS, &ledger, LedgerEntry::to_row),
        ),
        source_sheet(
            "Bank Data",
            entries_table(&BankEntry::COLUMNS, &bank, BankEntry::to_row),
        ),
    ];
    write_workbook(&cfg.output, &sheets).with_context(|| format!("writing {}", cfg.output.display()))?;

    let summary = result.summary();
    log.info(format!("Reconciliation: {summary}"));
    log.info(format!("Wrote {}", cfg.output.display()));
    Ok(ReconcileOutcome {
        output: cfg.output.clone(),
        summary,
    })
}

/// GL lines for the configured account. A bad extract leaves the ledger
/// side empty rather than aborting; a missing file or sheet does abort.
fn load_ledger(cfg: &ReconcileConfig, path: &Path, log: &Reporter) -> anyhow::Result<Vec<LedgerEntry>> {
    let spec = SheetSpec {
        sheet: Some(cfg.gl_sheet.clone()),
        skip_rows: cfg.gl_skip_rows,
        lowercase_headers: true,
    };
    let raw = read_table(path, &spec)?;
    match clean_gl(&raw, &cfg.gl) {
        Ok(Some(entries)) => Ok(entries),
        Ok(None) => {
            log.warn(format!(
                "{}: no '{}' column, reconciling against an empty ledger",
                path.display(),
                cfg.gl.account_column
            ));
            Ok(Vec::new())
        }
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            log.warn(format!("{}: {e}, reconciling against an empty ledger", path.display()));
            Ok(Vec::new())
        }
    }
}

fn header_row(names: &[&str]) -> Vec<Value> {
    names.iter().map(|n| Value::text(*n)).collect()
}

fn widths(values: &[f64]) -> Vec<(u16, f64)> {
    values.iter().enumerate().map(|(i, w)| (i as u16, *w)).collect()
}

fn matched_sheet(result: &ReconciliationResult, bank: &[BankEntry], ledger: &[LedgerEntry]) -> SheetOutput {
    let mut sheet = SheetOutput::new("Bank_OK");
    sheet.push_banner("Bank reconciliation matched", MATCHED_HEADER.len(), Hint::BannerOk);

    let header = sheet.push_row(header_row(&MATCHED_HEADER), Some(Hint::Header));
    sheet.hint_cell(header, SPACER_COLUMN, Hint::Spacer);
    for col in SPACER_COLUMN + 1..MATCHED_HEADER.len() as u16 {
        sheet.hint_cell(header, col, Hint::HeaderAlt);
    }

    for pair in &result.matches {
        let b = &bank[pair.bank_row];
        let l = &ledger[pair.ledger_row];
        let row = sheet.push_row(
            vec![
                b.date.clone(),
                Value::text(b.payee.as_str()),
                Value::text(b.purpose.as_str()),
                Value::text(b.serial.as_str()),
                Value::text(b.direction.to_string()),
                Value::Number(b.amount.amount()),
                Value::text(l.reference.as_str()),
                Value::Empty,
                Value::text(b.serial.as_str()),
                l.date.map(Value::Date).unwrap_or_default(),
                Value::text(l.description.as_str()),
                l.amount.map(|m| Value::Number(m.amount())).unwrap_or_default(),
            ],
            Some(Hint::Data),
        );
        sheet.hint_cell(row, SPACER_COLUMN, Hint::Spacer);
    }

    sheet.layout.column_widths = widths(&MATCHED_WIDTHS);
    sheet.layout.freeze = Some((header + 1, 0));
    sheet
}

fn unmatched_bank_sheet(result: &ReconciliationResult, bank: &[BankEntry]) -> SheetOutput {
    let mut sheet = SheetOutput::new("Unmatched_Bank_Data");
    sheet.push_banner("Unmatched bank data", UNMATCHED_BANK_HEADER.len(), Hint::BannerAttention);
    let header = sheet.push_row(header_row(&UNMATCHED_BANK_HEADER), Some(Hint::HeaderAlt));
    for &i in &result.unmatched_bank {
        let b = &bank[i];
        sheet.push_row(
            vec![
                b.date.clone(),
                Value::text(b.payee.as_str()),
                Value::text(b.purpose.as_str()),
                Value::text(b.direction.to_string()),
                Value::Number(b.amount.amount()),
                Value::text(b.serial.as_str()),
            ],
            Some(Hint::Data),
        );
    }
    sheet.layout.column_widths = widths(&[22.92, 42.26, 42.26, 13.46, 13.46, 17.0]);
    sheet.layout.freeze = Some((header + 1, 0));
    sheet
}

fn unmatched_gl_sheet(result: &ReconciliationResult, ledger: &[LedgerEntry]) -> SheetOutput {
    let mut sheet = SheetOutput::new("Unmatched_GL_Data");
    sheet.push_banner("Unmatched GL data", UNMATCHED_GL_HEADER.len(), Hint::BannerAttention);
    let header = sheet.push_row(header_row(&UNMATCHED_GL_HEADER), Some(Hint::HeaderAlt));
    for &i in &result.unmatched_ledger {
        let l = &ledger[i];
        sheet.push_row(
            vec![
                l.date.map(Value::Date).unwrap_or_default(),
                Value::text(l.description.as_str()),
                l.amount.map(|m| Value::Number(m.amount())).unwrap_or_default(),
                Value::text(l.reference.as_str()),
            ],
            Some(Hint::Data),
        );
    }
    sheet.layout.column_widths = widths(&[22.92, 42.26, 13.46, 17.0]);
    sheet.layout.freeze = Some((header + 1, 0));
    sheet
}

fn source_sheet(name: &str, table: Table) -> SheetOutput {
    let mut sheet = SheetOutput::new(name);
    sheet.push_table(&table, Hint::Header, Hint::Data);
    sheet.layout.default_width = Some(18.0);
    sheet.layout.hidden = true;
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, preamble, Cell, Cell::*};
    use backoffice_import::TieBreakKind;

    fn gl_rows() -> Vec<Vec<Cell>> {
        let mut rows = preamble(1);
        rows.push(vec![S("Account "), S("Journal Date"), S("User"), S("Line Description"), S("Base Amount")]);
        rows.push(vec![N(115307.0), S("2025-10-01"), S("JV-1"), S("Deposit A"), N(100.0)]);
        rows.push(vec![N(115307.0), S("2025-10-02"), S("JV-2"), S("Bank fee"), N(-50.0)]);
        rows.push(vec![N(999999.0), S("2025-10-02"), S("JV-X"), S("Other account"), N(100.0)]);
        rows.push(vec![N(115307.0), S("2025-10-03"), S("JV-3"), S("Deposit B"), N(100.0)]);
        rows.push(vec![N(115307.0), S("2025-10-04"), S("JV-4"), S("Lonely"), N(77.0)]);
        rows
    }

    fn bank_rows() -> Vec<Vec<Cell>> {
        let mut rows = preamble(8);
        rows.push(vec![
            S("交易日期[ Transaction Date ]"),
            S("收款人名称[ Payee's Name ]"),
            S("用途[ Purpose ]"),
            S("交易金额[ Trade Amount ]"),
            S("交易流水号[ Transaction reference number ]"),
        ]);
        rows.push(vec![S("20251001"), S("Client A"), S("deposit"), N(100.0), S("S1")]);
        rows.push(vec![S("20251005"), S("Client B"), S("deposit"), N(100.0), S("S2")]);
        rows.push(vec![S("20251002"), Blank, S("fee"), N(-50.0), S("S3")]);
        rows.push(vec![S("20251006"), S("X"), S("unknown"), N(12.5), S("S4")]);
        rows
    }

    fn seed(dir: &Path) -> ReconcileConfig {
        fixtures::write_workbook(&dir.join("gl_october.xlsx"), &[("sheet1", gl_rows())]);
        fixtures::write_workbook(&dir.join("bank_october.xlsx"), &[("Sheet1", bank_rows())]);
        ReconcileConfig {
            input_dir: dir.to_path_buf(),
            bank_pattern: "bank*.xlsx".to_string(),
            output: dir.join("Combined_Data.xlsx"),
            ..ReconcileConfig::default()
        }
    }

    #[test]
    fn writes_matched_and_unmatched_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = seed(dir.path());

        let outcome = run(&cfg, &Reporter::Tracing).unwrap();
        assert_eq!(outcome.summary.matched, 3);
        assert_eq!(outcome.summary.unmatched_bank, 1);
        assert_eq!(outcome.summary.unmatched_ledger, 1);

        assert_eq!(
            fixtures::sheet_names(&outcome.output),
            vec!["Bank_OK", "Unmatched_Bank_Data", "Unmatched_GL_Data", "GL Data", "Bank Data"]
        );

        let ok = fixtures::read_sheet(&outcome.output, "Bank_OK");
        assert_eq!(ok[0][0], "Bank reconciliation matched");
        assert_eq!(ok[1][8], "Check with Bank");
        assert_eq!(
            ok[2],
            vec![
                "2025-10-01", "Client A", "deposit", "S1", "Receipt", "100", "JV-1", "", "S1",
                "2025-10-01", "Deposit A", "100"
            ]
        );
        // second 100 receipt takes the next unconsumed 100 in ledger order
        assert_eq!(ok[3][6], "JV-3");
        assert_eq!(ok[4][6], "JV-2");
        assert_eq!(ok[4][4], "Payment");

        let bank = fixtures::read_sheet(&outcome.output, "Unmatched_Bank_Data");
        assert_eq!(bank[0][0], "Unmatched bank data");
        assert_eq!(bank[2], vec!["2025-10-06", "X", "unknown", "Receipt", "12.5", "S4"]);

        let gl = fixtures::read_sheet(&outcome.output, "Unmatched_GL_Data");
        assert_eq!(gl[2], vec!["2025-10-04", "Lonely", "77", "JV-4"]);
    }

    #[test]
    fn nearest_date_can_be_configured() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ReconcileConfig {
            tie_break: TieBreakKind::NearestDate,
            ..seed(dir.path())
        };
        let outcome = run(&cfg, &Reporter::Tracing).unwrap();
        assert_eq!(outcome.summary.matched, 3);
    }

    #[test]
    fn extract_without_account_column_reconciles_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ReconcileConfig {
            gl: backoffice_import::GlLayout {
                account_column: "ledger account".to_string(),
                ..Default::default()
            },
            ..seed(dir.path())
        };
        let outcome = run(&cfg, &Reporter::Tracing).unwrap();
        assert_eq!(outcome.summary.matched, 0);
        assert_eq!(outcome.summary.unmatched_bank, 4);
        assert_eq!(outcome.summary.unmatched_ledger, 0);
    }

    #[test]
    fn missing_bank_export_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ReconcileConfig {
            bank_pattern: "statement*.xlsx".to_string(),
            ..seed(dir.path())
        };
        let err = run(&cfg, &Reporter::Tracing).unwrap_err();
        assert!(matches!(err.downcast_ref::<ImportError>(), Some(ImportError::MissingInput(_))));
        assert!(!cfg.output.exists());
    }
}
