use anyhow::Context;
use backoffice_core::Table;
use backoffice_import::{normalize_aged_sheet, read_table, ImportError, SheetSpec};
use backoffice_report::{aggregate, aging_sheet, unique_path, write_workbook};
use std::path::{Path, PathBuf};

use crate::config::AgingConfig;
use crate::inputs;
use crate::worker::Reporter;

#[derive(Debug, Clone, PartialEq)]
pub struct AgingOutcome {
    pub output: PathBuf,
    pub files_read: usize,
    pub files_skipped: usize,
    pub suppliers: usize,
    pub months: usize,
}

/// Reads every aged-payables workbook, pivots the combined transactions by
/// supplier and month, and writes `<YYYY-MM>_AP_Aging_Report.xlsx`.
///
/// `files` overrides discovery in the configured input folder.
pub fn run(cfg: &AgingConfig, files: &[PathBuf], log: &Reporter) -> anyhow::Result<AgingOutcome> {
    let files = if files.is_empty() {
        if !cfg.input_dir.is_dir() {
            return Err(ImportError::MissingInput(cfg.input_dir.clone()).into());
        }
        inputs::discover(&cfg.input_dir, &cfg.pattern)?
    } else {
        files.to_vec()
    };
    if files.is_empty() {
        anyhow::bail!("no workbooks matching {} in {}", cfg.pattern, cfg.input_dir.display());
    }
    log.info(format!("Aging report: {} workbook(s) to read", files.len()));

    let mut tables = Vec::new();
    let mut skipped = 0;
    for path in &files {
        match read_aged_workbook(path, cfg, log) {
            Ok(sheets) => tables.extend(sheets),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                skipped += 1;
                log.warn(format!("Skipping {}: {e}", path.display()));
            }
        }
    }
    if tables.is_empty() {
        anyhow::bail!("none of the {} workbook(s) could be read", files.len());
    }

    let combined = Table::concat(tables);
    let pivot = aggregate(&combined, &cfg.pivot).context("aggregating aged payables")?;
    let month = pivot
        .latest_month()
        .context("no dated transactions in the aged payables")?;

    let output = unique_path(&cfg.output_dir, &format!("{month}_AP_Aging_Report"), "xlsx");
    let generated_at = chrono::Local::now().naive_local();
    write_workbook(&output, &[aging_sheet(&pivot, &cfg.title, generated_at)])
        .with_context(|| format!("writing {}", output.display()))?;

    log.info(format!(
        "Wrote {} ({} suppliers, {} months)",
        output.display(),
        pivot.rows.len(),
        pivot.months.len()
    ));

    Ok(AgingOutcome {
        output,
        files_read: files.len() - skipped,
        files_skipped: skipped,
        suppliers: pivot.rows.len(),
        months: pivot.months.len(),
    })
}

fn read_aged_workbook(path: &Path, cfg: &AgingConfig, log: &Reporter) -> Result<Vec<Table>, ImportError> {
    let mut tables = Vec::with_capacity(cfg.sheets.len());
    for sheet in &cfg.sheets {
        let mut table = read_table(path, &SheetSpec::named(sheet, cfg.skip_rows))?;
        let report = normalize_aged_sheet(&mut table, &cfg.layout)?;

        if report.looks_misaligned() {
            log.warn(format!(
                "{} [{sheet}]: no dates or references parsed, is the header {} rows down?",
                path.display(),
                cfg.skip_rows
            ));
        }
        if !report.missing_numeric.is_empty() {
            log.warn(format!(
                "{} [{sheet}]: missing columns {}",
                path.display(),
                report.missing_numeric.join(", ")
            ));
        }
        tracing::debug!(dropped = report.total_rows_dropped, "subtotal rows removed");
        log.info(format!("Read {} rows from {} [{sheet}]", table.len(), path.display()));
        tables.push(table);
    }
    Ok(tables)
}
