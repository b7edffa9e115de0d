use anyhow::Context;
use backoffice_core::Value;
use backoffice_import::{prepare_receipts, read_rows, read_table, ImportError, SheetSpec};
use backoffice_report::{archive_file, split_statements, statement_sheet, write_workbook};
use std::path::{Path, PathBuf};

use crate::config::StatementsConfig;
use crate::worker::Reporter;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementsOutcome {
    pub written: Vec<PathBuf>,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub archived: usize,
}

/// Splits each receipt export into per-supplier, per-rate statements under
/// `<output_dir>/<YYYY-MM>/`, then moves the export into the archive.
pub fn run(cfg: &StatementsConfig, files: &[PathBuf], log: &Reporter) -> anyhow::Result<StatementsOutcome> {
    if files.is_empty() {
        anyhow::bail!("no receipt files given");
    }
    let letterhead = load_letterhead(cfg, log);

    let mut outcome = StatementsOutcome::default();
    for path in files {
        if is_archived(cfg, path) {
            log.warn(format!("Skipping {}: already in the archive", path.display()));
            outcome.files_skipped += 1;
            continue;
        }
        log.info(format!("Processing {}", path.display()));
        let raw = match read_table(path, &SheetSpec::first(cfg.receipts.skip_rows)) {
            Ok(raw) => raw,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                log.warn(format!("Skipping {}: {e}", path.display()));
                outcome.files_skipped += 1;
                continue;
            }
        };
        let receipts = match prepare_receipts(raw, &cfg.receipts) {
            Ok(receipts) => receipts,
            Err(e) => {
                log.warn(format!("Skipping {}: {e}", path.display()));
                outcome.files_skipped += 1;
                continue;
            }
        };
        let split = match split_statements(&receipts.table, &cfg.split) {
            Ok(split) => split,
            Err(e) => {
                log.warn(format!("Skipping {}: {e}", path.display()));
                outcome.files_skipped += 1;
                continue;
            }
        };
        for warning in &split.warnings {
            log.warn(format!("{}: {warning}", path.display()));
        }

        let folder = cfg.output_dir.join(receipts.period.to_string());
        for group in &split.groups {
            let target = folder.join(group.file_name(receipts.period));
            write_workbook(&target, &[statement_sheet(group, &cfg.split, &letterhead)])
                .with_context(|| format!("writing {}", target.display()))?;
            log.info(format!(
                "Wrote {} ({} rows)",
                target.display(),
                group.table.len()
            ));
            outcome.written.push(target);
        }
        outcome.files_processed += 1;

        let now = chrono::Local::now().naive_local();
        match archive_file(path, &cfg.archive_dir, now) {
            Ok(dest) => {
                outcome.archived += 1;
                log.info(format!("Archived to {}", dest.display()));
            }
            Err(e) => log.warn(format!("Could not archive {}: {e}", path.display())),
        }
    }

    log.info(format!(
        "Statements: {} written from {} file(s), {} skipped",
        outcome.written.len(),
        outcome.files_processed,
        outcome.files_skipped
    ));
    Ok(outcome)
}

/// Leading rows of the letterhead workbook; none when it is absent or
/// unreadable.
fn load_letterhead(cfg: &StatementsConfig, log: &Reporter) -> Vec<Vec<Value>> {
    if !cfg.letterhead.is_file() {
        log.warn(format!(
            "Letterhead {} not found, statements get no header block",
            cfg.letterhead.display()
        ));
        return Vec::new();
    }
    match read_rows(&cfg.letterhead, None, cfg.letterhead_rows) {
        Ok(rows) => rows,
        Err(e) => {
            log.warn(format!("Letterhead {} unreadable: {e}", cfg.letterhead.display()));
            Vec::new()
        }
    }
}

/// Whether `path` is inside the archive folder already (re-running on
/// archived files would move them onto themselves).
pub fn is_archived(cfg: &StatementsConfig, path: &Path) -> bool {
    match (path.parent().map(Path::canonicalize), cfg.archive_dir.canonicalize()) {
        (Some(Ok(parent)), Ok(archive)) => parent == archive,
        _ => false,
    }
}
