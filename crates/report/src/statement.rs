use backoffice_core::{Money, Table, TableError, Value, YearMonth};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::paths::sanitize_component;
use crate::xlsx::{Hint, PrintSetup, SheetOutput};

/// How a receipt table is split into per-supplier statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSpec {
    pub account_column: String,
    pub rate_column: String,
    /// Stable sort keys applied before grouping, when all are present.
    pub sort_columns: Vec<String>,
    /// Columns summed into the subtotal footer.
    pub measure_columns: Vec<String>,
    /// Column that carries the subtotal label.
    pub label_column: String,
    pub subtotal_label: String,
}

impl Default for SplitSpec {
    fn default() -> Self {
        Self {
            account_column: "供应商/备用金报销账户".to_string(),
            rate_column: "税率".to_string(),
            sort_columns: vec!["收货日期".to_string(), "部门".to_string(), "订单号".to_string()],
            measure_columns: vec![
                "小计金额(结算)".to_string(),
                "税额(结算)".to_string(),
                "小计价税(结算)".to_string(),
            ],
            label_column: "单价(结算)".to_string(),
            subtotal_label: "合计".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitWarning {
    /// Rows kept in source order because these sort columns are absent.
    MissingSortColumns(Vec<String>),
    /// Rows left out because their account or rate was empty.
    UngroupedRows(usize),
    /// A subtotal left blank because the column sum overflowed.
    SubtotalOverflow { account: String, column: String },
}

impl fmt::Display for SplitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitWarning::MissingSortColumns(cols) => {
                write!(f, "sort columns missing ({}), rows kept in source order", cols.join(", "))
            }
            SplitWarning::UngroupedRows(n) => write!(f, "{n} rows without account or rate left out"),
            SplitWarning::SubtotalOverflow { account, column } => {
                write!(f, "{account}: {column} total is out of range, subtotal left blank")
            }
        }
    }
}

/// One (account, rate) statement.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementGroup {
    pub account: Value,
    pub rate: Value,
    /// Group rows, rate column rendered as a percentage.
    pub table: Table,
    /// `(column, amount)` rounded half-up to two decimals.
    pub subtotals: Vec<(String, Money)>,
}

#[derive(Debug, Clone, Default)]
pub struct SplitOutcome {
    pub groups: Vec<StatementGroup>,
    pub warnings: Vec<SplitWarning>,
}

/// Rate as a whole-number percentage, truncated: `0.13 -> "13%"`. Empty
/// rates read `0%`; text that is not numeric, or a number too large to be a
/// percentage, is kept as it is.
pub fn format_rate(rate: &Value) -> String {
    match rate {
        Value::Empty => "0%".to_string(),
        other => match other
            .to_decimal()
            .and_then(|d| d.checked_mul(Decimal::ONE_HUNDRED))
            .and_then(|pct| pct.trunc().to_i64())
        {
            Some(pct) => format!("{pct}%"),
            None => other.to_string(),
        },
    }
}

impl StatementGroup {
    pub fn rate_label(&self) -> String {
        format_rate(&self.rate)
    }

    /// `<YYYY-MM>_<account>_<rate>.xlsx`
    pub fn file_name(&self, period: YearMonth) -> String {
        format!(
            "{}_{}_{}.xlsx",
            period,
            sanitize_component(&self.account.to_string(), &[' ', '.']),
            sanitize_component(&self.rate_label(), &[' ', '%'])
        )
    }

    /// The footer row: label under `label_column`, formatted subtotals under
    /// their measure columns.
    pub fn footer_row(&self, spec: &SplitSpec) -> Vec<Value> {
        let columns = self.table.columns();
        let mut row = vec![Value::Empty; columns.len()];
        for (i, name) in columns.iter().enumerate() {
            if *name == spec.label_column {
                row[i] = Value::text(spec.subtotal_label.as_str());
            } else if let Some((_, amount)) = self.subtotals.iter().find(|(c, _)| c == name) {
                row[i] = Value::text(amount.to_string());
            }
        }
        row
    }
}

/// Groups rows by (account, rate).
///
/// Groups come out in ascending (account, rate) order. Rows inside a group
/// keep table order, after a stable sort on `sort_columns` when they are all
/// present.
pub fn split_statements(table: &Table, spec: &SplitSpec) -> Result<SplitOutcome, TableError> {
    table.require_columns(&[spec.account_column.as_str(), spec.rate_column.as_str()])?;
    table.require_columns(&spec.measure_columns)?;

    let mut outcome = SplitOutcome::default();
    let mut sorted = table.clone();
    let missing_sort = table.missing_columns(&spec.sort_columns);
    if missing_sort.is_empty() {
        sorted.sort_by_columns(&spec.sort_columns)?;
    } else {
        outcome.warnings.push(SplitWarning::MissingSortColumns(missing_sort));
    }

    let account = sorted.column_index(&spec.account_column)?;
    let rate = sorted.column_index(&spec.rate_column)?;

    let mut keyed: Vec<((Value, Value), Vec<usize>)> = Vec::new();
    let mut ungrouped = 0;
    for (idx, row) in sorted.rows().iter().enumerate() {
        let key = (row.get(account).clone(), row.get(rate).clone());
        if key.0.is_empty() || key.1.is_empty() {
            ungrouped += 1;
            continue;
        }
        match keyed.iter_mut().find(|(k, _)| *k == key) {
            Some((_, rows)) => rows.push(idx),
            None => keyed.push((key, vec![idx])),
        }
    }
    if ungrouped > 0 {
        outcome.warnings.push(SplitWarning::UngroupedRows(ungrouped));
    }
    keyed.sort_by(|(a, _), (b, _)| a.0.sort_cmp(&b.0).then_with(|| a.1.sort_cmp(&b.1)));

    for ((account_value, rate_value), indices) in keyed {
        let mut group = sorted.take_rows(&indices);
        let mut subtotals = Vec::with_capacity(spec.measure_columns.len());
        for c in &spec.measure_columns {
            let sum = group
                .column_values(c)?
                .filter_map(Value::to_decimal)
                .try_fold(Decimal::ZERO, |acc, d| acc.checked_add(d));
            match sum {
                Some(sum) => subtotals.push((c.clone(), Money::from_decimal(sum))),
                None => outcome.warnings.push(SplitWarning::SubtotalOverflow {
                    account: account_value.to_string(),
                    column: c.clone(),
                }),
            }
        }
        group.map_column(&spec.rate_column, |v| Value::text(format_rate(v)))?;

        outcome.groups.push(StatementGroup {
            account: account_value,
            rate: rate_value,
            table: group,
            subtotals,
        });
    }

    Ok(outcome)
}

/// Statement sheet: optional letterhead block, header (repeated on every
/// printed page), group rows and the subtotal footer.
pub fn statement_sheet(group: &StatementGroup, spec: &SplitSpec, letterhead: &[Vec<Value>]) -> SheetOutput {
    let mut sheet = SheetOutput::new("Statement");
    for row in letterhead {
        sheet.push_row(row.clone(), Some(Hint::Letterhead));
    }
    let header = sheet.push_table(&group.table, Hint::Header, Hint::Centered);
    sheet.push_row(group.footer_row(spec), Some(Hint::Subtotal));

    let layout = &mut sheet.layout;
    layout.auto_width = Some((header, 8.0));
    layout.freeze = Some((header + 1, 0));
    layout.print = Some(PrintSetup {
        repeat_row: Some(header),
        margins: Some([0.2, 0.0, 0.25, 1.05, 0.0, 0.5]),
        ..PrintSetup::default()
    });
    sheet
}
