use backoffice_core::{Table, Value, YearMonth};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::ExportError;
use crate::xlsx::{Hint, SheetOutput};

/// Shown instead of a zero amount in the month columns.
pub const ZERO_PLACEHOLDER: &str = "-";
pub const TOTAL_COLUMN: &str = "Total_Sum";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgingSpec {
    /// Entity key, forward-filled before grouping.
    pub key_columns: Vec<String>,
    pub date_column: String,
    pub measure_column: String,
}

impl Default for AgingSpec {
    fn default() -> Self {
        Self {
            key_columns: vec!["Supplier ID".to_string(), "Supplier Name".to_string()],
            date_column: "Transaction Date".to_string(),
            measure_column: "Total".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub key: Vec<Value>,
    /// One amount per month, aligned with [`AgingPivot::months`].
    pub cells: Vec<Decimal>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTotals {
    pub months: Vec<Decimal>,
    pub total: Decimal,
}

/// Entity × year-month amounts. Months run newest first; entities are in
/// ascending key order.
#[derive(Debug, Clone, PartialEq)]
pub struct AgingPivot {
    pub key_columns: Vec<String>,
    pub months: Vec<YearMonth>,
    pub rows: Vec<PivotRow>,
    totals: ColumnTotals,
}

/// Pivots `table` into entity rows by year-month.
///
/// Key columns are forward-filled on a copy first. Rows without a date or
/// with an empty key part are left out; measures that are not numeric count
/// as zero. Missing key, date or measure columns are an error, and so is a
/// sum that leaves the decimal range.
pub fn aggregate(table: &Table, spec: &AgingSpec) -> Result<AgingPivot, ExportError> {
    let mut filled = table.clone();
    filled.forward_fill(&spec.key_columns)?;

    let keys: Vec<usize> = spec
        .key_columns
        .iter()
        .map(|k| filled.column_index(k))
        .collect::<Result<_, _>>()?;
    let date = filled.column_index(&spec.date_column)?;
    let measure = filled.column_index(&spec.measure_column)?;

    // key text -> position in `groups`
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Value>, BTreeMap<YearMonth, Decimal>)> = Vec::new();
    let mut months = BTreeSet::new();
    let mut skipped = 0usize;

    for row in filled.rows() {
        let key: Vec<Value> = keys.iter().map(|&i| row.get(i).clone()).collect();
        let Some(day) = row.get(date).as_date() else {
            skipped += 1;
            continue;
        };
        if key.iter().any(Value::is_empty) {
            skipped += 1;
            continue;
        }
        let month = YearMonth::from_date(day);
        let amount = row.get(measure).to_decimal().unwrap_or_default();

        let text: Vec<String> = key.iter().map(ToString::to_string).collect();
        let at = *index.entry(text).or_insert_with(|| {
            groups.push((key.clone(), BTreeMap::new()));
            groups.len() - 1
        });
        let sum = groups[at].1.entry(month).or_default();
        *sum = sum
            .checked_add(amount)
            .ok_or_else(|| overflow(&key_label(&key), month))?;
        months.insert(month);
    }

    if skipped > 0 {
        tracing::debug!(skipped, "rows without date or key left out of the pivot");
    }

    groups.sort_by(|(a, _), (b, _)| {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.sort_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    let months: Vec<YearMonth> = months.into_iter().rev().collect();
    let rows = groups
        .into_iter()
        .map(|(key, by_month)| {
            let cells: Vec<Decimal> = months
                .iter()
                .map(|m| by_month.get(m).copied().unwrap_or_default())
                .collect();
            let total = checked_sum(cells.iter().copied())
                .ok_or_else(|| ExportError::AmountOverflow(format!("{} total", key_label(&key))))?;
            Ok(PivotRow { key, cells, total })
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    let totals = ColumnTotals {
        months: months
            .iter()
            .enumerate()
            .map(|(i, m)| {
                checked_sum(rows.iter().map(|r| r.cells[i])).ok_or_else(|| overflow("all suppliers", *m))
            })
            .collect::<Result<_, _>>()?,
        total: checked_sum(rows.iter().map(|r| r.total))
            .ok_or_else(|| ExportError::AmountOverflow("grand total".to_string()))?,
    };

    Ok(AgingPivot {
        key_columns: spec.key_columns.clone(),
        months,
        rows,
        totals,
    })
}

fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, d| acc.checked_add(d))
}

fn key_label(key: &[Value]) -> String {
    key.iter().map(ToString::to_string).collect::<Vec<_>>().join(" / ")
}

fn overflow(what: &str, month: YearMonth) -> ExportError {
    ExportError::AmountOverflow(format!("{what} {month}"))
}

impl AgingPivot {
    pub fn latest_month(&self) -> Option<YearMonth> {
        self.months.first().copied()
    }

    /// Per-month and grand totals over every entity.
    pub fn column_totals(&self) -> &ColumnTotals {
        &self.totals
    }

    /// Bucket label above month column `i` (0-based): `30 Days`, `60 Days`, ...
    pub fn bucket_labels(&self) -> Vec<String> {
        (1..=self.months.len()).map(|i| format!("{} Days", 30 * i)).collect()
    }

    pub fn header(&self) -> Vec<String> {
        self.key_columns
            .iter()
            .cloned()
            .chain(std::iter::once(TOTAL_COLUMN.to_string()))
            .chain(self.months.iter().map(ToString::to_string))
            .collect()
    }

    /// Keys, row total, then months newest first. Zero month amounts show as
    /// [`ZERO_PLACEHOLDER`]; the row total always stays numeric.
    pub fn to_display_table(&self) -> Table {
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut values = r.key.clone();
                values.push(Value::Number(r.total));
                values.extend(r.cells.iter().map(|c| {
                    if c.is_zero() {
                        Value::text(ZERO_PLACEHOLDER)
                    } else {
                        Value::Number(*c)
                    }
                }));
                values
            })
            .collect();
        Table::with_rows(self.header(), rows)
    }
}

/// Report sheet: a generation-stamp row with the bucket labels, the header,
/// a statistics row of column totals, then one row per entity.
pub fn aging_sheet(pivot: &AgingPivot, title: &str, generated_at: NaiveDateTime) -> SheetOutput {
    let keys = pivot.key_columns.len();
    let mut sheet = SheetOutput::new("Aggregated Data");

    let mut stamp = vec![Value::DateTime(generated_at), Value::text(title)];
    stamp.resize(keys + 1, Value::Empty);
    stamp.extend(pivot.bucket_labels().into_iter().map(Value::text));
    sheet.push_row(stamp, Some(Hint::Stats));

    let table = pivot.to_display_table();
    sheet.push_row(table.columns().iter().map(|c| Value::text(c.as_str())).collect(), Some(Hint::Header));

    let totals = pivot.column_totals();
    let mut stats = vec![Value::text("Total")];
    stats.resize(keys, Value::Empty);
    stats.push(Value::Number(totals.total));
    stats.extend(totals.months.iter().copied().map(Value::Number));
    sheet.push_row(stats, Some(Hint::Stats));

    for row in table.rows() {
        sheet.push_row(row.values().to_vec(), Some(Hint::Data));
    }

    let layout = &mut sheet.layout;
    layout.column_widths = vec![(0, 19.0), (1, 40.0)];
    layout.default_width = Some(20.0);
    layout.row_height = Some(22.5);
    layout.freeze = Some((3, 0));
    layout.hide_gridlines = true;
    sheet
}
