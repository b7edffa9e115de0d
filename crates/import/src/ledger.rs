use backoffice_core::{Money, Table, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ImportError;
use crate::match_engine::MatchableEntry;
use crate::parse::{coerce_amount, parse_compact_date, parse_date};

// ── General ledger extract ───────────────────────────────────────────────────

/// Column names of a GL journal extract. Headers are matched after being
/// trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlLayout {
    pub account_column: String,
    /// Only journal lines posted to this account are reconciled.
    pub account: String,
    pub date_column: String,
    pub reference_column: String,
    pub description_column: String,
    pub amount_column: String,
}

impl Default for GlLayout {
    fn default() -> Self {
        Self {
            account_column: "account".to_string(),
            account: "115307".to_string(),
            date_column: "journal date".to_string(),
            reference_column: "user".to_string(),
            description_column: "line description".to_string(),
            amount_column: "base amount".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub date: Option<NaiveDate>,
    pub reference: String,
    pub description: String,
    /// `None` when the cell was not numeric; such lines never match.
    pub amount: Option<Money>,
}

impl LedgerEntry {
    pub const COLUMNS: [&'static str; 4] = ["Date", "Reference", "Description", "Base Amount"];

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            self.date.map(Value::Date).unwrap_or_default(),
            Value::text(self.reference.as_str()),
            Value::text(self.description.as_str()),
            self.amount.map(|m| Value::Number(m.amount())).unwrap_or_default(),
        ]
    }

    pub fn matchable(&self, row: usize) -> MatchableEntry {
        MatchableEntry {
            row,
            date: self.date,
            amount: self.amount,
        }
    }
}

/// Extracts the configured account's journal lines.
///
/// Returns `Ok(None)` when the extract has no account column at all (the
/// caller logs and reconciles against nothing); a missing mapped column is a
/// schema mismatch.
pub fn clean_gl(table: &Table, layout: &GlLayout) -> Result<Option<Vec<LedgerEntry>>, ImportError> {
    if !table.has_column(&layout.account_column) {
        return Ok(None);
    }
    table.require_columns(&[
        layout.date_column.as_str(),
        layout.reference_column.as_str(),
        layout.description_column.as_str(),
        layout.amount_column.as_str(),
    ])?;

    let account = table.column_index(&layout.account_column)?;
    let date = table.column_index(&layout.date_column)?;
    let reference = table.column_index(&layout.reference_column)?;
    let description = table.column_index(&layout.description_column)?;
    let amount = table.column_index(&layout.amount_column)?;

    let entries = table
        .rows()
        .iter()
        .filter(|row| row.get(account).to_string().trim() == layout.account)
        .map(|row| LedgerEntry {
            date: parse_date(row.get(date)).ok(),
            reference: row.get(reference).to_string(),
            description: row.get(description).to_string(),
            amount: coerce_amount(row.get(amount)).map(Money::from_decimal),
        })
        .collect();

    Ok(Some(entries))
}

// ── Bank statement export ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankLayout {
    pub date_column: String,
    pub payee_column: String,
    pub purpose_column: String,
    pub amount_column: String,
    pub serial_column: String,
    /// Substituted for blank payee names (the account holder's own transfers
    /// come through without one).
    pub default_payee: Option<String>,
}

impl Default for BankLayout {
    fn default() -> Self {
        Self {
            date_column: "交易日期[ Transaction Date ]".to_string(),
            payee_column: "收款人名称[ Payee's Name ]".to_string(),
            purpose_column: "用途[ Purpose ]".to_string(),
            amount_column: "交易金额[ Trade Amount ]".to_string(),
            serial_column: "交易流水号[ Transaction reference number ]".to_string(),
            default_payee: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Receipt,
    Payment,
    None,
}

impl Direction {
    pub fn of(amount: Money) -> Self {
        if amount.is_positive() {
            Direction::Receipt
        } else if amount.is_negative() {
            Direction::Payment
        } else {
            Direction::None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Receipt => write!(f, "Receipt"),
            Direction::Payment => write!(f, "Payment"),
            Direction::None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankEntry {
    /// A `Date` when the export's date parsed, otherwise the raw cell.
    pub date: Value,
    pub payee: String,
    pub purpose: String,
    pub amount: Money,
    pub direction: Direction,
    pub serial: String,
}

impl BankEntry {
    pub const COLUMNS: [&'static str; 6] = ["Date", "Payee", "Purpose", "Amount", "Direction", "Serial"];

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            self.date.clone(),
            Value::text(self.payee.as_str()),
            Value::text(self.purpose.as_str()),
            Value::Number(self.amount.amount()),
            Value::text(self.direction.to_string()),
            Value::text(self.serial.as_str()),
        ]
    }

    pub fn matchable(&self, row: usize) -> MatchableEntry {
        MatchableEntry {
            row,
            date: self.date.as_date(),
            amount: Some(self.amount),
        }
    }
}

fn bank_date(value: &Value) -> Value {
    match value {
        Value::Date(_) => value.clone(),
        Value::DateTime(dt) => Value::Date(dt.date()),
        other => parse_compact_date(&other.to_string())
            .map(Value::Date)
            .unwrap_or_else(|| other.clone()),
    }
}

/// Reshapes a bank export into [`BankEntry`] rows.
///
/// Returns the entries plus the expected columns that were absent; absent
/// columns read as empty (amount as zero) so a renamed header shows up as a
/// warning rather than a failed run.
pub fn clean_bank(table: &Table, layout: &BankLayout) -> (Vec<BankEntry>, Vec<String>) {
    let missing = table.missing_columns(&[
        layout.date_column.as_str(),
        layout.payee_column.as_str(),
        layout.purpose_column.as_str(),
        layout.amount_column.as_str(),
        layout.serial_column.as_str(),
    ]);

    let entries = (0..table.len())
        .map(|i| {
            let payee = table.value_or_empty(i, &layout.payee_column).to_string();
            let payee = match (&layout.default_payee, payee.trim().is_empty()) {
                (Some(default), true) => default.clone(),
                _ => payee,
            };
            let amount = coerce_amount(table.value_or_empty(i, &layout.amount_column))
                .map(Money::from_decimal)
                .unwrap_or_else(Money::zero);
            BankEntry {
                date: bank_date(table.value_or_empty(i, &layout.date_column)),
                payee,
                purpose: table.value_or_empty(i, &layout.purpose_column).to_string(),
                amount,
                direction: Direction::of(amount),
                serial: table.value_or_empty(i, &layout.serial_column).to_string(),
            }
        })
        .collect();

    (entries, missing)
}

/// Renders entries back into a table (for the hidden source sheets).
pub fn entries_table<E>(columns: &[&str], entries: &[E], to_row: impl Fn(&E) -> Vec<Value>) -> Table {
    Table::with_rows(columns.iter().copied(), entries.iter().map(to_row).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn t(s: &str) -> Value {
        Value::text(s)
    }

    fn n(v: i64) -> Value {
        Value::Number(Decimal::from(v))
    }

    fn gl_table() -> Table {
        Table::with_rows(
            ["account", "journal date", "user", "line description", "base amount", "period"],
            vec![
                vec![n(115307), t("2024-03-01"), t("jdoe"), t("Deposit"), n(100), t("P3")],
                vec![t(" 115307 "), t("2024-03-02"), t("jdoe"), t("Fee"), t("-5.5"), t("P3")],
                vec![n(200100), t("2024-03-02"), t("asmith"), t("Other"), n(7), t("P3")],
                vec![n(115307), t("bad date"), t("jdoe"), t("Odd"), t("n/a"), t("P3")],
            ],
        )
    }

    #[test]
    fn gl_keeps_only_configured_account() {
        let entries = clean_gl(&gl_table(), &GlLayout::default()).unwrap().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].amount, Some(Money::from_cents(10000)));
        assert_eq!(entries[1].amount, Some(Money::from_cents(-550)));
        assert_eq!(entries[0].reference, "jdoe");
        assert_eq!(entries[2].date, None);
        assert_eq!(entries[2].amount, None);
    }

    #[test]
    fn gl_without_account_column_is_none() {
        let table = Table::new(["journal date"]);
        assert!(clean_gl(&table, &GlLayout::default()).unwrap().is_none());
    }

    #[test]
    fn gl_missing_mapped_column_is_schema_mismatch() {
        let table = Table::new(["account", "journal date"]);
        let err = clean_gl(&table, &GlLayout::default()).unwrap_err();
        assert!(matches!(err, ImportError::SchemaMismatch(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn bank_rows_are_reshaped() {
        let layout = BankLayout {
            default_payee: Some("Own account".to_string()),
            ..BankLayout::default()
        };
        let table = Table::with_rows(
            [
                layout.date_column.as_str(),
                layout.payee_column.as_str(),
                layout.purpose_column.as_str(),
                layout.amount_column.as_str(),
                layout.serial_column.as_str(),
            ],
            vec![
                vec![t("20240301"), t("Acme"), t("Invoice 7"), n(100), n(900001)],
                vec![n(20240302), Value::Empty, t("Transfer"), t("-50"), t("S-2")],
                vec![t("March"), t("Beta"), Value::Empty, Value::Empty, Value::Empty],
            ],
        );
        let (entries, missing) = clean_bank(&table, &layout);
        assert!(missing.is_empty());

        let d = |day| Value::Date(NaiveDate::from_ymd_opt(2024, 3, day).unwrap());
        assert_eq!(entries[0].date, d(1));
        assert_eq!(entries[0].direction, Direction::Receipt);
        assert_eq!(entries[0].serial, "900001");
        assert_eq!(entries[1].date, d(2));
        assert_eq!(entries[1].payee, "Own account");
        assert_eq!(entries[1].direction, Direction::Payment);
        assert_eq!(entries[2].date, t("March"));
        assert_eq!(entries[2].amount, Money::zero());
        assert_eq!(entries[2].direction, Direction::None);
    }

    #[test]
    fn bank_reports_missing_columns() {
        let table = Table::with_rows(["Amount"], vec![vec![n(1)]]);
        let (entries, missing) = clean_bank(&table, &BankLayout::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(missing.len(), 5);
    }

    #[test]
    fn entries_render_as_table() {
        let entries = clean_gl(&gl_table(), &GlLayout::default()).unwrap().unwrap();
        let table = entries_table(&LedgerEntry::COLUMNS, &entries, LedgerEntry::to_row);
        assert_eq!(table.columns(), LedgerEntry::COLUMNS);
        assert_eq!(table.len(), 3);
    }
}
