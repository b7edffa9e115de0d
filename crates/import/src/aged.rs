use backoffice_core::{Table, Value};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::parse::coerce_amount;
use crate::repair::{ColumnRepair, RepairReport, RepairRule};

/// Column layout of an aged-payables sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgedLayout {
    pub date_column: String,
    pub reference_column: String,
    pub supplier_id_column: String,
    pub supplier_name_column: String,
    pub numeric_columns: Vec<String>,
}

impl Default for AgedLayout {
    fn default() -> Self {
        Self {
            date_column: "Transaction Date".to_string(),
            reference_column: "Transaction Reference".to_string(),
            supplier_id_column: "Supplier ID".to_string(),
            supplier_name_column: "Supplier Name".to_string(),
            numeric_columns: [
                "Total", "30 days", "60 days", "90 days", "120 days", "150 days", "180 days",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// What normalization did to one sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgedSheetReport {
    pub total_rows_dropped: usize,
    pub date_repair: Option<RepairReport>,
    pub reference_repair: Option<RepairReport>,
    /// Expected numeric columns the sheet did not have.
    pub missing_numeric: Vec<String>,
}

impl AgedSheetReport {
    pub fn looks_misaligned(&self) -> bool {
        self.date_repair.is_some_and(|r| r.looks_misaligned())
            || self.reference_repair.is_some_and(|r| r.looks_misaligned())
    }
}

fn mentions_total(value: &Value) -> bool {
    value.to_string().to_lowercase().contains("total")
}

/// Cleans one aged-payables sheet in place:
///
/// 1. numeric columns coerced (non-numeric cells become empty);
/// 2. subtotal rows dropped (either key column mentions "total");
/// 3. supplier IDs pulled out of the date column and supplier names out of
///    the reference column.
pub fn normalize_aged_sheet(
    table: &mut Table,
    layout: &AgedLayout,
) -> Result<AgedSheetReport, ImportError> {
    let mut report = AgedSheetReport {
        missing_numeric: table.missing_columns(&layout.numeric_columns),
        ..AgedSheetReport::default()
    };

    for column in &layout.numeric_columns {
        if table.has_column(column) {
            table.map_column(column, |v| coerce_amount(v).map(Value::Number).unwrap_or_default())?;
        }
    }

    if table.has_column(&layout.date_column) && table.has_column(&layout.reference_column) {
        let date = table.column_index(&layout.date_column)?;
        let reference = table.column_index(&layout.reference_column)?;
        let before = table.len();
        table.retain_rows(|row| !mentions_total(row.get(date)) && !mentions_total(row.get(reference)));
        report.total_rows_dropped = before - table.len();
    }

    if table.has_column(&layout.date_column) {
        let repair = ColumnRepair::new(&layout.date_column, &layout.supplier_id_column, RepairRule::Date);
        report.date_repair = Some(repair.apply(table)?);
    }

    if table.has_column(&layout.reference_column) {
        let repair = ColumnRepair::new(
            &layout.reference_column,
            &layout.supplier_name_column,
            RepairRule::Reference,
        );
        report.reference_repair = Some(repair.apply(table)?);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn t(s: &str) -> Value {
        Value::text(s)
    }

    fn n(v: i64) -> Value {
        Value::Number(Decimal::from(v))
    }

    fn sheet() -> Table {
        Table::with_rows(
            ["Transaction Date", "Transaction Reference", "Total", "30 days"],
            vec![
                vec![t("S001"), t("Acme Supplies"), Value::Empty, Value::Empty],
                vec![t("2024-01-15"), t("INV-1"), n(100), t("n/a")],
                vec![t("2024-02-03"), t("INV-2"), t("50"), n(50)],
                vec![t("Total S001"), Value::Empty, n(150), n(50)],
                vec![t("S002"), t("Bolt & Nut Co"), Value::Empty, Value::Empty],
                vec![t("2024-02-10"), t("INV-9"), n(20), Value::Empty],
                vec![Value::Empty, t("Grand TOTAL"), n(170), Value::Empty],
            ],
        )
    }

    #[test]
    fn normalizes_sheet() {
        let mut table = sheet();
        let report = normalize_aged_sheet(&mut table, &AgedLayout::default()).unwrap();

        assert_eq!(report.total_rows_dropped, 2);
        assert_eq!(table.len(), 5);
        assert_eq!(report.missing_numeric.len(), 5);
        assert!(!report.looks_misaligned());

        assert_eq!(table.value(0, "Supplier ID").unwrap(), &t("S001"));
        assert_eq!(table.value(0, "Supplier Name").unwrap(), &t("Acme Supplies"));
        assert_eq!(
            table.value(1, "Transaction Date").unwrap(),
            &Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert!(table.value(1, "30 days").unwrap().is_empty());
        assert_eq!(table.value(2, "Total").unwrap(), &n(50));
    }

    #[test]
    fn sheet_without_key_columns_is_left_alone() {
        let mut table = Table::with_rows(["Total"], vec![vec![t("5")]]);
        let report = normalize_aged_sheet(&mut table, &AgedLayout::default()).unwrap();
        assert_eq!(report.date_repair, None);
        assert_eq!(table.value(0, "Total").unwrap(), &n(5));
    }
}
