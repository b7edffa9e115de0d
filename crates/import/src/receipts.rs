use backoffice_core::{Table, Value, YearMonth};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::parse::parse_date;

/// Layout of a purchasing-system receipt-detail export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptLayout {
    /// Rows of report preamble above the header.
    pub skip_rows: usize,
    /// Header renames applied before the column check, `(from, to)`.
    pub renames: Vec<(String, String)>,
    /// Columns kept, in output order. Any absent one rejects the file.
    pub columns: Vec<String>,
    pub date_column: String,
}

impl Default for ReceiptLayout {
    fn default() -> Self {
        let columns = [
            "收货日期",
            "订单号",
            "商品名称",
            "实收数量",
            "基本单位",
            "单价(结算)",
            "小计金额(结算)",
            "税额(结算)",
            "小计价税(结算)",
            "部门",
            "税率",
            "供应商/备用金报销账户",
        ];
        Self {
            skip_rows: 28,
            renames: vec![("单位".to_string(), "基本单位".to_string())],
            columns: columns.iter().map(|c| c.to_string()).collect(),
            date_column: "收货日期".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Receipts {
    pub table: Table,
    /// Year-month of the earliest receipt date.
    pub period: YearMonth,
}

/// Normalizes a raw receipt export: renames, column check, reorder, blank
/// rows dropped, receipt dates parsed (unparseable dates become empty).
pub fn prepare_receipts(mut raw: Table, layout: &ReceiptLayout) -> Result<Receipts, ImportError> {
    for (from, to) in &layout.renames {
        if raw.has_column(from) && !raw.has_column(to) {
            raw.rename_column(from, to)?;
        }
    }
    raw.require_columns(&layout.columns)?;

    let order: Vec<&str> = layout.columns.iter().map(String::as_str).collect();
    let mut table = raw.reindex(&order);
    table.retain_rows(|row| !row.is_blank());
    table.map_column(&layout.date_column, |v| {
        parse_date(v).map(Value::Date).unwrap_or_default()
    })?;

    let period = table
        .column_values(&layout.date_column)?
        .filter_map(Value::as_date)
        .min()
        .map(YearMonth::from_date)
        .ok_or_else(|| ImportError::NoDates(layout.date_column.clone()))?;

    tracing::debug!(rows = table.len(), %period, "prepared receipts");
    Ok(Receipts { table, period })
}
