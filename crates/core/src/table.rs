use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TableError {
    #[error("Missing column: {0}")]
    MissingColumn(String),
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Row {0} out of range")]
    RowOutOfRange(usize),
}

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Bool(bool),
}

static EMPTY: Value = Value::Empty;

impl Value {
    /// Text cell; blank strings become `Empty`.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            Value::Empty
        } else {
            Value::Text(s)
        }
    }

    /// Converts a spreadsheet float through its shortest round-trip text so
    /// that `10.005` is stored as exactly `10.005`.
    pub fn from_f64(n: f64) -> Self {
        if !n.is_finite() {
            return Value::Empty;
        }
        Decimal::from_str(&n.to_string())
            .map(Value::Number)
            .unwrap_or(Value::Empty)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    /// Numeric coercion: numbers as-is, numeric text parsed, everything else `None`.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => {
                let s = s.trim();
                Decimal::from_str(s)
                    .or_else(|_| Decimal::from_scientific(s))
                    .ok()
            }
            _ => None,
        }
    }

    fn sort_rank(&self) -> u8 {
        match self {
            Value::Number(_) => 0,
            Value::Date(_) | Value::DateTime(_) => 1,
            Value::Text(_) => 2,
            Value::Bool(_) => 3,
            Value::Empty => 4,
        }
    }

    /// Total order used for sorting rows: numbers, then dates, then text,
    /// then booleans; empty cells always last.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (a, b) if a.sort_rank() == 1 && b.sort_rank() == 1 => {
                let key = |v: &Value| match v {
                    Value::Date(d) => d.and_hms_opt(0, 0, 0).unwrap_or_default(),
                    Value::DateTime(dt) => *dt,
                    _ => NaiveDateTime::default(),
                };
                key(a).cmp(&key(b))
            }
            (a, b) => a.sort_rank().cmp(&b.sort_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n.normalize()),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Number(n)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// One row of a [`Table`]; cells are positional and line up with the
/// table's column list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Row { values }
    }

    pub fn get(&self, idx: usize) -> &Value {
        self.values.get(idx).unwrap_or(&EMPTY)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(Value::is_empty)
    }

    fn set(&mut self, idx: usize, value: Value) {
        if idx >= self.values.len() {
            self.values.resize(idx + 1, Value::Empty);
        }
        self.values[idx] = value;
    }
}

/// An in-memory sheet region: a header plus rows.
///
/// Columns are looked up by exact name. Lookups of absent columns return
/// [`TableError::MissingColumn`] rather than a silent empty value; callers
/// that want the lenient behaviour ask for it with [`Table::value_or_empty`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Names from `expected` that this table lacks, in the order given.
    pub fn missing_columns<S: AsRef<str>>(&self, expected: &[S]) -> Vec<String> {
        expected
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|name| !self.has_column(name))
            .map(str::to_string)
            .collect()
    }

    pub fn require_columns<S: AsRef<str>>(&self, expected: &[S]) -> Result<(), TableError> {
        let missing = self.missing_columns(expected);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TableError::MissingColumns(missing))
        }
    }

    pub fn value(&self, row: usize, column: &str) -> Result<&Value, TableError> {
        let col = self.column_index(column)?;
        let row = self.rows.get(row).ok_or(TableError::RowOutOfRange(row))?;
        Ok(row.get(col))
    }

    /// Lenient lookup: absent columns and rows read as `Empty`.
    pub fn value_or_empty(&self, row: usize, column: &str) -> &Value {
        self.value(row, column).unwrap_or(&EMPTY)
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: Value) -> Result<(), TableError> {
        let width = self.columns.len();
        let r = self.rows.get_mut(row).ok_or(TableError::RowOutOfRange(row))?;
        if col < width {
            r.set(col, value);
        }
        Ok(())
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut values: Vec<Value>) {
        values.resize(self.columns.len(), Value::Empty);
        self.rows.push(Row::new(values));
    }

    /// Returns the index of `name`, appending it (all rows `Empty`) if absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Ok(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        let width = self.columns.len();
        for row in &mut self.rows {
            row.values.resize(width, Value::Empty);
        }
        width - 1
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), TableError> {
        let idx = self.column_index(from)?;
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// Projects and renames columns: each `(source, target)` pair becomes one
    /// output column in the given order.
    pub fn select(&self, mapping: &[(&str, &str)]) -> Result<Table, TableError> {
        let sources: Vec<&str> = mapping.iter().map(|(s, _)| *s).collect();
        self.require_columns(sources.as_slice())?;
        let indices: Vec<usize> = sources
            .iter()
            .map(|s| self.column_index(s))
            .collect::<Result<_, _>>()?;
        let mut out = Table::new(mapping.iter().map(|(_, t)| *t));
        for row in &self.rows {
            out.push_row(indices.iter().map(|&i| row.get(i).clone()).collect());
        }
        Ok(out)
    }

    /// Reorders columns to `order`, creating any that are absent as `Empty`.
    pub fn reindex(&self, order: &[&str]) -> Table {
        let indices: Vec<Option<usize>> = order.iter().map(|c| self.column_index(c).ok()).collect();
        let mut out = Table::new(order.iter().copied());
        for row in &self.rows {
            out.push_row(
                indices
                    .iter()
                    .map(|i| i.map(|i| row.get(i).clone()).unwrap_or_default())
                    .collect(),
            );
        }
        out
    }

    pub fn retain_rows(&mut self, f: impl FnMut(&Row) -> bool) {
        self.rows.retain(f);
    }

    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    pub fn column_values<'a>(
        &'a self,
        name: &str,
    ) -> Result<impl Iterator<Item = &'a Value> + 'a, TableError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |r| r.get(idx)))
    }

    pub fn map_column(
        &mut self,
        name: &str,
        mut f: impl FnMut(&Value) -> Value,
    ) -> Result<(), TableError> {
        let idx = self.column_index(name)?;
        for row in &mut self.rows {
            let v = f(row.get(idx));
            row.set(idx, v);
        }
        Ok(())
    }

    /// Carry-down: an empty cell in any of `columns` takes the nearest
    /// non-empty value above it. Leading empties stay empty.
    pub fn forward_fill<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<(), TableError> {
        for name in columns {
            let idx = self.column_index(name.as_ref())?;
            let mut last: Option<Value> = None;
            for row in &mut self.rows {
                let current = row.get(idx);
                if current.is_empty() {
                    if let Some(v) = &last {
                        row.set(idx, v.clone());
                    }
                } else {
                    last = Some(current.clone());
                }
            }
        }
        Ok(())
    }

    /// Stable sort on the given key columns, in priority order.
    pub fn sort_by_columns<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<(), TableError> {
        let indices: Vec<usize> = keys
            .iter()
            .map(|k| self.column_index(k.as_ref()))
            .collect::<Result<_, _>>()?;
        self.rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| a.get(i).sort_cmp(b.get(i)))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        Ok(())
    }

    /// Stacks tables vertically. Columns are the union in first-seen order;
    /// cells a source table lacks are `Empty`.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Table {
        let tables: Vec<Table> = tables.into_iter().collect();
        let mut out = Table::default();
        for t in &tables {
            for c in &t.columns {
                out.ensure_column(c);
            }
        }
        for t in tables {
            let mapping: Vec<usize> = t
                .columns
                .iter()
                .filter_map(|c| out.column_index(c).ok())
                .collect();
            for row in t.rows {
                let mut values = vec![Value::Empty; out.columns.len()];
                for (src, dst) in mapping.iter().enumerate() {
                    values[*dst] = row.get(src).clone();
                }
                out.rows.push(Row::new(values));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Value {
        Value::text(s)
    }

    fn num(s: &str) -> Value {
        Value::Number(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn forward_fill_carries_last_key_down() {
        let mut table = Table::with_rows(
            ["Supplier ID"],
            vec![
                vec![t("A")],
                vec![Value::Empty],
                vec![Value::Empty],
                vec![t("B")],
                vec![Value::Empty],
            ],
        );
        table.forward_fill(&["Supplier ID"]).unwrap();
        let filled: Vec<String> = table
            .column_values("Supplier ID")
            .unwrap()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(filled, ["A", "A", "A", "B", "B"]);
    }

    #[test]
    fn forward_fill_leaves_leading_empties() {
        let mut table = Table::with_rows(["k"], vec![vec![Value::Empty], vec![t("A")]]);
        table.forward_fill(&["k"]).unwrap();
        assert!(table.value(0, "k").unwrap().is_empty());
    }

    #[test]
    fn missing_column_is_an_error_not_a_null() {
        let table = Table::with_rows(["a"], vec![vec![t("x")]]);
        assert_eq!(
            table.value(0, "b"),
            Err(TableError::MissingColumn("b".to_string()))
        );
        assert!(table.value_or_empty(0, "b").is_empty());
    }

    #[test]
    fn require_columns_lists_every_missing_name() {
        let table = Table::new(["a", "b"]);
        let err = table.require_columns(&["a", "c", "d"]).unwrap_err();
        assert_eq!(err, TableError::MissingColumns(vec!["c".into(), "d".into()]));
        assert_eq!(err.to_string(), "Missing columns: c, d");
    }

    #[test]
    fn ensure_column_pads_existing_rows() {
        let mut table = Table::with_rows(["a"], vec![vec![t("x")], vec![t("y")]]);
        let idx = table.ensure_column("b");
        assert_eq!(idx, 1);
        assert_eq!(table.ensure_column("b"), 1);
        assert!(table.value(1, "b").unwrap().is_empty());
    }

    #[test]
    fn concat_unions_columns() {
        let a = Table::with_rows(["x", "y"], vec![vec![t("1"), t("2")]]);
        let b = Table::with_rows(["y", "z"], vec![vec![t("3"), t("4")]]);
        let out = Table::concat([a, b]);
        assert_eq!(out.columns(), ["x", "y", "z"]);
        assert_eq!(out.value(1, "y").unwrap(), &t("3"));
        assert!(out.value(1, "x").unwrap().is_empty());
        assert!(out.value(0, "z").unwrap().is_empty());
    }

    #[test]
    fn select_projects_and_renames() {
        let table = Table::with_rows(
            ["journal date", "user", "other"],
            vec![vec![t("2024-01-01"), t("ana"), t("skip")]],
        );
        let out = table.select(&[("user", "Reference"), ("journal date", "Date")]).unwrap();
        assert_eq!(out.columns(), ["Reference", "Date"]);
        assert_eq!(out.value(0, "Reference").unwrap(), &t("ana"));
    }

    #[test]
    fn reindex_creates_absent_columns() {
        let table = Table::with_rows(["b", "a"], vec![vec![t("2"), t("1")]]);
        let out = table.reindex(&["a", "b", "c"]);
        assert_eq!(out.columns(), ["a", "b", "c"]);
        assert_eq!(out.value(0, "a").unwrap(), &t("1"));
        assert!(out.value(0, "c").unwrap().is_empty());
    }

    #[test]
    fn sort_is_stable_and_puts_empties_last() {
        let mut table = Table::with_rows(
            ["k", "tag"],
            vec![
                vec![num("2"), t("first-2")],
                vec![Value::Empty, t("empty")],
                vec![num("1"), t("one")],
                vec![num("2"), t("second-2")],
            ],
        );
        table.sort_by_columns(&["k"]).unwrap();
        let tags: Vec<String> = table.column_values("tag").unwrap().map(|v| v.to_string()).collect();
        assert_eq!(tags, ["one", "first-2", "second-2", "empty"]);
    }

    #[test]
    fn number_display_drops_trailing_zeros() {
        assert_eq!(num("12345.00").to_string(), "12345");
        assert_eq!(num("10.50").to_string(), "10.5");
    }

    #[test]
    fn from_f64_keeps_short_decimal() {
        assert_eq!(Value::from_f64(10.005), num("10.005"));
        assert_eq!(Value::from_f64(f64::NAN), Value::Empty);
    }

    #[test]
    fn to_decimal_coerces_numeric_text_only() {
        assert_eq!(t(" 42.5 ").to_decimal(), Some(Decimal::from_str("42.5").unwrap()));
        assert_eq!(t("n/a").to_decimal(), None);
        assert_eq!(Value::Empty.to_decimal(), None);
    }

    #[test]
    fn blank_text_is_empty() {
        assert!(Value::text("   ").is_empty());
        assert!(!Value::text("x").is_empty());
    }
}
