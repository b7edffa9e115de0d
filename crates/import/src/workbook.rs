use backoffice_core::{Table, Value};
use calamine::{open_workbook_auto, Data, Range, Reader};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ImportError;
use crate::parse;

/// Where a table lives inside a workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSpec {
    /// Sheet name; `None` reads the first sheet.
    pub sheet: Option<String>,
    /// Physical rows to discard before the header row.
    pub skip_rows: usize,
    /// Trim and lower-case header names.
    pub lowercase_headers: bool,
}

impl Default for SheetSpec {
    fn default() -> Self {
        Self {
            sheet: None,
            skip_rows: 0,
            lowercase_headers: false,
        }
    }
}

impl SheetSpec {
    pub fn named(sheet: &str, skip_rows: usize) -> Self {
        Self {
            sheet: Some(sheet.to_string()),
            skip_rows,
            ..Self::default()
        }
    }

    pub fn first(skip_rows: usize) -> Self {
        Self {
            skip_rows,
            ..Self::default()
        }
    }
}

/// Converts a calamine cell into a [`Value`].
pub fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Empty,
        Data::String(s) => Value::text(s.as_str()),
        Data::Float(n) => Value::from_f64(*n),
        Data::Int(n) => Value::Number(Decimal::from(*n)),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => parse::excel_serial_to_value(dt.as_f64()).unwrap_or_default(),
        Data::DateTimeIso(s) => parse::parse_datetime_text(s)
            .map(Value::DateTime)
            .or_else(|| parse::parse_date_text(s).ok().map(Value::Date))
            .unwrap_or_else(|| Value::text(s.as_str())),
        Data::DurationIso(s) => Value::text(s.as_str()),
    }
}

/// Materialises a calamine range as physical rows, re-inserting the blank
/// rows and columns calamine trims off the top-left corner.
fn physical_rows(range: &Range<Data>) -> Vec<Vec<Value>> {
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Value>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut values = vec![Value::Empty; start_col as usize];
        values.extend(row.iter().map(cell_value));
        rows.push(values);
    }
    rows
}

/// Builds a [`Table`] from physical rows: skip `skip_rows`, take the first
/// non-blank row as the header, keep every following non-blank row.
pub fn table_from_rows(rows: Vec<Vec<Value>>, spec: &SheetSpec) -> Table {
    let mut iter = rows
        .into_iter()
        .skip(spec.skip_rows)
        .skip_while(|r| r.iter().all(Value::is_empty));

    let Some(header) = iter.next() else {
        return Table::default();
    };

    let mut names: Vec<String> = Vec::with_capacity(header.len());
    for (idx, cell) in header.iter().enumerate() {
        let mut name = cell.to_string().trim().to_string();
        if spec.lowercase_headers {
            name = name.to_lowercase();
        }
        if name.is_empty() {
            name = format!("Unnamed: {idx}");
        }
        let base = name.clone();
        let mut n = 1;
        while names.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        names.push(name);
    }

    let mut table = Table::new(names);
    for row in iter {
        if row.iter().all(Value::is_empty) {
            continue;
        }
        table.push_row(row);
    }
    table
}

fn open(path: &Path) -> Result<calamine::Sheets<std::io::BufReader<std::fs::File>>, ImportError> {
    if !path.is_file() {
        return Err(ImportError::MissingInput(path.to_path_buf()));
    }
    Ok(open_workbook_auto(path)?)
}

fn load_range(path: &Path, sheet: Option<&str>) -> Result<Range<Data>, ImportError> {
    let mut workbook = open(path)?;
    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| ImportError::MissingSheet {
                path: path.to_path_buf(),
                sheet: wanted.to_string(),
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::NoSheets(path.to_path_buf()))?,
    };
    Ok(workbook.worksheet_range(&name)?)
}

/// Reads one sheet region of a workbook (`.xlsx`, `.xlsm`, `.xls`, `.ods`).
pub fn read_table(path: &Path, spec: &SheetSpec) -> Result<Table, ImportError> {
    let range = load_range(path, spec.sheet.as_deref())?;
    let table = table_from_rows(physical_rows(&range), spec);
    tracing::debug!(
        path = %path.display(),
        sheet = spec.sheet.as_deref().unwrap_or("<first>"),
        rows = table.len(),
        "read sheet"
    );
    Ok(table)
}

/// The first `limit` physical rows of a sheet, unparsed. Used for
/// letterhead blocks copied verbatim into generated statements.
pub fn read_rows(path: &Path, sheet: Option<&str>, limit: usize) -> Result<Vec<Vec<Value>>, ImportError> {
    let range = load_range(path, sheet)?;
    Ok(physical_rows(&range).into_iter().take(limit).collect())
}
