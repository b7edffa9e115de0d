//! Workbook builders and readers shared by the pipeline tests.

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub enum Cell {
    S(&'static str),
    N(f64),
    Blank,
}

/// Writes one workbook with the given `(sheet, rows)` pairs.
pub fn write_workbook(path: &Path, sheets: &[(&str, Vec<Vec<Cell>>)]) {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    Cell::S(s) => {
                        sheet.write_string(r as u32, c as u16, *s).unwrap();
                    }
                    Cell::N(n) => {
                        sheet.write_number(r as u32, c as u16, *n).unwrap();
                    }
                    Cell::Blank => {}
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

/// `n` rows of report preamble.
pub fn preamble(n: usize) -> Vec<Vec<Cell>> {
    (0..n).map(|_| vec![Cell::S("report preamble")]).collect()
}

/// A sheet's used range as display strings.
pub fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<String>> {
    let mut workbook = open_workbook_auto(path).unwrap();
    let range = workbook.worksheet_range(sheet).unwrap();
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

pub fn sheet_names(path: &Path) -> Vec<String> {
    open_workbook_auto(path).unwrap().sheet_names()
}
