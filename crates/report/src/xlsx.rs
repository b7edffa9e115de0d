use backoffice_core::{Table, Value};
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::ExportError;

const FONT_NAME: &str = "Microsoft YaHei";
const NAVY: u32 = 0x002060;
const SLATE: u32 = 0x333F4F;
const STEEL: u32 = 0x1F497D;
const PALE_BLUE: u32 = 0xDDEBF7;
const ACCOUNTING: &str = "#,##0.00;[Red]-#,##0.00";

/// Visual role of a cell. The writer owns the mapping to concrete fonts,
/// fills and number formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// Column header row.
    Header,
    /// Secondary header (dark grey) for the ledger side of a sheet.
    HeaderAlt,
    /// Green banner above a table of successful results.
    BannerOk,
    /// Yellow banner above a table of exceptions.
    BannerAttention,
    /// Totals and report metadata (light blue).
    Stats,
    /// Letterhead block copied above a statement.
    Letterhead,
    /// Subtotal footer of a statement.
    Subtotal,
    Data,
    /// Data cell aligned to the centre.
    Centered,
    /// Keep a column narrow and empty (visual gap).
    Spacer,
}

/// A style request for one row, or one cell when `column` is set. Cell
/// hints win over row hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleHint {
    pub row: u32,
    pub column: Option<u16>,
    pub hint: Hint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrintSetup {
    /// Row repeated at the top of every printed page.
    pub repeat_row: Option<u32>,
    pub fit_to_width: bool,
    pub footer: Option<String>,
    pub a4: bool,
    pub center_horizontally: bool,
    /// left, right, top, bottom, header, footer (inches)
    pub margins: Option<[f64; 6]>,
}

impl Default for PrintSetup {
    fn default() -> Self {
        Self {
            repeat_row: None,
            fit_to_width: true,
            footer: Some("&CPage &P of &N".to_string()),
            a4: true,
            center_horizontally: true,
            margins: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetLayout {
    pub column_widths: Vec<(u16, f64)>,
    /// Width for columns not listed in `column_widths`.
    pub default_width: Option<f64>,
    /// Size columns to their longest value (from `row` down) plus `padding`.
    pub auto_width: Option<(u32, f64)>,
    pub row_height: Option<f64>,
    /// Rows and columns kept in view: `(rows, columns)`.
    pub freeze: Option<(u32, u16)>,
    pub hidden: bool,
    pub hide_gridlines: bool,
    pub print: Option<PrintSetup>,
}

/// One worksheet to be written: cells by physical row, style hints, merged
/// banners and layout.
#[derive(Debug, Clone, Default)]
pub struct SheetOutput {
    pub name: String,
    pub rows: Vec<Vec<Value>>,
    pub hints: Vec<StyleHint>,
    /// `(row, first column, last column)` merged into one cell.
    pub merges: Vec<(u32, u16, u16)>,
    pub layout: SheetLayout,
}

impl SheetOutput {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn next_row(&self) -> u32 {
        self.rows.len() as u32
    }

    /// Appends a row and returns its index.
    pub fn push_row(&mut self, values: Vec<Value>, hint: Option<Hint>) -> u32 {
        let row = self.next_row();
        self.rows.push(values);
        if let Some(hint) = hint {
            self.hint_row(row, hint);
        }
        row
    }

    pub fn hint_row(&mut self, row: u32, hint: Hint) {
        self.hints.push(StyleHint { row, column: None, hint });
    }

    pub fn hint_cell(&mut self, row: u32, column: u16, hint: Hint) {
        self.hints.push(StyleHint {
            row,
            column: Some(column),
            hint,
        });
    }

    /// Writes `text` merged across `width` columns.
    pub fn push_banner(&mut self, text: &str, width: usize, hint: Hint) -> u32 {
        let row = self.push_row(vec![Value::text(text)], Some(hint));
        if width > 1 {
            self.merges.push((row, 0, width as u16 - 1));
        }
        row
    }

    /// Appends the table's header and rows; returns the header row index.
    pub fn push_table(&mut self, table: &Table, header: Hint, data: Hint) -> u32 {
        let header_row = self.push_row(table.columns().iter().map(|c| Value::text(c.as_str())).collect(), Some(header));
        for row in table.rows() {
            self.push_row(row.values().to_vec(), Some(data));
        }
        header_row
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Hints grouped by row, later hints replacing earlier ones.
    fn hints_by_row(&self) -> HashMap<u32, RowHints> {
        let mut index: HashMap<u32, RowHints> = HashMap::new();
        for h in &self.hints {
            let entry = index.entry(h.row).or_default();
            match h.column {
                Some(column) => {
                    entry.cells.insert(column, h.hint);
                }
                None => entry.row = Some(h.hint),
            }
        }
        index
    }
}

#[derive(Debug, Default)]
struct RowHints {
    row: Option<Hint>,
    cells: HashMap<u16, Hint>,
}

impl RowHints {
    fn at(&self, column: u16) -> Hint {
        self.cells.get(&column).copied().or(self.row).unwrap_or(Hint::Data)
    }
}

fn base_format() -> Format {
    Format::new().set_font_name(FONT_NAME).set_font_size(10)
}

fn format_for(hint: Hint, numeric: bool) -> Format {
    let format = match hint {
        Hint::Header => base_format()
            .set_bold()
            .set_font_size(9)
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(NAVY))
            .set_align(FormatAlign::Center),
        Hint::HeaderAlt => base_format()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(SLATE))
            .set_align(FormatAlign::Center),
        Hint::BannerOk => base_format()
            .set_font_color(Color::RGB(0x006100))
            .set_background_color(Color::RGB(0xC6EFCE)),
        Hint::BannerAttention => base_format()
            .set_font_color(Color::Black)
            .set_background_color(Color::RGB(0xFFFF00)),
        Hint::Stats => base_format()
            .set_bold()
            .set_font_size(9)
            .set_font_color(Color::RGB(NAVY))
            .set_background_color(Color::RGB(PALE_BLUE))
            .set_align(FormatAlign::Right),
        Hint::Letterhead => base_format()
            .set_bold()
            .set_font_size(16)
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(STEEL))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter),
        Hint::Subtotal => base_format()
            .set_bold()
            .set_font_size(9)
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(STEEL))
            .set_align(FormatAlign::Center),
        Hint::Data => base_format().set_font_color(Color::RGB(NAVY)),
        Hint::Centered => base_format().set_align(FormatAlign::Center),
        Hint::Spacer => Format::new(),
    };
    if numeric {
        format.set_num_format(ACCOUNTING)
    } else {
        format
    }
}

/// Hints whose fill should cover empty cells too.
fn paints_blanks(hint: Hint) -> bool {
    matches!(
        hint,
        Hint::Header | Hint::HeaderAlt | Hint::Stats | Hint::Letterhead | Hint::Subtotal
    )
}

fn write_cell(ws: &mut Worksheet, row: u32, col: u16, value: &Value, hint: Hint) -> Result<(), ExportError> {
    match value {
        Value::Empty => {
            if paints_blanks(hint) {
                ws.write_blank(row, col, &format_for(hint, false))?;
            }
        }
        Value::Number(n) => {
            let format = format_for(hint, true);
            match n.to_f64() {
                Some(f) => ws.write_number_with_format(row, col, f, &format)?,
                None => ws.write_string_with_format(row, col, n.to_string(), &format)?,
            };
        }
        Value::Bool(b) => {
            ws.write_boolean_with_format(row, col, *b, &format_for(hint, false))?;
        }
        other => {
            ws.write_string_with_format(row, col, other.to_string(), &format_for(hint, false))?;
        }
    }
    Ok(())
}

fn text_width(value: &Value) -> f64 {
    value.to_string().chars().count() as f64
}

fn apply_layout(ws: &mut Worksheet, sheet: &SheetOutput) -> Result<(), ExportError> {
    let layout = &sheet.layout;
    let width = sheet.width() as u16;

    for col in 0..width {
        let explicit = layout.column_widths.iter().find(|(c, _)| *c == col).map(|(_, w)| *w);
        let auto = layout.auto_width.map(|(from, padding)| {
            sheet
                .rows
                .iter()
                .skip(from as usize)
                .filter_map(|r| r.get(col as usize))
                .map(text_width)
                .fold(0.0, f64::max)
                + padding
        });
        if let Some(w) = explicit.or(auto).or(layout.default_width) {
            ws.set_column_width(col, w)?;
        }
    }

    if let Some(height) = layout.row_height {
        for row in 0..sheet.next_row() {
            ws.set_row_height(row, height)?;
        }
    }
    if let Some((rows, cols)) = layout.freeze {
        ws.set_freeze_panes(rows, cols)?;
    }
    if layout.hide_gridlines {
        ws.set_screen_gridlines(false);
    }
    if let Some(print) = &layout.print {
        if print.a4 {
            ws.set_paper_size(9);
        }
        if print.fit_to_width {
            ws.set_print_fit_to_pages(1, 0);
        }
        if let Some(footer) = &print.footer {
            ws.set_footer(footer);
        }
        if let Some(row) = print.repeat_row {
            ws.set_repeat_rows(row, row)?;
        }
        if let Some([left, right, top, bottom, header, footer]) = print.margins {
            ws.set_margins(left, right, top, bottom, header, footer);
        }
        ws.set_print_center_horizontally(print.center_horizontally);
    }
    if layout.hidden {
        ws.set_hidden(true);
    }
    Ok(())
}

fn write_sheet(ws: &mut Worksheet, sheet: &SheetOutput) -> Result<(), ExportError> {
    ws.set_name(&sheet.name)?;

    let hints = sheet.hints_by_row();
    let unhinted = RowHints::default();
    let hints_for = |row: u32| hints.get(&row).unwrap_or(&unhinted);
    let merged_rows: HashSet<u32> = sheet.merges.iter().map(|&(row, _, _)| row).collect();
    let width = sheet.width() as u16;

    for &(row, first, last) in &sheet.merges {
        let text = sheet
            .rows
            .get(row as usize)
            .and_then(|r| r.first())
            .map(ToString::to_string)
            .unwrap_or_default();
        ws.merge_range(row, first, row, last, &text, &format_for(hints_for(row).at(first), false))?;
    }

    for (r, values) in sheet.rows.iter().enumerate() {
        let row = r as u32;
        let merged = merged_rows.contains(&row);
        let row_hints = hints_for(row);
        for (c, value) in values.iter().enumerate() {
            let col = c as u16;
            if merged && col == 0 {
                continue;
            }
            write_cell(ws, row, col, value, row_hints.at(col))?;
        }
        // paint the rest of a filled row out to the sheet width
        if let Some(hint) = row_hints.row.filter(|&h| paints_blanks(h)) {
            if !merged {
                for col in values.len() as u16..width {
                    ws.write_blank(row, col, &format_for(hint, false))?;
                }
            }
        }
    }

    apply_layout(ws, sheet)
}

/// Writes sheets in order to a new workbook at `path`. Hidden sheets should
/// not come first; Excel needs a visible sheet to open on.
pub fn write_workbook(path: &Path, sheets: &[SheetOutput]) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    for sheet in sheets {
        let ws = workbook.add_worksheet();
        write_sheet(ws, sheet)?;
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    workbook.save(path)?;
    tracing::debug!(path = %path.display(), sheets = sheets.len(), "wrote workbook");
    Ok(())
}
