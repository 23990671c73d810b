//! Record-to-worksheet writer.

use rust_xlsxwriter::{Format, Workbook};

use crate::{FlatCumRow, GoroutineCount, GoroutineWaitRecord, ReportResult};

/// Longest text a single cell accepts.
const MAX_CELL_CHARS: usize = 32_767;

pub enum Cell {
    Text(String),
    Number(f64),
}

/// A record type that can be laid out as one worksheet row. Column labels
/// and cells are in field declaration order.
pub trait SheetRecord {
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<Cell>;
}

/// Adds a sheet named `name` with a bold, wrapped header row followed by one
/// row per record, starting at column A.
pub fn write_sheet<R: SheetRecord>(
    workbook: &mut Workbook,
    name: &str,
    records: &[R],
) -> ReportResult<()> {
    let header = Format::new().set_bold().set_text_wrap().set_font_size(12);
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;

    for (col, label) in R::COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, column(col), *label, &header)?;
    }
    for (idx, record) in records.iter().enumerate() {
        let row = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        for (col, cell) in record.cells().into_iter().enumerate() {
            match cell {
                Cell::Text(text) => {
                    sheet.write_string(row, column(col), clip(&text))?;
                }
                Cell::Number(value) => {
                    sheet.write_number(row, column(col), value)?;
                }
            }
        }
    }
    Ok(())
}

fn column(idx: usize) -> u16 {
    u16::try_from(idx).unwrap_or(u16::MAX)
}

fn clip(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

impl SheetRecord for FlatCumRow {
    const COLUMNS: &'static [&'static str] = &["flat", "flat%", "sum%", "cum", "cum%", "code"];

    fn cells(&self) -> Vec<Cell> {
        [
            &self.flat,
            &self.flat_percent,
            &self.sum_percent,
            &self.cum,
            &self.cum_percent,
            &self.code,
        ]
        .into_iter()
        .map(|s| Cell::Text(s.clone()))
        .collect()
    }
}

impl SheetRecord for GoroutineCount {
    const COLUMNS: &'static [&'static str] = &["Goroutine Total"];

    fn cells(&self) -> Vec<Cell> {
        vec![Cell::Number(self.total as f64)]
    }
}

impl SheetRecord for GoroutineWaitRecord {
    const COLUMNS: &'static [&'static str] = &["Goroutine ID", "Wait Minutes", "Reason", "Stack"];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Number(self.id as f64),
            Cell::Number(self.wait_minutes as f64),
            Cell::Text(self.reason.clone()),
            Cell::Text(self.stack.clone()),
        ]
    }
}
