//! XLSX export of [`Sheet`] datasets with `rust_xlsxwriter`.

use std::path::Path;

use recording_sync_core::contract::SpreadsheetExporter;
use recording_sync_core::error::CollaboratorError;
use recording_sync_core::sheet::{Cell, Sheet};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::{debug, info, warn};

/// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;
/// Excel caps a cell's text at 32,767 characters.
pub const MAX_CELL_TEXT: usize = 32_767;

#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxExporter;

impl XlsxExporter {
    pub fn new() -> Self {
        Self
    }
}

fn export_err(e: XlsxError) -> CollaboratorError {
    CollaboratorError::Export(e.to_string())
}

/// `text` cut to at most [`MAX_CELL_TEXT`] characters.
fn cell_text(text: &str) -> Option<String> {
    text.char_indices()
        .nth(MAX_CELL_TEXT)
        .map(|(end, _)| text[..end].to_string())
}

fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &Sheet,
    header: &Format,
) -> Result<(), XlsxError> {
    let name: String = sheet.name.chars().take(MAX_SHEET_NAME).collect();
    worksheet.set_name(name)?;

    for (col, title) in sheet.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, title, header)?;
    }
    for (r, row) in sheet.rows.iter().enumerate() {
        let row_idx = (r + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => match cell_text(s) {
                    Some(cut) => {
                        let column = sheet.columns.get(col as usize).map(String::as_str);
                        warn!(
                            sheet = %sheet.name,
                            row = row_idx,
                            column = column.unwrap_or_default(),
                            chars = s.chars().count(),
                            "Cell text exceeds the Excel limit, truncating"
                        );
                        worksheet.write_string(row_idx, col, &cut)?;
                    }
                    None => {
                        worksheet.write_string(row_idx, col, s)?;
                    }
                },
                Cell::Number(n) => {
                    worksheet.write_number(row_idx, col, *n)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(row_idx, col, *b)?;
                }
            }
        }
    }
    Ok(())
}

impl SpreadsheetExporter for XlsxExporter {
    fn export(&self, path: &Path, sheets: &[Sheet]) -> Result<(), CollaboratorError> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();

        for sheet in sheets {
            let worksheet = workbook.add_worksheet();
            write_sheet(worksheet, sheet, &header).map_err(export_err)?;
            debug!(sheet = %sheet.name, rows = sheet.rows.len(), "Wrote worksheet");
        }
        if sheets.is_empty() {
            workbook.add_worksheet();
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        workbook.save(path).map_err(export_err)?;
        info!(path = %path.display(), sheets = sheets.len(), "Workbook saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_written_as_is() {
        assert_eq!(cell_text("hello"), None);
        assert_eq!(cell_text(&"x".repeat(MAX_CELL_TEXT)), None);
    }

    #[test]
    fn long_text_is_cut_on_a_char_boundary() {
        let text = "é".repeat(MAX_CELL_TEXT + 10);
        let cut = cell_text(&text).unwrap();
        assert_eq!(cut.chars().count(), MAX_CELL_TEXT);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
