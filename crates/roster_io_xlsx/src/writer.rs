//! XLSX writer kernel that serializes [`SheetGrid`]s into a workbook.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook, Worksheet, XlsxError};

use crate::grid::SheetGrid;
use crate::spec::{EnumCellValue, SpecXlsxReport};

/// Stateful workbook writer.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    if_sheet_written: bool,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path.
    ///
    /// The workbook is buffered in memory until [`Self::close`] is called.
    pub fn new(path_file_out: impl AsRef<Path>) -> Self {
        Self {
            path_file_out: path_file_out.as_ref().to_path_buf(),
            workbook: Workbook::new(),
            if_sheet_written: false,
            if_closed: false,
        }
    }

    /// Flush workbook to disk, replacing any existing file. Idempotent.
    pub fn close(&mut self) -> Result<(), String> {
        if self.if_closed {
            return Ok(());
        }
        self.workbook
            .save(&self.path_file_out)
            .map_err(derive_xlsx_error_text)?;
        self.if_closed = true;
        Ok(())
    }

    /// Write the grid as the workbook's sheet: values, fills, then column
    /// widths. One grid per writer.
    pub fn write_grid(&mut self, grid: &SheetGrid) -> Result<SpecXlsxReport, String> {
        if self.if_closed {
            return Err("Cannot write after close().".to_string());
        }
        if self.if_sheet_written {
            return Err(format!(
                "Sheet already written; cannot add {:?}.",
                grid.sheet_name()
            ));
        }

        let mut report = SpecXlsxReport::default();
        let worksheet = self.workbook.add_worksheet();
        worksheet
            .set_name(grid.sheet_name())
            .map_err(derive_xlsx_error_text)?;

        let mut dict_fmt_by_color: BTreeMap<&str, Format> = BTreeMap::new();
        for (_, c_color) in grid.fills() {
            if !dict_fmt_by_color.contains_key(c_color) {
                dict_fmt_by_color.insert(c_color, derive_fill_format(c_color)?);
            }
            report.cnt_filled += 1;
        }

        for n_idx_row in 0..grid.height() {
            for n_idx_col in 0..grid.width() {
                let value = grid.cell(n_idx_row, n_idx_col).unwrap_or(EnumCellValue::None);
                let fmt_fill = grid
                    .cell_fill(n_idx_row, n_idx_col)
                    .and_then(|c_color| dict_fmt_by_color.get(c_color));
                write_cell(worksheet, n_idx_row, n_idx_col, &value, fmt_fill)?;
            }
        }

        for n_idx_col in 0..grid.width() {
            if let Some(n_width) = grid.column_width(n_idx_col) {
                worksheet
                    .set_column_width(cast_col_num(n_idx_col)?, n_width)
                    .map_err(derive_xlsx_error_text)?;
            }
        }

        self.if_sheet_written = true;
        report.sheets.push(grid.sheet_name().to_string());
        Ok(report)
    }
}

/// Solid background format for an `AARRGGBB` color; alpha is ignored by Excel.
fn derive_fill_format(color_argb: &str) -> Result<Format, String> {
    let c_rgb = color_argb
        .get(color_argb.len().saturating_sub(6)..)
        .ok_or_else(|| format!("Invalid fill color: {color_argb:?}"))?;
    let n_rgb = u32::from_str_radix(c_rgb, 16)
        .map_err(|err| format!("Invalid fill color {color_argb:?}: {err}"))?;
    Ok(Format::new()
        .set_pattern(FormatPattern::Solid)
        .set_background_color(Color::RGB(n_rgb)))
}

fn write_cell(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: Option<&Format>,
) -> Result<(), String> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match (value, format) {
        (EnumCellValue::None, Some(fmt)) => {
            worksheet
                .write_blank(n_row, n_col, fmt)
                .map_err(derive_xlsx_error_text)?;
        }
        (EnumCellValue::None, None) => {}
        (EnumCellValue::String(val), Some(fmt)) => {
            worksheet
                .write_string_with_format(n_row, n_col, val, fmt)
                .map_err(derive_xlsx_error_text)?;
        }
        (EnumCellValue::String(val), None) => {
            worksheet
                .write_string(n_row, n_col, val)
                .map_err(derive_xlsx_error_text)?;
        }
        (EnumCellValue::Number(val), Some(fmt)) => {
            worksheet
                .write_number_with_format(n_row, n_col, *val, fmt)
                .map_err(derive_xlsx_error_text)?;
        }
        (EnumCellValue::Number(val), None) => {
            worksheet
                .write_number(n_row, n_col, *val)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}
