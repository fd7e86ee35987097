//! In-memory worksheet: header row, typed cells, fills and column widths.
//!
//! Coordinates are sheet-relative and zero-based: row `0` is the header,
//! data rows start at `1`.

use std::collections::BTreeMap;

use polars::prelude::DataFrame;

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{EnumCellValue, SpecAutofitPolicy};
use crate::util::{
    calculate_autofit_width, derive_cell_value_from_any_value, normalize_argb_color,
    render_cell_text, sanitize_sheet_name, validate_unique_columns,
};

/// One worksheet prior to serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetGrid {
    sheet_name: String,
    l_header: Vec<String>,
    l_rows: Vec<Vec<EnumCellValue>>,
    dict_fills: BTreeMap<(usize, usize), String>,
    l_widths: Vec<Option<f64>>,
}

impl SheetGrid {
    /// Empty grid with the given header.
    fn new(sheet_name: &str, header: Vec<String>) -> Result<Self, String> {
        validate_unique_columns(&header)?;
        if header.len() > N_NCOLS_EXCEL_MAX {
            return Err(format!(
                "Too many columns for one sheet: {} > {N_NCOLS_EXCEL_MAX}",
                header.len()
            ));
        }
        let n_width = header.len();
        Ok(Self {
            sheet_name: sanitize_sheet_name(sheet_name, "_"),
            l_header: header,
            l_rows: Vec::new(),
            dict_fills: BTreeMap::new(),
            l_widths: vec![None; n_width],
        })
    }

    /// Render `df` as header + one row per record, column order preserved.
    pub fn from_dataframe(df: &DataFrame, sheet_name: &str) -> Result<Self, String> {
        let l_colnames: Vec<String> = df
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        let mut grid = Self::new(sheet_name, l_colnames)?;

        let n_height = df.height();
        if n_height + 1 > N_NROWS_EXCEL_MAX {
            return Err(format!(
                "Too many rows for one sheet: {n_height} + header > {N_NROWS_EXCEL_MAX}"
            ));
        }

        let l_cols = df.get_columns();
        grid.l_rows.reserve(n_height);
        for n_idx_row in 0..n_height {
            let mut l_row = Vec::with_capacity(l_cols.len());
            for col in l_cols {
                let value = col
                    .get(n_idx_row)
                    .map_err(|err| format!("Failed to access cell value: {err}"))?;
                l_row.push(derive_cell_value_from_any_value(value));
            }
            grid.l_rows.push(l_row);
        }

        Ok(grid)
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.l_header.len()
    }

    /// Number of rows including the header row.
    pub fn height(&self) -> usize {
        self.l_rows.len() + 1
    }

    /// Header text → column ordinal, left to right.
    pub fn derive_column_index_map(&self) -> BTreeMap<String, usize> {
        self.l_header
            .iter()
            .enumerate()
            .map(|(n_idx, c_name)| (c_name.clone(), n_idx))
            .collect()
    }

    /// Cell value at sheet coordinates; the header row yields text cells.
    pub fn cell(&self, row: usize, col: usize) -> Option<EnumCellValue> {
        if row == 0 {
            return self
                .l_header
                .get(col)
                .map(|c_name| EnumCellValue::String(c_name.clone()));
        }
        self.l_rows.get(row - 1)?.get(col).cloned()
    }

    /// Fill color (`AARRGGBB`) of a cell, when one is set.
    pub fn cell_fill(&self, row: usize, col: usize) -> Option<&str> {
        self.dict_fills.get(&(row, col)).map(String::as_str)
    }

    /// Set solid background fill; overwrites any previous fill.
    pub fn set_cell_fill(&mut self, row: usize, col: usize, color: &str) -> Result<(), String> {
        if row >= self.height() || col >= self.width() {
            return Err(format!("Cell out of range: row={row} col={col}"));
        }
        let c_color = normalize_argb_color(color)?;
        self.dict_fills.insert((row, col), c_color);
        Ok(())
    }

    /// All filled cells in row-major order.
    pub fn fills(&self) -> impl Iterator<Item = ((usize, usize), &str)> {
        self.dict_fills
            .iter()
            .map(|(coord, c_color)| (*coord, c_color.as_str()))
    }

    pub fn column_width(&self, col: usize) -> Option<f64> {
        self.l_widths.get(col).copied().flatten()
    }

    /// Longest rendered text (character count) over header and body cells.
    pub fn derive_max_text_len(&self, col: usize) -> usize {
        let n_len_header = self
            .l_header
            .get(col)
            .map_or(0, |c_name| c_name.chars().count());
        self.l_rows
            .iter()
            .filter_map(|l_row| l_row.get(col))
            .filter_map(render_cell_text)
            .map(|c_text| c_text.chars().count())
            .fold(n_len_header, usize::max)
    }

    /// Set every column width from its longest rendered value.
    pub fn autofit_columns(&mut self, policy: &SpecAutofitPolicy) -> Vec<f64> {
        let l_widths: Vec<f64> = (0..self.width())
            .map(|n_idx_col| calculate_autofit_width(self.derive_max_text_len(n_idx_col), policy))
            .collect();
        for (slot, n_width) in self.l_widths.iter_mut().zip(&l_widths) {
            *slot = Some(*n_width);
        }
        l_widths
    }
}
