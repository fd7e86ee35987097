//! Shared sheet models: cell values, autofit policy, write report.

use crate::conf::{N_WIDTH_FACTOR_DEFAULT, N_WIDTH_PADDING_DEFAULT};

////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Normalized cell value held by [`crate::grid::SheetGrid`].
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region AutofitPolicy

/// Column width policy: `(max_chars + width_padding) * width_factor`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecAutofitPolicy {
    /// Characters added to the longest rendered value.
    pub width_padding: usize,
    /// Multiplier applied after padding.
    pub width_factor: f64,
}

impl Default for SpecAutofitPolicy {
    fn default() -> Self {
        Self {
            width_padding: N_WIDTH_PADDING_DEFAULT,
            width_factor: N_WIDTH_FACTOR_DEFAULT,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Report

/// Per-write call report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Sheet names written by the call.
    pub sheets: Vec<String>,
    /// Number of cells written with a fill.
    pub cnt_filled: u64,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
