//! Stateless helper utilities used by the sheet grid and writer.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::AnyValue;

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::{EnumCellValue, SpecAutofitPolicy};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Map one polars scalar onto a sheet cell value.
///
/// Numbers stay numeric, booleans render as `True`/`False`, everything else
/// falls back to its display text.
pub fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

/// Render a cell as the text a reader sees; `None` for blank cells.
///
/// Integral numbers render without a fractional part.
pub fn render_cell_text(value: &EnumCellValue) -> Option<String> {
    match value {
        EnumCellValue::None => None,
        EnumCellValue::String(s) => Some(s.clone()),
        EnumCellValue::Number(n) => {
            if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                Some((*n as i64).to_string())
            } else {
                Some(n.to_string())
            }
        }
    }
}

/// Coerce a cell to an integer the way a rule predicate reads it.
///
/// Numbers are truncated toward zero; text must parse as a base-10 integer
/// after trimming surrounding whitespace. Blank and non-finite cells fail.
pub fn coerce_cell_to_integer(value: &EnumCellValue) -> Result<i64, String> {
    match value {
        EnumCellValue::None => Err("blank cell has no integer value".to_string()),
        EnumCellValue::Number(n) => {
            if n.is_finite() {
                Ok(n.trunc() as i64)
            } else {
                Err(format!("non-finite number {n} has no integer value"))
            }
        }
        EnumCellValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid literal for integer: {s:?}")),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColorAndWidth

/// Normalize `RRGGBB` / `AARRGGBB` (optional `#`) into uppercase `AARRGGBB`.
pub fn normalize_argb_color(color: &str) -> Result<String, String> {
    let c_hex = color.trim().trim_start_matches('#');
    if !c_hex.chars().all(|chr| chr.is_ascii_hexdigit()) {
        return Err(format!("Color is not hexadecimal: {color:?}"));
    }
    match c_hex.len() {
        6 => Ok(format!("00{}", c_hex.to_ascii_uppercase())),
        8 => Ok(c_hex.to_ascii_uppercase()),
        _ => Err(format!(
            "Color must have 6 (RRGGBB) or 8 (AARRGGBB) hex digits: {color:?}"
        )),
    }
}

/// Final column width for a longest rendered value of `n_chars_max` characters.
pub fn calculate_autofit_width(n_chars_max: usize, policy: &SpecAutofitPolicy) -> f64 {
    (n_chars_max + policy.width_padding) as f64 * policy.width_factor
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataFrameLikeUtils

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), String> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate column names detected: {c_msg}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
