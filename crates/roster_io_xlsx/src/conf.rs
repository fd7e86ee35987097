//! Excel limits and sheet defaults.

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Fill color used when a rule does not name one (ARGB, yellow).
pub const C_FILL_COLOR_DEFAULT: &str = "00FFFF00";

/// Characters added to the longest rendered value before scaling.
pub const N_WIDTH_PADDING_DEFAULT: usize = 2;
/// Scale applied to padded character count.
pub const N_WIDTH_FACTOR_DEFAULT: f64 = 1.2;
