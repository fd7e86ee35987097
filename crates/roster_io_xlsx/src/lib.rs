//! `roster_io_xlsx` v1:
//! Sheet grid and XLSX output kernel for roster exports.
//!
//! Modules:
//! - `conf`   : Excel limits and default presets
//! - `spec`   : cell values, autofit policy, report models
//! - `util`   : pure helper functions
//! - `grid`   : in-memory worksheet (values, fills, widths)
//! - `writer` : `rust_xlsxwriter` output
pub mod conf;
pub mod grid;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_FILL_COLOR_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_EXCEL_ILLEGAL,
};
pub use grid::SheetGrid;
pub use spec::{EnumCellValue, SpecAutofitPolicy, SpecXlsxReport};
pub use util::{
    calculate_autofit_width, coerce_cell_to_integer, derive_cell_value_from_any_value,
    normalize_argb_color, render_cell_text, sanitize_sheet_name, validate_unique_columns,
};
pub use writer::XlsxWriter;
