//! Run-time report models for import and export.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Export pipeline checkpoints, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum EnumExportStage {
    #[default]
    Start,
    TableLoaded,
    SpreadsheetWritten,
    RulesApplied,
    Autofitted,
    Saved,
}

impl EnumExportStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::TableLoaded => "TABLE_LOADED",
            Self::SpreadsheetWritten => "SPREADSHEET_WRITTEN",
            Self::RulesApplied => "RULES_APPLIED",
            Self::Autofitted => "AUTOFITTED",
            Self::Saved => "SAVED",
        }
    }
}

impl fmt::Display for EnumExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region ReportExport

/// Counters and diagnostics for one export run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReportExport {
    /// Last stage reached.
    pub stage: EnumExportStage,
    /// Data rows rendered.
    pub cnt_rows: u64,
    /// Rules evaluated.
    pub cnt_rules: u64,
    /// Rules skipped because a column is missing from the sheet.
    pub cnt_rules_skipped: u64,
    /// Fill assignments made (a cell hit by two rules counts twice).
    pub cnt_fills_applied: u64,
    /// Distinct cells carrying a fill when saved.
    pub cnt_cells_filled: u64,
    /// Saved workbook path.
    pub path_file_out: Option<PathBuf>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportExport {
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        let c_msg = msg.as_ref();
        tracing::warn!("{c_msg}");
        self.warnings.push(c_msg.to_string());
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_rows".to_string(), self.cnt_rows);
        dict_counts.insert("cnt_rules".to_string(), self.cnt_rules);
        dict_counts.insert("cnt_rules_skipped".to_string(), self.cnt_rules_skipped);
        dict_counts.insert("cnt_fills_applied".to_string(), self.cnt_fills_applied);
        dict_counts.insert("cnt_cells_filled".to_string(), self.cnt_cells_filled);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        let c_path = self
            .path_file_out
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{prefix} stage={} rows={} rules={} skipped={} fills={} cells={} warnings={} out={c_path}",
            self.stage,
            dict_counts["cnt_rows"],
            dict_counts["cnt_rules"],
            dict_counts["cnt_rules_skipped"],
            dict_counts["cnt_fills_applied"],
            dict_counts["cnt_cells_filled"],
            dict_counts["cnt_warnings"],
        )
    }
}

impl fmt::Display for ReportExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[EXPORT]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportImport

/// Outcome of loading one flat file into a table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportImport {
    /// Destination table.
    pub table: String,
    /// Rows committed.
    pub cnt_rows_inserted: u64,
    /// True when the table was created (and recorded) by this import.
    pub if_table_created: bool,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportImport {
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        let c_msg = msg.as_ref();
        tracing::warn!("{c_msg}");
        self.warnings.push(c_msg.to_string());
    }

    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} table={:?} inserted={} created={} warnings={}",
            self.table,
            self.cnt_rows_inserted,
            self.if_table_created,
            self.warnings.len()
        )
    }
}

impl fmt::Display for ReportImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[IMPORT]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
