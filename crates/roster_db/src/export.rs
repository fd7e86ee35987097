//! Table → formatted workbook pipeline.
//!
//! One run walks `START → TABLE_LOADED → SPREADSHEET_WRITTEN → RULES_APPLIED
//! → AUTOFITTED → SAVED`; any error stops the run before the workbook is
//! written, so a failed run never leaves a partial file behind.

use std::collections::BTreeMap;
use std::path::PathBuf;

use roster_io_xlsx::{
    SheetGrid, SpecAutofitPolicy, XlsxWriter, coerce_cell_to_integer, render_cell_text,
};

use crate::report::{EnumExportStage, ReportExport};
use crate::spec::{EnumRuleEntry, Result, RosterError, SpecMetadataRecord};
use crate::store::Store;

/// What to export and where.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecExportOptions {
    /// Table rendered to the sheet; also the sheet name.
    pub table: String,
    /// Workbook path, overwritten when present.
    pub path_file_out: PathBuf,
    pub policy_autofit: SpecAutofitPolicy,
}

/// Render `options.table` with the fills from `record.export_params` and
/// save it to `options.path_file_out`.
pub fn export_table<S: Store + ?Sized>(
    store: &S,
    record: &SpecMetadataRecord,
    options: &SpecExportOptions,
) -> Result<ReportExport> {
    let mut report = ReportExport::default();
    let c_table = options.table.as_str();
    if !store.table_exists(c_table)? {
        return Err(RosterError::EntityNotFound(format!("table {c_table}")));
    }

    let df = store.query_table(c_table)?;
    report.cnt_rows = df.height() as u64;
    report.stage = EnumExportStage::TableLoaded;

    let mut grid = SheetGrid::from_dataframe(&df, c_table).map_err(RosterError::Xlsx)?;
    report.stage = EnumExportStage::SpreadsheetWritten;

    apply_export_rules(&mut grid, &record.export_params, &mut report)?;
    report.stage = EnumExportStage::RulesApplied;

    grid.autofit_columns(&options.policy_autofit);
    report.stage = EnumExportStage::Autofitted;

    if let Some(parent) = options.path_file_out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = XlsxWriter::new(&options.path_file_out);
    let report_xlsx = writer.write_grid(&grid).map_err(RosterError::Xlsx)?;
    writer.close().map_err(RosterError::Xlsx)?;
    report.cnt_cells_filled = report_xlsx.cnt_filled;
    report.path_file_out = Some(options.path_file_out.clone());
    report.stage = EnumExportStage::Saved;

    tracing::info!(
        table = c_table,
        path = %options.path_file_out.display(),
        rows = report.cnt_rows,
        cells_filled = report.cnt_cells_filled,
        "export saved"
    );
    Ok(report)
}

/// Apply every rule to `grid` in registration order.
///
/// Column names are matched case-insensitively against the header. A rule is
/// evaluated only on rows whose key cell equals the rule's key value; its
/// target cell must then read as an integer. Later rules overwrite earlier
/// fills on the same cell. Rules naming a column the sheet lacks, and stored
/// entries that do not read as rules, are skipped with a warning.
pub fn apply_export_rules(
    grid: &mut SheetGrid,
    export_params: &BTreeMap<String, Vec<EnumRuleEntry>>,
    report: &mut ReportExport,
) -> Result<()> {
    let dict_idx_by_col: BTreeMap<String, usize> = grid
        .derive_column_index_map()
        .into_iter()
        .map(|(c_name, n_idx)| (c_name.to_uppercase(), n_idx))
        .collect();

    for (c_target, l_rules) in export_params {
        let Some(&n_idx_target) = dict_idx_by_col.get(&c_target.to_uppercase()) else {
            report.cnt_rules_skipped += l_rules.len() as u64;
            report.warn(format!(
                "Column {c_target:?} is not in sheet {:?}; {} rule(s) skipped.",
                grid.sheet_name(),
                l_rules.len()
            ));
            continue;
        };

        for (n_idx_entry, entry) in l_rules.iter().enumerate() {
            let Some(rule) = entry.as_rule() else {
                report.cnt_rules_skipped += 1;
                report.warn(format!(
                    "Rule #{} on {c_target:?} could not be read; skipped.",
                    n_idx_entry + 1
                ));
                continue;
            };
            let Some(&n_idx_key) = dict_idx_by_col.get(&rule.key_column.to_uppercase()) else {
                report.cnt_rules_skipped += 1;
                report.warn(format!(
                    "Key column {:?} is not in sheet {:?}; rule on {c_target:?} skipped.",
                    rule.key_column,
                    grid.sheet_name()
                ));
                continue;
            };
            report.cnt_rules += 1;

            let mut n_hits = 0u64;
            for n_idx_row in 1..grid.height() {
                let if_key_match = grid
                    .cell(n_idx_row, n_idx_key)
                    .is_some_and(|cell| rule.key_value.matches_cell(&cell));
                if !if_key_match {
                    continue;
                }
                let cell = grid
                    .cell(n_idx_row, n_idx_target)
                    .unwrap_or(roster_io_xlsx::EnumCellValue::None);
                let n_value =
                    coerce_cell_to_integer(&cell).map_err(|_| RosterError::TypeCoercion {
                        column: c_target.clone(),
                        row: n_idx_row,
                        value: render_cell_text(&cell).unwrap_or_default(),
                    })?;
                if rule.operator.is_satisfied_by(n_value) {
                    grid.set_cell_fill(n_idx_row, n_idx_target, &rule.color)
                        .map_err(RosterError::Xlsx)?;
                    n_hits += 1;
                }
            }
            report.cnt_fills_applied += n_hits;
            tracing::debug!(
                column = c_target.as_str(),
                key_column = rule.key_column.as_str(),
                key_value = %rule.key_value,
                operator = %rule.operator,
                fills = n_hits,
                "rule applied"
            );
        }
    }
    Ok(())
}
