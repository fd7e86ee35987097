//! Table creation and frame → signature derivation.

use polars::prelude::DataFrame;

use crate::spec::{EnumColumnType, Result, SpecColumnDecl, SpecMetadataRecord, SpecTableSignature};
use crate::store::Store;

/// Map frame dtypes onto storage types: integral → `INTEGER`, anything else
/// (floats, booleans, dates, text) → `TEXT`.
pub fn derive_signature(df: &DataFrame) -> SpecTableSignature {
    SpecTableSignature::new(
        df.get_columns()
            .iter()
            .map(|col| {
                let dtype = if col.dtype().is_integer() {
                    EnumColumnType::Integer
                } else {
                    EnumColumnType::Text
                };
                SpecColumnDecl::new(col.name().as_str(), dtype)
            })
            .collect(),
    )
}

/// Make sure `table` exists and is recorded in `record`.
///
/// Tables already listed in `record` are left alone. Otherwise the table is
/// created and the column list the store reports back is recorded; that
/// list is not compared against `signature`. Returns true when the table was
/// recorded by this call.
pub fn ensure_table<S: Store + ?Sized>(
    store: &mut S,
    record: &mut SpecMetadataRecord,
    table: &str,
    signature: &SpecTableSignature,
) -> Result<bool> {
    if record.is_table_known(table) {
        return Ok(false);
    }
    store.create_table(table, signature)?;
    let l_cols = store.table_columns(table)?;
    tracing::info!(table, columns = ?l_cols, "table recorded");
    record.tables.insert(table.to_string(), l_cols);
    Ok(true)
}
