//! Flat-file reading and bulk row insertion.

use std::fs::File;
use std::path::Path;

use polars::prelude::{AnyValue, CsvReadOptions, DataFrame, IpcReader, SerReader};

use crate::spec::{Result, RosterError};
use crate::store::{EnumStoreValue, Store};

/// Read a `.csv` (header row expected) or `.ipc`/`.arrow` file into a frame.
pub fn read_frame_file(path_file: &Path) -> Result<DataFrame> {
    let c_ext = path_file
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !matches!(c_ext.as_str(), "csv" | "ipc" | "arrow") {
        return Err(RosterError::UnsupportedFileType(
            path_file.display().to_string(),
        ));
    }
    if !path_file.is_file() {
        return Err(RosterError::EntityNotFound(path_file.display().to_string()));
    }

    let df = match c_ext.as_str() {
        "csv" => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path_file.to_path_buf()))?
            .finish()?,
        _ => IpcReader::new(File::open(path_file)?).finish()?,
    };
    tracing::debug!(
        path = %path_file.display(),
        rows = df.height(),
        columns = df.width(),
        "frame read"
    );
    Ok(df)
}

/// Convert one polars scalar into a bindable store value.
///
/// Booleans become `True`/`False` text; unsupported types fall back to
/// their display text.
pub fn derive_store_value(value: AnyValue<'_>) -> EnumStoreValue {
    match value {
        AnyValue::Null => EnumStoreValue::Null,
        AnyValue::Boolean(val) => {
            EnumStoreValue::Text(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::String(val) => EnumStoreValue::Text(val.to_string()),
        AnyValue::StringOwned(val) => EnumStoreValue::Text(val.to_string()),
        AnyValue::UInt8(val) => EnumStoreValue::Integer(val as i64),
        AnyValue::UInt16(val) => EnumStoreValue::Integer(val as i64),
        AnyValue::UInt32(val) => EnumStoreValue::Integer(val as i64),
        AnyValue::UInt64(val) => match i64::try_from(val) {
            Ok(n) => EnumStoreValue::Integer(n),
            Err(_) => EnumStoreValue::Text(val.to_string()),
        },
        AnyValue::Int8(val) => EnumStoreValue::Integer(val as i64),
        AnyValue::Int16(val) => EnumStoreValue::Integer(val as i64),
        AnyValue::Int32(val) => EnumStoreValue::Integer(val as i64),
        AnyValue::Int64(val) => EnumStoreValue::Integer(val),
        AnyValue::Float32(val) => EnumStoreValue::Real(val as f64),
        AnyValue::Float64(val) => EnumStoreValue::Real(val),
        _ => EnumStoreValue::Text(value.to_string()),
    }
}

/// Row-major store values in frame column order.
pub fn derive_store_rows(df: &DataFrame) -> Result<Vec<Vec<EnumStoreValue>>> {
    let l_cols = df.get_columns();
    let mut l_rows = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let mut l_row = Vec::with_capacity(l_cols.len());
        for col in l_cols {
            l_row.push(derive_store_value(col.get(n_idx_row)?));
        }
        l_rows.push(l_row);
    }
    Ok(l_rows)
}

/// Insert every row of `df` into `table`, one bound statement per row.
///
/// Values are bound as parameters, never spliced into SQL text. The first
/// rejected row aborts the load and nothing is committed.
pub fn load_frame<S: Store + ?Sized>(store: &mut S, df: &DataFrame, table: &str) -> Result<usize> {
    let l_colnames: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let l_rows = derive_store_rows(df)?;
    let n_inserted = store.insert_rows(table, &l_colnames, &l_rows)?;
    tracing::info!(table, rows = n_inserted, "rows loaded");
    Ok(n_inserted)
}

#[cfg(test)]
mod tests {
    use polars::prelude::*;

    use super::*;
    use crate::schema::{derive_signature, ensure_table};
    use crate::spec::SpecMetadataRecord;
    use crate::store::SqliteStore;

    #[test]
    fn import_then_read_back_round_trips_shape() {
        let df = df!(
            "a" => &[1i64, 2, 3],
            "b" => &["x", "y, \"z\"", "'; DROP TABLE t; --"],
        )
        .expect("frame");
        let mut store = SqliteStore::open_in_memory().expect("store");
        let mut record = SpecMetadataRecord::default();
        ensure_table(&mut store, &mut record, "t", &derive_signature(&df)).expect("ensure");

        assert_eq!(load_frame(&mut store, &df, "t").expect("load"), 3);

        let df_back = store.query_table("t").expect("query");
        assert_eq!(df_back.get_column_names_str(), vec!["A", "B"]);
        assert_eq!(df_back.height(), df.height());
        assert_eq!(
            df_back.column("B").expect("col").str().expect("str").get(2),
            Some("'; DROP TABLE t; --")
        );
    }

    #[test]
    fn read_frame_file_parses_csv() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_csv = tmp.path().join("students.csv");
        std::fs::write(&path_csv, "ID,NAME,SCORE\n1,Ada,380\n2,Bo,410\n").expect("write");

        let df = read_frame_file(&path_csv).expect("read");
        assert_eq!(df.height(), 2);
        assert!(df.column("ID").expect("col").dtype().is_integer());
        assert_eq!(df.column("NAME").expect("col").dtype(), &DataType::String);
    }

    #[test]
    fn read_frame_file_rejects_unknown_extension_and_missing_file() {
        assert!(matches!(
            read_frame_file(Path::new("roster.xls")),
            Err(RosterError::UnsupportedFileType(_))
        ));
        assert!(matches!(
            read_frame_file(Path::new("/no/such/roster.csv")),
            Err(RosterError::EntityNotFound(_))
        ));
    }

    #[test]
    fn derive_store_value_formats_literals() {
        assert_eq!(derive_store_value(AnyValue::Int32(7)), EnumStoreValue::Integer(7));
        assert_eq!(
            derive_store_value(AnyValue::Boolean(true)),
            EnumStoreValue::Text("True".into())
        );
        assert_eq!(derive_store_value(AnyValue::Null), EnumStoreValue::Null);
    }
}
