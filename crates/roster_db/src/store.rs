//! Relational store seam and its SQLite implementation.
//!
//! Column names are uppercased on read ([`Store::query_table`]); metadata
//! keeps names as declared, so callers compare case-insensitively.

use std::path::Path;

use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, OpenFlags, params_from_iter};

use crate::spec::{Result, RosterError, SpecTableSignature, quote_identifier};

////////////////////////////////////////////////////////////////////////////////
// #region StoreValue

/// Scalar bound into an insert statement.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumStoreValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ToSql for EnumStoreValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(val) => ToSqlOutput::Owned(Value::Integer(*val)),
            Self::Real(val) => ToSqlOutput::Owned(Value::Real(*val)),
            Self::Text(val) => ToSqlOutput::Borrowed(ValueRef::Text(val.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for EnumStoreValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(val) => Self::Integer(val),
            ValueRef::Real(val) => Self::Real(val),
            ValueRef::Text(val) | ValueRef::Blob(val) => {
                Self::Text(String::from_utf8_lossy(val).into_owned())
            }
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StoreTrait

/// Operations the roster needs from a relational store.
pub trait Store {
    /// Catalog lookup; does not treat query failures as "missing".
    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Create `table` unless it already exists.
    fn create_table(&mut self, table: &str, signature: &SpecTableSignature) -> Result<()>;

    /// Column names as stored, in declaration order.
    fn table_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Insert every row with one parameterized statement per row.
    ///
    /// All-or-nothing: the first rejected row aborts the batch and no row is
    /// committed. Returns the number of inserted rows.
    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<EnumStoreValue>],
    ) -> Result<usize>;

    /// Whole table as a frame with uppercased column names.
    fn query_table(&self, table: &str) -> Result<DataFrame>;
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SqliteStore

/// [`Store`] over one SQLite file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing store file.
    pub fn open(path_file: impl AsRef<Path>) -> Result<Self> {
        let path_file = path_file.as_ref();
        if !path_file.is_file() {
            return Err(RosterError::EntityNotFound(path_file.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            path_file,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Create a new, empty store file; fails when the file exists.
    pub fn create(path_file: impl AsRef<Path>) -> Result<Self> {
        let path_file = path_file.as_ref();
        if path_file.exists() {
            return Err(RosterError::Validation(format!(
                "{} already exists.",
                path_file.display()
            )));
        }
        if let Some(parent) = path_file.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path_file)?;
        // Force the header page so the file exists on disk right away.
        conn.execute_batch("PRAGMA user_version = 1;")?;
        Ok(Self { conn })
    }

    /// Private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    fn column_decl_types(&self, table: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let l_rows = stmt
            .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(l_rows)
    }
}

impl Store for SqliteStore {
    fn table_exists(&self, table: &str) -> Result<bool> {
        let n_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [table],
            |row| row.get(0),
        )?;
        Ok(n_count > 0)
    }

    fn create_table(&mut self, table: &str, signature: &SpecTableSignature) -> Result<()> {
        if signature.is_empty() {
            return Err(RosterError::Validation(format!(
                "table {table:?} needs at least one column"
            )));
        }
        let c_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(table),
            signature.to_sql()
        );
        self.conn.execute(&c_sql, [])?;
        Ok(())
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let l_cols = self
            .column_decl_types(table)?
            .into_iter()
            .map(|(c_name, _)| c_name)
            .collect::<Vec<_>>();
        if l_cols.is_empty() {
            return Err(RosterError::EntityNotFound(format!("table {table}")));
        }
        Ok(l_cols)
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<EnumStoreValue>],
    ) -> Result<usize> {
        if columns.is_empty() {
            return Err(RosterError::Validation(
                "insert needs at least one column".to_string(),
            ));
        }
        let c_cols = columns
            .iter()
            .map(|c_name| quote_identifier(c_name))
            .collect::<Vec<_>>()
            .join(", ");
        let c_placeholders = (1..=columns.len())
            .map(|n_idx| format!("?{n_idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let c_sql = format!(
            "INSERT INTO {} ({c_cols}) VALUES ({c_placeholders})",
            quote_identifier(table)
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&c_sql)?;
            for (n_idx_row, l_row) in rows.iter().enumerate() {
                if l_row.len() != columns.len() {
                    return Err(RosterError::Validation(format!(
                        "row {n_idx_row} has {} values, expected {}",
                        l_row.len(),
                        columns.len()
                    )));
                }
                stmt.execute(params_from_iter(l_row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn query_table(&self, table: &str) -> Result<DataFrame> {
        if !self.table_exists(table)? {
            return Err(RosterError::EntityNotFound(format!("table {table}")));
        }
        let l_decl = self.column_decl_types(table)?;
        let c_sql = format!("SELECT * FROM {}", quote_identifier(table));
        let mut stmt = self.conn.prepare(&c_sql)?;
        let l_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_uppercase)
            .collect();
        let n_width = l_names.len();

        let mut l_values_by_col: Vec<Vec<EnumStoreValue>> = vec![Vec::new(); n_width];
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (n_idx_col, l_values) in l_values_by_col.iter_mut().enumerate() {
                l_values.push(EnumStoreValue::from(row.get_ref(n_idx_col)?));
            }
        }

        let l_columns = l_names
            .iter()
            .zip(l_values_by_col)
            .enumerate()
            .map(|(n_idx_col, (c_name, l_values))| {
                let c_decl = l_decl
                    .get(n_idx_col)
                    .map(|(_, c_type)| c_type.as_str())
                    .unwrap_or("");
                derive_frame_column(c_name, c_decl, l_values)
            })
            .collect::<Vec<_>>();

        Ok(DataFrame::new(l_columns)?)
    }
}

/// Build one frame column, typed from the values (or the declared type when
/// every value is null).
fn derive_frame_column(name: &str, decl_type: &str, values: Vec<EnumStoreValue>) -> Column {
    let if_all_integer = values
        .iter()
        .all(|val| matches!(val, EnumStoreValue::Null | EnumStoreValue::Integer(_)));
    let if_all_numeric = values.iter().all(|val| {
        matches!(
            val,
            EnumStoreValue::Null | EnumStoreValue::Integer(_) | EnumStoreValue::Real(_)
        )
    });
    let if_all_null = values.iter().all(|val| matches!(val, EnumStoreValue::Null));
    let c_decl = decl_type.to_ascii_uppercase();

    let if_as_integer = if if_all_null {
        c_decl.contains("INT")
    } else {
        if_all_integer
    };
    let if_as_real = if if_all_null {
        ["REAL", "FLOA", "DOUB"].iter().any(|c_kw| c_decl.contains(c_kw))
    } else {
        if_all_numeric
    };

    let series = if if_as_integer {
        let l_vals: Vec<Option<i64>> = values
            .into_iter()
            .map(|val| match val {
                EnumStoreValue::Integer(n) => Some(n),
                _ => None,
            })
            .collect();
        Series::new(name.into(), l_vals)
    } else if if_as_real {
        let l_vals: Vec<Option<f64>> = values
            .into_iter()
            .map(|val| match val {
                EnumStoreValue::Integer(n) => Some(n as f64),
                EnumStoreValue::Real(n) => Some(n),
                _ => None,
            })
            .collect();
        Series::new(name.into(), l_vals)
    } else {
        let l_vals: Vec<Option<String>> = values
            .into_iter()
            .map(|val| match val {
                EnumStoreValue::Null => None,
                EnumStoreValue::Integer(n) => Some(n.to_string()),
                EnumStoreValue::Real(n) => Some(n.to_string()),
                EnumStoreValue::Text(s) => Some(s),
            })
            .collect();
        Series::new(name.into(), l_vals)
    };
    Column::from(series)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use polars::prelude::DataType;

    use super::*;
    use crate::spec::{EnumColumnType, SpecColumnDecl};

    fn derive_signature_id_name() -> SpecTableSignature {
        SpecTableSignature::new(vec![
            SpecColumnDecl::new("Id", EnumColumnType::Integer),
            SpecColumnDecl::new("Name", EnumColumnType::Text),
        ])
    }

    #[test]
    fn table_exists_uses_catalog() {
        let mut store = SqliteStore::open_in_memory().expect("store");
        assert!(!store.table_exists("Scores").expect("exists"));
        store
            .create_table("Scores", &derive_signature_id_name())
            .expect("create");
        assert!(store.table_exists("Scores").expect("exists"));
        assert!(store.table_exists("scores").expect("exists"));
    }

    #[test]
    fn query_uppercases_names_and_types_columns() {
        let mut store = SqliteStore::open_in_memory().expect("store");
        store
            .create_table("Scores", &derive_signature_id_name())
            .expect("create");
        let n_rows = store
            .insert_rows(
                "Scores",
                &["Id".to_string(), "Name".to_string()],
                &[
                    vec![EnumStoreValue::Integer(1), EnumStoreValue::Text("a, b'); --".into())],
                    vec![EnumStoreValue::Integer(2), EnumStoreValue::Null],
                ],
            )
            .expect("insert");
        assert_eq!(n_rows, 2);

        let df = store.query_table("Scores").expect("query");
        assert_eq!(df.get_column_names_str(), vec!["ID", "NAME"]);
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("ID").expect("col").dtype(), &DataType::Int64);
        assert_eq!(df.column("NAME").expect("col").dtype(), &DataType::String);
        assert_eq!(
            df.column("NAME").expect("col").str().expect("str").get(0),
            Some("a, b'); --")
        );
    }

    #[test]
    fn insert_rows_is_all_or_nothing() {
        let mut store = SqliteStore::open_in_memory().expect("store");
        store
            .conn
            .execute_batch("CREATE TABLE t (id INTEGER NOT NULL)")
            .expect("create");
        let res = store.insert_rows(
            "t",
            &["id".to_string()],
            &[
                vec![EnumStoreValue::Integer(1)],
                vec![EnumStoreValue::Null],
                vec![EnumStoreValue::Integer(3)],
            ],
        );
        assert!(matches!(res, Err(RosterError::Store(_))));
        assert_eq!(store.query_table("t").expect("query").height(), 0);
    }

    #[test]
    fn empty_integer_table_keeps_declared_type() {
        let mut store = SqliteStore::open_in_memory().expect("store");
        store
            .create_table("Scores", &derive_signature_id_name())
            .expect("create");
        let df = store.query_table("Scores").expect("query");
        assert_eq!(df.height(), 0);
        assert_eq!(df.column("ID").expect("col").dtype(), &DataType::Int64);
        assert_eq!(store.table_columns("Scores").expect("cols"), vec!["Id", "Name"]);
    }

    #[test]
    fn missing_table_and_file_are_not_found() {
        let store = SqliteStore::open_in_memory().expect("store");
        assert!(matches!(
            store.query_table("nope"),
            Err(RosterError::EntityNotFound(_))
        ));
        assert!(matches!(
            SqliteStore::open("/definitely/not/here.db"),
            Err(RosterError::EntityNotFound(_))
        ));
    }
}
