//! Database handle tying the store file, the metadata registry and the
//! export pipeline together.
//!
//! The handle owns only a name and a configuration. Every operation loads
//! the registry, mutates it, and saves it back; store connections live for
//! one call.

use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;

use crate::conf::{C_STORE_EXTENSION, SpecRosterConfig};
use crate::export::{SpecExportOptions, export_table};
use crate::loader::{load_frame, read_frame_file};
use crate::registry::MetadataRegistry;
use crate::report::{ReportExport, ReportImport};
use crate::rules::{SpecRuleRequest, register_rule};
use crate::schema::{derive_signature, ensure_table};
use crate::spec::{
    EnumColumnType, Result, RosterError, SpecMetadataRecord, SpecRelationship, SpecRule,
};
use crate::store::{SqliteStore, Store};

/// Handle on one named local database.
#[derive(Debug, Clone)]
pub struct LocalDb {
    db_name: String,
    config: SpecRosterConfig,
}

impl LocalDb {
    /// Canonical store name: `school` → `school.db`.
    ///
    /// Names carrying another extension are rejected; names must not contain
    /// path separators.
    pub fn normalize_db_name(name: &str) -> Result<String> {
        let c_name = name.trim();
        if c_name.is_empty() {
            return Err(RosterError::Validation("database name is empty".to_string()));
        }
        if c_name.contains(['/', '\\']) {
            return Err(RosterError::Validation(format!(
                "database name {c_name:?} must not contain path separators"
            )));
        }
        match Path::new(c_name).extension().and_then(|ext| ext.to_str()) {
            None => Ok(format!("{c_name}.{C_STORE_EXTENSION}")),
            Some(ext) if ext.eq_ignore_ascii_case(C_STORE_EXTENSION) => Ok(c_name.to_string()),
            Some(_) => Err(RosterError::UnsupportedFileType(c_name.to_string())),
        }
    }

    /// Create a new empty store file, then open it.
    pub fn create(config: &SpecRosterConfig, name: &str) -> Result<Self> {
        let db_name = Self::normalize_db_name(name)?;
        let path_file = config.path_dir_databases().join(&db_name);
        SqliteStore::create(&path_file)?;
        tracing::info!(db = db_name.as_str(), path = %path_file.display(), "store created");
        Self::open(config, &db_name)
    }

    /// Open an existing store; records it in the registry on first sight and
    /// declares the primary table.
    pub fn open(config: &SpecRosterConfig, name: &str) -> Result<Self> {
        let handle = Self {
            db_name: Self::normalize_db_name(name)?,
            config: config.clone(),
        };
        let mut store = handle.open_store()?;

        let mut registry = handle.load_registry()?;
        let (record, if_created) = registry.ensure_record(&handle.db_name);
        if if_created {
            tracing::info!(db = handle.db_name.as_str(), "metadata record created");
        }
        ensure_table(
            &mut store,
            record,
            &handle.config.name_primary_table,
            &handle.config.primary_signature(),
        )?;
        registry.save()?;
        Ok(handle)
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn path_file_store(&self) -> PathBuf {
        self.config.path_dir_databases().join(&self.db_name)
    }

    /// `<exports>/<db name>/<export file name>`.
    pub fn path_file_export(&self) -> PathBuf {
        self.config
            .path_dir_exports()
            .join(&self.db_name)
            .join(&self.config.name_export_file)
    }

    /// Snapshot of this database's metadata record.
    pub fn metadata(&self) -> Result<SpecMetadataRecord> {
        Ok(self.load_registry()?.require_record(&self.db_name)?.clone())
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        self.open_store()?.table_exists(table)
    }

    /// Whole table with uppercased column names.
    pub fn get_table(&self, table: &str) -> Result<DataFrame> {
        self.open_store()?.query_table(table)
    }

    /// Load a `.csv`/`.ipc`/`.arrow` file; the table defaults to the file stem.
    pub fn import_file(&self, path_file: &Path, table: Option<&str>) -> Result<ReportImport> {
        let df = read_frame_file(path_file)?;
        let c_table = match table {
            Some(c_table) => c_table.trim().to_string(),
            None => path_file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        self.import_frame(&df, &c_table)
    }

    /// Ensure `table` for the frame's signature and insert every row.
    ///
    /// The table is recorded before rows are loaded, so a rejected batch
    /// still leaves the (empty) table known.
    pub fn import_frame(&self, df: &DataFrame, table: &str) -> Result<ReportImport> {
        if table.is_empty() {
            return Err(RosterError::Validation("table name is empty".to_string()));
        }
        let mut report = ReportImport {
            table: table.to_string(),
            ..ReportImport::default()
        };
        let signature = derive_signature(df);
        for (col, decl) in df.get_columns().iter().zip(&signature.columns) {
            if decl.dtype == EnumColumnType::Text && !col.dtype().is_string() {
                report.warn(format!(
                    "Column {:?} ({}) stored as TEXT.",
                    decl.name,
                    col.dtype()
                ));
            }
        }

        let mut store = self.open_store()?;
        let mut registry = self.load_registry()?;
        let record = registry.require_record_mut(&self.db_name)?;
        report.if_table_created = ensure_table(&mut store, record, table, &signature)?;
        registry.save()?;

        report.cnt_rows_inserted = load_frame(&mut store, df, table)? as u64;
        tracing::info!(db = self.db_name.as_str(), "{}", report);
        Ok(report)
    }

    /// Validate and persist one export rule.
    pub fn add_export_param(&self, request: &SpecRuleRequest) -> Result<SpecRule> {
        let store = self.open_store()?;
        let mut registry = self.load_registry()?;
        let record = registry.require_record_mut(&self.db_name)?;
        let rule = register_rule(&store, record, &self.config.name_primary_table, request)?;
        registry.save()?;
        Ok(rule)
    }

    /// Record how `table` joins against the primary table.
    pub fn add_relationship(
        &self,
        table: &str,
        join_columns: &[String],
        pull_columns: &[String],
    ) -> Result<()> {
        if join_columns.is_empty() {
            return Err(RosterError::Validation(format!(
                "relationship for {table:?} needs at least one join column"
            )));
        }
        let mut registry = self.load_registry()?;
        let record = registry.require_record_mut(&self.db_name)?;
        let l_cols = Self::require_known_columns(record, table)?;
        for c_col in join_columns.iter().chain(pull_columns) {
            if !l_cols.iter().any(|c_known| c_known.eq_ignore_ascii_case(c_col)) {
                return Err(RosterError::Validation(format!(
                    "{c_col} is not a column in {table}"
                )));
            }
        }
        record.relationships.insert(
            table.to_string(),
            SpecRelationship {
                join_columns: join_columns.to_vec(),
                pull_columns: pull_columns.to_vec(),
            },
        );
        registry.save()?;
        tracing::info!(db = self.db_name.as_str(), table, "relationship recorded");
        Ok(())
    }

    /// Map a column of a secondary table onto a primary table column.
    pub fn add_subject(&self, foreign_column: &str, primary_column: &str) -> Result<()> {
        let mut registry = self.load_registry()?;
        let record = registry.require_record_mut(&self.db_name)?;
        let c_primary_table = self.config.name_primary_table.as_str();

        let l_primary = Self::require_known_columns(record, c_primary_table)?;
        if !l_primary
            .iter()
            .any(|c_known| c_known.eq_ignore_ascii_case(primary_column))
        {
            return Err(RosterError::Validation(format!(
                "{primary_column} is not a column in {c_primary_table}"
            )));
        }
        let if_foreign_known = record
            .tables
            .iter()
            .filter(|(c_table, _)| c_table.as_str() != c_primary_table)
            .any(|(_, l_cols)| {
                l_cols
                    .iter()
                    .any(|c_known| c_known.eq_ignore_ascii_case(foreign_column))
            });
        if !if_foreign_known {
            return Err(RosterError::Validation(format!(
                "{foreign_column} is not a column of any secondary table"
            )));
        }

        record
            .subjects
            .insert(foreign_column.to_string(), primary_column.to_string());
        registry.save()?;
        tracing::info!(
            db = self.db_name.as_str(),
            foreign_column,
            primary_column,
            "subject recorded"
        );
        Ok(())
    }

    /// Render the primary table with its rules to
    /// [`Self::path_file_export`].
    pub fn export_all_students(&self) -> Result<ReportExport> {
        let store = self.open_store()?;
        let c_table = self.config.name_primary_table.as_str();
        if !store.table_exists(c_table)? {
            return Err(RosterError::EntityNotFound(format!(
                "{c_table} table in {}",
                self.db_name
            )));
        }
        let record = self.metadata()?;
        let options = SpecExportOptions {
            table: c_table.to_string(),
            path_file_out: self.path_file_export(),
            policy_autofit: self.config.autofit_policy(),
        };
        export_table(&store, &record, &options)
    }

    fn open_store(&self) -> Result<SqliteStore> {
        let path_file = self.path_file_store();
        if !path_file.is_file() {
            return Err(RosterError::EntityNotFound(self.db_name.clone()));
        }
        SqliteStore::open(path_file)
    }

    fn load_registry(&self) -> Result<MetadataRegistry> {
        MetadataRegistry::load(self.config.path_file_registry())
    }

    fn require_known_columns<'a>(
        record: &'a SpecMetadataRecord,
        table: &str,
    ) -> Result<&'a [String]> {
        record
            .tables
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| RosterError::EntityNotFound(format!("table {table}")))
    }
}
