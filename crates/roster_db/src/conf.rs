//! Constants, directory layout and runtime configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::spec::{
    EnumColumnType, Result, RosterError, SpecColumnDecl, SpecTableSignature,
};

pub use roster_io_xlsx::C_FILL_COLOR_DEFAULT;

/// Metadata file name inside the data directory.
pub const C_REGISTRY_FILE_NAME: &str = "config.json";
/// Canonical store file extension.
pub const C_STORE_EXTENSION: &str = "db";
/// Sub-directory holding the metadata file.
pub const C_DIR_DATA: &str = "data";
/// Sub-directory holding store files.
pub const C_DIR_DATABASES: &str = "databases";
/// Sub-directory holding per-database export folders.
pub const C_DIR_EXPORTS: &str = "exports";
/// Table every rule keys against.
pub const C_PRIMARY_TABLE_DEFAULT: &str = "All Students";
/// Export workbook name inside `exports/<db>/`.
pub const C_EXPORT_FILE_NAME_DEFAULT: &str = "all_students.xlsx";

/// Runtime configuration; every field has a default so a partial TOML file
/// is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecRosterConfig {
    /// Root holding `data/`, `databases/` and `exports/`.
    pub dir_root: PathBuf,
    /// Name of the primary table.
    pub name_primary_table: String,
    /// Signature the primary table is declared with.
    pub primary_columns: Vec<SpecColumnDecl>,
    /// Export workbook file name.
    pub name_export_file: String,
    /// Autofit padding in characters.
    pub width_padding: usize,
    /// Autofit scale factor.
    pub width_factor: f64,
}

impl Default for SpecRosterConfig {
    fn default() -> Self {
        Self {
            dir_root: PathBuf::from("."),
            name_primary_table: C_PRIMARY_TABLE_DEFAULT.to_string(),
            primary_columns: vec![
                SpecColumnDecl::new("ID", EnumColumnType::Integer),
                SpecColumnDecl::new("NAME", EnumColumnType::Text),
                SpecColumnDecl::new("SUBJECT", EnumColumnType::Text),
                SpecColumnDecl::new("SCORE", EnumColumnType::Integer),
            ],
            name_export_file: C_EXPORT_FILE_NAME_DEFAULT.to_string(),
            width_padding: roster_io_xlsx::conf::N_WIDTH_PADDING_DEFAULT,
            width_factor: roster_io_xlsx::conf::N_WIDTH_FACTOR_DEFAULT,
        }
    }
}

impl SpecRosterConfig {
    /// Default configuration rooted at `dir_root`.
    pub fn with_root(dir_root: impl Into<PathBuf>) -> Self {
        Self {
            dir_root: dir_root.into(),
            ..Self::default()
        }
    }

    /// Read a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let c_text = std::fs::read_to_string(path).map_err(|err| {
            RosterError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        toml::from_str(&c_text)
            .map_err(|err| RosterError::Config(format!("{}: {err}", path.display())))
    }

    pub fn path_dir_data(&self) -> PathBuf {
        self.dir_root.join(C_DIR_DATA)
    }

    pub fn path_dir_databases(&self) -> PathBuf {
        self.dir_root.join(C_DIR_DATABASES)
    }

    pub fn path_dir_exports(&self) -> PathBuf {
        self.dir_root.join(C_DIR_EXPORTS)
    }

    pub fn path_file_registry(&self) -> PathBuf {
        self.path_dir_data().join(C_REGISTRY_FILE_NAME)
    }

    pub fn primary_signature(&self) -> SpecTableSignature {
        SpecTableSignature::new(self.primary_columns.clone())
    }

    pub fn autofit_policy(&self) -> roster_io_xlsx::SpecAutofitPolicy {
        roster_io_xlsx::SpecAutofitPolicy {
            width_padding: self.width_padding,
            width_factor: self.width_factor,
        }
    }
}
