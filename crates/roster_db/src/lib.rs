//! `roster_db` v1:
//! Local student/subject record store with rule-based spreadsheet export.
//!
//! Modules:
//! - `conf`     : constants, paths and runtime configuration
//! - `spec`     : data model, rule operators and error types
//! - `registry` : per-database metadata file (tables, relationships, rules)
//! - `store`    : relational store seam and its SQLite implementation
//! - `schema`   : table creation and frame signature derivation
//! - `loader`   : flat-file reading and bulk row insertion
//! - `rules`    : export rule validation and registration
//! - `export`   : table → formatted workbook pipeline
//! - `report`   : run-time report models
//! - `db`       : database handle orchestrating the above
pub mod conf;
pub mod db;
pub mod export;
pub mod loader;
pub mod registry;
pub mod report;
pub mod rules;
pub mod schema;
pub mod spec;
pub mod store;

pub use conf::SpecRosterConfig;
pub use db::LocalDb;
pub use export::{SpecExportOptions, apply_export_rules, export_table};
pub use loader::{derive_store_rows, load_frame, read_frame_file};
pub use registry::MetadataRegistry;
pub use report::{EnumExportStage, ReportExport, ReportImport};
pub use rules::{SpecRuleRequest, register_rule};
pub use schema::{derive_signature, ensure_table};
pub use spec::{
    EnumColumnType, EnumKeyValue, EnumRuleEntry, EnumRuleOperator, Result, RosterError,
    SpecColumnDecl, SpecMetadataRecord, SpecRelationship, SpecRule, SpecTableSignature,
};
pub use store::{EnumStoreValue, SqliteStore, Store};
