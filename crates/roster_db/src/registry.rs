//! Durable per-database metadata, stored as one JSON document.
//!
//! The file is always read and rewritten whole. Writes go to a sibling
//! `.tmp` file first and are renamed over the target, so readers never see a
//! half-written document. There is no locking: two processes mutating the
//! same file concurrently lose updates (last writer wins).

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::spec::{Result, RosterError, SpecMetadataRecord};

/// In-memory copy of the metadata file.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRegistry {
    path_file: PathBuf,
    dict_records: BTreeMap<String, SpecMetadataRecord>,
}

impl MetadataRegistry {
    /// Load the registry; a missing file yields an empty registry.
    pub fn load(path_file: impl AsRef<Path>) -> Result<Self> {
        let path_file = path_file.as_ref().to_path_buf();
        let dict_records = if path_file.exists() {
            let v_bytes = fs::read(&path_file)?;
            if v_bytes.iter().all(u8::is_ascii_whitespace) {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&v_bytes)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path_file,
            dict_records,
        })
    }

    /// Persist the whole registry (4-space indented JSON).
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path_file.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut v_buf = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut v_buf, PrettyFormatter::with_indent(b"    "));
        self.dict_records.serialize(&mut serializer)?;

        let path_tmp = derive_tmp_path(&self.path_file);
        {
            let mut file_tmp = fs::File::create(&path_tmp)?;
            file_tmp.write_all(&v_buf)?;
            file_tmp.sync_all()?;
        }
        fs::rename(&path_tmp, &self.path_file)?;
        tracing::debug!(path = %self.path_file.display(), "metadata registry saved");
        Ok(())
    }

    pub fn db_names(&self) -> impl Iterator<Item = &str> {
        self.dict_records.keys().map(String::as_str)
    }

    pub fn record(&self, db_name: &str) -> Option<&SpecMetadataRecord> {
        self.dict_records.get(db_name)
    }

    pub fn record_mut(&mut self, db_name: &str) -> Option<&mut SpecMetadataRecord> {
        self.dict_records.get_mut(db_name)
    }

    /// Like [`Self::record`], but a missing record is an error.
    pub fn require_record(&self, db_name: &str) -> Result<&SpecMetadataRecord> {
        self.record(db_name)
            .ok_or_else(|| RosterError::EntityNotFound(format!("metadata for {db_name}")))
    }

    /// Like [`Self::record_mut`], but a missing record is an error.
    pub fn require_record_mut(&mut self, db_name: &str) -> Result<&mut SpecMetadataRecord> {
        self.record_mut(db_name)
            .ok_or_else(|| RosterError::EntityNotFound(format!("metadata for {db_name}")))
    }

    /// Get or create the record for `db_name`; the flag is true when created.
    pub fn ensure_record(&mut self, db_name: &str) -> (&mut SpecMetadataRecord, bool) {
        let if_created = !self.dict_records.contains_key(db_name);
        let record = self.dict_records.entry(db_name.to_string()).or_default();
        (record, if_created)
    }
}

fn derive_tmp_path(path_file: &Path) -> PathBuf {
    let mut c_name = path_file
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    c_name.push(".tmp");
    path_file.with_file_name(c_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnumKeyValue, EnumRuleOperator, SpecRule};

    #[test]
    fn missing_file_loads_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let registry = MetadataRegistry::load(tmp.path().join("config.json")).expect("load");
        assert_eq!(registry.db_names().count(), 0);
    }

    #[test]
    fn save_then_load_round_trips_and_leaves_no_tmp() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_file = tmp.path().join("data").join("config.json");

        let mut registry = MetadataRegistry::load(&path_file).expect("load");
        let (record, if_created) = registry.ensure_record("school.db");
        assert!(if_created);
        record
            .tables
            .insert("All Students".into(), vec!["ID".into(), "SCORE".into()]);
        record.export_params.insert(
            "SCORE".into(),
            vec![SpecRule {
                key_column: "ID".into(),
                key_value: EnumKeyValue::Integer(1),
                operator: EnumRuleOperator::Lt(400),
                color: "00FF0000".into(),
            }
            .into()],
        );
        registry.save().expect("save");

        assert!(path_file.exists());
        assert!(!tmp.path().join("data").join("config.json.tmp").exists());
        let c_text = fs::read_to_string(&path_file).expect("read");
        assert!(c_text.contains("\n    \"school.db\""));

        let registry_back = MetadataRegistry::load(&path_file).expect("reload");
        assert_eq!(registry_back, registry);
        let (_, if_created) = registry.ensure_record("school.db");
        assert!(!if_created);
    }

    #[test]
    fn unknown_keys_survive_rewrite() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_file = tmp.path().join("config.json");
        fs::write(
            &path_file,
            r#"{"old.db": {"export_params": {}, "notes": {"owner": "ms. k"}}}"#,
        )
        .expect("seed");

        let registry = MetadataRegistry::load(&path_file).expect("load");
        registry.save().expect("save");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path_file).expect("read")).expect("json");
        assert_eq!(value["old.db"]["notes"]["owner"], "ms. k");
        assert!(value["old.db"]["tables"].is_object());
    }

    #[test]
    fn unreadable_rule_does_not_block_other_databases() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_file = tmp.path().join("config.json");
        fs::write(
            &path_file,
            r#"{
                "a.db": {"export_params": {"SCORE": [{"u_col": "ID", "u_val": 1, "operator": "<"}]}},
                "b.db": {"export_params": {"SCORE": [{"u_col": "ID", "u_val": 2, "operator": "<", "val_1": 400}]}}
            }"#,
        )
        .expect("seed");

        let registry = MetadataRegistry::load(&path_file).expect("load");
        let record_a = registry.require_record("a.db").expect("a");
        assert_eq!(record_a.rule_count(), 0);
        assert_eq!(record_a.unreadable_rule_count(), 1);
        assert_eq!(registry.require_record("b.db").expect("b").rule_count(), 1);

        registry.save().expect("save");
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path_file).expect("read")).expect("json");
        assert_eq!(
            value["a.db"]["export_params"]["SCORE"][0],
            serde_json::json!({"u_col": "ID", "u_val": 1, "operator": "<"})
        );
    }

    #[test]
    fn require_record_reports_missing_db() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let registry = MetadataRegistry::load(tmp.path().join("c.json")).expect("load");
        assert!(matches!(
            registry.require_record("nope.db"),
            Err(RosterError::EntityNotFound(_))
        ));
    }
}
