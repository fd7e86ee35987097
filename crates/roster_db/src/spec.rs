//! Data model, rule operators and top-level error types.

use std::collections::BTreeMap;
use std::fmt;

use roster_io_xlsx::EnumCellValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conf::C_FILL_COLOR_DEFAULT;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RosterError>;

////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failures surfaced by roster operations.
#[derive(Debug, Error)]
pub enum RosterError {
    /// Store name or import file carries an unrecognized extension.
    #[error("{0} file type not supported.")]
    UnsupportedFileType(String),

    /// Database file, table or metadata record is missing.
    #[error("{0} does not exist.")]
    EntityNotFound(String),

    /// Rejected input; nothing was changed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Rule target cell cannot be read as an integer.
    #[error("cannot coerce {value:?} in column {column} (sheet row {row}) to an integer")]
    TypeCoercion {
        /// Target column name.
        column: String,
        /// Sheet row (header is row 0).
        row: usize,
        /// Rendered offending value.
        value: String,
    },

    /// Store rejected a statement or query.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata file could not be parsed or written.
    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame construction or flat-file parsing failed.
    #[error("frame error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    /// Workbook rendering or saving failed.
    #[error("xlsx error: {0}")]
    Xlsx(String),

    /// Configuration file could not be read.
    #[error("config error: {0}")]
    Config(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TableSignature

/// Declared storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnumColumnType {
    /// Integral values.
    Integer,
    /// Anything else.
    Text,
}

impl EnumColumnType {
    /// SQL type marker.
    pub const fn sql_marker(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
        }
    }
}

/// One `(name, type)` pair of a table signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecColumnDecl {
    pub name: String,
    pub dtype: EnumColumnType,
}

impl SpecColumnDecl {
    pub fn new(name: impl Into<String>, dtype: EnumColumnType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// Ordered column → type signature of a table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecTableSignature {
    pub columns: Vec<SpecColumnDecl>,
}

impl SpecTableSignature {
    pub fn new(columns: Vec<SpecColumnDecl>) -> Self {
        Self { columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|decl| decl.name.clone()).collect()
    }

    /// Column definition list, e.g. `"ID" INTEGER, "NAME" TEXT`.
    pub fn to_sql(&self) -> String {
        self.columns
            .iter()
            .map(|decl| format!("{} {}", quote_identifier(&decl.name), decl.dtype.sql_marker()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Double-quote an SQL identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RuleModel

/// Value that selects the rows a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumKeyValue {
    Integer(i64),
    Text(String),
}

impl EnumKeyValue {
    /// Caller-typed value, kept verbatim as text until the key column's type
    /// is known (see [`Self::retype_for`]).
    pub fn from_raw(raw: &str) -> Self {
        Self::Text(raw.to_string())
    }

    /// Same value, retyped to match a column of the given kind.
    ///
    /// Text is parsed only for integral columns; text columns keep it as
    /// written, so `"007"` stays `"007"`.
    pub fn retype_for(&self, dtype: EnumColumnType) -> Self {
        match (self, dtype) {
            (Self::Integer(n), EnumColumnType::Text) => Self::Text(n.to_string()),
            (Self::Text(s), EnumColumnType::Integer) => match s.trim().parse::<i64>() {
                Ok(n) => Self::Integer(n),
                Err(_) => self.clone(),
            },
            _ => self.clone(),
        }
    }

    /// Equality against a rendered sheet cell; integers never equal text.
    pub fn matches_cell(&self, cell: &EnumCellValue) -> bool {
        match (self, cell) {
            (Self::Integer(n), EnumCellValue::Number(v)) => *v == *n as f64,
            (Self::Text(s), EnumCellValue::String(v)) => s == v,
            _ => false,
        }
    }
}

impl fmt::Display for EnumKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Rule comparison with exactly the bounds it needs.
///
/// Two-bound variants compare literally: `RangeGt` is `bound_1 > v > bound_2`,
/// so it only matches when `bound_1` is the larger bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumRuleOperator {
    /// `<`
    Lt(i64),
    /// `<=`
    Le(i64),
    /// `>`
    Gt(i64),
    /// `>=`
    Ge(i64),
    /// `< value <`
    RangeLt(i64, i64),
    /// `<= value <=`
    RangeLe(i64, i64),
    /// `> value >`
    RangeGt(i64, i64),
    /// `>= value >=`
    RangeGe(i64, i64),
}

impl EnumRuleOperator {
    /// Recognized operator tokens.
    pub const TUP_TOKENS: [&'static str; 8] = [
        "<",
        "<=",
        ">",
        ">=",
        "< value <",
        "<= value <=",
        "> value >",
        ">= value >=",
    ];

    /// Build from the token form plus optional bounds.
    ///
    /// A second bound given to a one-bound operator is ignored.
    pub fn parse(token: &str, bound_1: Option<i64>, bound_2: Option<i64>) -> Result<Self> {
        let c_token = token.trim();
        let is_two_bound = c_token.contains("value");
        if !Self::TUP_TOKENS.contains(&c_token) {
            return Err(RosterError::Validation(format!(
                "{token} is not a valid operator."
            )));
        }
        let Some(n_bound_1) = bound_1 else {
            return Err(RosterError::Validation(format!(
                "operator {c_token:?} requires a first bound"
            )));
        };
        if !is_two_bound {
            return Ok(match c_token {
                "<" => Self::Lt(n_bound_1),
                "<=" => Self::Le(n_bound_1),
                ">" => Self::Gt(n_bound_1),
                _ => Self::Ge(n_bound_1),
            });
        }
        let Some(n_bound_2) = bound_2 else {
            return Err(RosterError::Validation(format!(
                "operator {c_token:?} requires two bounds"
            )));
        };
        Ok(match c_token {
            "< value <" => Self::RangeLt(n_bound_1, n_bound_2),
            "<= value <=" => Self::RangeLe(n_bound_1, n_bound_2),
            "> value >" => Self::RangeGt(n_bound_1, n_bound_2),
            _ => Self::RangeGe(n_bound_1, n_bound_2),
        })
    }

    pub const fn token(&self) -> &'static str {
        match self {
            Self::Lt(_) => "<",
            Self::Le(_) => "<=",
            Self::Gt(_) => ">",
            Self::Ge(_) => ">=",
            Self::RangeLt(..) => "< value <",
            Self::RangeLe(..) => "<= value <=",
            Self::RangeGt(..) => "> value >",
            Self::RangeGe(..) => ">= value >=",
        }
    }

    /// `(bound_1, bound_2)`; the second is `None` for one-bound operators.
    pub const fn bounds(&self) -> (i64, Option<i64>) {
        match *self {
            Self::Lt(b) | Self::Le(b) | Self::Gt(b) | Self::Ge(b) => (b, None),
            Self::RangeLt(b1, b2)
            | Self::RangeLe(b1, b2)
            | Self::RangeGt(b1, b2)
            | Self::RangeGe(b1, b2) => (b1, Some(b2)),
        }
    }

    pub const fn is_satisfied_by(&self, value: i64) -> bool {
        match *self {
            Self::Lt(b) => value < b,
            Self::Le(b) => value <= b,
            Self::Gt(b) => value > b,
            Self::Ge(b) => value >= b,
            Self::RangeLt(b1, b2) => b1 < value && value < b2,
            Self::RangeLe(b1, b2) => b1 <= value && value <= b2,
            Self::RangeGt(b1, b2) => b1 > value && value > b2,
            Self::RangeGe(b1, b2) => b1 >= value && value >= b2,
        }
    }

    /// True when no integer can satisfy the operator.
    pub fn is_empty_range(&self) -> bool {
        match *self {
            Self::RangeLt(b1, b2) => b2.saturating_sub(b1) < 2,
            Self::RangeLe(b1, b2) => b1 > b2,
            Self::RangeGt(b1, b2) => b1.saturating_sub(b2) < 2,
            Self::RangeGe(b1, b2) => b1 < b2,
            _ => false,
        }
    }
}

impl fmt::Display for EnumRuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            (b1, None) => write!(f, "value {} {b1}", self.token()),
            (b1, Some(b2)) => write!(f, "{b1} {} {b2}", self.token()),
        }
    }
}

/// One conditional-fill instruction; the target column is the key it is
/// stored under in [`SpecMetadataRecord::export_params`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SpecRuleRecord", into = "SpecRuleRecord")]
pub struct SpecRule {
    /// Column whose value selects rows.
    pub key_column: String,
    /// Selecting value in `key_column`.
    pub key_value: EnumKeyValue,
    /// Comparison applied to the target cell.
    pub operator: EnumRuleOperator,
    /// Fill color, `AARRGGBB`.
    pub color: String,
}

/// On-disk rule shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpecRuleRecord {
    u_col: String,
    u_val: EnumKeyValue,
    operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    val_1: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    val_2: Option<i64>,
    #[serde(default = "derive_default_color")]
    color: String,
}

fn derive_default_color() -> String {
    C_FILL_COLOR_DEFAULT.to_string()
}

impl TryFrom<SpecRuleRecord> for SpecRule {
    type Error = RosterError;

    fn try_from(record: SpecRuleRecord) -> Result<Self> {
        Ok(Self {
            operator: EnumRuleOperator::parse(&record.operator, record.val_1, record.val_2)?,
            key_column: record.u_col,
            key_value: record.u_val,
            color: record.color,
        })
    }
}

impl From<SpecRule> for SpecRuleRecord {
    fn from(rule: SpecRule) -> Self {
        let (val_1, val_2) = rule.operator.bounds();
        Self {
            u_col: rule.key_column,
            u_val: rule.key_value,
            operator: rule.operator.token().to_string(),
            val_1: Some(val_1),
            val_2,
            color: rule.color,
        }
    }
}

/// One stored entry under a target column of
/// [`SpecMetadataRecord::export_params`].
///
/// Entries that do not read as a [`SpecRule`] (hand edits, older writers
/// that left out a bound) are kept verbatim and written back unchanged.
/// The export skips them with a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumRuleEntry {
    Rule(SpecRule),
    Unreadable(serde_json::Value),
}

impl EnumRuleEntry {
    pub fn as_rule(&self) -> Option<&SpecRule> {
        match self {
            Self::Rule(rule) => Some(rule),
            Self::Unreadable(_) => None,
        }
    }
}

impl From<SpecRule> for EnumRuleEntry {
    fn from(rule: SpecRule) -> Self {
        Self::Rule(rule)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MetadataRecord

/// Columns used to join a table against the primary table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpecRelationship {
    /// Columns matched between the two tables.
    pub join_columns: Vec<String>,
    /// Columns pulled from the joined table.
    pub pull_columns: Vec<String>,
}

/// Everything remembered about one database.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecMetadataRecord {
    /// Table name → column names observed at creation.
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<String>>,
    /// Table name → join description.
    #[serde(default)]
    pub relationships: BTreeMap<String, SpecRelationship>,
    /// Foreign column → primary table column.
    #[serde(default)]
    pub subjects: BTreeMap<String, String>,
    /// Target column → rules in registration order.
    #[serde(default)]
    pub export_params: BTreeMap<String, Vec<EnumRuleEntry>>,
    /// Keys this version does not know about, kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SpecMetadataRecord {
    pub fn is_table_known(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Number of readable rules.
    pub fn rule_count(&self) -> usize {
        self.export_params
            .values()
            .flatten()
            .filter(|entry| entry.as_rule().is_some())
            .count()
    }

    /// Number of stored entries that did not read as rules.
    pub fn unreadable_rule_count(&self) -> usize {
        self.export_params
            .values()
            .flatten()
            .filter(|entry| entry.as_rule().is_none())
            .count()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_token_and_missing_bounds() {
        assert!(matches!(
            EnumRuleOperator::parse("=<", Some(1), None),
            Err(RosterError::Validation(_))
        ));
        assert!(matches!(
            EnumRuleOperator::parse("<", None, None),
            Err(RosterError::Validation(_))
        ));
        assert!(matches!(
            EnumRuleOperator::parse("< value <", Some(1), None),
            Err(RosterError::Validation(_))
        ));
        assert_eq!(
            EnumRuleOperator::parse(">=", Some(4), Some(9)).unwrap(),
            EnumRuleOperator::Ge(4)
        );
    }

    #[test]
    fn literal_range_semantics() {
        let op = EnumRuleOperator::parse("< value <", Some(400), Some(425)).unwrap();
        assert!(op.is_satisfied_by(410));
        assert!(!op.is_satisfied_by(400));
        assert!(!op.is_satisfied_by(425));

        let op = EnumRuleOperator::parse("<= value <=", Some(400), Some(425)).unwrap();
        assert!(op.is_satisfied_by(400));
        assert!(op.is_satisfied_by(425));

        let op = EnumRuleOperator::parse("> value >", Some(400), Some(425)).unwrap();
        assert!(op.is_empty_range());
        assert!(!op.is_satisfied_by(410));

        let op = EnumRuleOperator::parse("> value >", Some(425), Some(400)).unwrap();
        assert!(!op.is_empty_range());
        assert!(op.is_satisfied_by(410));
    }

    #[test]
    fn rule_serializes_in_file_shape() {
        let rule = SpecRule {
            key_column: "SUBJECT".to_string(),
            key_value: EnumKeyValue::Text("MATH_6".to_string()),
            operator: EnumRuleOperator::RangeLt(400, 425),
            color: "00FFFF00".to_string(),
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "u_col": "SUBJECT",
                "u_val": "MATH_6",
                "operator": "< value <",
                "val_1": 400,
                "val_2": 425,
                "color": "00FFFF00",
            })
        );
        let rule_back: SpecRule = serde_json::from_value(value).unwrap();
        assert_eq!(rule_back, rule);
    }

    #[test]
    fn rule_without_color_gets_default_and_bad_operator_fails() {
        let rule: SpecRule = serde_json::from_value(serde_json::json!({
            "u_col": "ID", "u_val": 1, "operator": "<", "val_1": 400
        }))
        .unwrap();
        assert_eq!(rule.color, C_FILL_COLOR_DEFAULT);
        assert_eq!(rule.key_value, EnumKeyValue::Integer(1));

        let res: std::result::Result<SpecRule, _> = serde_json::from_value(serde_json::json!({
            "u_col": "ID", "u_val": 1, "operator": "!=", "val_1": 400
        }));
        assert!(res.is_err());
    }

    #[test]
    fn unreadable_rule_entry_is_kept_verbatim() {
        let record: SpecMetadataRecord = serde_json::from_value(serde_json::json!({
            "export_params": {
                "SCORE": [
                    {"u_col": "ID", "u_val": 1, "operator": "<"},
                    {"u_col": "ID", "u_val": 2, "operator": ">", "val_1": 400},
                ]
            }
        }))
        .unwrap();
        assert_eq!(record.rule_count(), 1);
        assert_eq!(record.unreadable_rule_count(), 1);
        assert_eq!(
            record.export_params["SCORE"][1].as_rule().map(|rule| rule.operator),
            Some(EnumRuleOperator::Gt(400))
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value["export_params"]["SCORE"][0],
            serde_json::json!({"u_col": "ID", "u_val": 1, "operator": "<"})
        );
    }

    #[test]
    fn key_value_matching_is_type_aware() {
        let key = EnumKeyValue::from_raw("1").retype_for(EnumColumnType::Integer);
        assert_eq!(key, EnumKeyValue::Integer(1));
        assert!(key.matches_cell(&EnumCellValue::Number(1.0)));
        assert!(!key.matches_cell(&EnumCellValue::String("1".into())));
        assert!(
            key.retype_for(EnumColumnType::Text)
                .matches_cell(&EnumCellValue::String("1".into()))
        );
        assert_eq!(
            EnumKeyValue::from_raw(" 12").retype_for(EnumColumnType::Integer),
            EnumKeyValue::Integer(12)
        );
        assert_eq!(
            EnumKeyValue::from_raw("MATH_6"),
            EnumKeyValue::Text("MATH_6".into())
        );
    }

    #[test]
    fn raw_key_keeps_text_form_for_text_columns() {
        for c_raw in ["007", "+5", " 12"] {
            let key = EnumKeyValue::from_raw(c_raw).retype_for(EnumColumnType::Text);
            assert_eq!(key, EnumKeyValue::Text(c_raw.to_string()));
            assert!(key.matches_cell(&EnumCellValue::String(c_raw.to_string())));
        }
        assert_eq!(
            EnumKeyValue::from_raw("007").retype_for(EnumColumnType::Integer),
            EnumKeyValue::Integer(7)
        );
    }

    #[test]
    fn signature_sql_quotes_identifiers() {
        let sig = SpecTableSignature::new(vec![
            SpecColumnDecl::new("ID", EnumColumnType::Integer),
            SpecColumnDecl::new("SOL \"LAST\" YEAR", EnumColumnType::Text),
        ]);
        assert_eq!(sig.to_sql(), "\"ID\" INTEGER, \"SOL \"\"LAST\"\" YEAR\" TEXT");
    }
}
