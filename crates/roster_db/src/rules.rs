//! Export rule validation and registration.

use roster_io_xlsx::{derive_cell_value_from_any_value, normalize_argb_color};

use crate::conf::C_FILL_COLOR_DEFAULT;
use crate::spec::{
    EnumColumnType, EnumKeyValue, EnumRuleEntry, EnumRuleOperator, Result, RosterError,
    SpecMetadataRecord, SpecRule,
};
use crate::store::Store;

/// Unvalidated rule as entered by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRuleRequest {
    /// Column whose cells get filled.
    pub column: String,
    /// Column selecting the rows.
    pub key_column: String,
    /// Selecting value.
    pub key_value: EnumKeyValue,
    /// Operator token, e.g. `"<"` or `"< value <"`.
    pub operator: String,
    pub bound_1: Option<i64>,
    pub bound_2: Option<i64>,
    /// Hex color; `None` uses the default yellow.
    pub color: Option<String>,
}

/// Validate `request` against the current primary table and append it to
/// `record.export_params`.
///
/// Nothing in `record` changes unless every check passes. The caller owns
/// persistence of `record`.
pub fn register_rule<S: Store + ?Sized>(
    store: &S,
    record: &mut SpecMetadataRecord,
    primary_table: &str,
    request: &SpecRuleRequest,
) -> Result<SpecRule> {
    let operator =
        EnumRuleOperator::parse(&request.operator, request.bound_1, request.bound_2)?;
    let c_color = normalize_argb_color(request.color.as_deref().unwrap_or(C_FILL_COLOR_DEFAULT))
        .map_err(RosterError::Validation)?;

    let c_target = request.column.trim();
    let c_key_col = request.key_column.trim();
    if c_target.is_empty() || c_key_col.is_empty() {
        return Err(RosterError::Validation(
            "rule needs a target column and a key column".to_string(),
        ));
    }

    let df = store.query_table(primary_table)?;
    if df.column(&c_target.to_uppercase()).is_err() {
        return Err(RosterError::Validation(format!(
            "{c_target} is not a column in {primary_table}"
        )));
    }
    let Ok(col_key) = df.column(&c_key_col.to_uppercase()) else {
        return Err(RosterError::Validation(format!(
            "{c_key_col} is not a column in {primary_table}"
        )));
    };

    let dtype_key = if col_key.dtype().is_integer() {
        EnumColumnType::Integer
    } else {
        EnumColumnType::Text
    };
    let key_value = request.key_value.retype_for(dtype_key);
    let mut if_key_found = false;
    for n_idx in 0..col_key.len() {
        if key_value.matches_cell(&derive_cell_value_from_any_value(col_key.get(n_idx)?)) {
            if_key_found = true;
            break;
        }
    }
    if !if_key_found {
        return Err(RosterError::Validation(format!(
            "{key_value} is not a value in column {c_key_col}"
        )));
    }

    if operator.is_empty_range() {
        tracing::warn!(
            column = c_target,
            %operator,
            "operator bounds admit no value; rule will never fill a cell"
        );
    }

    let rule = SpecRule {
        key_column: c_key_col.to_string(),
        key_value,
        operator,
        color: c_color,
    };
    record
        .export_params
        .entry(c_target.to_string())
        .or_default()
        .push(EnumRuleEntry::Rule(rule.clone()));
    tracing::info!(
        column = c_target,
        key_column = c_key_col,
        key_value = %rule.key_value,
        %operator,
        "export rule registered"
    );
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::spec::{SpecColumnDecl, SpecTableSignature};
    use crate::store::{EnumStoreValue, SqliteStore};

    fn derive_store_primary() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().expect("store");
        store
            .create_table(
                "All Students",
                &SpecTableSignature::new(vec![
                    SpecColumnDecl::new("ID", EnumColumnType::Integer),
                    SpecColumnDecl::new("NAME", EnumColumnType::Text),
                    SpecColumnDecl::new("SUBJECT", EnumColumnType::Text),
                    SpecColumnDecl::new("SCORE", EnumColumnType::Integer),
                ]),
            )
            .expect("create");
        store
            .insert_rows(
                "All Students",
                &["ID".into(), "NAME".into(), "SUBJECT".into(), "SCORE".into()],
                &[
                    vec![
                        EnumStoreValue::Integer(1),
                        EnumStoreValue::Text("Ada".into()),
                        EnumStoreValue::Text("MATH_6".into()),
                        EnumStoreValue::Integer(380),
                    ],
                    vec![
                        EnumStoreValue::Integer(2),
                        EnumStoreValue::Text("Bo".into()),
                        EnumStoreValue::Text("READ_6".into()),
                        EnumStoreValue::Integer(410),
                    ],
                ],
            )
            .expect("insert");
        store
    }

    fn derive_request(key_value: EnumKeyValue, operator: &str) -> SpecRuleRequest {
        SpecRuleRequest {
            column: "score".into(),
            key_column: "ID".into(),
            key_value,
            operator: operator.into(),
            bound_1: Some(400),
            bound_2: None,
            color: Some("FF0000".into()),
        }
    }

    #[test]
    fn register_appends_normalized_rule() {
        let store = derive_store_primary();
        let mut record = SpecMetadataRecord::default();
        let rule = register_rule(
            &store,
            &mut record,
            "All Students",
            &derive_request(EnumKeyValue::from_raw("1"), "<"),
        )
        .expect("register");
        assert_eq!(rule.color, "00FF0000");
        assert_eq!(rule.operator, EnumRuleOperator::Lt(400));
        assert_eq!(record.export_params["score"], vec![EnumRuleEntry::Rule(rule)]);
    }

    #[test]
    fn text_key_is_retyped_for_integer_column() {
        let store = derive_store_primary();
        let mut record = SpecMetadataRecord::default();
        let rule = register_rule(
            &store,
            &mut record,
            "All Students",
            &derive_request(EnumKeyValue::Text("2".into()), ">="),
        )
        .expect("register");
        assert_eq!(rule.key_value, EnumKeyValue::Integer(2));
    }

    #[test]
    fn text_key_column_keeps_leading_zeros() {
        let mut store = SqliteStore::open_in_memory().expect("store");
        store
            .create_table(
                "All Students",
                &SpecTableSignature::new(vec![
                    SpecColumnDecl::new("CODE", EnumColumnType::Text),
                    SpecColumnDecl::new("SCORE", EnumColumnType::Integer),
                ]),
            )
            .expect("create");
        store
            .insert_rows(
                "All Students",
                &["CODE".into(), "SCORE".into()],
                &[
                    vec![EnumStoreValue::Text("007".into()), EnumStoreValue::Integer(380)],
                    vec![EnumStoreValue::Text("008".into()), EnumStoreValue::Integer(410)],
                ],
            )
            .expect("insert");
        let mut record = SpecMetadataRecord::default();

        let rule = register_rule(
            &store,
            &mut record,
            "All Students",
            &SpecRuleRequest {
                key_column: "CODE".into(),
                ..derive_request(EnumKeyValue::from_raw("007"), "<")
            },
        )
        .expect("register");
        assert_eq!(rule.key_value, EnumKeyValue::Text("007".into()));

        let err = register_rule(
            &store,
            &mut record,
            "All Students",
            &SpecRuleRequest {
                key_column: "CODE".into(),
                ..derive_request(EnumKeyValue::from_raw("7"), "<")
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "validation failed: 7 is not a value in column CODE");
    }

    #[test]
    fn rejected_requests_leave_record_unchanged() {
        let store = derive_store_primary();
        let mut record = SpecMetadataRecord::default();
        register_rule(
            &store,
            &mut record,
            "All Students",
            &derive_request(EnumKeyValue::Integer(1), "<"),
        )
        .expect("seed");
        let record_before = record.clone();

        let l_requests = vec![
            derive_request(EnumKeyValue::Integer(999), "<"),
            derive_request(EnumKeyValue::Integer(1), "=<"),
            SpecRuleRequest {
                color: Some("not-a-color".into()),
                ..derive_request(EnumKeyValue::Integer(1), "<")
            },
            SpecRuleRequest {
                column: "GPA".into(),
                ..derive_request(EnumKeyValue::Integer(1), "<")
            },
            SpecRuleRequest {
                key_column: "STUDENT".into(),
                ..derive_request(EnumKeyValue::Integer(1), "<")
            },
            SpecRuleRequest {
                bound_2: None,
                ..derive_request(EnumKeyValue::Integer(1), "< value <")
            },
        ];
        for request in &l_requests {
            let res = register_rule(&store, &mut record, "All Students", request);
            assert!(
                matches!(res, Err(RosterError::Validation(_))),
                "{request:?} -> {res:?}"
            );
        }
        assert_eq!(record, record_before);
    }

    #[test]
    fn absent_key_message_names_value_and_column() {
        let store = derive_store_primary();
        let mut record = SpecMetadataRecord::default();
        let err = register_rule(
            &store,
            &mut record,
            "All Students",
            &SpecRuleRequest {
                key_column: "SUBJECT".into(),
                ..derive_request(EnumKeyValue::from_raw("SCI_6"), "<")
            },
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed: SCI_6 is not a value in column SUBJECT"
        );
    }

    proptest! {
        #[test]
        fn single_bound_predicates_match_comparison(b in -1000i64..1000, v in -1000i64..1000) {
            prop_assert_eq!(EnumRuleOperator::Lt(b).is_satisfied_by(v), v < b);
            prop_assert_eq!(EnumRuleOperator::Le(b).is_satisfied_by(v), v <= b);
            prop_assert_eq!(EnumRuleOperator::Gt(b).is_satisfied_by(v), v > b);
            prop_assert_eq!(EnumRuleOperator::Ge(b).is_satisfied_by(v), v >= b);
        }

        #[test]
        fn ascending_ranges_match_open_and_closed_intervals(
            b1 in -1000i64..1000,
            b2 in -1000i64..1000,
            v in -1000i64..1000,
        ) {
            let op_open = EnumRuleOperator::parse("< value <", Some(b1), Some(b2)).unwrap();
            let op_closed = EnumRuleOperator::parse("<= value <=", Some(b1), Some(b2)).unwrap();
            prop_assert_eq!(op_open.is_satisfied_by(v), b1 < v && v < b2);
            prop_assert_eq!(op_closed.is_satisfied_by(v), b1 <= v && v <= b2);
        }

        #[test]
        fn empty_range_flag_means_nothing_matches(
            b1 in -50i64..50,
            b2 in -50i64..50,
            v in -100i64..100,
        ) {
            for c_token in ["< value <", "<= value <=", "> value >", ">= value >="] {
                let op = EnumRuleOperator::parse(c_token, Some(b1), Some(b2)).unwrap();
                if op.is_empty_range() {
                    prop_assert!(!op.is_satisfied_by(v));
                }
            }
        }
    }
}
