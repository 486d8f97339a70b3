//! Tests for rowbind-model types.

use rowbind_model::{
    ConfigError, FieldType, PositionConflict, RecordDeclaration, RuleDecl, RowContext, Value,
    ValueKind,
};

#[test]
fn record_declaration_from_json() {
    let json = r#"{
        "name": "User",
        "bundles": {
            "zip": {
                "name": "zip",
                "attributes": {"size": 7},
                "rules": [{"kind": "length_exact", "attributes": {"length": 8}}],
                "overrides": [{"source": "size", "target_kind": "length_exact", "target_attribute": "length"}]
            }
        },
        "fields": [
            {"name": "id", "type": "integer", "position": 1},
            {"name": "postal", "type": "string", "position": 2, "label": "Postal Code",
             "rules": [{"use": "zip"}, {"kind": "trim", "directions": ["read"]}]}
        ]
    }"#;

    let record: RecordDeclaration = serde_json::from_str(json).expect("parse record");
    assert_eq!(record.name, "User");
    assert_eq!(record.fields.len(), 2);
    assert_eq!(record.fields[0].field_type, FieldType::Integer);
    assert_eq!(record.fields[1].label.as_deref(), Some("Postal Code"));
    assert!(matches!(record.fields[1].rules[0], RuleDecl::Use(_)));
    assert!(record.bundles.contains_key("zip"));
    assert_eq!(
        record.bundles["zip"].attributes.get("size"),
        Some(&Value::Integer(7))
    );
}

#[test]
fn field_type_value_kinds() {
    assert_eq!(FieldType::Integer.value_kind(), ValueKind::Integer);
    assert_eq!(FieldType::Decimal.value_kind(), ValueKind::Float);
    assert_eq!(FieldType::Enum.value_kind(), ValueKind::Text);
    assert_eq!("datetime".parse::<FieldType>(), Ok(FieldType::DateTime));
    assert!("blob".parse::<FieldType>().is_err());
}

#[test]
fn duplicate_position_message_names_all_fields() {
    let error = ConfigError::DuplicatePositions {
        record: "User".to_string(),
        conflicts: vec![PositionConflict {
            position: 2,
            fields: vec!["name".to_string(), "email".to_string()],
        }],
    };
    insta::assert_snapshot!(error.to_string(), @"record 'User' declares duplicate positions: 2 (name, email)");
}

#[test]
fn override_kind_mismatch_message() {
    let error = ConfigError::OverrideKindMismatch {
        bundle: "zip".to_string(),
        kind: "length_exact".to_string(),
        attribute: "length".to_string(),
        source_kind: ValueKind::Text,
        expected: vec![ValueKind::Integer, ValueKind::List],
    };
    insta::assert_snapshot!(
        error.to_string(),
        @"bundle 'zip' overrides 'length_exact.length' with a text value but the target accepts integer or list"
    );
}

#[test]
fn row_context_display() {
    let context = RowContext::new(3, 2).at_column(4);
    assert_eq!(context.to_string(), "line 3, row 2, column 4");
    assert_eq!(RowContext::new(1, 1).to_string(), "line 1, row 1");
}
