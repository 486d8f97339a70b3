//! Rendering row exceptions through message bundles.

use std::sync::Arc;

use rowbind_core::{BindConfig, CompiledMapping, ErrorConverter, RowException, Session};
use rowbind_message::MessageBundle;
use rowbind_model::{FieldDeclaration, FieldType, RecordDeclaration, RowContext, RuleInstance};

fn person() -> RecordDeclaration {
    RecordDeclaration::new("person")
        .field(
            FieldDeclaration::new("name", FieldType::String, 1)
                .label("Name")
                .rule(RuleInstance::new("require")),
        )
        .field(
            FieldDeclaration::new("age", FieldType::Integer, 2)
                .label("Age")
                .rule(RuleInstance::new("number_min").with_attr("min", 18_i64)),
        )
        .field(FieldDeclaration::new("born", FieldType::Date, 3).label("Born"))
}

fn reject(record: &RecordDeclaration, row: &[&str], line: usize) -> RowException {
    let mapping = CompiledMapping::compile(record, &BindConfig::default()).unwrap();
    let mut session = Session::new(Arc::new(mapping));
    let tokens: Vec<String> = row.iter().map(|t| (*t).to_string()).collect();
    session
        .process_row(&tokens, RowContext::new(line, line))
        .into_result()
        .unwrap_err()
}

#[test]
fn default_bundle_renders_every_error() {
    let exception = reject(&person(), &["", "12", "2024-13-01"], 3);
    let messages = ErrorConverter::new().to_messages(&exception, &MessageBundle::default_bundle());
    insta::assert_snapshot!(messages.join("\n"), @r"
    [line 3, column 1] Name is required.
    [line 3, column 2] Age must be at least 18, but was 12.
    [line 3, column 3] Born must be a date in the format %Y-%m-%d, but was '2024-13-01'.
    ");
}

#[test]
fn field_specific_codes_win_over_generic_ones() {
    let exception = reject(&person(), &["", "30", "2000-01-01"], 2);
    let bundle = MessageBundle::default_bundle()
        .with_message("require.name", "Everyone needs a name (line {lineNumber}).");
    let messages = ErrorConverter::new().to_messages(&exception, &bundle);
    assert_eq!(messages, ["Everyone needs a name (line 2)."]);
}

#[test]
fn explicit_rule_message_takes_precedence() {
    let record = RecordDeclaration::new("person").field(
        FieldDeclaration::new("age", FieldType::Integer, 1).label("Age").rule(
            RuleInstance::new("number_min")
                .with_attr("min", 18_i64)
                .with_message("{label} must be an adult (${min} or older)"),
        ),
    );
    let exception = reject(&record, &["7"], 5);
    let messages = ErrorConverter::new().to_messages(&exception, &MessageBundle::default_bundle());
    assert_eq!(messages, ["Age must be an adult (18 or older)"]);
}

#[test]
fn unknown_codes_fall_back_to_context() {
    let exception = reject(&person(), &["", "30", "2000-01-01"], 4);
    let messages = ErrorConverter::new().to_messages(&exception, &MessageBundle::new());
    assert_eq!(messages, ["line 4, row 4, column 1: require"]);
}

#[test]
fn row_shape_and_type_mismatch_messages() {
    let exception = reject(&person(), &["only", "two"], 6);
    let messages = ErrorConverter::new().to_messages(&exception, &MessageBundle::default_bundle());
    assert_eq!(messages, ["[line 6] expected 3 columns but found 2."]);

    let record = RecordDeclaration::new("r").field(
        FieldDeclaration::new("code", FieldType::String, 1)
            .label("Code")
            .rule(RuleInstance::new("number_min").with_attr("min", 1_i64)),
    );
    let exception = reject(&record, &["7"], 2);
    let messages = ErrorConverter::new().to_messages(&exception, &MessageBundle::default_bundle());
    insta::assert_snapshot!(
        &messages[0],
        @"[line 2, column 1] Code: rule 'number_min' compares integer values but received text."
    );
}

#[test]
fn conversion_codes_lead_with_type_mismatch() {
    let exception = reject(&person(), &["Ann", "old", "2000-01-01"], 2);
    let errors = ErrorConverter::new().to_errors(&exception);
    assert_eq!(
        errors[0].codes,
        [
            "typeMismatch.person.age",
            "typeMismatch.age",
            "typeMismatch.integer",
            "typeMismatch.number",
            "typeMismatch",
        ]
    );
}
