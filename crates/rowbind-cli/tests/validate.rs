//! End-to-end validation of the demo schema.

use std::fs;
use std::path::{Path, PathBuf};

use rowbind_cli::schema::{load_config, load_messages, load_schema};
use rowbind_cli::validate::{ValidateOptions, schema_headers, validate_file};
use rowbind_core::{BindConfig, ErrorPolicy, HeaderMode};

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

fn options() -> ValidateOptions {
    ValidateOptions {
        header: HeaderMode::Validate,
        ..ValidateOptions::default()
    }
}

#[test]
fn demo_file_reports_every_rejected_row() {
    let declaration = load_schema(&demo("person.schema.json")).expect("schema");
    let messages = load_messages(None).expect("messages");
    let outcome = validate_file(
        &declaration,
        &BindConfig::default(),
        &messages,
        &demo("people.csv"),
        &options(),
    )
    .expect("validate");

    assert_eq!(outcome.record, "person");
    assert_eq!((outcome.rows, outcome.accepted, outcome.rejected), (4, 1, 3));
    assert!(outcome.has_errors());
    let rendered: Vec<_> = outcome.issues.iter().map(|i| i.message.as_str()).collect();
    insta::assert_snapshot!(rendered.join("\n"), @r"
    [line 3, column 2] Name is required.
    [line 4, column 1] Id 'A1' already appears on line 2.
    [line 4, column 3] Age must be a number, but was 'abc'.
    [line 4, column 4] Joined must be a date in the format %d/%m/%Y, but was '2024-01-31'.
    [line 4, column 5] Active must be one of true, 1, yes, on, y or false, 0, no, off, n, but was 'maybe'.
    [line 5, column 3] Age must be between 0 and 130, but was 150.
    ");
    let codes: Vec<_> = outcome.issues.iter().map(|i| i.code.as_str()).collect();
    assert_eq!(
        codes,
        ["require", "unique", "typeMismatch", "typeMismatch", "typeMismatch", "number_range"]
    );
}

#[test]
fn message_overrides_and_groups_apply() {
    let declaration = load_schema(&demo("person.schema.json")).expect("schema");
    let messages = load_messages(Some(&demo("messages.properties"))).expect("messages");
    let config = BindConfig::default().with_group("adult");
    let outcome = validate_file(&declaration, &config, &messages, &demo("people.csv"), &options())
        .expect("validate");

    let line3: Vec<_> = outcome
        .issues
        .iter()
        .filter(|i| i.line == 3)
        .map(|i| i.message.as_str())
        .collect();
    assert_eq!(
        line3,
        [
            "[line 3, column 2] every person needs a name.",
            "[line 3, column 3] Age must be at least 18, but was 17.",
        ]
    );
    assert!(
        outcome
            .issues
            .iter()
            .any(|i| i.message == "[line 5, column 3] Age 150 is outside 0..130.")
    );
}

#[test]
fn fail_fast_stops_at_first_rejected_row() {
    let declaration = load_schema(&demo("person.schema.json")).expect("schema");
    let config = BindConfig::default().with_error_policy(ErrorPolicy::AbortOnFirst);
    let outcome = validate_file(
        &declaration,
        &config,
        &load_messages(None).expect("messages"),
        &demo("people.csv"),
        &options(),
    )
    .expect("validate");

    assert!(outcome.aborted);
    assert_eq!((outcome.rows, outcome.accepted, outcome.rejected), (2, 1, 1));
    assert_eq!(outcome.issues.len(), 1);
}

#[test]
fn header_mismatch_is_reported_without_rejecting_rows() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("people.csv");
    fs::write(&input, "Id,Name,Years,Joined,Active\nA1,Ann,41,31/01/2024,yes\n").expect("write");

    let declaration = load_schema(&demo("person.schema.json")).expect("schema");
    let outcome = validate_file(
        &declaration,
        &BindConfig::default(),
        &load_messages(None).expect("messages"),
        &input,
        &options(),
    )
    .expect("validate");

    assert_eq!((outcome.rows, outcome.accepted, outcome.rejected), (1, 1, 0));
    assert_eq!(outcome.issues.len(), 1);
    assert_eq!(outcome.issues[0].code, "rowError");
    assert_eq!(outcome.issues[0].column, 0);
    assert_eq!(
        outcome.issues[0].message,
        "[line 1] header mismatch: expected (Id, Name, Age, Joined, Active) but found (Id, Name, Years, Joined, Active)."
    );
}

#[test]
fn accepted_rows_are_rewritten_in_canonical_form() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    fs::write(&input, " x9 ,Ann,41,,YES\n").expect("write");

    let declaration = load_schema(&demo("person.schema.json")).expect("schema");
    let options = ValidateOptions {
        header: HeaderMode::None,
        output: Some(output.clone()),
        ..ValidateOptions::default()
    };
    let outcome = validate_file(
        &declaration,
        &BindConfig::default(),
        &load_messages(None).expect("messages"),
        &input,
        &options,
    )
    .expect("validate");

    assert_eq!(outcome.written, 1);
    assert_eq!(
        fs::read_to_string(&output).expect("read output"),
        "Id,Name,Age,Joined,Active\nX9,Ann,41,01/01/2000,true\n"
    );
}

#[test]
fn headers_and_config_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, r#"{"active_groups": ["adult"], "column_count": 5}"#).expect("write");

    let config = load_config(Some(&config_path)).expect("config");
    assert!(config.active_groups.contains("adult"));
    let declaration = load_schema(&demo("person.schema.json")).expect("schema");
    assert_eq!(
        schema_headers(&declaration, &config).expect("headers"),
        ["Id", "Name", "Age", "Joined", "Active"]
    );

    let missing = load_schema(&dir.path().join("nope.json")).expect_err("missing schema");
    assert!(format!("{missing:#}").starts_with("read schema "));
}
