//! Compilation and row binding behaviour of compiled mappings and sessions.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use rowbind_core::{
    BindConfig, BindError, BindingErrorKind, BindingErrors, CompiledMapping, ErrorPolicy,
    FieldFailure, HeaderMode, RecordError, Record, RowError, RuleRegistry, Session, Stage,
    StageFactory, UnknownRulePolicy, VecSink, VecSource,
};
use rowbind_core::stages::conversion::fixed_size;
use rowbind_model::{
    ComposedRuleSet, ConfigError, Direction, FieldDeclaration, FieldDescriptor, FieldType,
    OverrideDirective, RecordDeclaration, RowContext, RuleCategory, RuleInstance, Value,
};

fn tokens(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn session(record: &RecordDeclaration, config: &BindConfig) -> Session {
    Session::new(Arc::new(CompiledMapping::compile(record, config).unwrap()))
}

type Log = Arc<Mutex<Vec<String>>>;

/// Stage that records its kind when it runs.
#[derive(Clone)]
struct Recording {
    kind: &'static str,
    log: Log,
}

impl Stage for Recording {
    fn execute(&mut self, value: Value, _context: &RowContext) -> Result<Value, FieldFailure> {
        self.log.lock().unwrap().push(self.kind.to_string());
        Ok(value)
    }

    fn fresh(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }
}

struct RecordingFactory {
    kind: &'static str,
    category: RuleCategory,
    log: Log,
}

impl StageFactory for RecordingFactory {
    fn kind(&self) -> &str {
        self.kind
    }

    fn category(&self) -> RuleCategory {
        self.category
    }

    fn create(
        &self,
        _rule: &RuleInstance,
        _field: &FieldDescriptor,
    ) -> Result<Box<dyn Stage>, ConfigError> {
        Ok(Box::new(Recording {
            kind: self.kind,
            log: Arc::clone(&self.log),
        }))
    }
}

fn recording_registry(log: &Log) -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    for (kind, category) in [
        ("check_a", RuleCategory::Constraint),
        ("convert_a", RuleCategory::Conversion),
        ("check_b", RuleCategory::Constraint),
        ("convert_b", RuleCategory::Conversion),
    ] {
        registry.register(RecordingFactory {
            kind,
            category,
            log: Arc::clone(log),
        });
    }
    registry
}

#[test]
fn conversions_run_before_constraints_in_declared_order() {
    let log = Log::default();
    let registry = recording_registry(&log);
    let record = RecordDeclaration::new("r").field(
        FieldDeclaration::new("value", FieldType::String, 1)
            .rule(RuleInstance::new("check_a"))
            .rule(RuleInstance::new("convert_a"))
            .rule(RuleInstance::new("check_b"))
            .rule(RuleInstance::new("convert_b")),
    );
    let mapping = CompiledMapping::compile_with(&record, &BindConfig::default(), &registry).unwrap();

    let field = &mapping.fields()[0];
    let read: Vec<_> = field.pipeline(Direction::Read).rules().collect();
    assert_eq!(read, ["convert_a", "convert_b", "parse", "check_a", "check_b"]);
    let write: Vec<_> = field.pipeline(Direction::Write).rules().collect();
    assert_eq!(write, ["check_a", "check_b", "print", "convert_a", "convert_b"]);

    let mut session = Session::new(Arc::new(mapping));
    let outcome = session.process_row(&tokens(&["x"]), RowContext::new(1, 1));
    assert!(outcome.is_ok());
    assert_eq!(
        *log.lock().unwrap(),
        ["convert_a", "convert_b", "check_a", "check_b"]
    );
}

#[test]
fn direction_and_group_scoping() {
    let record = RecordDeclaration::new("r").field(
        FieldDeclaration::new("code", FieldType::String, 1)
            .rule(RuleInstance::new("trim").for_direction(Direction::Read))
            .rule(RuleInstance::new("length_max").with_attr("max", 3_i64).in_group("strict")),
    );
    let loose = CompiledMapping::compile(&record, &BindConfig::default()).unwrap();
    let read: Vec<_> = loose.fields()[0].pipeline(Direction::Read).rules().collect();
    assert_eq!(read, ["trim", "parse"]);
    let write: Vec<_> = loose.fields()[0].pipeline(Direction::Write).rules().collect();
    assert_eq!(write, ["print"]);

    let strict = CompiledMapping::compile(&record, &BindConfig::default().with_group("strict")).unwrap();
    let read: Vec<_> = strict.fields()[0].pipeline(Direction::Read).rules().collect();
    assert_eq!(read, ["trim", "parse", "length_max"]);
}

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

#[test]
fn failing_fields_are_independent() {
    let mut session = session(&person(), &BindConfig::default());
    let outcome = session.process_row(&tokens(&["", "12", "2001-04-05"]), RowContext::new(2, 2));

    let exception = outcome.exception.expect("row should be rejected");
    let fields: Vec<_> = exception.binding_errors().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, ["name", "age"]);
    assert_eq!(exception.errors.len(), 2);
    assert_eq!(
        outcome.output.get("born"),
        Some(&Value::Date(chrono::NaiveDate::from_ymd_opt(2001, 4, 5).unwrap()))
    );

    let age = exception.binding_errors().nth(1).unwrap();
    assert_eq!(age.kind, BindingErrorKind::Validation);
    assert_eq!(age.code, "number_min");
    assert_eq!(age.column, 2);
    assert_eq!(age.rejected_value, Value::Integer(12));
    assert_eq!(age.variables.get("min"), Some(&Value::Integer(18)));
}

#[test]
fn column_count_mismatch_skips_fields() {
    let mut session = session(&person(), &BindConfig::default());
    let exception = session
        .process_row(&tokens(&["", "1"]), RowContext::new(4, 4))
        .into_result()
        .unwrap_err();
    assert_eq!(
        exception.errors,
        vec![RowError::ColumnCountMismatch {
            expected: 3,
            actual: 2
        }]
    );
    assert!(exception.is_row_shape());
}

#[test]
fn rejected_raw_values_are_snapshots() {
    let mut session = session(&person(), &BindConfig::default());
    let first = session
        .process_row(&tokens(&["Ann", "x", "2001-04-05"]), RowContext::new(2, 2))
        .into_result()
        .unwrap_err();
    let _ = session.process_row(&tokens(&["Bob", "40", "1984-01-01"]), RowContext::new(3, 3));
    assert_eq!(first.raw_values, tokens(&["Ann", "x", "2001-04-05"]));
}

#[test]
fn duplicate_positions_name_every_field() {
    let record = RecordDeclaration::new("r")
        .field(FieldDeclaration::new("first", FieldType::String, 1))
        .field(FieldDeclaration::new("second", FieldType::String, 1));
    let err = CompiledMapping::compile(&record, &BindConfig::default()).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"record 'r' declares duplicate positions: 1 (first, second)");
}

#[test]
fn date_pattern_with_time_fields_fails_compile() {
    let record = RecordDeclaration::new("r")
        .field(FieldDeclaration::new("born", FieldType::Date, 1).format("pattern", "%Y-%m-%d %H:%M"));
    let err = CompiledMapping::compile(&record, &BindConfig::default()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidAttribute { ref attribute, .. } if attribute == "pattern"));
}

#[test]
fn override_kind_mismatch_fails_compile() {
    let bundle = ComposedRuleSet::new("short")
        .with_attr("max", "ten")
        .with_rule(RuleInstance::new("length_max"))
        .with_override(OverrideDirective::new("max", "length_max"));
    let record = RecordDeclaration::new("r")
        .field(FieldDeclaration::new("code", FieldType::String, 1).rule(bundle));
    let err = CompiledMapping::compile(&record, &BindConfig::default()).unwrap_err();
    assert!(matches!(err, ConfigError::OverrideKindMismatch { ref attribute, .. } if attribute == "max"));
}

#[test]
fn unregistered_kinds_follow_policy() {
    let record = RecordDeclaration::new("r").field(
        FieldDeclaration::new("code", FieldType::String, 1).rule(RuleInstance::new("checksum")),
    );
    assert!(matches!(
        CompiledMapping::compile(&record, &BindConfig::default()),
        Err(ConfigError::UnregisteredRule { .. })
    ));
    let config = BindConfig::default().with_unknown_rule_policy(UnknownRulePolicy::WarnAndSkip);
    let mapping = CompiledMapping::compile(&record, &config).unwrap();
    let read: Vec<_> = mapping.fields()[0].pipeline(Direction::Read).rules().collect();
    assert_eq!(read, ["parse"]);
}

#[test]
fn canonical_tokens_round_trip() {
    let record = RecordDeclaration::new("item")
        .field(FieldDeclaration::new("code", FieldType::String, 1).rule(RuleInstance::new("trim")))
        .field(FieldDeclaration::new("qty", FieldType::Integer, 2))
        .field(FieldDeclaration::new("price", FieldType::Decimal, 3).format("scale", 2_i64))
        .field(FieldDeclaration::new("active", FieldType::Boolean, 4))
        .field(FieldDeclaration::new("since", FieldType::Date, 5).format("pattern", "%d/%m/%Y"))
        .field(
            FieldDeclaration::new("colour", FieldType::Enum, 6)
                .format("values", Value::text_list(["Red", "Green"])),
        )
        .field(FieldDeclaration::new("note", FieldType::String, 7));
    let mut session = session(&record, &BindConfig::default());
    let input = tokens(&["A1", "42", "12.50", "true", "31/01/2024", "Green", ""]);

    let parsed = session
        .process_row(&input, RowContext::new(1, 1))
        .into_result()
        .unwrap();
    assert_eq!(parsed.get("price"), Some(&Value::Float(12.5)));
    assert_eq!(parsed.get("note"), Some(&Value::Null));
    let rendered = session
        .render_row(&parsed, RowContext::new(1, 1))
        .into_result()
        .unwrap();
    assert_eq!(rendered, input);
}

#[test]
fn unique_state_is_scoped_to_session() {
    let record = RecordDeclaration::new("r").field(
        FieldDeclaration::new("id", FieldType::String, 1).rule(RuleInstance::new("unique")),
    );
    let mapping = Arc::new(CompiledMapping::compile(&record, &BindConfig::default()).unwrap());

    let mut first = Session::new(Arc::clone(&mapping));
    assert!(first.process_row(&tokens(&["a"]), RowContext::new(1, 1)).is_ok());
    let duplicate = first
        .process_row(&tokens(&["a"]), RowContext::new(2, 2))
        .into_result()
        .unwrap_err();
    let error = duplicate.binding_errors().next().unwrap();
    assert_eq!(error.variables.get("duplicatedLineNumber"), Some(&Value::Integer(1)));

    let mut second = Session::new(mapping);
    assert!(second.process_row(&tokens(&["a"]), RowContext::new(1, 1)).is_ok());
}

#[test]
fn bound_kind_mismatch_names_both_kinds() {
    let record = RecordDeclaration::new("r").field(
        FieldDeclaration::new("code", FieldType::String, 1)
            .rule(RuleInstance::new("number_min").with_attr("min", 3_i64)),
    );
    let mut session = session(&record, &BindConfig::default());
    let exception = session
        .process_row(&tokens(&["7"]), RowContext::new(2, 2))
        .into_result()
        .unwrap_err();
    let error = exception.binding_errors().next().unwrap();
    assert_eq!(error.kind, BindingErrorKind::TypeMismatch);
    assert_eq!(error.code, "ruleTypeMismatch");
    assert_eq!(error.variables.get("expectedType"), Some(&Value::text("integer")));
    assert_eq!(error.variables.get("actualType"), Some(&Value::text("text")));
}

#[test]
fn record_validators_see_field_errors() {
    let record = RecordDeclaration::new("span")
        .field(FieldDeclaration::new("start", FieldType::Integer, 1))
        .field(FieldDeclaration::new("end", FieldType::Integer, 2));
    let mut session = session(&record, &BindConfig::default()).with_validator(
        |record: &Record, errors: &mut BindingErrors, _context: &RowContext| {
            if errors.has_field_errors("start") || errors.has_field_errors("end") {
                return;
            }
            let (Some(start), Some(end)) = (record.get("start"), record.get("end")) else {
                return;
            };
            if start.as_i64() > end.as_i64() {
                errors.push_record(RecordError::new("span_order").for_field("end"));
            }
        },
    );

    let reversed = session
        .process_row(&tokens(&["5", "2"]), RowContext::new(1, 1))
        .into_result()
        .unwrap_err();
    assert!(matches!(&reversed.errors[..], [RowError::Record(e)] if e.code == "span_order"));

    let bad_start = session
        .process_row(&tokens(&["x", "2"]), RowContext::new(2, 2))
        .into_result()
        .unwrap_err();
    assert_eq!(bad_start.errors.len(), 1);
    assert!(matches!(&bad_start.errors[0], RowError::Field(e) if e.field == "start"));
}

#[test]
fn read_all_honours_error_policy() {
    let rows = || {
        VecSource::from_tokens([
            vec!["Name", "Age", "Born"],
            vec!["Ann", "30", "1994-02-03"],
            vec!["Bob", "9", "2015-06-07"],
            vec!["Cid", "45", "1979-08-09"],
        ])
    };

    let mut collecting = session(&person(), &BindConfig::default());
    let report = collecting.read_all(&mut rows(), HeaderMode::Validate).unwrap();
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.exceptions.len(), 1);
    assert_eq!(report.exceptions[0].context.line_number, 3);

    let config = BindConfig {
        error_policy: ErrorPolicy::AbortOnFirst,
        ..BindConfig::default()
    };
    let mut aborting = session(&person(), &config);
    match aborting.read_all(&mut rows(), HeaderMode::Skip) {
        Err(BindError::Row(exception)) => assert_eq!(exception.context.row_number, 3),
        other => panic!("expected a row error, got {other:?}"),
    }
}

#[test]
fn header_mismatch_lists_both_sides() {
    let session = session(&person(), &BindConfig::default());
    let exception = session
        .validate_header(&tokens(&["Name", "Years", "Born"]), RowContext::new(1, 1))
        .unwrap_err();
    assert_eq!(
        exception.errors,
        vec![RowError::HeaderMismatch {
            expected: tokens(&["Name", "Age", "Born"]),
            actual: tokens(&["Name", "Years", "Born"]),
        }]
    );
}

#[test]
fn header_row_maps_columns_by_label() {
    let mut source = VecSource::from_tokens([
        vec!["Born", " Name ", "Age"],
        vec!["1994-02-03", "Ann", "30"],
        vec!["2015-06-07", "Bob", "9"],
    ]);
    let mut mapped = session(&person(), &BindConfig::default());
    let report = mapped.read_all(&mut source, HeaderMode::Map).unwrap();
    assert_eq!(mapped.column_order(), Some(&[1, 2, 0][..]));

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].get("name"), Some(&Value::text("Ann")));
    assert_eq!(report.records[0].get("age"), Some(&Value::Integer(30)));
    let age = report.exceptions[0].binding_errors().next().unwrap();
    assert_eq!((age.field.as_str(), age.column), ("age", 3));
    assert_eq!(report.exceptions[0].raw_values, tokens(&["2015-06-07", "Bob", "9"]));

    let mut in_order = session(&person(), &BindConfig::default());
    in_order
        .map_header(&tokens(&["Name", "Age", "Born"]), RowContext::new(1, 1))
        .unwrap();
    assert_eq!(in_order.column_order(), None);
}

#[test]
fn unmatched_header_label_fails_mapping() {
    let mut session = session(&person(), &BindConfig::default());
    let exception = session
        .map_header(&tokens(&["Born", "Name", "Years"]), RowContext::new(1, 1))
        .unwrap_err();
    assert!(matches!(&exception.errors[..], [RowError::HeaderMismatch { .. }]));
    assert_eq!(session.column_order(), None);
}

#[test]
fn pre_write_hooks_adjust_a_copy() {
    let mut session = session(&person(), &BindConfig::default()).with_pre_write(
        |record: &mut Record, _: &RowContext| {
            if let Some(Value::Text(name)) = record.get("name").cloned() {
                record.set("name", name.to_uppercase());
            }
        },
    );
    let record = Record::new()
        .with("name", "ann")
        .with("age", 30_i64)
        .with("born", chrono::NaiveDate::from_ymd_opt(1994, 2, 3).unwrap());
    let tokens_out = session
        .render_row(&record, RowContext::new(1, 1))
        .into_result()
        .unwrap();
    assert_eq!(tokens_out, tokens(&["ANN", "30", "1994-02-03"]));
    assert_eq!(record.get("name"), Some(&Value::text("ann")));
}

#[test]
fn fixed_size_columns_pad_and_trim() {
    let record = RecordDeclaration::new("ledger")
        .field(FieldDeclaration::new("code", FieldType::String, 1).rule(fixed_size(6)))
        .field(
            FieldDeclaration::new("amount", FieldType::Integer, 2)
                .rule(fixed_size(5).with_attr("side", "left").with_attr("pad_char", "0")),
        );
    let mut session = session(&record, &BindConfig::default());

    let read = session
        .process_row(&tokens(&["AB    ", "00042"]), RowContext::new(1, 1))
        .into_result()
        .unwrap();
    assert_eq!(read.get("code"), Some(&Value::text("AB")));
    assert_eq!(read.get("amount"), Some(&Value::Integer(42)));

    let written = session
        .render_row(&read, RowContext::new(1, 1))
        .into_result()
        .unwrap();
    assert_eq!(written, tokens(&["AB    ", "00042"]));
}

#[test]
fn partial_columns_pass_through() {
    let record = RecordDeclaration::new("r")
        .field(FieldDeclaration::new("id", FieldType::Integer, 1))
        .field(FieldDeclaration::new("name", FieldType::String, 3));
    let config = BindConfig::default().with_partial(true).with_column_count(4);
    let mut session = session(&record, &config);
    assert_eq!(session.mapping().headers(), ["id", "column2", "name", "column4"]);

    let record = session
        .process_row(&tokens(&["1", "ignored", "Ann", "also"]), RowContext::new(1, 1))
        .into_result()
        .unwrap();
    assert_eq!(record.len(), 2);

    let mut sink = VecSink::default();
    let report = session.write_all([&record], &mut sink).unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(sink.rows, vec![tokens(&["1", "", "Ann", ""])]);
}

#[test]
fn write_failures_are_reported() {
    let record = RecordDeclaration::new("r").field(
        FieldDeclaration::new("code", FieldType::String, 1)
            .rule(RuleInstance::new("length_max").with_attr("max", 2_i64)),
    );
    let mut strict = session(&record, &BindConfig::default());
    let mut sink = VecSink::default();
    let records = [Record::new().with("code", "ok"), Record::new().with("code", "toolong")];
    let report = strict.write_all(&records, &mut sink).unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(report.exceptions.len(), 1);

    let config = BindConfig::default().with_skip_validation_on_write(true);
    let mut lenient = session(&record, &config);
    let mut sink = VecSink::default();
    assert_eq!(lenient.write_all(&records, &mut sink).unwrap().written, 2);
}

proptest! {
    #[test]
    fn header_order_follows_positions(
        positions in (1u32..12).prop_flat_map(|n| Just((1..=n).collect::<Vec<u32>>()).prop_shuffle())
    ) {
        let record = positions.iter().fold(RecordDeclaration::new("r"), |record, position| {
            record.field(FieldDeclaration::new(format!("f{position}"), FieldType::String, *position))
        });
        let mapping = CompiledMapping::compile(&record, &BindConfig::default()).unwrap();
        let expected: Vec<String> = (1..=positions.len()).map(|p| format!("f{p}")).collect();
        prop_assert_eq!(mapping.headers(), expected.as_slice());
    }
}
