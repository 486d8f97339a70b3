//! Template rendering behaviour seen from outside the crate.

use std::sync::Arc;

use proptest::prelude::*;
use rowbind_message::{
    ElEvaluator, ExpressionFunctions, MessageBundle, MessageInterpolator, MessageResolver,
};
use rowbind_model::{Value, Variables};

fn vars(pairs: &[(&str, Value)]) -> Variables {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

#[test]
fn substitutes_plain_placeholders() {
    let interpolator = MessageInterpolator::default();
    let both = vars(&[("a", Value::text("x")), ("b", Value::text("y"))]);
    assert_eq!(interpolator.interpolate("{a} is {b}", &both, false), "x is y");

    let only_a = vars(&[("a", Value::text("x"))]);
    assert_eq!(interpolator.interpolate("{a} is {b}", &only_a, false), "x is {b}");
}

#[test]
fn evaluates_expression_blocks() {
    let interpolator = MessageInterpolator::default();
    assert_eq!(interpolator.interpolate("${1+2}", &Variables::new(), false), "3");
}

#[test]
fn failing_block_renders_blank_and_the_rest_still_renders() {
    let interpolator = MessageInterpolator::default();
    let v = vars(&[("a", Value::text("x"))]);
    let rendered = interpolator.interpolate_with("[${(}] {a} ${1 + 1}", &v, false, None);
    assert_eq!(rendered.text, "[] x 2");
    assert_eq!(rendered.failures.len(), 1);
    assert_eq!(rendered.failures[0].expression(), "(");
    assert_eq!(rendered.failures[0].variables(), &v);
}

#[test]
fn custom_evaluator_functions() {
    let mut functions = ExpressionFunctions::default();
    functions.register("shout", |args| {
        Ok(Value::Text(
            args.iter().map(|a| a.to_string().to_uppercase()).collect(),
        ))
    });
    let interpolator = MessageInterpolator::default()
        .with_evaluator(Arc::new(ElEvaluator::new().with_functions(functions)));
    let v = vars(&[("name", Value::text("email"))]);
    assert_eq!(interpolator.interpolate("${shout(name)}!", &v, false), "EMAIL!");
}

#[test]
fn default_bundle_renders_with_shared_location() {
    let bundle = MessageBundle::default_bundle();
    let template = bundle.message("number_min").unwrap();
    let v = vars(&[
        ("lineNumber", Value::Integer(3)),
        ("columnNumber", Value::Integer(2)),
        ("label", Value::text("Age")),
        ("min", Value::Integer(18)),
        ("inclusive", Value::Bool(true)),
        ("validatedValue", Value::Integer(12)),
    ]);
    let rendered = MessageInterpolator::default().interpolate_with(template, &v, true, Some(&bundle));
    insta::assert_snapshot!(rendered.text, @"[line 3, column 2] Age must be at least 18, but was 12.");
    assert!(rendered.failures.is_empty());
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z .,!?]{0,8}",
        Just("{a}".to_string()),
        Just("{b}".to_string()),
        Just("{missing}".to_string()),
        Just("${size(a)}".to_string()),
        Just("${b + '-' + a}".to_string()),
    ]
}

proptest! {
    #[test]
    fn interpolation_is_idempotent_without_nested_placeholders(
        segments in prop::collection::vec(segment(), 0..8),
        a in "[a-z ]{0,6}",
        b in "[a-z ]{0,6}",
    ) {
        let template: String = segments.concat();
        let v = vars(&[("a", Value::Text(a)), ("b", Value::Text(b))]);
        let interpolator = MessageInterpolator::default();
        let once = interpolator.interpolate(&template, &v, false);
        let twice = interpolator.interpolate(&once, &v, false);
        prop_assert_eq!(once, twice);
    }
}
