use anyhow::{Result, bail};
use comfy_table::Table;
use rowbind_cli::schema::{load_config, load_messages, load_schema};
use rowbind_cli::validate::{ValidateOptions, ValidationOutcome, schema_headers, validate_file};
use rowbind_core::{BindConfig, ErrorPolicy, HeaderMode, default_registry};
use rowbind_ingest::CsvOptions;
use rowbind_model::RuleCategory;

use crate::cli::{HeaderArg, SchemaArgs, ValidateArgs};
use crate::summary::apply_table_style;

pub fn run_validate(args: &ValidateArgs) -> Result<ValidationOutcome> {
    let declaration = load_schema(&args.schema.schema)?;
    let mut config = bind_config(&args.schema)?;
    if args.fail_fast {
        config = config.with_error_policy(ErrorPolicy::AbortOnFirst);
    }
    let messages = load_messages(args.messages.as_deref())?;
    let options = ValidateOptions {
        header: match args.header {
            HeaderArg::None => HeaderMode::None,
            HeaderArg::Skip => HeaderMode::Skip,
            HeaderArg::Validate => HeaderMode::Validate,
            HeaderArg::Map => HeaderMode::Map,
        },
        csv: CsvOptions::default()
            .with_delimiter(delimiter(args.delimiter)?)
            .with_trim(args.trim),
        output: args.output.clone(),
    };
    validate_file(&declaration, &config, &messages, &args.input, &options)
}

pub fn run_header(args: &SchemaArgs) -> Result<()> {
    let declaration = load_schema(&args.schema)?;
    let config = bind_config(args)?;
    let headers = schema_headers(&declaration, &config)?;
    println!("{}", headers.join(","));
    Ok(())
}

pub fn run_rules() -> Result<()> {
    let registry = default_registry();
    let mut table = Table::new();
    table.set_header(vec!["Rule", "Category", "Defaults"]);
    apply_table_style(&mut table);
    for kind in registry.kinds() {
        let Some(factory) = registry.get(kind) else {
            continue;
        };
        let category = match factory.category() {
            RuleCategory::Conversion => "conversion",
            RuleCategory::Constraint => "constraint",
        };
        let defaults = factory
            .default_attributes()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![kind.to_string(), category.to_string(), defaults]);
    }
    println!("{table}");
    Ok(())
}

fn bind_config(args: &SchemaArgs) -> Result<BindConfig> {
    let config = load_config(args.config.as_deref())?;
    Ok(args
        .groups
        .iter()
        .fold(config, |config, group| config.with_group(group.as_str())))
}

fn delimiter(value: char) -> Result<u8> {
    match u8::try_from(value) {
        Ok(byte) if byte.is_ascii() => Ok(byte),
        _ => bail!("delimiter must be a single ASCII character, got '{value}'"),
    }
}
