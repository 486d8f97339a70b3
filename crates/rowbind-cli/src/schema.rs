//! Loading record schemas, binding configuration and message files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rowbind_core::BindConfig;
use rowbind_message::MessageBundle;
use rowbind_model::RecordDeclaration;
use tracing::debug;

/// Read a JSON record declaration.
pub fn load_schema(path: &Path) -> Result<RecordDeclaration> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read schema {}", path.display()))?;
    let declaration: RecordDeclaration = serde_json::from_str(&text)
        .with_context(|| format!("parse schema {}", path.display()))?;
    debug!(
        record = %declaration.name,
        fields = declaration.fields.len(),
        bundles = declaration.bundles.len(),
        "loaded schema"
    );
    Ok(declaration)
}

/// Read a JSON binding configuration, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<BindConfig> {
    let Some(path) = path else {
        return Ok(BindConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))
}

/// The default messages, overlaid with a properties file when given.
pub fn load_messages(path: Option<&Path>) -> Result<MessageBundle> {
    let mut bundle = MessageBundle::default_bundle();
    if let Some(path) = path {
        let overrides = MessageBundle::load(path)
            .with_context(|| format!("load messages {}", path.display()))?;
        bundle.extend(overrides);
    }
    Ok(bundle)
}
