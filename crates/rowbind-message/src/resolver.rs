//! Message-code to template lookup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

const DEFAULT_MESSAGES: &str = include_str!("../resources/default_messages.properties");

/// Looks up message templates by code.
pub trait MessageResolver: Send + Sync {
    fn message(&self, code: &str) -> Option<&str>;
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to read message bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Templates keyed by code, loaded from `key=value` properties text.
///
/// Backslashes in values are kept as written so that interpolation escapes
/// survive loading. A trailing backslash continues the value on the next line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBundle {
    messages: BTreeMap<String, String>,
}

impl MessageBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The English templates shipped with rowbind.
    pub fn default_bundle() -> Self {
        Self::from_properties(DEFAULT_MESSAGES)
    }

    pub fn from_properties(source: &str) -> Self {
        let mut messages = BTreeMap::new();
        let mut lines = source.lines();
        while let Some(line) = lines.next() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let mut logical = line.to_string();
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }
            let (key, value) = match logical.find(['=', ':']) {
                Some(idx) => (&logical[..idx], &logical[idx + 1..]),
                None => (logical.as_str(), ""),
            };
            messages.insert(key.trim().to_string(), value.trim().to_string());
        }
        Self { messages }
    }

    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let source = fs::read_to_string(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle = Self::from_properties(&source);
        debug!(path = %path.display(), messages = bundle.len(), "loaded message bundle");
        Ok(bundle)
    }

    pub fn insert(&mut self, code: impl Into<String>, template: impl Into<String>) {
        self.messages.insert(code.into(), template.into());
    }

    #[must_use]
    pub fn with_message(mut self, code: impl Into<String>, template: impl Into<String>) -> Self {
        self.insert(code, template);
        self
    }

    /// Layer `other` on top of this bundle; its templates win.
    pub fn extend(&mut self, other: MessageBundle) {
        self.messages.extend(other.messages);
    }

    pub fn contains(&self, code: &str) -> bool {
        self.messages.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl MessageResolver for MessageBundle {
    fn message(&self, code: &str) -> Option<&str> {
        self.messages.get(code).map(String::as_str)
    }
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_properties_syntax() {
        let bundle = MessageBundle::from_properties(
            "# comment\n! also a comment\n\nrequire = {label} is required.\n\
             long: first \\\n    second\nescaped=\\{literal}\n",
        );
        assert_eq!(bundle.message("require"), Some("{label} is required."));
        assert_eq!(bundle.message("long"), Some("first second"));
        assert_eq!(bundle.message("escaped"), Some("\\{literal}"));
        assert_eq!(bundle.len(), 3);
    }

    #[test]
    fn extend_overrides_existing_codes() {
        let mut bundle = MessageBundle::new().with_message("a", "one");
        bundle.extend(MessageBundle::new().with_message("a", "two").with_message("b", "three"));
        assert_eq!(bundle.message("a"), Some("two"));
        assert_eq!(bundle.message("b"), Some("three"));
    }

    #[test]
    fn default_bundle_covers_row_errors() {
        let bundle = MessageBundle::default_bundle();
        assert!(bundle.contains("typeMismatch"));
        assert!(bundle.contains("rowError.columnCountMismatch"));
        assert!(bundle.contains("rowError.headerMismatch"));
    }
}
