//! Message template rendering.
//!
//! Two placeholder forms are recognised:
//!
//! - `{name}`: replaced with the variable's string form. A name that is not a
//!   variable is looked up as a message code when a resolver is supplied, and
//!   otherwise left in the output verbatim.
//! - `${expr}`: evaluated by the configured [`ExpressionEvaluator`]. A failing
//!   block renders as the empty string and is reported in
//!   [`Interpolation::failures`]; the rest of the template still renders.
//!
//! A backslash escapes the character after it. Block extents are found by
//! depth-aware scanning, so `${f:join(list, '}')}` is a single block.

use std::sync::Arc;

use rowbind_model::Variables;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::expression::{ElEvaluator, ExpressionError, ExpressionEvaluator};
use crate::resolver::MessageResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolatorConfig {
    /// Re-render substituted variable values that contain placeholders.
    pub recursive_variables: bool,
    /// Re-render expression results that contain placeholders.
    pub recursive_expressions: bool,
    /// Maximum nesting of re-rendering; `None` is unbounded.
    pub max_depth: Option<usize>,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            recursive_variables: false,
            recursive_expressions: false,
            max_depth: Some(5),
        }
    }
}

/// Rendered text plus the expression blocks that failed along the way.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Interpolation {
    pub text: String,
    pub failures: Vec<ExpressionError>,
}

#[derive(Clone)]
pub struct MessageInterpolator {
    config: InterpolatorConfig,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl std::fmt::Debug for MessageInterpolator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageInterpolator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for MessageInterpolator {
    fn default() -> Self {
        Self::new(InterpolatorConfig::default())
    }
}

impl MessageInterpolator {
    pub fn new(config: InterpolatorConfig) -> Self {
        Self {
            config,
            evaluator: Arc::new(ElEvaluator::new()),
        }
    }

    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &InterpolatorConfig {
        &self.config
    }

    /// Render `template`, discarding expression failures (they are logged).
    pub fn interpolate(&self, template: &str, variables: &Variables, recursive: bool) -> String {
        self.interpolate_with(template, variables, recursive, None).text
    }

    /// Render `template`, resolving unknown `{code}` placeholders through
    /// `resolver` and collecting expression failures.
    pub fn interpolate_with(
        &self,
        template: &str,
        variables: &Variables,
        recursive: bool,
        resolver: Option<&dyn MessageResolver>,
    ) -> Interpolation {
        let mut render = Render {
            interpolator: self,
            variables,
            recursive,
            resolver,
            failures: Vec::new(),
        };
        let text = render.template(template, 0);
        Interpolation {
            text,
            failures: render.failures,
        }
    }

    fn may_recurse(&self, enabled: bool, depth: usize, text: &str) -> bool {
        if !enabled || !text.contains('{') {
            return false;
        }
        match self.config.max_depth {
            Some(max_depth) if depth >= max_depth => {
                warn!(depth, max_depth, "message recursion limit reached, leaving placeholders as-is");
                false
            }
            _ => true,
        }
    }
}

struct Render<'a> {
    interpolator: &'a MessageInterpolator,
    variables: &'a Variables,
    recursive: bool,
    resolver: Option<&'a dyn MessageResolver>,
    failures: Vec<ExpressionError>,
}

impl Render<'_> {
    fn template(&mut self, template: &str, depth: usize) -> String {
        let bytes = template.as_bytes();
        let mut out = String::with_capacity(template.len());
        let mut literal_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'\\' => {
                    out.push_str(&template[literal_start..i]);
                    match template[i + 1..].chars().next() {
                        Some(escaped) => {
                            out.push(escaped);
                            i += 1 + escaped.len_utf8();
                        }
                        None => {
                            out.push('\\');
                            i += 1;
                        }
                    }
                    literal_start = i;
                }
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    match find_block_end(template, i + 2, true) {
                        Some(end) => {
                            out.push_str(&template[literal_start..i]);
                            let body = unescape_expression(&template[i + 2..end]);
                            let rendered = self.expression(&body, depth);
                            out.push_str(&rendered);
                            i = end + 1;
                            literal_start = i;
                        }
                        None => i += 2,
                    }
                }
                b'{' => match find_block_end(template, i + 1, false) {
                    Some(end) => {
                        out.push_str(&template[literal_start..i]);
                        let rendered = self.placeholder(&template[i + 1..end], depth);
                        out.push_str(&rendered);
                        i = end + 1;
                        literal_start = i;
                    }
                    None => i += 1,
                },
                _ => i += 1,
            }
        }
        out.push_str(&template[literal_start..]);
        out
    }

    fn placeholder(&mut self, name: &str, depth: usize) -> String {
        let config = self.interpolator.config;
        if let Some(value) = self.variables.get(name) {
            let text = value.to_string();
            if self.interpolator.may_recurse(self.recursive && config.recursive_variables, depth, &text) {
                return self.template(&text, depth + 1);
            }
            return text;
        }
        let resolved = self
            .resolver
            .and_then(|resolver| resolver.message(name))
            .map(str::to_string);
        match resolved {
            Some(message) => {
                if self.interpolator.may_recurse(self.recursive, depth, &message) {
                    self.template(&message, depth + 1)
                } else {
                    message
                }
            }
            None => format!("{{{name}}}"),
        }
    }

    fn expression(&mut self, body: &str, depth: usize) -> String {
        let config = self.interpolator.config;
        match self.interpolator.evaluator.evaluate(body, self.variables) {
            Ok(value) => {
                let text = value.to_string();
                if self.interpolator.may_recurse(self.recursive && config.recursive_expressions, depth, &text) {
                    self.template(&text, depth + 1)
                } else {
                    text
                }
            }
            Err(error) => {
                warn!(expression = body, error = %error, "message expression failed, rendering it blank");
                self.failures.push(error);
                String::new()
            }
        }
    }
}

/// Index of the `}` closing a block whose body starts at `start`.
///
/// Escaped characters never open or close a block. With `quotes`, braces
/// inside single- or double-quoted strings are ignored too.
fn find_block_end(template: &str, start: usize, quotes: bool) -> Option<usize> {
    let bytes = template.as_bytes();
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += 2;
            continue;
        }
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' if quotes => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Drop the backslash from `\{`, `\}` and `\$` inside expression bodies.
/// Other escapes belong to the expression's own string syntax.
fn unescape_expression(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '{' | '}' | '$') {
                    out.push(next);
                    chars.next();
                    continue;
                }
                out.push(c);
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}
