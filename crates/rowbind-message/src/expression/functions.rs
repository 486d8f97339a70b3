//! Functions callable from message expressions.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use rowbind_model::Value;

/// A callable expression function. Errors are plain descriptions.
pub type ExpressionFunction = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Function table consulted by `name(...)` and `ns:name(...)` calls.
///
/// [`Default`] installs the built-ins: `empty`, `size`, `format`,
/// `f:join` and `f:defaultString`.
#[derive(Clone)]
pub struct ExpressionFunctions {
    functions: HashMap<String, ExpressionFunction>,
}

impl ExpressionFunctions {
    /// A table with no functions at all.
    pub fn none() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut functions = Self::none();
        functions.register("empty", |args| {
            let [value] = args else {
                return Err(arity("empty", 1, args.len()));
            };
            Ok(Value::Bool(match value {
                Value::Null => true,
                Value::Text(s) => s.is_empty(),
                Value::List(items) => items.is_empty(),
                _ => false,
            }))
        });
        functions.register("size", |args| {
            let [value] = args else {
                return Err(arity("size", 1, args.len()));
            };
            match value {
                Value::Null => Ok(Value::Integer(0)),
                Value::Text(s) => Ok(Value::from(s.chars().count())),
                Value::List(items) => Ok(Value::from(items.len())),
                other => Err(format!("size() is undefined for {} values", other.kind())),
            }
        });
        functions.register("f:join", |args| match args {
            [value] => Ok(Value::Text(join(value, ", "))),
            [value, separator] => Ok(Value::Text(join(value, &separator.to_string()))),
            _ => Err(arity("f:join", 2, args.len())),
        });
        functions.register("f:defaultString", |args| match args {
            [Value::Null] => Ok(Value::text("")),
            [Value::Null, default] => Ok(Value::Text(default.to_string())),
            [value] | [value, _] => Ok(Value::Text(value.to_string())),
            _ => Err(arity("f:defaultString", 1, args.len())),
        });
        functions.register("format", |args| {
            let Some((pattern, rest)) = args.split_first() else {
                return Err(arity("format", 1, 0));
            };
            format_values(&pattern.to_string(), rest).map(Value::Text)
        });
        functions
    }

    /// Register or replace a function.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, String> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| format!("unknown function '{name}'"))?;
        function(args)
    }
}

impl Default for ExpressionFunctions {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ExpressionFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("ExpressionFunctions")
            .field("functions", &names)
            .finish()
    }
}

fn arity(name: &str, expected: usize, actual: usize) -> String {
    format!("{name}() expects {expected} argument(s), got {actual}")
}

fn join(value: &Value, separator: &str) -> String {
    match value {
        Value::List(items) => items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(separator),
        other => other.to_string(),
    }
}

/// printf-style formatting supporting `%s`, `%d`, `%f`, `%.Nf` and `%%`.
fn format_values(pattern: &str, args: &[Value]) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len());
    let mut args = args.iter();
    let mut chars = pattern.chars().peekable();
    let mut next_arg = || args.next().ok_or_else(|| "format() is missing an argument".to_string());

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => out.push_str(&next_arg()?.to_string()),
            Some('d') => {
                let value = next_arg()?;
                let number = match value {
                    Value::Integer(i) => *i,
                    Value::Float(f) => f.trunc() as i64,
                    other => return Err(format!("%d expects a number, got {}", other.kind())),
                };
                let _ = write!(out, "{number}");
            }
            Some(directive @ ('f' | '.')) => {
                let precision = if directive == '.' {
                    let mut digits = String::new();
                    while let Some(d) = chars.next_if(char::is_ascii_digit) {
                        digits.push(d);
                    }
                    if chars.next() != Some('f') {
                        return Err(format!("unsupported format directive '%.{digits}'"));
                    }
                    digits
                        .parse::<usize>()
                        .map_err(|_| "format precision is missing".to_string())?
                } else {
                    6
                };
                let value = next_arg()?;
                let number = value
                    .as_f64()
                    .ok_or_else(|| format!("%f expects a number, got {}", value.kind()))?;
                let _ = write!(out, "{number:.precision$}");
            }
            Some(other) => return Err(format!("unsupported format directive '%{other}'")),
            None => return Err("format pattern ends with '%'".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_default_string() {
        let functions = ExpressionFunctions::default();
        let list = Value::text_list(["a", "b"]);
        assert_eq!(
            functions.call("f:join", &[list, Value::text("|")]),
            Ok(Value::text("a|b"))
        );
        assert_eq!(
            functions.call("f:defaultString", &[Value::Null]),
            Ok(Value::text(""))
        );
        assert_eq!(
            functions.call("f:defaultString", &[Value::Null, Value::text("n/a")]),
            Ok(Value::text("n/a"))
        );
    }

    #[test]
    fn format_directives() {
        let out = format_values(
            "%s has %d items (%.2f%%)",
            &[Value::text("cart"), Value::Integer(3), Value::Float(12.345)],
        );
        assert_eq!(out, Ok("cart has 3 items (12.35%)".to_string()));
        assert!(format_values("%s", &[]).is_err());
        assert!(format_values("%x", &[Value::Integer(1)]).is_err());
    }

    #[test]
    fn custom_functions_replace_builtins() {
        let mut functions = ExpressionFunctions::none();
        assert!(!functions.contains("size"));
        functions.register("twice", |args| match args {
            [Value::Integer(i)] => Ok(Value::Integer(i * 2)),
            _ => Err("twice() expects one integer".to_string()),
        });
        assert_eq!(functions.call("twice", &[Value::Integer(4)]), Ok(Value::Integer(8)));
        assert_eq!(
            functions.call("size", &[]),
            Err("unknown function 'size'".to_string())
        );
    }
}
