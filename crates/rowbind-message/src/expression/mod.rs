//! Expression evaluation for `${...}` message blocks.
//!
//! Expressions are parsed once per source text and kept in a bounded,
//! process-wide [`ExpressionCache`]. Concurrent first use of the same text
//! parses it exactly once; later callers wait for that result.

mod ast;
mod eval;
mod functions;
mod parser;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use rowbind_model::{Value, Variables};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use functions::{ExpressionFunction, ExpressionFunctions};
pub use parser::parse_expression;

/// Non-fatal failure while rendering an expression block.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("cannot parse expression '{expression}': {message} (variables: {})", variable_names(.variables))]
    Parse {
        expression: String,
        message: String,
        variables: Variables,
    },

    #[error("cannot evaluate expression '{expression}': {message} (variables: {})", variable_names(.variables))]
    Evaluation {
        expression: String,
        message: String,
        variables: Variables,
    },
}

impl ExpressionError {
    pub fn expression(&self) -> &str {
        match self {
            ExpressionError::Parse { expression, .. }
            | ExpressionError::Evaluation { expression, .. } => expression,
        }
    }

    /// Snapshot of the variables the expression was evaluated against.
    pub fn variables(&self) -> &Variables {
        match self {
            ExpressionError::Parse { variables, .. }
            | ExpressionError::Evaluation { variables, .. } => variables,
        }
    }
}

/// Values stay out of the display string; they may hold row data.
fn variable_names(variables: &Variables) -> String {
    if variables.is_empty() {
        return "none".to_string();
    }
    variables.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Evaluates expression source text against a variable map.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, variables: &Variables) -> Result<Value, ExpressionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionCacheConfig {
    /// Maximum number of compiled expressions kept; 0 disables caching.
    pub capacity: usize,
}

impl Default for ExpressionCacheConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

type ParseSlot = Arc<OnceLock<Result<Arc<Expr>, String>>>;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, ParseSlot>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

/// Bounded cache of parsed expressions keyed by source text.
///
/// Eviction is first-in first-out. Parse failures are cached too.
#[derive(Debug)]
pub struct ExpressionCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl ExpressionCache {
    pub fn new(config: ExpressionCacheConfig) -> Self {
        Self {
            capacity: config.capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn get_or_parse(&self, source: &str) -> Result<Arc<Expr>, String> {
        let slot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match state.entries.get(source) {
                Some(slot) => {
                    trace!(expression = source, "expression cache hit");
                    Arc::clone(slot)
                }
                None => {
                    let slot: ParseSlot = Arc::new(OnceLock::new());
                    if self.capacity > 0 {
                        while state.entries.len() >= self.capacity {
                            let Some(oldest) = state.order.pop_front() else {
                                break;
                            };
                            state.entries.remove(&oldest);
                        }
                        state
                            .entries
                            .insert(source.to_string(), Arc::clone(&slot));
                        state.order.push_back(source.to_string());
                    }
                    slot
                }
            }
        };
        slot.get_or_init(|| parse_expression(source).map(Arc::new))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new(ExpressionCacheConfig::default())
    }
}

/// Default evaluator: nom-parsed expressions with the built-in function
/// table plus whatever the application registers.
#[derive(Debug, Default)]
pub struct ElEvaluator {
    functions: ExpressionFunctions,
    cache: ExpressionCache,
}

impl ElEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_config(config: ExpressionCacheConfig) -> Self {
        Self {
            functions: ExpressionFunctions::default(),
            cache: ExpressionCache::new(config),
        }
    }

    #[must_use]
    pub fn with_functions(mut self, functions: ExpressionFunctions) -> Self {
        self.functions = functions;
        self
    }

    pub fn functions_mut(&mut self) -> &mut ExpressionFunctions {
        &mut self.functions
    }

    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }
}

impl ExpressionEvaluator for ElEvaluator {
    fn evaluate(&self, expression: &str, variables: &Variables) -> Result<Value, ExpressionError> {
        let expr = self
            .cache
            .get_or_parse(expression)
            .map_err(|message| ExpressionError::Parse {
                expression: expression.to_string(),
                message,
                variables: variables.clone(),
            })?;
        eval::evaluate(&expr, variables, &self.functions).map_err(|message| {
            ExpressionError::Evaluation {
                expression: expression.to_string(),
                message,
                variables: variables.clone(),
            }
        })
    }
}
