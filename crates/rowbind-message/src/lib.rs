//! Message rendering for rowbind.
//!
//! - **expression**: the `${...}` expression language and its evaluator
//! - **interpolator**: template rendering with escapes and bounded recursion
//! - **resolver**: message-code lookup and the properties-backed bundle
//! - **codes**: message code chains for field and row errors

pub mod codes;
pub mod expression;
pub mod interpolator;
pub mod resolver;

pub use codes::MessageCodeGenerator;
pub use expression::{
    ElEvaluator, ExpressionCache, ExpressionCacheConfig, ExpressionError, ExpressionEvaluator,
    ExpressionFunctions,
};
pub use interpolator::{Interpolation, InterpolatorConfig, MessageInterpolator};
pub use resolver::{BundleError, MessageBundle, MessageResolver};
