//! Evaluation boundary for learner-submitted snippets.
//!
//! Snippets are written in a small expression language (see [`parser`]) and
//! are evaluated against an explicit [`EvalContext`]. Every failure is
//! captured into the returned [`EvaluationResult`]; nothing here panics on
//! learner input.

pub mod ast;
mod builtins;
mod context;
mod interpreter;
pub mod lexer;
pub mod parser;
mod value;

use thiserror::Error;

pub use context::EvalContext;
pub use interpreter::{MAX_CALL_DEPTH, call_function, evaluate};
pub use parser::{MAX_NESTING, parse_expression, parse_program};
pub use value::{Closure, Value, ValueKind};

/// Parse or runtime failure of a snippet.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("'{0}' is not defined")]
    UnknownName(String),

    #[error("{0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("{name} expects {expected} argument(s) but got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("a {0} value cannot be called")]
    NotCallable(ValueKind),

    #[error("integer overflow")]
    Overflow,

    #[error("maximum call depth of {0} exceeded")]
    RecursionLimit(usize),

    #[error("{0}")]
    Builtin(String),
}

/// Outcome of evaluating one snippet.
///
/// Holds a value iff the evaluation succeeded and an error iff it failed,
/// plus the names of bindings the evaluation created in the context.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    outcome: Result<Value, EvalError>,
    new_bindings: Vec<String>,
}

impl EvaluationResult {
    #[must_use]
    pub fn success(value: Value) -> Self {
        Self {
            outcome: Ok(value),
            new_bindings: Vec::new(),
        }
    }

    #[must_use]
    pub fn failure(error: EvalError) -> Self {
        Self {
            outcome: Err(error),
            new_bindings: Vec::new(),
        }
    }

    /// Treats raw learner text as the evaluated value, for questions whose
    /// input is not code.
    #[must_use]
    pub fn from_text(raw: &str) -> Self {
        Self::success(Value::Str(raw.trim().to_owned()))
    }

    #[must_use]
    pub fn with_new_bindings(mut self, names: Vec<String>) -> Self {
        self.new_bindings = names;
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    #[must_use]
    pub fn error(&self) -> Option<&EvalError> {
        self.outcome.as_ref().err()
    }

    #[must_use]
    pub fn new_bindings(&self) -> &[String] {
        &self.new_bindings
    }

    #[must_use]
    pub fn into_result(self) -> Result<Value, EvalError> {
        self.outcome
    }
}
