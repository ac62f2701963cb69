//! Domain core of the tutorial engine: the expression evaluator, question
//! and lesson model, validators, and saved progress.

pub mod error;
pub mod eval;
pub mod model;
pub mod text;
pub mod validate;

pub use error::Error;
pub use eval::{EvalContext, EvalError, EvaluationResult, Value};
pub use model::{Course, CourseProvider, Lesson, Progress, ProgressKey, Question};
pub use text::{DisplayText, PlainRenderer, Renderer, TextFormat};
pub use validate::{ValidationOutcome, Validator};
