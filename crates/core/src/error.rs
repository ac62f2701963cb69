use thiserror::Error;

use crate::eval::EvalError;
use crate::model::{CourseError, QuestionError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}
