//! Composable correctness checks.
//!
//! A [`Validator`] maps a [`Submission`] (raw input, question, evaluation
//! result, expected value, context) to a [`ValidationOutcome`]. Validators
//! never fail: malformed input is reported as an incorrect outcome.
//!
//! [`and`] and [`or`] build combinators which are themselves validators, so
//! chains nest arbitrarily.

mod builtin;

use std::fmt;
use std::sync::Arc;

use crate::eval::{EvalContext, EvaluationResult, Value};
use crate::model::Question;

pub use builtin::{
    choice_index, choice_set, contains_expression, creates_binding, equals_expected, equals_value,
    function_matches, is_numeric, number_exact, number_in_set, number_within, parse_choice,
    parse_choices, same_expression, text_exact, text_exact_ignore_case, text_matches, type_is,
};

pub const DEFAULT_SUCCESS: &str = "Correct!";

/// Result of checking one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub correct: bool,
    pub message: String,
}

impl ValidationOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            correct: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            correct: false,
            message: message.into(),
        }
    }
}

/// Everything a validator may inspect about one learner submission.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub input: &'a str,
    pub question: &'a Question,
    pub result: &'a EvaluationResult,
    /// Value the question expects, when it has one.
    pub expected: Option<&'a Value>,
    /// Read-only view of the session bindings, after evaluating the input.
    pub context: &'a EvalContext,
}

impl<'a> Submission<'a> {
    #[must_use]
    pub fn new(
        input: &'a str,
        question: &'a Question,
        result: &'a EvaluationResult,
        context: &'a EvalContext,
    ) -> Self {
        Self {
            input,
            question,
            result,
            expected: None,
            context,
        }
    }

    #[must_use]
    pub fn with_expected(mut self, expected: Option<&'a Value>) -> Self {
        self.expected = expected;
        self
    }
}

/// Contract implemented by every validator.
pub trait Validate: Send + Sync {
    fn validate(&self, submission: &Submission<'_>) -> ValidationOutcome;
}

impl<F> Validate for F
where
    F: Fn(&Submission<'_>) -> ValidationOutcome + Send + Sync,
{
    fn validate(&self, submission: &Submission<'_>) -> ValidationOutcome {
        self(submission)
    }
}

/// Shareable handle to any validator.
#[derive(Clone)]
pub struct Validator(Arc<dyn Validate>);

impl Validator {
    pub fn new(inner: impl Validate + 'static) -> Self {
        Self(Arc::new(inner))
    }

    pub fn from_fn(
        check: impl Fn(&Submission<'_>) -> ValidationOutcome + Send + Sync + 'static,
    ) -> Self {
        Self::new(check)
    }

    /// Decides from the raw input text alone. `{input}` in `message` is
    /// replaced by the trimmed input.
    pub fn input(
        predicate: impl Fn(&str, &Question) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self::new(InputValidator {
            predicate: Box::new(predicate),
            message: message.into(),
        })
    }

    /// Decides from the evaluated value and the expected value. `{value}`
    /// and `{expected}` in `message` are replaced by their displays.
    pub fn output(
        predicate: impl Fn(&Value, Option<&Value>) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self::new(OutputValidator {
            predicate: Box::new(predicate),
            message: message.into(),
        })
    }

    #[must_use]
    pub fn check(&self, submission: &Submission<'_>) -> ValidationOutcome {
        self.0.validate(submission)
    }

    /// Replaces the failure message, keeping the verdict.
    #[must_use]
    pub fn with_message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_fn(move |submission| {
            let outcome = self.check(submission);
            if outcome.correct {
                outcome
            } else {
                ValidationOutcome::fail(message.clone())
            }
        })
    }

    #[must_use]
    pub fn and(self, other: Validator) -> Self {
        and(vec![self, other])
    }

    #[must_use]
    pub fn or(self, other: Validator) -> Self {
        or(vec![self, other])
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

type InputPredicate = Box<dyn Fn(&str, &Question) -> bool + Send + Sync>;
type OutputPredicate = Box<dyn Fn(&Value, Option<&Value>) -> bool + Send + Sync>;

/// Predicate over the raw learner input and the question.
pub struct InputValidator {
    predicate: InputPredicate,
    message: String,
}

impl Validate for InputValidator {
    fn validate(&self, submission: &Submission<'_>) -> ValidationOutcome {
        let input = submission.input.trim();
        if (self.predicate)(input, submission.question) {
            ValidationOutcome::pass(DEFAULT_SUCCESS)
        } else {
            ValidationOutcome::fail(self.message.replace("{input}", input))
        }
    }
}

/// Predicate over the evaluated value and the expected value.
pub struct OutputValidator {
    predicate: OutputPredicate,
    message: String,
}

impl Validate for OutputValidator {
    fn validate(&self, submission: &Submission<'_>) -> ValidationOutcome {
        let Some(value) = submission.result.value() else {
            let reason = submission
                .result
                .error()
                .map_or_else(|| "no value".to_owned(), ToString::to_string);
            return ValidationOutcome::fail(format!("Your code produced an error: {reason}"));
        };
        if (self.predicate)(value, submission.expected) {
            return ValidationOutcome::pass(DEFAULT_SUCCESS);
        }
        let expected = submission
            .expected
            .map_or_else(|| "nothing".to_owned(), ToString::to_string);
        ValidationOutcome::fail(
            self.message
                .replace("{value}", &value.to_string())
                .replace("{expected}", &expected),
        )
    }
}

/// Correct iff every validator is correct. Runs left to right and stops at
/// the first failure, returning its message.
#[must_use]
pub fn and(validators: Vec<Validator>) -> Validator {
    Validator::from_fn(move |submission| {
        let mut last = ValidationOutcome::pass(DEFAULT_SUCCESS);
        for validator in &validators {
            last = validator.check(submission);
            if !last.correct {
                return last;
            }
        }
        last
    })
}

/// Correct iff at least one validator is correct. Runs left to right,
/// returning the first success, or the last failure if none succeed.
#[must_use]
pub fn or(validators: Vec<Validator>) -> Validator {
    Validator::from_fn(move |submission| {
        let mut last = ValidationOutcome::fail("No accepted answer matched.");
        for validator in &validators {
            last = validator.check(submission);
            if last.correct {
                return last;
            }
        }
        last
    })
}
