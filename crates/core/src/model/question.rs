use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::eval::{EvalContext, EvaluationResult, Value, evaluate};
use crate::text::{DisplayText, Renderer};
use crate::validate::{
    DEFAULT_SUCCESS, Submission, ValidationOutcome, Validator, choice_index, choice_set,
    equals_expected, number_exact, text_exact,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("a choice question needs at least two options")]
    TooFewChoices,

    #[error("answer {answer} is not one of the {count} options")]
    ChoiceOutOfRange { answer: usize, count: usize },

    #[error("a multi-choice question needs at least one correct option")]
    EmptyAnswerSet,

    #[error("a multi-step question needs at least one step")]
    NoSteps,

    #[error("required steps must be between 1 and {available}, got {required}")]
    InvalidRequiredSteps { required: usize, available: usize },
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

type TextPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// How a free-text answer is recognised.
#[derive(Clone)]
pub enum TextAnswer {
    Exact(String),
    Pattern(Regex),
    Predicate(TextPredicate),
}

impl TextAnswer {
    pub fn predicate(check: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(check))
    }
}

impl fmt::Debug for TextAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(text) => f.debug_tuple("Exact").field(text).finish(),
            Self::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Steps of a question answered across several prompts.
#[derive(Debug, Clone)]
pub struct MultiStep {
    steps: Vec<DisplayText>,
    step_hints: Vec<Option<DisplayText>>,
    required_steps: usize,
    answer: Option<String>,
}

impl MultiStep {
    #[must_use]
    pub fn steps(&self) -> &[DisplayText] {
        &self.steps
    }

    /// Prompt for a 1-based step.
    #[must_use]
    pub fn step(&self, step: usize) -> Option<&DisplayText> {
        step.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    /// Hint for a 1-based step, if one was authored.
    #[must_use]
    pub fn step_hint(&self, step: usize) -> Option<&DisplayText> {
        step.checked_sub(1)
            .and_then(|i| self.step_hints.get(i))
            .and_then(Option::as_ref)
    }

    #[must_use]
    pub fn required_steps(&self) -> usize {
        self.required_steps
    }

    /// Snippet whose value the combined fragments must reproduce. When unset,
    /// any successful evaluation is accepted.
    #[must_use]
    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }
}

/// Closed set of question variants.
#[derive(Debug, Clone)]
pub enum QuestionKind {
    /// Display-only text.
    Message,
    /// One snippet whose value must match the value of `answer`.
    Code { answer: String },
    MultiStep(MultiStep),
    Text { answer: TextAnswer },
    Numeric { answer: f64 },
    /// `answer` is a 1-based option number.
    SingleChoice {
        choices: Vec<DisplayText>,
        answer: usize,
    },
    MultiChoice {
        choices: Vec<DisplayText>,
        answer: BTreeSet<usize>,
    },
    /// Asks whether to open `url`; never scored.
    ConfirmLink { url: String },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single step of a lesson.
#[derive(Debug, Clone)]
pub struct Question {
    text: DisplayText,
    hint: Option<DisplayText>,
    kind: QuestionKind,
    validator: Option<Validator>,
    setup: Option<String>,
}

impl Question {
    fn with_kind(text: impl Into<DisplayText>, kind: QuestionKind) -> Self {
        Self {
            text: text.into(),
            hint: None,
            kind,
            validator: None,
            setup: None,
        }
    }

    pub fn message(text: impl Into<DisplayText>) -> Self {
        Self::with_kind(text, QuestionKind::Message)
    }

    pub fn code(text: impl Into<DisplayText>, answer: impl Into<String>) -> Self {
        Self::with_kind(
            text,
            QuestionKind::Code {
                answer: answer.into(),
            },
        )
    }

    /// A question answered in `steps.len()` fragments.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::NoSteps` if `steps` is empty.
    pub fn multi_step(
        text: impl Into<DisplayText>,
        steps: Vec<DisplayText>,
    ) -> Result<Self, QuestionError> {
        if steps.is_empty() {
            return Err(QuestionError::NoSteps);
        }
        let required_steps = steps.len();
        Ok(Self::with_kind(
            text,
            QuestionKind::MultiStep(MultiStep {
                step_hints: vec![None; steps.len()],
                steps,
                required_steps,
                answer: None,
            }),
        ))
    }

    pub fn text(text: impl Into<DisplayText>, answer: impl Into<String>) -> Self {
        Self::text_answer(text, TextAnswer::Exact(answer.into()))
    }

    pub fn text_answer(text: impl Into<DisplayText>, answer: TextAnswer) -> Self {
        Self::with_kind(text, QuestionKind::Text { answer })
    }

    pub fn numeric(text: impl Into<DisplayText>, answer: f64) -> Self {
        Self::with_kind(text, QuestionKind::Numeric { answer })
    }

    /// # Errors
    ///
    /// Returns `QuestionError` if there are fewer than two choices or
    /// `answer` is not a valid 1-based option.
    pub fn single_choice(
        text: impl Into<DisplayText>,
        choices: Vec<DisplayText>,
        answer: usize,
    ) -> Result<Self, QuestionError> {
        check_choice(answer, choices.len())?;
        Ok(Self::with_kind(
            text,
            QuestionKind::SingleChoice { choices, answer },
        ))
    }

    /// # Errors
    ///
    /// Returns `QuestionError` if there are fewer than two choices, the
    /// answer set is empty, or it names an option that does not exist.
    pub fn multi_choice(
        text: impl Into<DisplayText>,
        choices: Vec<DisplayText>,
        answer: BTreeSet<usize>,
    ) -> Result<Self, QuestionError> {
        if answer.is_empty() {
            return Err(QuestionError::EmptyAnswerSet);
        }
        for option in &answer {
            check_choice(*option, choices.len())?;
        }
        Ok(Self::with_kind(
            text,
            QuestionKind::MultiChoice { choices, answer },
        ))
    }

    pub fn confirm_link(text: impl Into<DisplayText>, url: impl Into<String>) -> Self {
        Self::with_kind(text, QuestionKind::ConfirmLink { url: url.into() })
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<DisplayText>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Overrides the default validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Snippet evaluated against the session context before display.
    #[must_use]
    pub fn with_setup(mut self, snippet: impl Into<String>) -> Self {
        self.setup = Some(snippet.into());
        self
    }

    /// Per-step hints for a multi-step question; ignored by other kinds.
    #[must_use]
    pub fn with_step_hints(mut self, hints: Vec<Option<DisplayText>>) -> Self {
        if let QuestionKind::MultiStep(multi) = &mut self.kind {
            multi.step_hints = hints;
        }
        self
    }

    /// Snippet the combined fragments of a multi-step question must match.
    #[must_use]
    pub fn with_final_answer(mut self, answer: impl Into<String>) -> Self {
        if let QuestionKind::MultiStep(multi) = &mut self.kind {
            multi.answer = Some(answer.into());
        }
        self
    }

    /// Limits how many of the authored steps must be entered.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidRequiredSteps` if `required` is zero or
    /// exceeds the number of steps.
    pub fn with_required_steps(mut self, required: usize) -> Result<Self, QuestionError> {
        if let QuestionKind::MultiStep(multi) = &mut self.kind {
            if required == 0 || required > multi.steps.len() {
                return Err(QuestionError::InvalidRequiredSteps {
                    required,
                    available: multi.steps.len(),
                });
            }
            multi.required_steps = required;
        }
        Ok(self)
    }

    #[must_use]
    pub fn text_body(&self) -> &DisplayText {
        &self.text
    }

    #[must_use]
    pub fn hint(&self) -> Option<&DisplayText> {
        self.hint.as_ref()
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn setup(&self) -> Option<&str> {
        self.setup.as_deref()
    }

    #[must_use]
    pub fn as_multi_step(&self) -> Option<&MultiStep> {
        match &self.kind {
            QuestionKind::MultiStep(multi) => Some(multi),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            QuestionKind::Message => "message",
            QuestionKind::Code { .. } => "code",
            QuestionKind::MultiStep(_) => "multi_step",
            QuestionKind::Text { .. } => "text",
            QuestionKind::Numeric { .. } => "numeric",
            QuestionKind::SingleChoice { .. } => "single_choice",
            QuestionKind::MultiChoice { .. } => "multi_choice",
            QuestionKind::ConfirmLink { .. } => "confirm_link",
        }
    }

    /// Display-only and link questions are not scored and never count
    /// attempts.
    #[must_use]
    pub fn is_scored(&self) -> bool {
        !matches!(
            self.kind,
            QuestionKind::Message | QuestionKind::ConfirmLink { .. }
        )
    }

    #[must_use]
    pub fn choice_count(&self) -> usize {
        match &self.kind {
            QuestionKind::SingleChoice { choices, .. }
            | QuestionKind::MultiChoice { choices, .. } => choices.len(),
            _ => 0,
        }
    }

    /// Prompt lines: the question text followed by numbered options for
    /// choice questions.
    #[must_use]
    pub fn display(&self, renderer: &dyn Renderer) -> Vec<String> {
        let mut lines = vec![self.text.render(renderer)];
        match &self.kind {
            QuestionKind::SingleChoice { choices, .. }
            | QuestionKind::MultiChoice { choices, .. } => {
                lines.extend(
                    choices
                        .iter()
                        .enumerate()
                        .map(|(i, choice)| format!("  {}: {}", i + 1, choice.render(renderer))),
                );
            }
            QuestionKind::ConfirmLink { url } => lines.push(format!("  {url}")),
            _ => {}
        }
        lines
    }

    /// Validator used when no override is supplied.
    #[must_use]
    pub fn default_validator(&self) -> Validator {
        match &self.kind {
            QuestionKind::Message | QuestionKind::ConfirmLink { .. } => {
                Validator::from_fn(|_| ValidationOutcome::pass(DEFAULT_SUCCESS))
            }
            QuestionKind::Code { .. } => equals_expected(),
            QuestionKind::MultiStep(multi) if multi.answer.is_some() => equals_expected(),
            QuestionKind::MultiStep(_) => Validator::output(|_, _| true, DEFAULT_SUCCESS),
            QuestionKind::Numeric { answer } => number_exact(*answer),
            QuestionKind::Text { answer } => match answer {
                TextAnswer::Exact(expected) => text_exact(expected.clone()),
                TextAnswer::Pattern(regex) => {
                    let regex = regex.clone();
                    Validator::input(
                        move |raw, _| regex.is_match(raw),
                        "\"{input}\" is not the answer we were looking for.",
                    )
                }
                TextAnswer::Predicate(check) => {
                    let check = Arc::clone(check);
                    Validator::input(
                        move |raw, _| check(raw),
                        "\"{input}\" is not the answer we were looking for.",
                    )
                }
            },
            QuestionKind::SingleChoice { answer, .. } => choice_index(*answer),
            QuestionKind::MultiChoice { answer, .. } => choice_set(answer.clone()),
        }
    }

    /// The override if present, otherwise the default.
    #[must_use]
    pub fn validator(&self) -> Validator {
        self.validator
            .clone()
            .unwrap_or_else(|| self.default_validator())
    }

    /// Value the answer must equal, computed against a fork of `context` so
    /// the reference solution leaves the learner's bindings untouched.
    #[must_use]
    pub fn expected_value(&self, context: &EvalContext) -> Option<Value> {
        match &self.kind {
            QuestionKind::Code { answer } => evaluate(answer, &mut context.fork()).into_result().ok(),
            QuestionKind::MultiStep(multi) => multi
                .answer
                .as_deref()
                .and_then(|answer| evaluate(answer, &mut context.fork()).into_result().ok()),
            QuestionKind::Numeric { answer } => Some(Value::Float(*answer)),
            QuestionKind::Text {
                answer: TextAnswer::Exact(expected),
            } => Some(Value::Str(expected.clone())),
            _ => None,
        }
    }

    /// Evaluates learner input the way this kind requires: code runs against
    /// the shared context, numeric input runs in a fork, everything else is
    /// taken as text.
    pub fn evaluate_input(&self, input: &str, context: &mut EvalContext) -> EvaluationResult {
        match &self.kind {
            QuestionKind::Code { .. } | QuestionKind::MultiStep(_) => evaluate(input, context),
            QuestionKind::Numeric { .. } => evaluate(input, &mut context.fork()),
            _ => EvaluationResult::from_text(input),
        }
    }

    /// Evaluates `input` and validates it with [`Question::validator`].
    pub fn check(
        &self,
        input: &str,
        context: &mut EvalContext,
    ) -> (EvaluationResult, ValidationOutcome) {
        let expected = self.expected_value(context);
        let result = self.evaluate_input(input, context);
        let outcome = self.validator().check(
            &Submission::new(input, self, &result, context).with_expected(expected.as_ref()),
        );
        (result, outcome)
    }

    /// Text shown when the learner runs out of attempts.
    #[must_use]
    pub fn reveal(&self) -> String {
        match &self.kind {
            QuestionKind::Message => String::new(),
            QuestionKind::Code { answer } => answer.clone(),
            QuestionKind::MultiStep(multi) => multi.answer.clone().unwrap_or_else(|| {
                multi
                    .steps
                    .iter()
                    .map(|step| step.raw().into_owned())
                    .collect::<Vec<_>>()
                    .join("\n")
            }),
            QuestionKind::Text { answer } => match answer {
                TextAnswer::Exact(expected) => expected.clone(),
                TextAnswer::Pattern(regex) => format!("text matching /{}/", regex.as_str()),
                TextAnswer::Predicate(_) => "an accepted answer".to_owned(),
            },
            QuestionKind::Numeric { answer } => answer.to_string(),
            QuestionKind::SingleChoice { choices, answer } => describe_choice(choices, *answer),
            QuestionKind::MultiChoice { choices, answer } => answer
                .iter()
                .map(|option| describe_choice(choices, *option))
                .collect::<Vec<_>>()
                .join(", "),
            QuestionKind::ConfirmLink { url } => url.clone(),
        }
    }
}

fn check_choice(answer: usize, count: usize) -> Result<(), QuestionError> {
    if count < 2 {
        return Err(QuestionError::TooFewChoices);
    }
    if answer == 0 || answer > count {
        return Err(QuestionError::ChoiceOutOfRange { answer, count });
    }
    Ok(())
}

fn describe_choice(choices: &[DisplayText], option: usize) -> String {
    let label = option
        .checked_sub(1)
        .and_then(|i| choices.get(i))
        .map(|choice| choice.raw().into_owned())
        .unwrap_or_default();
    format!("{option}: {label}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::PlainRenderer;
    use crate::validate;

    #[test]
    fn scored_excludes_message_and_link() {
        assert!(!Question::message("hi").is_scored());
        assert!(!Question::confirm_link("docs", "https://example.com").is_scored());
        assert!(Question::code("q", "1").is_scored());
        assert!(Question::text("q", "a").is_scored());
    }

    #[test]
    fn code_answer_validates_against_itself() {
        let questions = [
            Question::code("eight", "4 + 4"),
            Question::code("list", "[1, 2, 3]"),
            Question::code("assign", "total = 10"),
            Question::code("fn", "sum(range(4))"),
            Question::code("double", "fn(x) => x * 2"),
            Question::code("named double", "double = fn(n) => n * 2"),
        ];
        for question in &questions {
            let QuestionKind::Code { answer } = question.kind() else {
                unreachable!();
            };
            let mut ctx = EvalContext::new();
            let (_, outcome) = question.check(answer, &mut ctx);
            assert!(outcome.correct, "{}: {}", answer, outcome.message);
        }
    }

    #[test]
    fn code_question_reports_produced_value() {
        let question = Question::code("What is 8?", "8");
        let mut ctx = EvalContext::new();
        assert!(question.check("4+4", &mut ctx).1.correct);
        let (_, outcome) = question.check("5+2", &mut ctx);
        assert!(!outcome.correct);
        assert!(outcome.message.contains("produced 7"), "{}", outcome.message);
    }

    #[test]
    fn expected_value_does_not_touch_context() {
        let question = Question::code("Increment", "x = x + 1");
        let mut ctx = EvalContext::new();
        evaluate("x = 1", &mut ctx);
        let (_, outcome) = question.check("x = x + 1", &mut ctx);
        assert!(outcome.correct, "{}", outcome.message);
        assert_eq!(ctx.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn override_takes_precedence() {
        let question = Question::code("Anything positive", "1")
            .with_validator(validate::number_within(0.0, 100.0));
        let mut ctx = EvalContext::new();
        assert!(question.check("42", &mut ctx).1.correct);
        assert!(!question.check("-1", &mut ctx).1.correct);
    }

    #[test]
    fn display_enumerates_choices() {
        let question = Question::single_choice(
            "Pick one",
            vec!["red".into(), "green".into()],
            2,
        )
        .unwrap();
        assert_eq!(
            question.display(&PlainRenderer),
            vec!["Pick one", "  1: red", "  2: green"]
        );
        assert_eq!(question.reveal(), "2: green");
    }

    #[test]
    fn constructors_validate_structure() {
        assert_eq!(
            Question::single_choice("q", vec!["a".into(), "b".into()], 3).unwrap_err(),
            QuestionError::ChoiceOutOfRange { answer: 3, count: 2 }
        );
        assert_eq!(
            Question::single_choice("q", vec!["a".into()], 1).unwrap_err(),
            QuestionError::TooFewChoices
        );
        assert_eq!(
            Question::multi_choice("q", vec!["a".into(), "b".into()], BTreeSet::new()).unwrap_err(),
            QuestionError::EmptyAnswerSet
        );
        assert_eq!(
            Question::multi_step("q", Vec::new()).unwrap_err(),
            QuestionError::NoSteps
        );
        let err = Question::multi_step("q", vec!["a".into()])
            .unwrap()
            .with_required_steps(2)
            .unwrap_err();
        assert_eq!(
            err,
            QuestionError::InvalidRequiredSteps { required: 2, available: 1 }
        );
    }

    #[test]
    fn text_answers_dispatch_by_kind() {
        let mut ctx = EvalContext::new();
        let exact = Question::text("Say hi", "hi");
        assert!(exact.check(" hi ", &mut ctx).1.correct);
        assert!(!exact.check("Hi", &mut ctx).1.correct);

        let pattern = Question::text_answer("Say yes", TextAnswer::Pattern(Regex::new("^y(es)?$").unwrap()));
        assert!(pattern.check("y", &mut ctx).1.correct);

        let predicate = Question::text_answer("Long word", TextAnswer::predicate(|s| s.len() > 5));
        assert!(predicate.check("elephant", &mut ctx).1.correct);
        assert!(!predicate.check("cat", &mut ctx).1.correct);
    }

    #[test]
    fn numeric_input_is_evaluated_without_side_effects() {
        let question = Question::numeric("Half of 7", 3.5);
        let mut ctx = EvalContext::new();
        assert!(question.check("7 / 2", &mut ctx).1.correct);
        assert!(question.check("n = 3.5", &mut ctx).1.correct);
        assert!(!ctx.contains("n"));
    }

    #[test]
    fn multi_step_without_answer_accepts_any_success() {
        let question = Question::multi_step("Anything", vec!["a".into()]).unwrap();
        let mut ctx = EvalContext::new();
        assert!(question.check("a = 1\nb = a + 1", &mut ctx).1.correct);
        assert!(!question.check("1 +", &mut ctx).1.correct);

        let pinned = Question::multi_step("Pinned", vec!["a".into()])
            .unwrap()
            .with_final_answer("[1, 2]");
        assert!(pinned.check("[a, b]", &mut ctx).1.correct);
        assert!(!pinned.check("[b, a]", &mut ctx).1.correct);
    }

    #[test]
    fn step_hints_are_one_based() {
        let question = Question::multi_step("Build it", vec!["first".into(), "second".into()])
            .unwrap()
            .with_step_hints(vec![None, Some("two".into())]);
        let multi = question.as_multi_step().unwrap();
        assert!(multi.step_hint(1).is_none());
        assert_eq!(multi.step_hint(2).unwrap().raw(), "two");
        assert_eq!(multi.step(1).unwrap().raw(), "first");
        assert!(multi.step(3).is_none());
    }
}
