use std::collections::BTreeSet;

use regex::Regex;

use super::{DEFAULT_SUCCESS, ValidationOutcome, Validator};
use crate::eval::{Value, ValueKind, call_function, parse_expression, parse_program};

const NUMERIC_TOLERANCE: f64 = 1e-9;

//
// ─── VALUE EQUALITY ────────────────────────────────────────────────────────────
//

/// The evaluated value equals the question's expected value.
#[must_use]
pub fn equals_expected() -> Validator {
    Validator::output(
        |value, expected| expected.is_some_and(|expected| value == expected),
        "Expected {expected}, but your code produced {value}.",
    )
}

/// The evaluated value equals `target`.
#[must_use]
pub fn equals_value(target: Value) -> Validator {
    let message = format!("Expected {target}, but your code produced {{value}}.");
    Validator::output(move |value, _| *value == target, message)
}

//
// ─── STRINGS ───────────────────────────────────────────────────────────────────
//

#[must_use]
pub fn text_exact(expected: impl Into<String>) -> Validator {
    let expected = expected.into();
    Validator::input(
        move |raw, _| raw == expected.trim(),
        "\"{input}\" is not the answer we were looking for.",
    )
}

#[must_use]
pub fn text_exact_ignore_case(expected: impl Into<String>) -> Validator {
    let expected = expected.into().trim().to_lowercase();
    Validator::input(
        move |raw, _| raw.to_lowercase() == expected,
        "\"{input}\" is not the answer we were looking for.",
    )
}

/// The trimmed input matches `pattern`.
///
/// # Errors
///
/// Returns `regex::Error` if `pattern` is not a valid regular expression.
pub fn text_matches(pattern: &str) -> Result<Validator, regex::Error> {
    let regex = Regex::new(pattern)?;
    Ok(Validator::input(
        move |raw, _| regex.is_match(raw),
        "\"{input}\" does not have the expected form.",
    ))
}

//
// ─── NUMBERS ───────────────────────────────────────────────────────────────────
//

#[must_use]
pub fn number_exact(target: f64) -> Validator {
    Validator::output(
        move |value, _| value.as_f64().is_some_and(|n| (n - target).abs() <= NUMERIC_TOLERANCE),
        format!("Expected {target}, but got {{value}}."),
    )
}

/// The value is a number in the closed interval `[low, high]`.
#[must_use]
pub fn number_within(low: f64, high: f64) -> Validator {
    Validator::output(
        move |value, _| value.as_f64().is_some_and(|n| n >= low && n <= high),
        format!("{{value}} is not between {low} and {high}."),
    )
}

#[must_use]
pub fn number_in_set(allowed: Vec<f64>) -> Validator {
    let listed = allowed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Validator::output(
        move |value, _| {
            value.as_f64().is_some_and(|n| {
                allowed
                    .iter()
                    .any(|candidate| (n - candidate).abs() <= NUMERIC_TOLERANCE)
            })
        },
        format!("{{value}} is not one of: {listed}."),
    )
}

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

#[must_use]
pub fn type_is(kind: ValueKind) -> Validator {
    Validator::output(
        move |value, _| value.kind() == kind,
        format!("Expected a {kind} value, but got {{value}}."),
    )
}

#[must_use]
pub fn is_numeric() -> Validator {
    Validator::output(
        |value, _| value.kind().is_numeric(),
        "Expected a number, but got {value}.",
    )
}

//
// ─── EXPRESSION STRUCTURE ──────────────────────────────────────────────────────
//

/// The input parses to the same statements as `reference`, ignoring
/// whitespace and redundant parentheses.
#[must_use]
pub fn same_expression(reference: &str) -> Validator {
    let parsed = parse_program(reference);
    let shown = reference.trim().to_owned();
    Validator::from_fn(move |submission| {
        let Ok(expected) = &parsed else {
            return ValidationOutcome::fail(format!("The reference `{shown}` does not parse."));
        };
        match parse_program(submission.input) {
            Ok(actual) if actual == *expected => ValidationOutcome::pass(DEFAULT_SUCCESS),
            Ok(_) => ValidationOutcome::fail(format!("That is not the expression `{shown}`.")),
            Err(err) => ValidationOutcome::fail(format!("Your input does not parse: {err}")),
        }
    })
}

/// Some statement of the input contains `needle` as a sub-expression.
#[must_use]
pub fn contains_expression(needle: &str) -> Validator {
    let parsed = parse_expression(needle);
    let shown = needle.trim().to_owned();
    Validator::from_fn(move |submission| {
        let Ok(needle) = &parsed else {
            return ValidationOutcome::fail(format!("The reference `{shown}` does not parse."));
        };
        match parse_program(submission.input) {
            Ok(program) if program.statements.iter().any(|stmt| stmt.contains(needle)) => {
                ValidationOutcome::pass(DEFAULT_SUCCESS)
            }
            Ok(_) => ValidationOutcome::fail(format!("Your answer should use `{shown}`.")),
            Err(err) => ValidationOutcome::fail(format!("Your input does not parse: {err}")),
        }
    })
}

//
// ─── CONTEXT ───────────────────────────────────────────────────────────────────
//

/// The evaluation created a new binding: `name` if given, otherwise any.
#[must_use]
pub fn creates_binding(name: Option<&str>) -> Validator {
    let name = name.map(str::to_owned);
    Validator::from_fn(move |submission| {
        let created = submission.result.new_bindings();
        let ok = match &name {
            Some(name) => {
                created.iter().any(|created| created == name) && submission.context.contains(name)
            }
            None => !created.is_empty(),
        };
        if ok {
            return ValidationOutcome::pass(DEFAULT_SUCCESS);
        }
        match &name {
            Some(name) => ValidationOutcome::fail(format!("Create a new variable named `{name}`.")),
            None => ValidationOutcome::fail("Your code should create a new variable."),
        }
    })
}

/// The value is callable and returns the expected output for every
/// `(arguments, output)` pair.
#[must_use]
pub fn function_matches(cases: Vec<(Vec<Value>, Value)>) -> Validator {
    Validator::from_fn(move |submission| {
        let Some(function) = submission.result.value() else {
            let reason = submission
                .result
                .error()
                .map_or_else(|| "no value".to_owned(), ToString::to_string);
            return ValidationOutcome::fail(format!("Your code produced an error: {reason}"));
        };
        if !function.is_callable() {
            return ValidationOutcome::fail(format!("Expected a function, but got {function}."));
        }
        for (args, expected) in &cases {
            let shown = args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            match call_function(function, args.clone(), submission.context) {
                Ok(actual) if actual == *expected => {}
                Ok(actual) => {
                    return ValidationOutcome::fail(format!(
                        "Called with ({shown}) your function returned {actual}, expected {expected}."
                    ));
                }
                Err(err) => {
                    return ValidationOutcome::fail(format!(
                        "Called with ({shown}) your function failed: {err}"
                    ));
                }
            }
        }
        ValidationOutcome::pass(DEFAULT_SUCCESS)
    })
}

//
// ─── CHOICES ───────────────────────────────────────────────────────────────────
//

fn format_help(count: usize) -> String {
    format!("Please enter the corresponding number (1-{count}).")
}

/// Parses a 1-based option number, returning the format-help message on
/// failure.
///
/// # Errors
///
/// Returns a learner-facing message if `raw` is not a number in `1..=count`.
pub fn parse_choice(raw: &str, count: usize) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(n),
        _ => Err(format_help(count)),
    }
}

/// Parses option numbers separated by commas and/or whitespace.
///
/// # Errors
///
/// Returns a learner-facing message if any entry is not a valid option
/// number or nothing was entered.
pub fn parse_choices(raw: &str, count: usize) -> Result<BTreeSet<usize>, String> {
    let mut picked = BTreeSet::new();
    for part in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if part.is_empty() {
            continue;
        }
        picked.insert(parse_choice(part, count).map_err(|_| {
            format!("Please enter the corresponding numbers (1-{count}) separated by commas.")
        })?);
    }
    if picked.is_empty() {
        return Err(format!(
            "Please enter the corresponding numbers (1-{count}) separated by commas."
        ));
    }
    Ok(picked)
}

/// The input selects option `answer` (1-based).
#[must_use]
pub fn choice_index(answer: usize) -> Validator {
    Validator::from_fn(move |submission| {
        let count = submission.question.choice_count().max(answer);
        match parse_choice(submission.input, count) {
            Ok(n) if n == answer => ValidationOutcome::pass(DEFAULT_SUCCESS),
            Ok(n) => ValidationOutcome::fail(format!("Option {n} is not correct.")),
            Err(help) => ValidationOutcome::fail(help),
        }
    })
}

/// The input selects exactly the options in `answer` (1-based).
#[must_use]
pub fn choice_set(answer: BTreeSet<usize>) -> Validator {
    Validator::from_fn(move |submission| {
        let count = submission
            .question
            .choice_count()
            .max(answer.iter().copied().max().unwrap_or(0));
        match parse_choices(submission.input, count) {
            Ok(picked) if picked == answer => ValidationOutcome::pass(DEFAULT_SUCCESS),
            Ok(picked) if picked.is_subset(&answer) => {
                ValidationOutcome::fail("Some correct options are missing.")
            }
            Ok(_) => ValidationOutcome::fail("That selection includes an incorrect option."),
            Err(help) => ValidationOutcome::fail(help),
        }
    })
}
