//! Courses shipped with the binary.

use std::collections::BTreeSet;

use regex::Regex;
use tutor_core::Error;
use tutor_core::eval::{Value, ValueKind};
use tutor_core::model::{Course, CourseProvider, Lesson, Question, TextAnswer};
use tutor_core::text::DisplayText;
use tutor_core::validate::{
    and, contains_expression, equals_expected, equals_value, function_matches, or,
    same_expression, text_matches, type_is,
};

/// Serves a fixed list of courses.
#[derive(Debug, Clone, Default)]
pub struct StaticCourses {
    courses: Vec<Course>,
}

impl StaticCourses {
    #[must_use]
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }
}

impl CourseProvider for StaticCourses {
    fn list_courses(&self) -> Vec<Course> {
        self.courses.clone()
    }
}

/// The built-in "Expression Basics" course.
///
/// # Errors
///
/// Returns `Error` if any question or lesson is malformed.
pub fn builtin_courses() -> Result<Vec<Course>, Error> {
    let course = Course::new(
        "Expression Basics",
        vec![numbers_and_names()?, building_values()?],
    )?
    .with_description("values, names, and functions");
    Ok(vec![course])
}

fn numbers_and_names() -> Result<Lesson, Error> {
    let questions = vec![
        Question::message(DisplayText::markdown(
            "Welcome! Everything you type is **evaluated** as an expression.\n\n\
             At any prompt you can type `hint`, `skip`, `menu` or `exit`.",
        )),
        Question::code("Type an expression that adds 4 and 4.", "8").with_hint("Try `4 + 4`."),
        Question::code(DisplayText::markdown("Store the number 5 in a variable named `x`."), "x = 5")
            .with_hint("Assignments look like `name = value`.")
            .with_validator(and(vec![
                text_matches(r"^x\s*=")?.with_message("Assign the value to `x`."),
                equals_value(Value::Int(5)),
            ])),
        Question::code(DisplayText::markdown("Now double it: compute `x * 2`."), "x * 2")
            .with_hint("Use the variable you just created."),
        Question::numeric("What is 7 divided by 2?", 3.5)
            .with_hint("Dividing integers can produce a fraction."),
        Question::text("Which keyword starts a function literal?", "fn")
            .with_hint("It is two letters long."),
        Question::single_choice(
            "Which of these produces a list?",
            vec![
                "1 + 2".into(),
                "\"1, 2\"".into(),
                "[1, 2]".into(),
                "len([1, 2])".into(),
            ],
            3,
        )?
        .with_hint("Lists are written with square brackets."),
    ];
    Ok(Lesson::new("Numbers and Names", questions)?
        .with_description("Arithmetic, variables, and the shape of an answer."))
}

fn building_values() -> Result<Lesson, Error> {
    let questions = vec![
        Question::code(
            DisplayText::markdown("The variable `scores` holds `[3, 9, 4]`. Produce its largest element."),
            "max(scores)",
        )
        .with_setup("scores = [3, 9, 4]")
        .with_hint("There is a built-in for that."),
        Question::code(
            DisplayText::markdown("Add up `scores` with the `sum` built-in."),
            "sum(scores)",
        )
        .with_setup("scores = [3, 9, 4]")
        .with_validator(and(vec![contains_expression("sum(scores)"), equals_expected()])),
        Question::code(
            DisplayText::markdown("`x` is 4. Define `y` as either two or three times `x`."),
            "y = 2 * x",
        )
        .with_setup("x = 4")
        .with_validator(or(vec![
            same_expression("y = 2 * x"),
            same_expression("y = 3 * x"),
        ]))
        .with_hint("Write it as `y = <number> * x`."),
        Question::multi_step(
            "Build a pair one statement at a time.",
            vec![
                DisplayText::markdown("Set `a` to 1."),
                DisplayText::markdown("Set `b` to `a + 1`."),
                DisplayText::markdown("Produce the list `[a, b]`."),
            ],
        )?
        .with_step_hints(vec![
            Some(DisplayText::markdown("Type `a = 1`.")),
            Some(DisplayText::markdown("Type `b = a + 1`.")),
            None,
        ])
        .with_final_answer("[1, 2]")
        .with_hint("Enter one statement per step, then type `done`."),
        Question::multi_choice(
            "Which of these are built-in functions? Separate numbers with commas.",
            vec!["sum".into(), "total".into(), "len".into(), "count".into()],
            BTreeSet::from([1, 3]),
        )?,
        Question::code(
            DisplayText::markdown("Define `double` as a function that doubles its argument."),
            "double = fn(n) => n * 2",
        )
        .with_validator(function_matches(vec![
            (vec![Value::Int(2)], Value::Int(4)),
            (vec![Value::Int(-3)], Value::Int(-6)),
            (vec![Value::Float(1.5)], Value::Float(3.0)),
        ]))
        .with_hint("Function literals look like `fn(n) => ...`."),
        Question::text_answer(
            "Name a comparison operator.",
            TextAnswer::Pattern(Regex::new(r"^(==|!=|<=|>=|<|>)$")?),
        ),
        Question::code("Is 10 greater than 3? Answer with a comparison.", "10 > 3").with_validator(
            and(vec![type_is(ValueKind::Bool), equals_value(Value::Bool(true))]),
        ),
        Question::confirm_link(
            "Want to read more about expressions?",
            "https://en.wikipedia.org/wiki/Expression_(computer_science)",
        ),
    ];
    Ok(Lesson::new("Building Values", questions)?
        .with_description("Lists, functions, and answers built from several steps."))
}
