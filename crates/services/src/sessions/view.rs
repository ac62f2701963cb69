use tutor_core::model::{Course, Lesson, MultiStep};
use tutor_core::text::{DisplayText, Renderer};

use super::progress::LessonStatus;

pub(crate) const GOODBYE: &str = "Your progress has been saved. Goodbye!";
pub(crate) const ALL_STEPS_ENTERED: &str = "All steps are entered. Type `done` to check your answer.";
pub(crate) const STEPS_RESTARTED: &str =
    "Your earlier steps were not kept; starting this question again from step 1.";

pub(crate) fn course_menu(courses: &[Course]) -> Vec<String> {
    let mut lines = Vec::with_capacity(courses.len() + 2);
    if courses.is_empty() {
        lines.push("No courses are installed.".to_owned());
    } else {
        lines.push("Choose a course:".to_owned());
    }
    for (i, course) in courses.iter().enumerate() {
        match course.description() {
            Some(description) => lines.push(format!("  {}: {} - {description}", i + 1, course.name())),
            None => lines.push(format!("  {}: {}", i + 1, course.name())),
        }
    }
    lines.push("  0: Exit".to_owned());
    lines
}

pub(crate) fn course_menu_help(count: usize) -> String {
    if count == 0 {
        "Enter 0 to exit.".to_owned()
    } else {
        format!("Please enter a course number (1-{count}), or 0 to exit.")
    }
}

pub(crate) fn lesson_menu(course: &Course, statuses: &[LessonStatus]) -> Vec<String> {
    let mut lines = vec![format!("{}:", course.name())];
    for (i, (lesson, status)) in course.lessons().iter().zip(statuses).enumerate() {
        lines.push(format!("  {}: {} [{status}]", i + 1, lesson.title()));
    }
    lines.push("  0: Back to courses".to_owned());
    lines.push("Type `reset <n>` to clear one lesson or `reset all` to clear the course.".to_owned());
    lines
}

pub(crate) fn lesson_menu_help(count: usize) -> String {
    format!("Please enter a lesson number (1-{count}), `reset <n>`, `reset all`, or 0 to go back.")
}

pub(crate) fn lesson_banner(lesson: &Lesson) -> Vec<String> {
    let mut lines = vec![format!("== {} ==", lesson.title())];
    if let Some(description) = lesson.description() {
        lines.push(description.to_owned());
    }
    lines
}

pub(crate) fn step_prompt(multi: &MultiStep, step: usize, renderer: &dyn Renderer) -> String {
    let text = multi
        .step(step)
        .map(|text| text.render(renderer))
        .unwrap_or_default();
    format!("Step {step} of {}: {text}", multi.required_steps())
}

pub(crate) fn steps_remaining(remaining: usize) -> String {
    if remaining == 1 {
        "1 step remaining.".to_owned()
    } else {
        format!("{remaining} steps remaining.")
    }
}

pub(crate) fn hint_line(hint: Option<&DisplayText>, renderer: &dyn Renderer) -> String {
    match hint {
        Some(hint) => format!("Hint: {}", hint.render(renderer)),
        None => "No hint is available for this question.".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::Question;
    use tutor_core::text::PlainRenderer;

    #[test]
    fn steps_remaining_is_singular_for_one() {
        assert_eq!(steps_remaining(1), "1 step remaining.");
        assert_eq!(steps_remaining(3), "3 steps remaining.");
    }

    #[test]
    fn course_menu_lists_exit() {
        assert_eq!(course_menu(&[]), vec!["No courses are installed.", "  0: Exit"]);
    }

    #[test]
    fn step_prompt_counts_required_steps() {
        let question = Question::multi_step("q", vec!["first".into(), "second".into()])
            .unwrap()
            .with_required_steps(1)
            .unwrap();
        let multi = question.as_multi_step().unwrap();
        assert_eq!(step_prompt(multi, 1, &PlainRenderer), "Step 1 of 1: first");
    }
}
