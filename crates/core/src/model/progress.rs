use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Lesson;

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Identifies the progress record of one lesson within one course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgressKey {
    pub course: String,
    pub lesson: String,
}

impl ProgressKey {
    /// Builds a key from display names.
    #[must_use]
    pub fn new(course_name: &str, lesson_name: &str) -> Self {
        Self {
            course: slugify(course_name),
            lesson: slugify(lesson_name),
        }
    }

    /// Flat name used by stores that key on a single string. Slugs never
    /// contain `.`, so distinct keys always get distinct names.
    #[must_use]
    pub fn record_name(&self) -> String {
        format!("{}.{}", self.course, self.lesson)
    }
}

/// Saved position and score for one lesson.
///
/// Question indices are 1-based; `current_question == len + 1` means the
/// lesson has been worked through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub course_name: String,
    pub lesson_name: String,
    pub current_question: usize,
    pub completed: bool,
    pub correct_answers: u32,
    /// Submissions already used on the current question.
    pub attempts: u32,
    /// 1-based question index to 1-based step for multi-step questions in
    /// progress. A step of `required_steps + 1` means every fragment was
    /// entered and only `done` is missing.
    #[serde(default)]
    pub multistep_cursor: BTreeMap<usize, usize>,
}

impl Progress {
    #[must_use]
    pub fn new(course_name: impl Into<String>, lesson_name: impl Into<String>) -> Self {
        Self {
            course_name: course_name.into(),
            lesson_name: lesson_name.into(),
            current_question: 1,
            completed: false,
            correct_answers: 0,
            attempts: 0,
            multistep_cursor: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(&self.course_name, &self.lesson_name)
    }

    /// Clears position and score, keeping the names.
    pub fn reset(&mut self) {
        *self = Self::new(
            std::mem::take(&mut self.course_name),
            std::mem::take(&mut self.lesson_name),
        );
    }

    /// Moves to the next question, dropping per-question state.
    pub fn advance(&mut self) {
        self.multistep_cursor.remove(&self.current_question);
        self.current_question += 1;
        self.attempts = 0;
    }

    /// Step the learner is on for the current question, if it is multi-step.
    #[must_use]
    pub fn current_step(&self) -> Option<usize> {
        self.multistep_cursor.get(&self.current_question).copied()
    }

    /// Whether this record can describe a position in `lesson`.
    #[must_use]
    pub fn is_consistent_with(&self, lesson: &Lesson) -> bool {
        let end = lesson.len() + 1;
        let scored = u32::try_from(lesson.scored_count()).unwrap_or(u32::MAX);
        let position_ok = (1..=end).contains(&self.current_question)
            && (!self.completed || self.current_question == end);
        let cursor_ok = self.multistep_cursor.iter().all(|(index, step)| {
            index
                .checked_sub(1)
                .and_then(|i| lesson.question(i))
                .and_then(|q| q.as_multi_step())
                .is_some_and(|multi| (1..=multi.required_steps() + 1).contains(step))
        });
        position_ok && self.correct_answers <= scored && cursor_ok
    }
}
