use std::fmt;

use tutor_core::model::{Lesson, Progress};

/// Summary of a lesson's saved progress, shown in the lesson menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonStatus {
    NotStarted,
    InProgress { question: usize, total: usize },
    Complete { correct: u32, scored: usize },
}

impl LessonStatus {
    /// Records that do not fit the lesson count as not started, matching how
    /// the engine treats them on entry.
    #[must_use]
    pub fn from_progress(progress: &Progress, lesson: &Lesson) -> Self {
        if !progress.is_consistent_with(lesson) {
            return Self::NotStarted;
        }
        if progress.completed {
            return Self::Complete {
                correct: progress.correct_answers,
                scored: lesson.scored_count(),
            };
        }
        if progress.current_question == 1
            && progress.attempts == 0
            && progress.multistep_cursor.is_empty()
        {
            return Self::NotStarted;
        }
        Self::InProgress {
            question: progress.current_question,
            total: lesson.len(),
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::InProgress { question, total } => {
                write!(f, "in progress, question {question} of {total}")
            }
            Self::Complete { correct, scored } => write!(f, "complete, {correct}/{scored} correct"),
        }
    }
}
