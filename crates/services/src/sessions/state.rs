use serde::{Deserialize, Serialize};
use tutor_core::eval::EvalContext;
use tutor_core::model::Progress;

/// Where the session is waiting for input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    MenuCourse,
    MenuLesson,
    /// `lesson` is the 0-based index of the completed lesson.
    AwaitingRestartConfirm { lesson: usize },
    AwaitingResetAllConfirm,
    /// Transient while a question is being shown.
    Displaying,
    /// `attempt` is the 1-based number of the next submission.
    AwaitingAnswer { attempt: u32 },
    /// `step` is 1-based; `step > required_steps` means only `done` is left.
    MultiStep { step: usize, fragments: Vec<String> },
    Complete,
    /// The learner left; further input is ignored.
    Ended,
}

#[derive(Debug, Clone)]
pub(crate) struct ActiveLesson {
    pub(crate) lesson: usize,
    pub(crate) progress: Progress,
}

/// Fragments of a multi-step question the learner left for the menu.
#[derive(Debug, Clone)]
pub(crate) struct ParkedSteps {
    pub(crate) course: usize,
    pub(crate) lesson: usize,
    pub(crate) question: usize,
    pub(crate) fragments: Vec<String>,
}

impl ParkedSteps {
    /// Whether these fragments lead up to `step` of that question.
    pub(crate) fn resumes(&self, course: usize, lesson: usize, question: usize, step: usize) -> bool {
        self.course == course
            && self.lesson == lesson
            && self.question == question
            && self.fragments.len() + 1 == step
    }
}

/// State of one learner session, owned by the caller and threaded through
/// [`TutorEngine::handle`](super::TutorEngine::handle).
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) state: SessionState,
    pub(crate) course: Option<usize>,
    pub(crate) active: Option<ActiveLesson>,
    pub(crate) context: EvalContext,
    pub(crate) parked: Option<ParkedSteps>,
}

impl Session {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::MenuCourse,
            course: None,
            active: None,
            context: EvalContext::new(),
            parked: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// 0-based index of the selected course.
    #[must_use]
    pub fn course_index(&self) -> Option<usize> {
        self.course
    }

    /// 0-based index of the lesson being worked on.
    #[must_use]
    pub fn lesson_index(&self) -> Option<usize> {
        self.active.as_ref().map(|active| active.lesson)
    }

    /// In-memory progress of the lesson being worked on.
    #[must_use]
    pub fn progress(&self) -> Option<&Progress> {
        self.active.as_ref().map(|active| &active.progress)
    }

    /// Bindings created so far in this session.
    #[must_use]
    pub fn context(&self) -> &EvalContext {
        &self.context
    }
}

/// Result of feeding one line to the engine.
#[derive(Debug, Clone)]
pub struct Transition {
    pub session: Session,
    pub output: Vec<String>,
}

impl Transition {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.session.state == SessionState::Ended
    }
}
