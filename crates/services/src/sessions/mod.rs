//! Interactive lesson session: menus, question sequencing, attempts, and
//! persistence.

mod command;
mod engine;
mod progress;
mod state;
mod view;

pub use command::{AnswerCommand, CourseMenuCommand, LessonMenuCommand, is_yes};
pub use engine::{DEFAULT_MAX_ATTEMPTS, EngineConfig, TutorEngine};
pub use progress::LessonStatus;
pub use state::{Session, SessionState, Transition};
