mod course;
mod progress;
mod question;

pub use course::{Course, CourseError, CourseProvider, Lesson};
pub use progress::{Progress, ProgressKey, slugify};
pub use question::{MultiStep, Question, QuestionError, QuestionKind, TextAnswer};
