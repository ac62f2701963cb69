#![forbid(unsafe_code)]

pub mod catalog;
pub mod console;
pub mod error;
pub mod progress_store;
pub mod sessions;

pub use catalog::{StaticCourses, builtin_courses};
pub use console::{LineIo, ScriptedIo, drive};
pub use error::{BootstrapError, ProgressStoreError};
pub use progress_store::ProgressStore;

pub use sessions::{EngineConfig, LessonStatus, Session, SessionState, Transition, TutorEngine};
