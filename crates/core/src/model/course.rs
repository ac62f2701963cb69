use thiserror::Error;

use crate::model::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("lesson `{0}` has no questions")]
    NoQuestions(String),

    #[error("course `{0}` has no lessons")]
    NoLessons(String),
}

/// An ordered list of questions taught in one sitting.
#[derive(Debug, Clone)]
pub struct Lesson {
    name: String,
    title: Option<String>,
    description: Option<String>,
    questions: Vec<Question>,
}

impl Lesson {
    /// # Errors
    ///
    /// Returns `CourseError` if the name is blank or there are no questions.
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Result<Self, CourseError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(CourseError::EmptyName);
        }
        if questions.is_empty() {
            return Err(CourseError::NoQuestions(name));
        }
        Ok(Self {
            name,
            title: None,
            description: None,
            questions,
        })
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display title, falling back to the name.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Number of questions that count toward the score.
    #[must_use]
    pub fn scored_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_scored()).count()
    }
}

/// A named collection of lessons.
#[derive(Debug, Clone)]
pub struct Course {
    name: String,
    description: Option<String>,
    lessons: Vec<Lesson>,
}

impl Course {
    /// # Errors
    ///
    /// Returns `CourseError` if the name is blank or there are no lessons.
    pub fn new(name: impl Into<String>, lessons: Vec<Lesson>) -> Result<Self, CourseError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(CourseError::EmptyName);
        }
        if lessons.is_empty() {
            return Err(CourseError::NoLessons(name));
        }
        Ok(Self {
            name,
            description: None,
            lessons,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn lesson(&self, index: usize) -> Option<&Lesson> {
        self.lessons.get(index)
    }
}

/// Source of the courses offered in the course menu.
pub trait CourseProvider: Send + Sync {
    fn list_courses(&self) -> Vec<Course>;
}
