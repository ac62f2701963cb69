/// What the learner typed at an answer prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerCommand<'a> {
    Hint,
    Skip,
    Menu,
    Exit,
    /// Only recognised inside a multi-step question.
    Done,
    Answer(&'a str),
}

impl<'a> AnswerCommand<'a> {
    /// Commands are matched case-insensitively on the trimmed input;
    /// anything else is an answer.
    #[must_use]
    pub fn parse(input: &'a str, multi_step: bool) -> Self {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "hint" | "help" | "?" => Self::Hint,
            "skip" => Self::Skip,
            "menu" | "back" => Self::Menu,
            "exit" | "quit" | "bye" => Self::Exit,
            "done" if multi_step => Self::Done,
            _ => Self::Answer(trimmed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonMenuCommand {
    /// 1-based lesson number.
    Select(usize),
    Back,
    Reset(usize),
    ResetAll,
    Invalid,
}

impl LessonMenuCommand {
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let lowered = input.trim().to_ascii_lowercase();
        let mut words = lowered.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("reset"), Some("all"), None) => Self::ResetAll,
            (Some("reset"), Some(n), None) => match n.parse::<usize>() {
                Ok(n) if n > 0 => Self::Reset(n),
                _ => Self::Invalid,
            },
            (Some(n), None, None) => match n.parse::<i64>() {
                Ok(0) => Self::Back,
                Ok(n) => usize::try_from(n).map_or(Self::Invalid, Self::Select),
                Err(_) => Self::Invalid,
            },
            _ => Self::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseMenuCommand {
    /// 1-based course number.
    Select(usize),
    Exit,
    Invalid,
}

impl CourseMenuCommand {
    #[must_use]
    pub fn parse(input: &str) -> Self {
        match input.trim().parse::<i64>() {
            Ok(0 | -1) => Self::Exit,
            Ok(n) => usize::try_from(n).map_or(Self::Invalid, Self::Select),
            Err(_) => Self::Invalid,
        }
    }
}

/// Confirmation prompts accept `yes`/`y`; anything else is "no".
#[must_use]
pub fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "yes" | "y")
}
