use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// How the raw text of a [`DisplayText`] should be interpreted by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Markdown,
}

/// External rendering capability. The engine treats the rendered string as
/// opaque.
pub trait Renderer {
    fn render(&self, text: &str, format: TextFormat) -> String;
}

/// Renderer that returns text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn render(&self, text: &str, _format: TextFormat) -> String {
        text.to_owned()
    }
}

type Thunk = Arc<dyn Fn() -> String + Send + Sync>;

/// Text shown to the learner: plain, markdown, or produced on demand.
#[derive(Clone)]
pub enum DisplayText {
    Plain(String),
    Markdown(String),
    /// Markdown produced by a thunk each time the text is displayed.
    Deferred(Thunk),
}

impl DisplayText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Markdown(text.into())
    }

    pub fn deferred(thunk: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self::Deferred(Arc::new(thunk))
    }

    /// Unrendered text, evaluating the thunk if needed.
    #[must_use]
    pub fn raw(&self) -> Cow<'_, str> {
        match self {
            Self::Plain(text) | Self::Markdown(text) => Cow::Borrowed(text),
            Self::Deferred(thunk) => Cow::Owned(thunk()),
        }
    }

    #[must_use]
    pub fn format(&self) -> TextFormat {
        match self {
            Self::Plain(_) => TextFormat::Plain,
            Self::Markdown(_) | Self::Deferred(_) => TextFormat::Markdown,
        }
    }

    #[must_use]
    pub fn render(&self, renderer: &dyn Renderer) -> String {
        renderer.render(&self.raw(), self.format())
    }
}

impl From<&str> for DisplayText {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_owned())
    }
}

impl From<String> for DisplayText {
    fn from(text: String) -> Self {
        Self::Plain(text)
    }
}

impl fmt::Debug for DisplayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(text) => f.debug_tuple("Plain").field(text).finish(),
            Self::Markdown(text) => f.debug_tuple("Markdown").field(text).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}
