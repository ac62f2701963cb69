use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use tutor_core::text::{Renderer, TextFormat};

const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const CODE: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Renders markdown for a terminal, with ANSI styling when `ansi` is set.
#[derive(Debug, Clone, Copy)]
pub struct TerminalRenderer {
    ansi: bool,
}

impl TerminalRenderer {
    #[must_use]
    pub fn new(ansi: bool) -> Self {
        Self { ansi }
    }

    fn style(&self, out: &mut String, code: &str) {
        if self.ansi {
            out.push_str(code);
        }
    }

    fn render_markdown(&self, input: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let mut out = String::new();
        let mut lists: Vec<Option<u64>> = Vec::new();
        let mut link: Option<String> = None;
        let mut in_code_block = false;

        for event in Parser::new_ext(input, options) {
            match event {
                Event::End(TagEnd::Paragraph | TagEnd::Heading(_)) => out.push_str("\n\n"),
                Event::Start(Tag::Strong) => self.style(&mut out, BOLD),
                Event::Start(Tag::Emphasis) => self.style(&mut out, ITALIC),
                Event::End(TagEnd::Strong | TagEnd::Emphasis) => self.style(&mut out, RESET),
                Event::Code(code) => {
                    if self.ansi {
                        out.push_str(CODE);
                        out.push_str(&code);
                        out.push_str(RESET);
                    } else {
                        out.push('`');
                        out.push_str(&code);
                        out.push('`');
                    }
                }
                Event::Start(Tag::CodeBlock(_)) => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    in_code_block = true;
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    out.push('\n');
                }
                Event::Start(Tag::List(start)) => lists.push(start),
                Event::End(TagEnd::List(_)) => {
                    lists.pop();
                    if lists.is_empty() {
                        out.push('\n');
                    }
                }
                Event::Start(Tag::Item) => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(&"  ".repeat(lists.len().saturating_sub(1)));
                    match lists.last_mut() {
                        Some(Some(n)) => {
                            out.push_str(&format!("{n}. "));
                            *n += 1;
                        }
                        _ => out.push_str("- "),
                    }
                }
                Event::End(TagEnd::Item) => {
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                Event::Start(Tag::Link { dest_url, .. }) => link = Some(dest_url.to_string()),
                Event::End(TagEnd::Link) => {
                    if let Some(url) = link.take() {
                        out.push_str(&format!(" ({url})"));
                    }
                }
                Event::Text(text) if in_code_block => {
                    for line in text.lines() {
                        out.push_str("    ");
                        out.push_str(line);
                        out.push('\n');
                    }
                }
                Event::Text(text) => out.push_str(&text),
                Event::SoftBreak => out.push(' '),
                Event::HardBreak => out.push('\n'),
                Event::Rule => out.push_str("----\n\n"),
                _ => {}
            }
        }

        out.trim_end().to_owned()
    }
}

impl Renderer for TerminalRenderer {
    fn render(&self, text: &str, format: TextFormat) -> String {
        match format {
            TextFormat::Plain => text.to_owned(),
            TextFormat::Markdown => self.render_markdown(text),
        }
    }
}
