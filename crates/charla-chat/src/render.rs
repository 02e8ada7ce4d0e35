//! Turns a dialogue reply into lines a console can print.

use std::fmt;

use charla_core::types::{DialogueReply, OutputItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayLine {
    /// Plain assistant text.
    Message(String),
    /// Heading of a suggestion list.
    Title(String),
    /// One suggestion label.
    Choice(String),
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayLine::Message(text) => f.write_str(text),
            DisplayLine::Title(title) => f.write_str(title),
            DisplayLine::Choice(label) => write!(f, "- {}", label),
        }
    }
}

/// Walk the reply items in order. Unsupported items produce nothing.
pub fn render(reply: &DialogueReply) -> Vec<DisplayLine> {
    let mut lines = Vec::new();
    for item in reply.items() {
        match item {
            OutputItem::Text { text } => lines.push(DisplayLine::Message(text.clone())),
            OutputItem::Suggestion { title, suggestions } => {
                lines.push(DisplayLine::Title(title.clone()));
                lines.extend(
                    suggestions
                        .iter()
                        .map(|option| DisplayLine::Choice(option.label.clone())),
                );
            }
            OutputItem::Unsupported => {}
        }
    }
    lines
}

pub fn render_lines(reply: &DialogueReply) -> Vec<String> {
    render(reply).iter().map(ToString::to_string).collect()
}
