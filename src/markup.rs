//! Backend text to styled terminal lines.
//!
//! Assistant text and highlighted queries may carry a small HTML subset. Only
//! that subset is honoured; every other tag is stripped and its text kept, so
//! backend-controlled markup never reaches the terminal as anything but text.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use scraper::{ElementRef, Html};

/// Style for a highlight class emitted by the backend's query highlighter.
fn class_style(class: &str) -> Option<Style> {
    match class {
        "query-indicator" => Some(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        "tool-reference" => Some(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        "attribute" => Some(Style::default().fg(Color::Yellow)),
        _ => None,
    }
}

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str, base: Style) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut current_text), base));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(bold_text, base.add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::styled(current_text, base));
    }

    Line::from(spans)
}

struct LineBuilder {
    base: Style,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
}

impl LineBuilder {
    fn push_text(&mut self, text: &str, style: Style) {
        let mut parts = text.split('\n').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                self.current.push(Span::styled(part.to_string(), self.base.patch(style)));
            }
            if parts.peek().is_some() {
                self.break_line();
            }
        }
    }

    fn break_line(&mut self) {
        self.lines.push(Line::from(std::mem::take(&mut self.current)));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if !self.current.is_empty() || self.lines.is_empty() {
            self.break_line();
        }
        self.lines
    }
}

const SKIPPED_TAGS: &[&str] = &["script", "style"];
const BLOCK_TAGS: &[&str] = &["p", "div", "li"];

fn element_style(element: ElementRef<'_>, parent: Style) -> Style {
    let value = element.value();
    match value.name() {
        "b" | "strong" => parent.add_modifier(Modifier::BOLD),
        "em" | "i" => parent.add_modifier(Modifier::ITALIC),
        "span" => value
            .classes()
            .find_map(class_style)
            .map(|s| parent.patch(s))
            .unwrap_or(parent),
        _ => parent,
    }
}

/// Walk the parsed fragment, emitting text nodes with the style of their
/// enclosing elements. Attributes never become text.
fn walk(element: ElementRef<'_>, style: Style, builder: &mut LineBuilder) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            builder.push_text(text, style);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };

        let name = child.value().name();
        if SKIPPED_TAGS.contains(&name) {
            continue;
        }
        if name == "br" {
            builder.break_line();
            continue;
        }

        walk(child, element_style(child, style), builder);
        if BLOCK_TAGS.contains(&name) {
            builder.break_line();
        }
    }
}

/// Convert backend text into styled lines, honouring the highlight spans and
/// basic emphasis tags. Text without any tags gets `**bold**` handling instead.
pub fn to_lines(text: &str, base: Style) -> Vec<Line<'static>> {
    let fragment = Html::parse_fragment(text);
    let root = fragment.root_element();

    if !root.children().any(|child| child.value().is_element()) {
        let decoded: String = root.text().collect();
        return decoded
            .split('\n')
            .map(|line| parse_markdown_line(line, base))
            .collect();
    }

    let mut builder = LineBuilder {
        base,
        lines: Vec::new(),
        current: Vec::new(),
    };
    walk(root, Style::default(), &mut builder);
    builder.finish()
}

/// Flatten styled lines back to plain text.
pub fn plain_text(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
