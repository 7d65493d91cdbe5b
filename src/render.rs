//! Renderers for each classified response kind.

use ratatui::{
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
};

use crate::markup;
use crate::payload::{self, Classified, DeviceOutcome, DeviceStatus, ResponsePayload, SearchResults};
use crate::transcript::Step;

/// Display form of a message: styled terminal lines.
pub type Fragment = Vec<Line<'static>>;

pub const FAILURE_MESSAGE: &str = "Sorry, something went wrong.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    On,
    Off,
    Error,
}

impl DeviceState {
    pub fn derive(outcome: &DeviceOutcome, action: &str) -> Self {
        if !outcome.success {
            return DeviceState::Error;
        }
        match action.to_ascii_lowercase().as_str() {
            "turn_off" | "off" | "switch_off" => DeviceState::Off,
            _ => DeviceState::On,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceState::On => "on",
            DeviceState::Off => "off",
            DeviceState::Error => "error",
        }
    }

    fn style(&self) -> Style {
        match self {
            DeviceState::On => Style::default().fg(Color::Green).bold(),
            DeviceState::Off => Style::default().fg(Color::DarkGray).bold(),
            DeviceState::Error => Style::default().fg(Color::Red).bold(),
        }
    }
}

/// Classify and render a raw backend response.
pub fn render_response(raw: &str) -> Fragment {
    render_classified(&payload::classify(raw))
}

pub fn render_classified(classified: &Classified) -> Fragment {
    let mut lines = Vec::new();
    if let Some(residual) = &classified.residual {
        lines.extend(render_text(residual));
    }
    lines.extend(render_payload(&classified.payload));
    lines
}

pub fn render_payload(payload: &ResponsePayload) -> Fragment {
    match payload {
        ResponsePayload::PlainText(text) => render_text(text),
        ResponsePayload::SearchResults(search) => render_search(search),
        ResponsePayload::DeviceStatus(status) => render_devices(status),
        ResponsePayload::Error(message) => render_error(message),
    }
}

pub fn render_text(text: &str) -> Fragment {
    markup::to_lines(text, Style::default())
}

/// A user's query exactly as typed.
pub fn render_user_text(text: &str) -> Fragment {
    text.split('\n').map(|line| Line::from(line.to_string())).collect()
}

/// The backend's highlighted rendition of a user query.
pub fn render_highlighted_query(html: &str) -> Fragment {
    markup::to_lines(html, Style::default())
}

fn render_search(search: &SearchResults) -> Fragment {
    let mut lines = vec![Line::from(Span::styled(
        search.header.clone(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))];

    if let Some(suggestion) = &search.spellcheck {
        lines.push(Line::from(vec![
            Span::raw("Did you mean: "),
            Span::styled(suggestion.clone(), Style::default().add_modifier(Modifier::ITALIC)),
            Span::raw("?"),
        ]));
    }

    for hit in &search.results {
        lines.push(Line::default());

        let mut title = Vec::new();
        if hit.favicon.is_some() {
            title.push(Span::styled("◆ ", Style::default().fg(Color::DarkGray)));
        }
        title.push(Span::styled(
            hit.title.clone(),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        ));
        lines.push(Line::from(title));
        lines.push(Line::from(Span::styled(hit.url.clone(), Style::default().fg(Color::Green))));
        lines.extend(markup::to_lines(&hit.description, Style::default()));
    }

    lines
}

fn render_devices(status: &DeviceStatus) -> Fragment {
    let mut lines = vec![Line::from(vec![
        Span::styled(status.domain.clone(), Style::default().fg(Color::Cyan).bold()),
        Span::styled(" · ", Style::default().fg(Color::DarkGray)),
        Span::raw(status.action.replace('_', " ")),
    ])];

    for device in &status.devices {
        let state = DeviceState::derive(device, &status.action);
        let mut spans = vec![
            Span::raw("  "),
            Span::raw(device.name.clone()),
            Span::raw("  "),
            Span::styled(state.label(), state.style()),
        ];

        if !device.attributes.is_empty() {
            let chip_style = Style::default().fg(Color::Black).bg(Color::Gray);
            if let Some(color) = &device.attributes.color {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(format!("[color: {}]", color), chip_style));
            }
            if let Some(brightness) = device.attributes.brightness {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(format!("[brightness: {}%]", brightness), chip_style));
            }
        }
        lines.push(Line::from(spans));
    }

    lines
}

fn render_error(message: &str) -> Fragment {
    let mut lines = vec![Line::from(Span::styled(
        "Error",
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))];
    lines.extend(markup::to_lines(message, Style::default().fg(Color::Red)));
    lines
}

/// Numbered reasoning steps for an open disclosure panel.
pub fn render_steps(steps: &[Step]) -> Fragment {
    let mut lines = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("  {}. ", i + 1), Style::default().fg(Color::DarkGray)),
            Span::raw(step.description.clone()),
        ]));
        if let Some(result) = &step.result {
            lines.push(Line::from(Span::styled(
                format!("     → {}", result),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::plain_text;
    use crate::payload::{AppliedAttributes, SearchHit};

    fn device(name: &str, success: bool) -> DeviceOutcome {
        DeviceOutcome {
            name: name.to_string(),
            success,
            attributes: AppliedAttributes::default(),
        }
    }

    #[test]
    fn test_empty_search_results_render_header_only() {
        let lines = render_response(r#"{"type":"search_results","meta":{"header":"H"},"results":[]}"#);
        assert_eq!(plain_text(&lines), "H");
    }

    #[test]
    fn test_search_cards() {
        let search = SearchResults {
            header: "Here's what I found on the web for \"ratatui\"".to_string(),
            spellcheck: Some("ratatui".to_string()),
            results: vec![SearchHit {
                title: "Ratatui".to_string(),
                url: "https://ratatui.rs".to_string(),
                description: "A <strong>Rust</strong> library".to_string(),
                favicon: Some("https://ratatui.rs/favicon.ico".to_string()),
            }],
        };
        let text = plain_text(&render_payload(&ResponsePayload::SearchResults(search)));
        assert_eq!(
            text,
            "Here's what I found on the web for \"ratatui\"\nDid you mean: ratatui?\n\n◆ Ratatui\nhttps://ratatui.rs\nA Rust library"
        );
    }

    #[test]
    fn test_error_card() {
        let lines = render_payload(&ResponsePayload::Error("Search failed".to_string()));
        assert_eq!(plain_text(&lines), "Error\nSearch failed");
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn test_device_state_derivation() {
        assert_eq!(DeviceState::derive(&device("a", true), "turn_on"), DeviceState::On);
        assert_eq!(DeviceState::derive(&device("a", true), "turn_off"), DeviceState::Off);
        assert_eq!(DeviceState::derive(&device("a", true), "toggle"), DeviceState::On);
        assert_eq!(DeviceState::derive(&device("a", false), "turn_off"), DeviceState::Error);
    }

    #[test]
    fn test_device_status_lines_with_chips() {
        let status = DeviceStatus {
            domain: "light".to_string(),
            action: "turn_on".to_string(),
            devices: vec![
                DeviceOutcome {
                    name: "Kitchen".to_string(),
                    success: true,
                    attributes: AppliedAttributes {
                        color: Some("red".to_string()),
                        brightness: Some(40),
                    },
                },
                device("Porch", false),
            ],
        };
        let text = plain_text(&render_payload(&ResponsePayload::DeviceStatus(status)));
        assert_eq!(
            text,
            "light · turn on\n  Kitchen  on [color: red] [brightness: 40%]\n  Porch  error"
        );
    }

    #[test]
    fn test_residual_renders_before_payload() {
        let raw = r#"Done. {"type":"device_status","domain":"switch","action":"turn_off","devices":[{"name":"Fan","success":true}]}"#;
        let text = plain_text(&render_response(raw));
        assert_eq!(text, "Done.\nswitch · turn off\n  Fan  off");
    }

    #[test]
    fn test_steps_skip_missing_results() {
        let steps = vec![
            Step {
                description: "Found query indicator 'what'".to_string(),
                result: Some("question_query".to_string()),
            },
            Step {
                description: "Identified tools".to_string(),
                result: None,
            },
        ];
        let text = plain_text(&render_steps(&steps));
        assert_eq!(
            text,
            "  1. Found query indicator 'what'\n     → question_query\n  2. Identified tools"
        );
    }

    #[test]
    fn test_user_text_is_literal() {
        let lines = render_user_text("<b>not bold</b>");
        assert_eq!(plain_text(&lines), "<b>not bold</b>");
    }
}
