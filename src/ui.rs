use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};

use crate::api::Usage;
use crate::app::{App, AuthState, GeneralSetting, InputMode, LimitsView, SettingsTab};
use crate::render;
use crate::transcript::{Entry, Message, Role};

const BANNER: &str = " neubot can tell you the time, date and weather, and search the web. ";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let banner_height = if app.preferences().banner_dismissed { 0 } else { 1 };

    // Main layout: header, banner, chat, input, footer
    let [header_area, banner_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(banner_height),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    if banner_height > 0 {
        render_banner(frame, banner_area);
    }
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Popups
    if app.show_welcome {
        render_welcome(frame, area);
    } else if app.show_settings {
        render_settings(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let auth = match &app.auth {
        AuthState::Unknown => Span::styled(" … ", Style::default().fg(Color::Gray)),
        AuthState::Unreachable(reason) => Span::styled(format!(" {} ", reason), Style::default().fg(Color::Red)),
        AuthState::Anonymous => Span::styled(" guest ", Style::default().fg(Color::Gray)),
        AuthState::SignedIn(user) => Span::styled(format!(" {} ", user.name), Style::default().fg(Color::Green)),
    };

    let title = Line::from(vec![
        Span::styled(" neubot ", Style::default().fg(Color::Cyan).bold()),
        auth,
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_banner(frame: &mut Frame, area: Rect) {
    let banner = Line::from(vec![
        Span::styled(BANNER, Style::default().fg(Color::Black).bg(Color::Cyan)),
        Span::styled(" b ", Style::default().bg(Color::DarkGray).fg(Color::White)),
        Span::styled(" dismiss ", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(banner), area);
}

fn role_header(label: &'static str, color: Color) -> Line<'static> {
    Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn push_assistant_lines(app: &App, message: &Message, lines: &mut Vec<Line<'static>>) {
    let selected = app.selected == Some(message.id);
    let open = app.transcript.is_open(message.id);

    let mut header = vec![Span::styled(
        if selected { "▶ neubot" } else { "neubot" },
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )];
    header.push(Span::styled(
        format!("  Completed {} steps ", message.steps.len()),
        Style::default().fg(Color::DarkGray),
    ));
    header.push(Span::styled(
        if open { "Hide details" } else { "See details" },
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::UNDERLINED),
    ));
    let mut header = Line::from(header);
    if selected {
        header = header.style(Style::default().bg(Color::Rgb(40, 40, 40)));
    }
    lines.push(header);

    lines.extend(message.display.iter().cloned());

    if open {
        let steps = render::render_steps(&message.steps);
        if steps.is_empty() {
            lines.push(Line::from(Span::styled(
                "  No steps recorded",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        } else {
            lines.extend(steps);
        }
    }
}

/// Build the transcript as display lines. Also returns the index of the
/// selected message's header line.
pub fn build_chat_lines(app: &App) -> (Vec<Line<'static>>, Option<usize>) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut selected_line = None;

    for entry in app.transcript.entries() {
        match entry {
            Entry::Message(message) => match message.role {
                Role::User => {
                    let sending = message
                        .turn
                        .is_some_and(|turn| app.transcript.typing(turn).is_some());
                    let mut header = role_header("You", Color::Cyan);
                    if sending {
                        header.spans.push(Span::styled(
                            "  sending",
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                    lines.push(header);
                    lines.extend(message.display.iter().cloned());
                }
                Role::Assistant => {
                    if app.selected == Some(message.id) {
                        selected_line = Some(lines.len());
                    }
                    push_assistant_lines(app, message, &mut lines);
                }
            },
            Entry::Typing(indicator) => {
                lines.push(role_header("neubot", Color::Yellow));
                lines.push(Line::from(Span::styled(
                    format!("Processing{}", ".".repeat(indicator.dots())),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
        }
        lines.push(Line::default());
    }

    (lines, selected_line)
}

/// Rows a line occupies once wrapped to `width`.
fn wrapped_height(line: &Line<'_>, width: u16) -> u16 {
    let width = width.max(1) as usize;
    let chars = line.width();
    if chars == 0 {
        1
    } else {
        chars.div_ceil(width) as u16
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let focused = app.input_mode == InputMode::Normal;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(" Chat ");

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);

    let (lines, selected_line) = build_chat_lines(app);

    let heights: Vec<u16> = lines.iter().map(|l| wrapped_height(l, inner_width)).collect();
    let total: u16 = heights.iter().fold(0u16, |acc, h| acc.saturating_add(*h));
    let max_scroll = total.saturating_sub(inner_height);

    if app.scroll_to_selected {
        app.scroll_to_selected = false;
        if let Some(index) = selected_line {
            let offset: u16 = heights[..index].iter().fold(0u16, |acc, h| acc.saturating_add(*h));
            if offset < app.chat_scroll {
                app.chat_scroll = offset;
                app.follow_bottom = false;
            } else if offset >= app.chat_scroll.saturating_add(inner_height) {
                app.chat_scroll = offset.saturating_sub(inner_height / 2);
                app.follow_bottom = false;
            }
        }
    }

    if app.follow_bottom {
        app.chat_scroll = max_scroll;
    } else if app.chat_scroll >= max_scroll {
        app.chat_scroll = max_scroll;
        app.follow_bottom = true;
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Ask neubot ");
    if app.send_label_visible() {
        block = block.title(
            Line::from(Span::styled(" Send ⏎ ", Style::default().fg(Color::Black).bg(Color::Cyan)))
                .alignment(Alignment::Right),
        );
    }

    // Scroll horizontally so the cursor stays inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let offset = input_scroll_offset(app.input_cursor, inner_width);
    let visible: String = app.input.chars().skip(offset).take(inner_width).collect();

    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::White))
        .block(block);
    frame.render_widget(input, area);

    if editing && !app.show_welcome && !app.show_settings && inner_width > 0 {
        let cursor_x = (app.input_cursor - offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// First visible input character for a cursor at `cursor` (in chars).
fn input_scroll_offset(cursor: usize, inner_width: usize) -> usize {
    if inner_width == 0 || cursor < inner_width {
        0
    } else {
        cursor - inner_width + 1
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " CHAT ",
        InputMode::Editing => " ASK ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[(" Enter ", " send "), (" Esc ", " chat "), (" PgUp/PgDn ", " scroll ")],
        InputMode::Normal => &[
            (" j/k ", " select "),
            (" Enter ", " details "),
            (" i ", " ask "),
            (" s ", " settings "),
            (" q ", " quit "),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in pairs {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn render_welcome(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(area, 60, 14);
    frame.render_widget(Clear, popup);

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow).bold());
    let text = Text::from(vec![
        Line::from(Span::styled("Welcome to neubot", Style::default().fg(Color::Cyan).bold())),
        Line::default(),
        Line::from("Ask about the time, date, weather, or anything to search the web."),
        Line::default(),
        Line::from(vec![key("Enter"), Span::raw("  send your question")]),
        Line::from(vec![key("Esc"), Span::raw("    browse the chat, then "), key("j/k"), Span::raw(" to select")]),
        Line::from(vec![key("Enter"), Span::raw("  show how neubot worked out an answer")]),
        Line::from(vec![key("s"), Span::raw("      settings and usage limits")]),
        Line::default(),
        Line::from(Span::styled("Press any key to start", Style::default().fg(Color::DarkGray))),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), popup);
}

fn render_settings(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(area, 64, 18);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Settings ")
        .title_bottom(Line::from(" Tab switch · Esc close ").alignment(Alignment::Right));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let tips_height = if app.show_settings_tips { 2 } else { 0 };
    let [tabs_area, tips_area, body_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(tips_height),
        Constraint::Min(0),
    ])
    .areas(inner);

    let titles: Vec<&str> = SettingsTab::all().iter().map(|t| t.title()).collect();
    let selected = SettingsTab::all().iter().position(|t| *t == app.settings_tab).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, tabs_area);

    if tips_height > 0 {
        let tip = Paragraph::new(Span::styled(
            "Tip: toggles are saved immediately. Usage refreshes every minute while this is open.",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
        .wrap(Wrap { trim: true });
        frame.render_widget(tip, tips_area);
    }

    match app.settings_tab {
        SettingsTab::General => render_general_tab(app, frame, body_area),
        SettingsTab::Usage => render_usage_tab(app, frame, body_area),
        SettingsTab::Account => render_account_tab(app, frame, body_area),
    }
}

fn render_general_tab(app: &App, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = GeneralSetting::all()
        .iter()
        .map(|setting| {
            let mark = if setting.is_on(app.preferences()) { "[x]" } else { "[ ]" };
            ListItem::new(format!("{} {}", mark, setting.label()))
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.settings_selected));

    let list = List::new(items)
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_usage_tab(app: &App, frame: &mut Frame, area: Rect) {
    let limits = match &app.limits {
        LimitsView::NotLoaded | LimitsView::Loading => {
            frame.render_widget(Paragraph::new("Loading usage limits…").fg(Color::DarkGray), area);
            return;
        }
        LimitsView::Failed(reason) => {
            let text = format!("Could not load usage limits ({}). Press r to retry.", reason);
            frame.render_widget(Paragraph::new(text).fg(Color::Red).wrap(Wrap { trim: true }), area);
            return;
        }
        LimitsView::Loaded(limits) => limits,
    };

    let rows = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .split(area);

    let buckets = [
        ("Web search", &limits.search, Color::Cyan),
        ("Weather", &limits.weather, Color::Yellow),
        ("All queries", &limits.total, Color::Magenta),
    ];
    for (i, (label, usage, color)) in buckets.into_iter().enumerate() {
        render_usage_gauge(frame, rows[i], label, usage, color);
    }

    let reset = format!("Limits reset in {} days", limits.reset.days_remaining.max(0));
    frame.render_widget(Paragraph::new(reset).fg(Color::DarkGray), rows[3]);
}

fn render_usage_gauge(frame: &mut Frame, area: Rect, label: &str, usage: &Usage, color: Color) {
    let gauge = Gauge::default()
        .block(Block::default().title(format!(
            " {} · {} / {} used · {} remaining ",
            label,
            usage.used,
            usage.limit,
            usage.remaining.max(0)
        )))
        .gauge_style(Style::default().fg(color).bg(Color::Black))
        .percent(usage.percent());
    frame.render_widget(gauge, area);
}

fn render_account_tab(app: &App, frame: &mut Frame, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let lines = match &app.auth {
        AuthState::Unknown => vec![Line::from(Span::styled("Checking account…", label))],
        AuthState::Unreachable(reason) => vec![
            Line::from(Span::styled(format!("Account service unavailable ({})", reason), Style::default().fg(Color::Red))),
            Line::from(Span::styled("Press r to retry", label)),
        ],
        AuthState::Anonymous => vec![
            Line::from("Not signed in"),
            Line::from(Span::styled("Sign in through the web app to sync your usage.", label)),
        ],
        AuthState::SignedIn(user) => {
            let mut lines = vec![Line::from(vec![
                Span::styled("Name      ", label),
                Span::styled(user.name.clone(), Style::default().bold()),
            ])];
            if let Some(email) = &user.email {
                lines.push(Line::from(vec![Span::styled("Email     ", label), Span::raw(email.clone())]));
            }
            if let Some(picture) = &user.profile_pic {
                lines.push(Line::from(vec![Span::styled("Avatar    ", label), Span::raw(picture.clone())]));
            }
            if let Some(provider) = &user.provider {
                lines.push(Line::from(vec![Span::styled("Signed in ", label), Span::raw(format!("with {}", provider))]));
            }
            lines
        }
    };
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
}
