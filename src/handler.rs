use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputMode, SettingsTab};
use crate::tui::AppEvent;

const PAGE_LINES: u16 = 10;
const WHEEL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::QueryFinished { turn, result } => app.finish_turn(turn, result),
        AppEvent::LimitsLoaded(result) => app.on_limits(result),
        AppEvent::UserLoaded(result) => app.on_user(result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Popups take every key while open
    if app.show_welcome {
        app.dismiss_welcome();
        return;
    }
    if app.show_settings {
        handle_settings(app, key);
        return;
    }

    // Scrolling works from both modes
    match key.code {
        KeyCode::PageUp => return app.scroll_up(PAGE_LINES),
        KeyCode::PageDown => return app.scroll_down(PAGE_LINES),
        _ => {}
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to the input box
        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
            app.cursor_end();
        }

        // Move between assistant messages
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),

        // Thinking steps of the selected message
        KeyCode::Enter | KeyCode::Char('d') | KeyCode::Char(' ') => {
            app.toggle_selected_details();
        }

        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        KeyCode::Char('s') => app.open_settings(),
        KeyCode::Char('b') => app.dismiss_banner(),

        KeyCode::Esc => app.selected = None,

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.dispatch();
        }
        KeyCode::Backspace => app.delete_before_cursor(),
        KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        // Ctrl and Alt chords are commands, never text
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            app.insert_char(c)
        }
        _ => {}
    }
}

fn handle_settings(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('s') => app.close_settings(),

        KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => {
            app.settings_tab = app.settings_tab.next();
        }
        KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
            app.settings_tab = app.settings_tab.prev();
        }

        KeyCode::Char('j') | KeyCode::Down if app.settings_tab == SettingsTab::General => {
            app.settings_nav_down();
        }
        KeyCode::Char('k') | KeyCode::Up if app.settings_tab == SettingsTab::General => {
            app.settings_nav_up();
        }
        KeyCode::Enter | KeyCode::Char(' ') if app.settings_tab == SettingsTab::General => {
            app.toggle_selected_setting();
        }

        KeyCode::Char('r') if app.settings_tab == SettingsTab::Usage => app.refresh_limits(),
        KeyCode::Char('r') if app.settings_tab == SettingsTab::Account => app.refresh_user(),

        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat || app.show_settings || app.show_welcome {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_LINES),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NeubotClient;
    use crate::config::Config;
    use crate::error::ApiError;
    use crate::markup::plain_text;
    use crate::render::FAILURE_MESSAGE;
    use crate::transcript::{Entry, Role};
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut config = Config::default();
        config.preferences.welcome_seen = true;
        App::new(config, None, NeubotClient::new("http://127.0.0.1:9"), "UTC".to_string(), tx)
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))).unwrap();
    }

    #[tokio::test]
    async fn test_typing_and_enter_starts_a_turn() {
        let mut app = test_app();
        for c in "hello".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);

        assert!(app.input.is_empty());
        assert!(app.transcript.has_pending());
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[tokio::test]
    async fn test_enter_on_blank_input_does_nothing() {
        let mut app = test_app();
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.transcript.entries().len(), 1);
        assert_eq!(app.input, " ");
    }

    #[tokio::test]
    async fn test_query_finished_event_removes_placeholder() {
        let mut app = test_app();
        app.input = "weather".to_string();
        let pending = app.begin_turn().unwrap();

        let event = AppEvent::QueryFinished {
            turn: pending.turn,
            result: Err(ApiError::Status { status: 500, body: String::new() }),
        };
        handle_event(&mut app, event).unwrap();
        assert!(!app.transcript.has_pending());
        assert_eq!(app.transcript.entries().len(), 3);
    }

    #[tokio::test]
    async fn test_welcome_popup_swallows_first_key() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(
            Config::default(),
            None,
            NeubotClient::new("http://127.0.0.1:9"),
            "UTC".to_string(),
            tx,
        );
        assert!(app.show_welcome);
        press(&mut app, KeyCode::Char('x'));
        assert!(!app.show_welcome);
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_normal_mode_toggles_details() {
        let mut app = test_app();
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Normal);

        press(&mut app, KeyCode::Enter);
        assert!(app.transcript.open_details().is_some());
        press(&mut app, KeyCode::Char('d'));
        assert!(app.transcript.open_details().is_none());
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_from_any_mode() {
        let mut app = test_app();
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        handle_event(&mut app, AppEvent::Key(key)).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_unreachable_backend_appends_one_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut config = Config::default();
        config.preferences.welcome_seen = true;
        let mut app = App::new(config, None, NeubotClient::new("http://127.0.0.1:9"), "UTC".to_string(), tx);

        for c in "what time is it".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        assert!(app.transcript.has_pending());

        let event = rx.recv().await.unwrap();
        let AppEvent::QueryFinished { turn, result } = &event else {
            panic!("expected a query result, got {:?}", event);
        };
        assert!(matches!(result, Err(ApiError::Network(_))));
        let turn = *turn;
        assert!(app.transcript.typing(turn).unwrap().is_running());

        handle_event(&mut app, event).unwrap();

        assert!(app.transcript.typing(turn).is_none());
        assert!(!app.transcript.has_pending());
        let failures = app
            .transcript
            .entries()
            .iter()
            .filter(|e| matches!(e, Entry::Message(m) if m.role == Role::Assistant && plain_text(&m.display) == FAILURE_MESSAGE))
            .count();
        assert_eq!(failures, 1);
        assert_eq!(app.transcript.entries().len(), 3);
    }

    #[tokio::test]
    async fn test_control_chords_are_not_typed() {
        let mut app = test_app();
        press(&mut app, KeyCode::Char('h'));
        for modifiers in [KeyModifiers::CONTROL, KeyModifiers::ALT] {
            let key = KeyEvent::new(KeyCode::Char('u'), modifiers);
            handle_event(&mut app, AppEvent::Key(key)).unwrap();
        }
        let key = KeyEvent::new(KeyCode::Char('I'), KeyModifiers::SHIFT);
        handle_event(&mut app, AppEvent::Key(key)).unwrap();

        assert_eq!(app.input, "hI");
        assert!(!app.should_quit);
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(2, 2, 10, 5);
        assert!(point_in_rect(2, 2, rect));
        assert!(point_in_rect(11, 6, rect));
        assert!(!point_in_rect(12, 6, rect));
        assert!(!point_in_rect(1, 3, rect));
    }
}
