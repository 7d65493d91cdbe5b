use ratatui::layout::Rect;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::api::{Limits, NeubotClient, QueryResponse, User, UserInfo};
use crate::config::{Config, Preferences};
use crate::error::ApiError;
use crate::payload;
use crate::render::{self, FAILURE_MESSAGE};
use crate::transcript::{MessageId, Transcript, TurnId};
use crate::tui::AppEvent;

pub const WELCOME_MESSAGE: &str = "Hi! My name is neubot. How can I help you today?";

/// Usage limits are refreshed this often while the settings panel is open.
const LIMITS_REFRESH: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsTab {
    #[default]
    General,
    Usage,
    Account,
}

impl SettingsTab {
    pub fn all() -> [SettingsTab; 3] {
        [SettingsTab::General, SettingsTab::Usage, SettingsTab::Account]
    }

    pub fn title(&self) -> &'static str {
        match self {
            SettingsTab::General => "General",
            SettingsTab::Usage => "Usage",
            SettingsTab::Account => "Account",
        }
    }

    fn index(&self) -> usize {
        Self::all().iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        let all = Self::all();
        all[(self.index() + 1) % all.len()]
    }

    pub fn prev(&self) -> Self {
        let all = Self::all();
        all[(self.index() + all.len() - 1) % all.len()]
    }
}

/// Toggles on the General settings tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralSetting {
    Highlight,
    SendButton,
    Banner,
}

impl GeneralSetting {
    pub fn all() -> [GeneralSetting; 3] {
        [GeneralSetting::Highlight, GeneralSetting::SendButton, GeneralSetting::Banner]
    }

    pub fn label(&self) -> &'static str {
        match self {
            GeneralSetting::Highlight => "Highlight query keywords",
            GeneralSetting::SendButton => "Show send label in input",
            GeneralSetting::Banner => "Show capabilities banner",
        }
    }

    pub fn is_on(&self, prefs: &Preferences) -> bool {
        match self {
            GeneralSetting::Highlight => prefs.highlight_enabled,
            GeneralSetting::SendButton => prefs.send_button_visible,
            GeneralSetting::Banner => !prefs.banner_dismissed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitsView {
    NotLoaded,
    Loading,
    Loaded(Limits),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unknown,
    Unreachable(&'static str),
    Anonymous,
    SignedIn(User),
}

/// A turn that passed the input guard and is ready for the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub turn: TurnId,
    pub query: String,
}

/// Conversation controller: owns the transcript and every piece of UI state.
pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input box
    pub input: String,
    pub input_cursor: usize, // in chars

    // Transcript
    pub transcript: Transcript,
    pub selected: Option<MessageId>,
    pub chat_scroll: u16,
    pub follow_bottom: bool,
    pub scroll_to_selected: bool,
    pub chat_area: Option<Rect>, // for mouse hit-testing, updated during render

    // Turn bookkeeping
    next_turn: u64,
    latest_turn: Option<TurnId>,

    // Preferences
    pub config: Config,
    config_path: Option<PathBuf>,
    pub timezone: String,

    // Popups
    pub show_welcome: bool,
    pub show_settings: bool,
    pub settings_tab: SettingsTab,
    pub settings_selected: usize,
    pub show_settings_tips: bool,

    // Backend-provided state
    pub limits: LimitsView,
    limits_requested_at: Option<Instant>,
    pub auth: AuthState,

    client: NeubotClient,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        client: NeubotClient,
        timezone: String,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        let mut transcript = Transcript::new();
        transcript.push_assistant(None, render::render_text(WELCOME_MESSAGE), Vec::new());

        let show_welcome = !config.preferences.welcome_seen;

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            input_cursor: 0,

            transcript,
            selected: None,
            chat_scroll: 0,
            follow_bottom: true,
            scroll_to_selected: false,
            chat_area: None,

            next_turn: 1,
            latest_turn: None,

            config,
            config_path,
            timezone,

            show_welcome,
            show_settings: false,
            settings_tab: SettingsTab::default(),
            settings_selected: 0,
            show_settings_tips: false,

            limits: LimitsView::NotLoaded,
            limits_requested_at: None,
            auth: AuthState::Unknown,

            client,
            events,
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.config.preferences
    }

    // Query dispatch

    /// Guard the input and start a turn: clear the input, append the user
    /// message and a typing placeholder. Blank input starts nothing.
    pub fn begin_turn(&mut self) -> Option<PendingTurn> {
        let query = self.input.trim().to_string();
        if query.is_empty() {
            return None;
        }

        self.input.clear();
        self.input_cursor = 0;

        let turn = TurnId(self.next_turn);
        self.next_turn += 1;
        self.latest_turn = Some(turn);

        self.transcript.push_user(turn, render::render_user_text(&query));
        self.transcript.push_typing(turn);
        self.scroll_to_bottom();

        Some(PendingTurn { turn, query })
    }

    /// Start a turn and send it to the backend. The outcome comes back as
    /// `AppEvent::QueryFinished`.
    pub fn dispatch(&mut self) -> bool {
        let Some(pending) = self.begin_turn() else {
            return false;
        };

        info!(turn = pending.turn.0, "dispatching query");
        let client = self.client.clone();
        let events = self.events.clone();
        let timezone = self.timezone.clone();
        tokio::spawn(async move {
            let result = client.query(&pending.query, &timezone).await;
            let _ = events.send(AppEvent::QueryFinished {
                turn: pending.turn,
                result,
            });
        });
        true
    }

    /// Apply the backend's answer for `turn`. The placeholder is removed on
    /// every path.
    pub fn finish_turn(&mut self, turn: TurnId, result: Result<QueryResponse, ApiError>) {
        self.transcript.remove_typing(turn);

        if self.config.discard_stale_responses && self.latest_turn.is_some_and(|latest| turn < latest) {
            info!(turn = turn.0, "discarding response for superseded turn");
            return;
        }

        match result {
            Ok(response) => {
                if self.config.preferences.highlight_enabled {
                    if let Some(highlighted) = response.highlighted_query.as_deref().filter(|h| !h.trim().is_empty()) {
                        self.transcript.patch_user(turn, render::render_highlighted_query(highlighted));
                    }
                }

                let classified = payload::classify(&response.response);
                debug!(
                    turn = turn.0,
                    kind = classified.payload.kind(),
                    steps = response.thoughts.len(),
                    "response received"
                );
                self.transcript
                    .push_assistant(Some(turn), render::render_classified(&classified), response.steps());
            }
            Err(e) => {
                warn!(turn = turn.0, error = %e, "query failed");
                self.transcript
                    .push_assistant(Some(turn), render::render_text(FAILURE_MESSAGE), Vec::new());
            }
        }

        self.scroll_to_bottom();
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }

    /// The send label shows only when enabled and there is something to send.
    pub fn send_label_visible(&self) -> bool {
        self.config.preferences.send_button_visible && !self.input.trim().is_empty()
    }

    // Transcript navigation

    pub fn select_next(&mut self) {
        let ids = self.transcript.assistant_ids();
        self.selected = match self.selected.and_then(|s| ids.iter().position(|&id| id == s)) {
            Some(i) => ids.get(i + 1).or(ids.last()).copied(),
            None => ids.last().copied(),
        };
        self.scroll_to_selected = true;
    }

    pub fn select_prev(&mut self) {
        let ids = self.transcript.assistant_ids();
        self.selected = match self.selected.and_then(|s| ids.iter().position(|&id| id == s)) {
            Some(i) => ids.get(i.saturating_sub(1)).copied(),
            None => ids.last().copied(),
        };
        self.scroll_to_selected = true;
    }

    /// Toggle the steps panel of the selected assistant message, selecting
    /// the latest one if nothing is selected.
    pub fn toggle_selected_details(&mut self) -> bool {
        if self.selected.is_none() {
            self.selected = self.transcript.assistant_ids().last().copied();
        }
        let open = match self.selected {
            Some(id) => self.transcript.toggle_details(id),
            None => false,
        };
        self.scroll_to_selected = true;
        open
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_to_top(&mut self) {
        self.follow_bottom = false;
        self.chat_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
    }

    // Preferences

    fn persist(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = self.config.save_to(path) {
            warn!(error = %e, path = ?path, "failed to save preferences");
        }
    }

    pub fn toggle_setting(&mut self, setting: GeneralSetting) {
        let prefs = &mut self.config.preferences;
        match setting {
            GeneralSetting::Highlight => prefs.highlight_enabled = !prefs.highlight_enabled,
            GeneralSetting::SendButton => prefs.send_button_visible = !prefs.send_button_visible,
            GeneralSetting::Banner => prefs.banner_dismissed = !prefs.banner_dismissed,
        }
        info!(?setting, on = setting.is_on(prefs), "preference changed");
        self.persist();
    }

    pub fn toggle_selected_setting(&mut self) {
        if let Some(&setting) = GeneralSetting::all().get(self.settings_selected) {
            self.toggle_setting(setting);
        }
    }

    pub fn settings_nav_down(&mut self) {
        self.settings_selected = (self.settings_selected + 1).min(GeneralSetting::all().len() - 1);
    }

    pub fn settings_nav_up(&mut self) {
        self.settings_selected = self.settings_selected.saturating_sub(1);
    }

    pub fn dismiss_banner(&mut self) {
        if !self.config.preferences.banner_dismissed {
            self.config.preferences.banner_dismissed = true;
            self.persist();
        }
    }

    pub fn dismiss_welcome(&mut self) {
        self.show_welcome = false;
        if !self.config.preferences.welcome_seen {
            self.config.preferences.welcome_seen = true;
            self.persist();
        }
    }

    // Settings panel

    pub fn open_settings(&mut self) {
        self.show_settings = true;
        self.show_settings_tips = !self.config.preferences.settings_tips_seen;
        self.refresh_limits();
    }

    pub fn close_settings(&mut self) {
        self.show_settings = false;
        if self.show_settings_tips {
            self.show_settings_tips = false;
            self.config.preferences.settings_tips_seen = true;
            self.persist();
        }
    }

    pub fn refresh_limits(&mut self) {
        if self.limits == LimitsView::NotLoaded {
            self.limits = LimitsView::Loading;
        }
        self.limits_requested_at = Some(Instant::now());

        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let _ = events.send(AppEvent::LimitsLoaded(client.limits().await));
        });
    }

    pub fn on_limits(&mut self, result: Result<Limits, ApiError>) {
        self.limits = match result {
            Ok(limits) => LimitsView::Loaded(limits),
            Err(e) => {
                warn!(error = %e, "failed to load usage limits");
                LimitsView::Failed(e.summary().to_string())
            }
        };
    }

    pub fn refresh_user(&self) {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let _ = events.send(AppEvent::UserLoaded(client.user().await));
        });
    }

    pub fn on_user(&mut self, result: Result<UserInfo, ApiError>) {
        self.auth = match result {
            Ok(UserInfo {
                authenticated: true,
                user: Some(user),
            }) => AuthState::SignedIn(user),
            Ok(_) => AuthState::Anonymous,
            Err(e) => {
                warn!(error = %e, "failed to load user info");
                AuthState::Unreachable(e.summary())
            }
        };
    }

    /// Periodic housekeeping, called on every tick.
    pub fn tick(&mut self) {
        let stale = self
            .limits_requested_at
            .map_or(true, |at| at.elapsed() >= LIMITS_REFRESH);
        if self.show_settings && stale {
            self.refresh_limits();
        }
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
