//! The conversation transcript: ordered messages, typing placeholders and the
//! single open "thinking steps" panel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::render::Fragment;

/// How often the typing dots advance.
pub const DOT_INTERVAL: Duration = Duration::from_millis(500);
const MAX_DOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One reasoning step reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub description: String,
    pub result: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    /// The welcome message belongs to no turn.
    pub turn: Option<TurnId>,
    pub display: Fragment,
    pub steps: Vec<Step>,
}

/// "Processing..." placeholder shown while a turn is in flight. It owns the
/// timer that animates its dots and stops it when removed.
pub struct TypingIndicator {
    turn: TurnId,
    dots: Arc<AtomicUsize>,
    timer: Option<JoinHandle<()>>,
}

impl TypingIndicator {
    /// Must be called from within a tokio runtime.
    pub fn start(turn: TurnId) -> Self {
        let dots = Arc::new(AtomicUsize::new(MAX_DOTS));
        let counter = Arc::clone(&dots);
        let timer = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + DOT_INTERVAL;
            let mut interval = tokio::time::interval_at(start, DOT_INTERVAL);
            loop {
                interval.tick().await;
                let current = counter.load(Ordering::Relaxed);
                counter.store((current % MAX_DOTS) + 1, Ordering::Relaxed);
            }
        });

        Self {
            turn,
            dots,
            timer: Some(timer),
        }
    }

    pub fn turn(&self) -> TurnId {
        self.turn
    }

    pub fn dots(&self) -> usize {
        self.dots.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Stop the animation. Returns `true` only for the call that actually
    /// stopped the timer.
    pub fn cancel(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.abort();
                trace!(turn = self.turn.0, "typing timer cancelled");
                true
            }
            None => false,
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TypingIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingIndicator")
            .field("turn", &self.turn)
            .field("dots", &self.dots())
            .field("running", &self.is_running())
            .finish()
    }
}

#[derive(Debug)]
pub enum Entry {
    Message(Message),
    Typing(TypingIndicator),
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_message: u64,
    open_details: Option<MessageId>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    fn push_message(&mut self, role: Role, turn: Option<TurnId>, display: Fragment, steps: Vec<Step>) -> MessageId {
        let id = MessageId(self.next_message);
        self.next_message += 1;
        self.entries.push(Entry::Message(Message {
            id,
            role,
            turn,
            display,
            steps,
        }));
        id
    }

    pub fn push_user(&mut self, turn: TurnId, display: Fragment) -> MessageId {
        self.push_message(Role::User, Some(turn), display, Vec::new())
    }

    pub fn push_assistant(&mut self, turn: Option<TurnId>, display: Fragment, steps: Vec<Step>) -> MessageId {
        self.push_message(Role::Assistant, turn, display, steps)
    }

    pub fn push_typing(&mut self, turn: TurnId) {
        self.entries.push(Entry::Typing(TypingIndicator::start(turn)));
    }

    /// Remove the placeholder for `turn`, stopping its timer. Returns whether
    /// a placeholder was found.
    pub fn remove_typing(&mut self, turn: TurnId) -> bool {
        let position = self
            .entries
            .iter()
            .position(|e| matches!(e, Entry::Typing(t) if t.turn() == turn));

        match position {
            Some(i) => {
                if let Entry::Typing(mut indicator) = self.entries.remove(i) {
                    indicator.cancel();
                }
                true
            }
            None => false,
        }
    }

    pub fn typing(&self, turn: TurnId) -> Option<&TypingIndicator> {
        self.entries.iter().find_map(|e| match e {
            Entry::Typing(t) if t.turn() == turn => Some(t),
            _ => None,
        })
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| matches!(e, Entry::Typing(_)))
    }

    /// Replace the displayed text of the user message for `turn`.
    pub fn patch_user(&mut self, turn: TurnId, display: Fragment) -> bool {
        let message = self.entries.iter_mut().find_map(|e| match e {
            Entry::Message(m) if m.role == Role::User && m.turn == Some(turn) => Some(m),
            _ => None,
        });

        match message {
            Some(m) => {
                m.display = display;
                true
            }
            None => false,
        }
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.entries.iter().find_map(|e| match e {
            Entry::Message(m) if m.id == id => Some(m),
            _ => None,
        })
    }

    pub fn assistant_ids(&self) -> Vec<MessageId> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Message(m) if m.role == Role::Assistant => Some(m.id),
                _ => None,
            })
            .collect()
    }

    pub fn open_details(&self) -> Option<MessageId> {
        self.open_details
    }

    pub fn is_open(&self, id: MessageId) -> bool {
        self.open_details == Some(id)
    }

    /// Open or close the steps panel of an assistant message. Opening one
    /// closes whichever was open before. Returns whether `id` is now open.
    pub fn toggle_details(&mut self, id: MessageId) -> bool {
        if !matches!(self.message(id), Some(m) if m.role == Role::Assistant) {
            return false;
        }

        if self.open_details == Some(id) {
            self.open_details = None;
            false
        } else {
            self.open_details = Some(id);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::plain_text;
    use crate::render::render_user_text;

    fn text_of(transcript: &Transcript, id: MessageId) -> String {
        plain_text(&transcript.message(id).unwrap().display)
    }

    #[tokio::test]
    async fn test_turn_ordering() {
        let mut transcript = Transcript::new();
        let turn = TurnId(1);

        let user = transcript.push_user(turn, render_user_text("what time is it"));
        transcript.push_typing(turn);
        assert!(transcript.has_pending());
        assert!(matches!(transcript.entries()[1], Entry::Typing(_)));

        assert!(transcript.remove_typing(turn));
        let reply = transcript.push_assistant(Some(turn), render_user_text("It is noon."), vec![]);

        assert_eq!(transcript.entries().len(), 2);
        assert!(!transcript.has_pending());
        assert_eq!(text_of(&transcript, user), "what time is it");
        assert_eq!(text_of(&transcript, reply), "It is noon.");
    }

    #[tokio::test]
    async fn test_remove_typing_only_touches_its_turn() {
        let mut transcript = Transcript::new();
        transcript.push_typing(TurnId(1));
        transcript.push_typing(TurnId(2));

        assert!(transcript.remove_typing(TurnId(2)));
        assert!(!transcript.remove_typing(TurnId(2)));
        assert!(transcript.typing(TurnId(1)).is_some());
    }

    #[tokio::test]
    async fn test_cancel_happens_once() {
        let mut indicator = TypingIndicator::start(TurnId(7));
        assert!(indicator.is_running());
        assert!(indicator.cancel());
        assert!(!indicator.cancel());
        assert!(!indicator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dots_cycle_and_stop_on_removal() {
        let mut transcript = Transcript::new();
        let turn = TurnId(1);
        transcript.push_typing(turn);
        assert_eq!(transcript.typing(turn).unwrap().dots(), 3);

        tokio::time::sleep(DOT_INTERVAL + Duration::from_millis(10)).await;
        assert_eq!(transcript.typing(turn).unwrap().dots(), 1);

        tokio::time::sleep(DOT_INTERVAL).await;
        assert_eq!(transcript.typing(turn).unwrap().dots(), 2);

        let dots = Arc::clone(&transcript.typing(turn).unwrap().dots);
        assert!(transcript.remove_typing(turn));

        tokio::time::sleep(DOT_INTERVAL * 4).await;
        assert_eq!(dots.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_patch_user_message() {
        let mut transcript = Transcript::new();
        let id = transcript.push_user(TurnId(3), render_user_text("weather in paris"));

        assert!(transcript.patch_user(TurnId(3), render_user_text("weather in Paris")));
        assert!(!transcript.patch_user(TurnId(4), render_user_text("nope")));
        assert_eq!(text_of(&transcript, id), "weather in Paris");
    }

    #[test]
    fn test_single_open_disclosure() {
        let mut transcript = Transcript::new();
        let a = transcript.push_assistant(Some(TurnId(1)), vec![], vec![]);
        let b = transcript.push_assistant(Some(TurnId(2)), vec![], vec![]);

        assert!(transcript.toggle_details(a));
        assert!(transcript.is_open(a));

        // Opening B closes A
        assert!(transcript.toggle_details(b));
        assert!(!transcript.is_open(a));
        assert_eq!(transcript.open_details(), Some(b));

        // Toggling the open one closes it
        assert!(!transcript.toggle_details(b));
        assert_eq!(transcript.open_details(), None);
    }

    #[test]
    fn test_user_messages_have_no_disclosure() {
        let mut transcript = Transcript::new();
        let a = transcript.push_assistant(None, vec![], vec![]);
        transcript.toggle_details(a);

        let id = MessageId(transcript.next_message);
        transcript.push_message(Role::User, Some(TurnId(1)), vec![], vec![]);
        assert!(!transcript.toggle_details(id));
        assert_eq!(transcript.open_details(), Some(a));
        assert_eq!(transcript.assistant_ids(), vec![a]);
    }
}
