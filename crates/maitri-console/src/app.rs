use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use maitri_console::conversation::{Conversation, QUICK_ACTIONS};
use maitri_console::store::Store;
use maitri_core::{Feedback, AGENT_ROSTER};

pub struct App {
    pub conversation: Conversation,
    pub input: String,
    pub suggestion_cursor: Option<usize>,
    pub status_note: Option<String>,
}

impl App {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            input: String::new(),
            suggestion_cursor: None,
            status_note: None,
        }
    }

    pub fn store(&self) -> &Store {
        self.conversation.store()
    }

    fn send_input(&mut self) {
        let text = std::mem::take(&mut self.input);
        self.suggestion_cursor = None;
        if self.conversation.submit(&text).is_some() {
            self.status_note = None;
        }
    }

    fn cycle_suggestion(&mut self) {
        let suggestions = self.store().suggestions();
        if suggestions.is_empty() {
            return;
        }
        let next = self
            .suggestion_cursor
            .map(|index| (index + 1) % suggestions.len())
            .unwrap_or(0);
        self.suggestion_cursor = Some(next);
        self.input = suggestions[next].clone();
    }

    fn move_agent_selection(&mut self, forward: bool) {
        let store = self.store();
        let current = store
            .selected_agent()
            .and_then(|id| AGENT_ROSTER.iter().position(|entry| entry.id == id));
        let last = AGENT_ROSTER.len() - 1;
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => last,
            (Some(index), true) => (index + 1).min(last),
            (Some(index), false) => index.saturating_sub(1),
        };
        store.select_agent(Some(AGENT_ROSTER[next].id.to_string()));
    }

    fn send_quick_action(&mut self, index: usize) {
        if self.conversation.quick_action(index).is_some() {
            self.status_note = Some(format!("Sent: {}", QUICK_ACTIONS[index]));
        }
    }

    fn rate_last_reply(&mut self, feedback: Feedback) {
        let store = self.store();
        let rated = store
            .last_assistant_index()
            .map(|index| store.rate(index, feedback))
            .unwrap_or(false);
        self.status_note = Some(if rated {
            match feedback {
                Feedback::Up => "Rated last reply helpful".to_string(),
                Feedback::Down => "Rated last reply unhelpful".to_string(),
            }
        } else {
            "No reply to rate yet".to_string()
        });
    }
}

/// F3, F4 and F7 map onto `QUICK_ACTIONS` in order.
pub const QUICK_ACTION_KEYS: [u8; 3] = [3, 4, 7];

pub fn handle_input(event: Event, app: &mut App) -> bool {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(key, app),
        _ => false,
    }
}

/// Returns true when the operator asked to quit.
pub fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('c') if ctrl => true,
        KeyCode::Enter => {
            app.send_input();
            false
        }
        KeyCode::Tab => {
            app.cycle_suggestion();
            false
        }
        KeyCode::F(2) => {
            if app.conversation.emergency().is_some() {
                app.status_note = Some("Emergency request sent".to_string());
            }
            false
        }
        KeyCode::F(n) if QUICK_ACTION_KEYS.contains(&n) => {
            if let Some(index) = QUICK_ACTION_KEYS.iter().position(|key| *key == n) {
                app.send_quick_action(index);
            }
            false
        }
        KeyCode::Up => {
            app.move_agent_selection(false);
            false
        }
        KeyCode::Down => {
            app.move_agent_selection(true);
            false
        }
        KeyCode::F(5) => {
            app.rate_last_reply(Feedback::Up);
            false
        }
        KeyCode::F(6) => {
            app.rate_last_reply(Feedback::Down);
            false
        }
        KeyCode::Backspace => {
            app.input.pop();
            app.suggestion_cursor = None;
            false
        }
        KeyCode::Char(ch) if !ctrl => {
            app.input.push(ch);
            app.suggestion_cursor = None;
            false
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maitri_console::conversation::EMERGENCY_TEXT;
    use maitri_core::Role;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        App::new(Conversation::new(Store::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn typing_then_enter_submits_and_clears_input() {
        let mut app = app();
        for ch in "hello".chars() {
            assert!(!handle_key(key(KeyCode::Char(ch)), &mut app));
        }
        assert_eq!(app.input, "hello");
        assert!(!handle_key(key(KeyCode::Enter), &mut app));

        assert!(app.input.is_empty());
        let chat = app.store().chat();
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].role, Role::User);
        assert_eq!(chat[0].text, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn tab_cycles_suggestions_into_the_input_line() {
        let mut app = app();
        let suggestions = app.store().suggestions();
        handle_key(key(KeyCode::Tab), &mut app);
        assert_eq!(app.input, suggestions[0]);
        handle_key(key(KeyCode::Tab), &mut app);
        assert_eq!(app.input, suggestions[1]);
        for _ in 0..suggestions.len() - 1 {
            handle_key(key(KeyCode::Tab), &mut app);
        }
        assert_eq!(app.input, suggestions[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn f2_sends_the_emergency_text() {
        let mut app = app();
        handle_key(key(KeyCode::F(2)), &mut app);
        assert_eq!(app.store().chat()[0].text, EMERGENCY_TEXT);
    }

    #[tokio::test(start_paused = true)]
    async fn function_keys_send_the_quick_actions() {
        let mut app = app();
        for (n, text) in QUICK_ACTION_KEYS.into_iter().zip(QUICK_ACTIONS) {
            assert!(!handle_key(key(KeyCode::F(n)), &mut app));
            let chat = app.store().chat();
            assert_eq!(chat[chat.len() - 1].text, text);
            assert_eq!(app.status_note, Some(format!("Sent: {text}")));
        }
        assert_eq!(app.store().chat_len(), QUICK_ACTIONS.len());
    }

    #[tokio::test(start_paused = true)]
    async fn agent_selection_walks_the_roster_and_clamps() {
        let mut app = app();
        handle_key(key(KeyCode::Down), &mut app);
        assert_eq!(app.store().selected_agent().as_deref(), Some(AGENT_ROSTER[0].id));
        handle_key(key(KeyCode::Up), &mut app);
        assert_eq!(app.store().selected_agent().as_deref(), Some(AGENT_ROSTER[0].id));
        for _ in 0..AGENT_ROSTER.len() + 3 {
            handle_key(key(KeyCode::Down), &mut app);
        }
        assert_eq!(
            app.store().selected_agent().as_deref(),
            Some(AGENT_ROSTER[AGENT_ROSTER.len() - 1].id)
        );
    }

    #[test]
    fn escape_and_ctrl_c_quit() {
        let mut app = app();
        assert!(handle_key(key(KeyCode::Esc), &mut app));
        assert!(handle_key(
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            &mut app
        ));
        assert!(app.input.is_empty());
    }

    #[test]
    fn rating_without_a_reply_leaves_a_note() {
        let mut app = app();
        handle_key(key(KeyCode::F(5)), &mut app);
        assert_eq!(app.status_note.as_deref(), Some("No reply to rate yet"));
    }
}
