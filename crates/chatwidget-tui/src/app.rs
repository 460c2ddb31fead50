use std::path::PathBuf;

use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::warn;
use chatwidget_core::{ChatWidget, Completion, Config, GeminiClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Model,
    Credential,
    Composer,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Model => Focus::Credential,
            Focus::Credential => Focus::Composer,
            Focus::Composer => Focus::Model,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Focus::Model => Focus::Composer,
            Focus::Credential => Focus::Model,
            Focus::Composer => Focus::Credential,
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub focus: Focus,
    pub widget: ChatWidget,

    // Cursor positions (in chars) for the three text fields
    pub model_cursor: usize,
    pub credential_cursor: usize,
    pub draft_cursor: usize,

    // Confirmation popup for clearing the conversation
    pub show_confirm_clear: bool,

    // Message list scrolling
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub follow_tail: bool,
    pub rendered_revision: Option<u64>,
    pub messages_area: Option<Rect>,

    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub suggestions: Vec<String>,
    pub config_path: Option<PathBuf>,
    pub pending: Option<JoinHandle<Completion>>,
}

impl App {
    pub fn new(widget: ChatWidget, suggestions: Vec<String>, config_path: Option<PathBuf>) -> Self {
        let state = widget.state();
        let model_cursor = state.model.chars().count();
        let credential_cursor = state.credential.chars().count();
        let draft_cursor = state.draft.chars().count();

        Self {
            should_quit: false,
            focus: Focus::Composer,
            widget,

            model_cursor,
            credential_cursor,
            draft_cursor,

            show_confirm_clear: false,

            chat_scroll: 0,
            chat_height: 0,
            follow_tail: true,
            rendered_revision: None,
            messages_area: None,

            animation_frame: 0,

            suggestions,
            config_path,
            pending: None,
        }
    }

    /// Send the draft, or `explicit` text when given, without waiting for the reply.
    pub fn submit(&mut self, explicit: Option<&str>) {
        if let Some(dispatch) = self.widget.begin_send(explicit) {
            // A leftover handle belongs to a cancelled dispatch; its reply would be discarded anyway
            self.pending = Some(tokio::spawn(dispatch.run()));
        }
        self.clamp_cursors();
    }

    pub fn send_suggestion(&mut self, index: usize) {
        if let Some(text) = self.suggestions.get(index).cloned() {
            self.submit(Some(&text));
        }
    }

    /// Apply the reply once the background request has finished
    pub async fn poll_pending(&mut self) {
        let finished = self.pending.as_ref().is_some_and(|h| h.is_finished());
        if !finished {
            return;
        }

        if let Some(handle) = self.pending.take() {
            match handle.await {
                Ok(completion) => {
                    self.widget.complete(completion);
                }
                Err(e) => {
                    warn!(error = %e, "generation task died");
                    self.widget.abort_pending(format!("request failed: {e}"));
                }
            }
        }
        self.clamp_cursors();
    }

    /// Esc: stop waiting for a reply, otherwise hide the error banner
    pub fn cancel_or_dismiss(&mut self) {
        if self.widget.is_busy() {
            if let Some(handle) = self.pending.take() {
                handle.abort();
            }
            self.widget.cancel_pending();
        } else {
            self.widget.dismiss_error();
        }
    }

    pub fn request_clear(&mut self) {
        if !self.widget.is_busy() {
            self.show_confirm_clear = true;
        }
    }

    pub fn answer_clear(&mut self, confirmed: bool) {
        self.show_confirm_clear = false;
        self.widget.clear_history(&mut |_: &str| confirmed);
        self.clamp_cursors();
    }

    pub fn toggle_remember(&mut self) {
        let remember = !self.widget.state().remember_credential;
        self.widget.set_remember_credential(remember);
    }

    /// Step the model field through the known model ids
    pub fn cycle_model(&mut self, forward: bool) {
        let models = GeminiClient::list_models();
        let current = models.iter().position(|m| *m == self.widget.state().model);

        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % models.len(),
            (Some(i), false) => (i + models.len() - 1) % models.len(),
            (None, _) => 0,
        };

        let model = models[next].clone();
        self.model_cursor = model.chars().count();
        self.widget.set_model(model);
    }

    /// Remember the current model as the default for future sessions
    pub fn save_model_default(&self) {
        let Some(path) = self.config_path.as_ref() else {
            return;
        };

        let mut config = Config::load_from(path).unwrap_or_else(|_| Config::new());
        config.default_model = Some(self.widget.state().model.clone());
        if let Err(e) = config.save_to(path) {
            warn!(error = %e, "could not save default model");
        }
    }

    pub fn tick_animation(&mut self) {
        if self.widget.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Called while rendering with the wrapped height of the conversation.
    /// Jumps to the bottom whenever the transcript or busy flag changed.
    pub fn sync_scroll(&mut self, total_lines: u16, visible_height: u16) {
        let revision = self.widget.revision();
        if self.rendered_revision != Some(revision) {
            self.rendered_revision = Some(revision);
            self.follow_tail = true;
        }

        let max_scroll = total_lines.saturating_sub(visible_height);
        if self.follow_tail {
            self.chat_scroll = max_scroll;
        } else {
            self.chat_scroll = self.chat_scroll.min(max_scroll);
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn page_size(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    fn clamp_cursors(&mut self) {
        let state = self.widget.state();
        self.model_cursor = self.model_cursor.min(state.model.chars().count());
        self.credential_cursor = self.credential_cursor.min(state.credential.chars().count());
        self.draft_cursor = self.draft_cursor.min(state.draft.chars().count());
    }

    /// Stop any in-flight request before exiting
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.widget.cancel_pending();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use async_trait::async_trait;
    use chatwidget_core::{
        ChatError, GenerateRequest, GenerateResponse, GenerationService, MemoryStore,
        ServiceConnector, WidgetConfig,
    };

    struct CannedService {
        replies: Mutex<VecDeque<Option<String>>>,
    }

    #[async_trait]
    impl GenerationService for CannedService {
        async fn generate(&self, _request: &GenerateRequest) -> Result<GenerateResponse, ChatError> {
            let text = self.replies.lock().unwrap().pop_front().flatten();
            Ok(GenerateResponse { text })
        }
    }

    struct CannedConnector(Arc<CannedService>);

    impl ServiceConnector for CannedConnector {
        fn connect(&self, _credential: &str) -> Result<Arc<dyn GenerationService>, ChatError> {
            Ok(self.0.clone())
        }
    }

    pub(crate) fn test_app(replies: Vec<Option<&str>>) -> App {
        let service = Arc::new(CannedService {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
        });
        let widget = ChatWidget::new(
            WidgetConfig {
                default_model: "gemini-2.5-flash".to_string(),
                starter: None,
            },
            Box::new(MemoryStore::new()),
            Arc::new(CannedConnector(service)),
        );
        App::new(widget, chatwidget_core::config::default_suggestions(), None)
    }

    pub(crate) fn test_app_with_credential(replies: Vec<Option<&str>>) -> App {
        let mut app = test_app(replies);
        app.widget.set_credential("abc");
        app
    }

    #[test]
    fn focus_cycles_through_fields() {
        assert_eq!(Focus::Model.next(), Focus::Credential);
        assert_eq!(Focus::Composer.next(), Focus::Model);
        assert_eq!(Focus::Model.prev(), Focus::Composer);
    }

    #[test]
    fn cursors_start_at_end_of_prefilled_fields() {
        let app = test_app(vec![]);
        assert_eq!(app.model_cursor, "gemini-2.5-flash".len());
        assert_eq!(app.draft_cursor, 0);
    }

    #[test]
    fn sync_scroll_follows_tail_until_user_scrolls() {
        let mut app = test_app(vec![]);

        app.sync_scroll(50, 10);
        assert_eq!(app.chat_scroll, 40);

        app.scroll_up(5);
        app.sync_scroll(50, 10);
        assert_eq!(app.chat_scroll, 35);

        app.scroll_down(100);
        app.sync_scroll(50, 10);
        assert_eq!(app.chat_scroll, 40);
    }

    #[tokio::test]
    async fn new_turn_snaps_back_to_bottom() {
        let mut app = test_app_with_credential(vec![Some("reply")]);
        app.sync_scroll(50, 10);
        app.scroll_up(20);
        app.sync_scroll(50, 10);
        assert_eq!(app.chat_scroll, 20);

        app.submit(Some("Hello"));
        app.sync_scroll(54, 10);
        assert_eq!(app.chat_scroll, 44);
    }

    #[test]
    fn cycle_model_walks_known_models() {
        let mut app = test_app(vec![]);
        let models = GeminiClient::list_models();

        app.cycle_model(true);
        assert_eq!(app.widget.state().model, models[1]);
        app.cycle_model(false);
        app.cycle_model(false);
        assert_eq!(app.widget.state().model, models[models.len() - 1]);
        assert_eq!(app.model_cursor, app.widget.state().model.chars().count());

        app.widget.set_model("custom-model");
        app.cycle_model(true);
        assert_eq!(app.widget.state().model, models[0]);
    }

    #[test]
    fn save_model_default_writes_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut app = test_app(vec![]);
        app.config_path = Some(path.clone());
        app.widget.set_model("gemini-2.5-pro");

        app.save_model_default();

        assert_eq!(Config::load_from(&path).unwrap().model(), "gemini-2.5-pro");
    }

    #[tokio::test]
    async fn shutdown_cancels_in_flight_request() {
        let mut app = test_app_with_credential(vec![Some("reply")]);
        app.submit(Some("Hello"));
        app.shutdown();
        assert!(!app.widget.is_busy());
        assert!(app.pending.is_none());
    }
}
