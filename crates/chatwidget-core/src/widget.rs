//! The chat widget: session state plus the operations that change it.
//!
//! Sending is split in two so a front end can keep its event loop running
//! while the model works. [`ChatWidget::begin_send`] does the synchronous half
//! and hands back a [`Dispatch`]; the caller runs it wherever it likes and
//! feeds the [`Completion`] back through [`ChatWidget::complete`].
//! [`ChatWidget::send_message`] does all three in one call.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ai::{GenerateRequest, GenerateResponse, GenerationService, ServiceConnector};
use crate::error::ChatError;
use crate::render::{self, Bubble};
use crate::state::{Message, SessionState, CLEARED_GREETING};
use crate::storage::{CredentialStore, KeyValueStore};

/// Shown in place of an empty reply.
pub const NO_CONTENT: &str = "[No content]";

pub const CLEAR_PROMPT: &str = "Clear the whole conversation and start over?";

pub const CANCELLED_ERROR: &str = "request cancelled";

/// Answers the yes/no question asked before a reset.
pub trait Confirmation {
    fn confirm(&mut self, question: &str) -> bool;
}

impl<F> Confirmation for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, question: &str) -> bool {
        self(question)
    }
}

/// Values the host supplies when mounting a widget.
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub default_model: String,
    /// Pre-filled into the draft
    pub starter: Option<String>,
}

#[derive(Debug)]
pub enum Outcome {
    Finished(Result<GenerateResponse, ChatError>),
    Cancelled,
}

/// Result of running a [`Dispatch`], tagged with the dispatch it belongs to.
#[derive(Debug)]
pub struct Completion {
    pub id: u64,
    pub outcome: Outcome,
}

/// One outbound request, ready to run.
pub struct Dispatch {
    id: u64,
    request: GenerateRequest,
    service: Arc<dyn GenerationService>,
    cancel: CancellationToken,
}

impl Dispatch {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &GenerateRequest {
        &self.request
    }

    pub async fn run(self) -> Completion {
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Outcome::Cancelled,
            result = self.service.generate(&self.request) => Outcome::Finished(result),
        };

        Completion {
            id: self.id,
            outcome,
        }
    }
}

struct InFlight {
    id: u64,
    cancel: CancellationToken,
}

pub struct ChatWidget {
    state: SessionState,
    credentials: CredentialStore,
    connector: Arc<dyn ServiceConnector>,
    in_flight: Option<InFlight>,
    next_id: u64,
    revision: u64,
}

impl ChatWidget {
    /// Mount a widget: seed the greeting, pre-fill the starter, and pick up a
    /// remembered credential.
    pub fn new(
        config: WidgetConfig,
        store: Box<dyn KeyValueStore>,
        connector: Arc<dyn ServiceConnector>,
    ) -> Self {
        let credentials = CredentialStore::new(store);
        let mut state = SessionState::new(config.default_model);

        state.credential = credentials.load_credential();
        if let Some(starter) = config.starter.filter(|s| !s.is_empty()) {
            state.draft = starter;
        }

        Self {
            state,
            credentials,
            connector,
            in_flight: None,
            next_id: 0,
            revision: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn transcript(&self) -> &[Message] {
        &self.state.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy
    }

    pub fn last_error(&self) -> &str {
        &self.state.last_error
    }

    /// Bumped whenever the transcript or the busy flag changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn bubbles(&self) -> Vec<Bubble> {
        render::project(&self.state.transcript, self.state.busy)
    }

    /// Whether a plain submit of the draft would be accepted right now
    pub fn can_send(&self) -> bool {
        !self.state.busy
            && !self.state.draft.trim().is_empty()
            && !self.state.credential.is_empty()
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.state.model = model.into();
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.state.draft = draft.into();
    }

    pub fn set_credential(&mut self, credential: impl Into<String>) {
        self.state.credential = credential.into();
        if self.state.remember_credential {
            self.credentials.save_credential(&self.state.credential);
        }
    }

    pub fn set_remember_credential(&mut self, remember: bool) {
        self.state.remember_credential = remember;
        if !remember {
            self.credentials.clear_credential();
        } else if !self.state.credential.is_empty() {
            self.credentials.save_credential(&self.state.credential);
        }
    }

    pub fn dismiss_error(&mut self) {
        self.state.last_error.clear();
    }

    fn set_busy(&mut self, busy: bool) {
        self.state.busy = busy;
        self.revision += 1;
    }

    fn push_message(&mut self, message: Message) {
        self.state.transcript.push(message);
        self.revision += 1;
    }

    /// Synchronous half of a send. Returns `None` when nothing should be sent.
    /// Empty content and a request already in flight are silent no-ops; a
    /// missing credential or a client that can't be built sets `last_error`.
    pub fn begin_send(&mut self, explicit_text: Option<&str>) -> Option<Dispatch> {
        let content = explicit_text
            .unwrap_or(&self.state.draft)
            .trim()
            .to_string();
        if content.is_empty() || self.state.busy {
            return None;
        }

        if self.state.credential.is_empty() {
            self.state.last_error = ChatError::MissingCredential.to_string();
            return None;
        }

        let service = match self.connector.connect(&self.state.credential) {
            Ok(service) => service,
            Err(e) => {
                warn!(error = %e, "could not construct generation client");
                self.state.last_error = e.to_string();
                return None;
            }
        };

        self.state.last_error.clear();
        self.set_busy(true);
        self.push_message(Message::user(content));
        self.state.draft.clear();

        self.next_id += 1;
        let id = self.next_id;
        let cancel = CancellationToken::new();
        self.in_flight = Some(InFlight {
            id,
            cancel: cancel.clone(),
        });

        let request = GenerateRequest {
            model: self.state.model.clone(),
            contents: self.state.transcript.clone(),
        };
        debug!(id, model = %request.model, turns = request.contents.len(), "dispatching");

        Some(Dispatch {
            id,
            request,
            service,
            cancel,
        })
    }

    /// Apply a finished dispatch. Completions that no longer match the
    /// in-flight dispatch are dropped; returns whether it was applied.
    pub fn complete(&mut self, completion: Completion) -> bool {
        match &self.in_flight {
            Some(in_flight) if in_flight.id == completion.id => {}
            _ => {
                debug!(id = completion.id, "discarding stale completion");
                return false;
            }
        }
        self.in_flight = None;

        match completion.outcome {
            Outcome::Finished(Ok(response)) => {
                let reply = response
                    .text
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| NO_CONTENT.to_string());
                debug!(id = completion.id, chars = reply.len(), "reply received");
                self.push_message(Message::model(reply));
            }
            Outcome::Finished(Err(e)) => {
                info!(id = completion.id, error = %e, "generation failed");
                self.state.last_error = e.to_string();
            }
            // Only reaches here when the token was cancelled outside
            // `abort_pending`, which drops the in-flight id first
            Outcome::Cancelled => {
                self.state.last_error = CANCELLED_ERROR.to_string();
            }
        }

        self.set_busy(false);
        true
    }

    /// Give up on the in-flight dispatch, recording `reason` as the error.
    pub fn abort_pending(&mut self, reason: impl Into<String>) -> bool {
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };

        in_flight.cancel.cancel();
        self.state.last_error = reason.into();
        self.set_busy(false);
        debug!(id = in_flight.id, "dispatch abandoned");
        true
    }

    /// Cancel the in-flight dispatch; its reply, if any, is ignored.
    pub fn cancel_pending(&mut self) -> bool {
        self.abort_pending(CANCELLED_ERROR)
    }

    /// Send and wait for the reply in one go. Returns whether a request was made.
    pub async fn send_message(&mut self, explicit_text: Option<&str>) -> bool {
        let Some(dispatch) = self.begin_send(explicit_text) else {
            return false;
        };

        let completion = dispatch.run().await;
        self.complete(completion);
        true
    }

    /// Reset to a fresh greeting after the user confirms. Does nothing while a
    /// request is in flight. Returns whether the history was cleared.
    pub fn clear_history(&mut self, confirmation: &mut dyn Confirmation) -> bool {
        if self.state.busy {
            return false;
        }
        if !confirmation.confirm(CLEAR_PROMPT) {
            return false;
        }

        self.state.transcript = vec![Message::model(CLEARED_GREETING)];
        self.state.last_error.clear();
        self.state.draft.clear();
        self.revision += 1;
        info!("conversation cleared");
        true
    }
}

impl Drop for ChatWidget {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
        }
    }
}
