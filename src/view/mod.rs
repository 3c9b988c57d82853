//! Client-side chat view state
//!
//! [`ChatView`] owns the message list a client displays and enforces the
//! submit/stream lifecycle:
//!
//! ```text
//! Idle --submit--> Submitting --first chunk--> Streaming --end/error--> Idle
//!                       |                                                ^
//!                       +------------------end/error---------------------+
//! ```
//!
//! The view does no I/O. A driver (the terminal client in
//! [`crate::commands::chat`]) sends the request that [`ChatView::submit`]
//! produces and feeds the response back through [`ChatView::on_chunk`],
//! [`ChatView::on_complete`] and [`ChatView::on_error`].

use crate::message::{ChatMessage, ChatRequest, Message, Role};

pub mod terminal;

/// Shown in place of the transcript when there is no history
pub const EMPTY_HISTORY: &str =
    "No messages yet. Start chatting or try refreshing if history isn't loading.";

/// Where the view is in the request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No request in flight
    #[default]
    Idle,
    /// Request sent, no response text yet
    Submitting,
    /// Response text arriving
    Streaming,
}

/// In-memory chat thread plus input state
#[derive(Debug, Clone, Default)]
pub struct ChatView {
    messages: Vec<ChatMessage>,
    input: String,
    phase: Phase,
    error: Option<String>,
    scroll_pending: bool,
}

impl ChatView {
    /// Create a view seeded with stored history
    ///
    /// The seed is only read here; afterwards the view owns its list.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::message::{Message, Role};
    /// use parley::view::ChatView;
    ///
    /// let view = ChatView::new(&[Message::new(Role::User, "hi")]);
    /// assert_eq!(view.messages().len(), 1);
    /// assert!(!view.is_in_flight());
    /// ```
    pub fn new(history: &[Message]) -> Self {
        Self {
            messages: history.iter().map(Message::to_chat).collect(),
            scroll_pending: !history.is_empty(),
            ..Default::default()
        }
    }

    /// Messages in display order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Current input text
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Error from the last request, if it failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the input text
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Submit the current input
    ///
    /// Returns the request body to send, or `None` when the input is blank
    /// or a request is already in flight. On success the user message is
    /// appended, the input and any previous error are cleared, and the view
    /// moves to [`Phase::Submitting`].
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::view::{ChatView, Phase};
    ///
    /// let mut view = ChatView::default();
    /// view.set_input("hello");
    /// let request = view.submit().unwrap();
    /// assert_eq!(request.messages.len(), 1);
    /// assert_eq!(view.phase(), Phase::Submitting);
    /// assert!(view.submit().is_none());
    /// ```
    pub fn submit(&mut self) -> Option<ChatRequest> {
        if self.is_in_flight() {
            return None;
        }
        let content = self.input.trim();
        if content.is_empty() {
            return None;
        }

        let message = ChatMessage::user(content);
        self.input.clear();
        self.error = None;
        self.push(message);
        self.phase = Phase::Submitting;

        Some(ChatRequest::new(self.messages.clone()))
    }

    /// Apply one chunk of response text
    ///
    /// The first chunk opens a new assistant message; later chunks extend
    /// it. Empty chunks and chunks arriving while idle are ignored.
    pub fn on_chunk(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        match self.phase {
            Phase::Idle => {
                tracing::debug!("Ignoring chunk received while idle");
            }
            Phase::Submitting => {
                self.push(ChatMessage::assistant(chunk));
                self.phase = Phase::Streaming;
            }
            Phase::Streaming => {
                if let Some(last) = self.messages.last_mut() {
                    last.content.push_str(chunk);
                    self.scroll_pending = true;
                }
            }
        }
    }

    /// The response finished
    pub fn on_complete(&mut self) {
        self.phase = Phase::Idle;
    }

    /// The request failed; messages so far are kept
    pub fn on_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.phase = Phase::Idle;
    }

    /// Whether a request is outstanding
    pub fn is_in_flight(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// In flight with no response text yet
    pub fn is_waiting_for_first_token(&self) -> bool {
        self.is_in_flight() && self.messages.last().map(|m| m.role) == Some(Role::User)
    }

    /// Whether input should be refused
    pub fn is_input_disabled(&self) -> bool {
        self.is_in_flight()
    }

    /// Label for the submit affordance
    pub fn status_label(&self) -> &'static str {
        match self.phase {
            Phase::Idle => "Send",
            Phase::Submitting => "Wait...",
            Phase::Streaming => "Processing...",
        }
    }

    /// Consume a pending request to scroll to the newest message
    ///
    /// Set by every change to the message list.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.scroll_pending = true;
    }
}
