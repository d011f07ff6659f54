use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};

use crate::backend::{QueryBackend, QueryRequest, QueryResponse};
use crate::state::Message;

/// Outcome of the in-flight request task, as seen by the event loop
pub type QueryOutcome = Result<anyhow::Result<QueryResponse>, JoinError>;

pub struct App {
    pub should_quit: bool,

    // Conversation store
    pub transcript: Vec<Message>,
    pub draft: String,
    pub draft_cursor: usize, // character index into draft
    pub pending: bool,

    // Backend
    backend: Arc<dyn QueryBackend>,
    pub endpoint: String,
    pub query_task: Option<JoinHandle<anyhow::Result<QueryResponse>>>,

    // View state
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub show_details: bool, // show structured query/results under answers
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(backend: Arc<dyn QueryBackend>, endpoint: &str) -> Self {
        Self {
            should_quit: false,
            transcript: Vec::new(),
            draft: String::new(),
            draft_cursor: 0,
            pending: false,
            backend,
            endpoint: endpoint.to_string(),
            query_task: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            show_details: false,
            animation_frame: 0,
        }
    }

    pub fn append_message(&mut self, msg: Message) {
        self.transcript.push(msg);
        self.scroll_chat_to_bottom();
    }

    /// Replace the draft verbatim, leaving the cursor at its end
    pub fn set_draft(&mut self, s: impl Into<String>) {
        self.draft = s.into();
        self.draft_cursor = self.draft.chars().count();
    }

    pub fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
        if !pending {
            self.animation_frame = 0;
        }
        // The busy indicator adds lines below the transcript
        self.scroll_chat_to_bottom();
    }

    /// Accept the draft as the next user turn and send it to the backend.
    ///
    /// A blank draft is ignored entirely. Otherwise the user turn is
    /// appended before the request starts, and the request carries the
    /// transcript including that turn. Callers gate on `pending`; this does
    /// not check it.
    pub fn submit(&mut self) {
        // Also strip the byte-order mark, which char::is_whitespace does not cover
        let prompt = self.draft.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
        if prompt.is_empty() {
            return;
        }
        let prompt = prompt.to_string();

        let mut history = self.transcript.clone();
        history.push(Message::user(prompt.clone()));

        self.append_message(Message::user(prompt.clone()));
        self.set_draft("");
        self.set_pending(true);

        tracing::info!(
            prompt_chars = prompt.chars().count(),
            history_len = history.len(),
            "Submitting question"
        );

        let backend = self.backend.clone();
        let request = QueryRequest { prompt, history };
        self.query_task = Some(tokio::spawn(async move { backend.query(request).await }));
    }

    /// Fold a settled request into the transcript: exactly one assistant turn,
    /// then pending is released.
    pub fn finish_query(&mut self, outcome: QueryOutcome) {
        self.query_task = None;

        let reply = match outcome {
            Ok(Ok(response)) => {
                if let Some(error) = &response.error {
                    tracing::warn!(error = %error, query = ?response.cypher_query, "Backend could not run its query");
                }
                tracing::info!(
                    has_query = response.cypher_query.is_some(),
                    has_results = response.results.is_some(),
                    "Backend answered"
                );
                response.into_message()
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Submission failed");
                Message::error(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "Request task did not complete");
                Message::error(e)
            }
        };

        self.append_message(reply);
        self.set_pending(false);
    }

    /// Wait for the in-flight request and reconcile it. No-op when idle.
    #[cfg(test)]
    pub async fn settle(&mut self) {
        if let Some(task) = self.query_task.take() {
            let outcome = task.await;
            self.finish_query(outcome);
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.pending {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn toggle_details(&mut self) {
        self.show_details = !self.show_details;
        self.scroll_chat_to_bottom();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.transcript_line_count().saturating_sub(self.visible_height());
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
    }

    /// Scroll chat to bottom so the newest turn (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let total_lines = self.transcript_line_count();
        let visible_height = self.visible_height();

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    /// Estimated rendered height of the transcript, wrapped to the chat width
    pub fn transcript_line_count(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        // Empty text renders no body lines
        let wrapped = |text: &str| -> usize {
            text.lines()
                .map(|line| line.chars().count() / wrap_width + 1)
                .fold(0, usize::saturating_add)
        };

        let mut total_lines: usize = 0;
        for msg in &self.transcript {
            total_lines = total_lines.saturating_add(1); // Role line
            total_lines = total_lines.saturating_add(wrapped(&msg.text));
            if self.show_details {
                if let Some(query) = &msg.structured_query {
                    total_lines = total_lines.saturating_add(wrapped(query));
                }
                if let Some(results) = &msg.results {
                    total_lines = total_lines.saturating_add(wrapped(&results.to_string()));
                }
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.pending {
            total_lines = total_lines.saturating_add(2); // Role line + "Thinking..."
        }

        u16::try_from(total_lines).unwrap_or(u16::MAX)
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }
}
