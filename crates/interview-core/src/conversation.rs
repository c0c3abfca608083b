//! One conversation with the interview assistant.
//!
//! A turn goes: append the user message, clear the input, mark the flow busy,
//! send the text, append the reply (or a stand-in when the request failed),
//! clear the busy mark. While busy, new turns are dropped, so replies always
//! land in the order their questions were asked.

use crate::backend::{AskReply, Backend};
use crate::error::{BackendError, TurnRejected, BACKEND_UNREACHABLE_TEXT, NO_REPLY_TEXT};
use crate::state::{ChatMessage, Transcript};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text input with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    text: String,
    cursor: usize,
}

impl InputBuffer {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.chars().count();
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }
}

/// Identifies the turn a reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTicket(u64);

/// Request produced by [`ConversationFlow::begin_turn`], to be sent by the caller.
#[derive(Debug, Clone)]
pub struct OutgoingTurn {
    pub ticket: TurnTicket,
    pub message: String,
}

#[derive(Debug)]
pub struct ConversationFlow {
    transcript: Transcript,
    input: InputBuffer,
    pending: Option<TurnTicket>,
    next_ticket: u64,
}

impl ConversationFlow {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            transcript: Transcript::new(greeting),
            input: InputBuffer::default(),
            pending: None,
            next_ticket: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputBuffer {
        &mut self.input
    }

    /// True while a reply is outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Append the user turn and mark the flow busy. The caller sends
    /// `OutgoingTurn::message` and reports back through [`complete_turn`].
    ///
    /// Refusals leave the flow untouched.
    ///
    /// [`complete_turn`]: ConversationFlow::complete_turn
    pub fn begin_turn(&mut self, text: &str) -> Result<OutgoingTurn, TurnRejected> {
        if text.trim().is_empty() {
            return Err(TurnRejected::EmptyInput);
        }
        if self.pending.is_some() {
            tracing::debug!("turn dropped, reply still pending");
            return Err(TurnRejected::Busy);
        }

        self.transcript.push(ChatMessage::user(text));
        self.input.clear();

        let ticket = TurnTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending = Some(ticket);

        Ok(OutgoingTurn {
            ticket,
            message: text.to_string(),
        })
    }

    /// [`begin_turn`](ConversationFlow::begin_turn) with the input buffer's text.
    pub fn submit_input(&mut self) -> Result<OutgoingTurn, TurnRejected> {
        let text = self.input.as_str().to_string();
        self.begin_turn(&text)
    }

    /// Append the reply for `ticket` and clear the busy mark.
    ///
    /// Returns false, leaving the flow untouched, when `ticket` is not the
    /// outstanding turn.
    pub fn complete_turn(
        &mut self,
        ticket: TurnTicket,
        outcome: Result<AskReply, BackendError>,
    ) -> bool {
        if self.pending != Some(ticket) {
            tracing::debug!(?ticket, "discarding stale reply");
            return false;
        }

        let content = match outcome {
            Ok(reply) => reply
                .response
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| NO_REPLY_TEXT.to_string()),
            Err(err) => {
                tracing::warn!(error = %err, kind = ?err.kind(), "assistant request failed");
                BACKEND_UNREACHABLE_TEXT.to_string()
            }
        };
        self.transcript.push(ChatMessage::assistant(content));
        self.pending = None;
        true
    }

    /// Run a whole turn against `backend`.
    pub async fn send_turn(
        &mut self,
        backend: &dyn Backend,
        text: &str,
    ) -> Result<(), TurnRejected> {
        let outgoing = self.begin_turn(text)?;
        let outcome = backend.ask(&outgoing.message).await;
        self.complete_turn(outgoing.ticket, outcome);
        Ok(())
    }
}
