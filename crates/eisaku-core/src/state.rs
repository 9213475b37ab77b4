//! UI-agnostic transcript state
//!
//! The transcript is the append-only list of chat messages shown to the user.
//! It has no knowledge of how messages are drawn; instead it records which
//! entries changed so a renderer can re-project exactly those.

use chrono::{DateTime, Local};

use crate::error::TranscriptError;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Where a message is in its reveal lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Awaiting a remote result, no status label (typing indicator).
    Pending,
    /// Awaiting a remote result, showing `status_label` as a badge.
    ProvisionalStatus,
    /// Final. Never mutated again.
    Settled,
}

/// One transcript entry
#[derive(Debug, Clone)]
pub struct Message {
    pub role: ChatRole,
    pub content: String,
    pub render_state: RenderState,
    pub status_label: Option<String>,
    timestamp: DateTime<Local>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            render_state: RenderState::Settled,
            status_label: None,
            timestamp: Local::now(),
        }
    }

    /// Assistant placeholder with a status badge ("generating", "grading").
    pub fn provisional(label: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            render_state: RenderState::ProvisionalStatus,
            status_label: Some(label.into()),
            timestamp: Local::now(),
        }
    }

    /// Assistant placeholder drawn as a bare typing indicator.
    pub fn pending() -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            render_state: RenderState::Pending,
            status_label: None,
            timestamp: Local::now(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn is_settled(&self) -> bool {
        self.render_state == RenderState::Settled
    }
}

/// Stable reference to a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageHandle(usize);

impl MessageHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Partial update applied by [`Transcript::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub render_state: Option<RenderState>,
    pub status_label: Option<Option<String>>,
}

impl MessagePatch {
    /// Resolve a placeholder to its final text. The status label is kept so
    /// the renderer can hold the badge until the reveal.
    pub fn settle(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            render_state: Some(RenderState::Settled),
            status_label: None,
        }
    }

    pub fn status(label: impl Into<String>) -> Self {
        Self {
            content: None,
            render_state: Some(RenderState::ProvisionalStatus),
            status_label: Some(Some(label.into())),
        }
    }
}

/// Append-only, chronologically ordered list of messages.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    changes: Vec<MessageHandle>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) -> MessageHandle {
        let handle = MessageHandle(self.messages.len());
        self.messages.push(message);
        self.changes.push(handle);
        handle
    }

    pub fn update(&mut self, handle: MessageHandle, patch: MessagePatch) -> Result<(), TranscriptError> {
        let message = self
            .messages
            .get_mut(handle.0)
            .ok_or(TranscriptError::InvalidHandle(handle.0))?;

        if message.is_settled() {
            return Err(TranscriptError::AlreadySettled(handle.0));
        }

        if let Some(content) = patch.content {
            message.content = content;
        }
        if let Some(state) = patch.render_state {
            message.render_state = state;
        }
        if let Some(label) = patch.status_label {
            message.status_label = label;
        }

        self.changes.push(handle);
        Ok(())
    }

    pub fn get(&self, handle: MessageHandle) -> Option<&Message> {
        self.messages.get(handle.0)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MessageHandle, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .map(|(i, m)| (MessageHandle(i), m))
    }

    /// Drain the handles touched since the last call, in mutation order.
    pub fn take_changes(&mut self) -> Vec<MessageHandle> {
        std::mem::take(&mut self.changes)
    }

    /// Number of assistant messages still awaiting a result.
    pub fn unsettled_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_settled()).count()
    }
}
