//! Message renderer
//!
//! Projects transcript messages onto chat bubbles. The only state kept here
//! is the reveal schedule: when an assistant message settles, its final text
//! is held back behind the typing/status indicator until `reveal_delay` has
//! elapsed, measured from the moment the renderer first observed the settled
//! content. The network call itself is never delayed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use eisaku_core::{ChatRole, Message, MessageHandle, RenderState, Strings, Transcript};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleBody {
    Text(String),
    /// Settled with empty content; shows the localized "no result" text.
    NoResult,
    /// Operation in flight, labelled badge.
    Status(String),
    /// Operation in flight, no label.
    Typing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub role: ChatRole,
    pub body: BubbleBody,
    pub time: String,
}

pub struct MessageRenderer {
    reveal_delay: Duration,
    reveal_at: HashMap<MessageHandle, Instant>,
}

impl MessageRenderer {
    pub fn new(reveal_delay: Duration) -> Self {
        Self {
            reveal_delay,
            reveal_at: HashMap::new(),
        }
    }

    /// Consume the transcript's change log, scheduling reveals for
    /// assistant messages that just settled.
    pub fn observe(&mut self, transcript: &mut Transcript, now: Instant) {
        for handle in transcript.take_changes() {
            let Some(message) = transcript.get(handle) else {
                continue;
            };
            if message.role == ChatRole::Assistant && message.is_settled() {
                self.reveal_at.entry(handle).or_insert(now + self.reveal_delay);
            }
        }
    }

    pub fn bubble(&self, handle: MessageHandle, message: &Message, now: Instant) -> Bubble {
        let time = message.timestamp().format("%H:%M").to_string();

        let body = match (message.role, message.render_state) {
            (ChatRole::User, _) => BubbleBody::Text(message.content.clone()),
            (ChatRole::Assistant, RenderState::Pending) => BubbleBody::Typing,
            (ChatRole::Assistant, RenderState::ProvisionalStatus) => match &message.status_label {
                Some(label) => BubbleBody::Status(label.clone()),
                None => BubbleBody::Typing,
            },
            (ChatRole::Assistant, RenderState::Settled) => {
                match self.reveal_at.get(&handle) {
                    Some(at) if now < *at => {
                        // Keep showing the last in-flight look until the reveal.
                        match &message.status_label {
                            Some(label) => BubbleBody::Status(label.clone()),
                            None => BubbleBody::Typing,
                        }
                    }
                    _ if message.content.is_empty() => BubbleBody::NoResult,
                    _ => BubbleBody::Text(message.content.clone()),
                }
            }
        };

        Bubble {
            role: message.role,
            body,
            time,
        }
    }

    /// Bubbles for the whole transcript, in transcript order.
    pub fn bubbles(&self, transcript: &Transcript, now: Instant) -> Vec<Bubble> {
        transcript
            .iter()
            .map(|(handle, message)| self.bubble(handle, message, now))
            .collect()
    }

    /// True while some reveal is still scheduled in the future.
    pub fn is_revealing(&self, now: Instant) -> bool {
        self.reveal_at.values().any(|at| now < *at)
    }
}

/// Lay out one bubble as terminal lines: header, body, blank separator.
pub fn bubble_lines(bubble: &Bubble, strings: &Strings, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, color) = match bubble.role {
        ChatRole::User => (strings.user_label, Color::Cyan),
        ChatRole::Assistant => (strings.assistant_label, Color::Yellow),
    };
    lines.push(Line::from(vec![
        Span::styled(
            format!("{}:", label),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {}", bubble.time), Style::default().fg(Color::DarkGray)),
    ]));

    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat((animation_frame % 3) as usize + 1);

    match &bubble.body {
        BubbleBody::Text(text) => {
            for line in text.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        BubbleBody::NoResult => {
            lines.push(Line::from(Span::styled(
                strings.no_result,
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        BubbleBody::Status(label) => {
            lines.push(Line::from(vec![
                Span::styled(
                    format!(" {} ", label),
                    Style::default()
                        .bg(Color::Magenta)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(dots, Style::default().fg(Color::DarkGray)),
            ]));
        }
        BubbleBody::Typing => {
            lines.push(Line::from(Span::styled(
                dots,
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
    }

    lines.push(Line::default());
    lines
}
