use std::time::Instant;

use eisaku_core::{Controller, SubmitOutcome, NEW_QUESTION_TOKEN};
use ratatui::widgets::ListState;

use crate::render::MessageRenderer;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,

    // Conversation
    pub controller: Controller,
    pub renderer: MessageRenderer,
    pub base_url: String,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars
    pub notice: Option<&'static str>,

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Institution picker state
    pub institutions: Vec<String>,
    pub show_institution_picker: bool,
    pub institution_picker_state: ListState,
}

impl App {
    pub fn new(
        controller: Controller,
        renderer: MessageRenderer,
        institutions: Vec<String>,
        base_url: String,
    ) -> Self {
        Self {
            should_quit: false,
            controller,
            renderer,
            base_url,
            input: String::new(),
            cursor: 0,
            notice: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            institutions,
            show_institution_picker: false,
            institution_picker_state: ListState::default(),
        }
    }

    /// Apply finished remote calls and let the renderer see what changed.
    pub fn sync(&mut self, now: Instant) {
        self.controller.try_settle();
        self.renderer.observe(self.controller.transcript_mut(), now);
        if !self.is_busy(now) {
            self.notice = None;
        }
    }

    /// An operation is outstanding, or its reply is still behind the
    /// reveal delay. New submissions wait for both.
    pub fn is_busy(&self, now: Instant) -> bool {
        self.controller.is_busy() || self.renderer.is_revealing(now)
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy(Instant::now()) {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Submission
    pub fn submit_input(&mut self) -> SubmitOutcome {
        let outcome = if self.renderer.is_revealing(Instant::now()) && !self.input.trim().is_empty() {
            SubmitOutcome::Busy
        } else {
            self.controller.submit(&self.input)
        };
        match outcome {
            SubmitOutcome::Issued(_) => {
                self.input.clear();
                self.cursor = 0;
                self.notice = None;
            }
            // Keep the text so it can be sent once the reply lands.
            SubmitOutcome::Busy => {
                self.notice = Some(self.controller.strings().busy);
            }
            SubmitOutcome::Ignored => {}
        }
        outcome
    }

    pub fn request_new_question(&mut self) -> SubmitOutcome {
        let outcome = if self.renderer.is_revealing(Instant::now()) {
            SubmitOutcome::Busy
        } else {
            self.controller.submit(NEW_QUESTION_TOKEN)
        };
        if outcome == SubmitOutcome::Busy {
            self.notice = Some(self.controller.strings().busy);
        }
        outcome
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        let char_count = self.input.chars().count();
        if self.cursor < char_count {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // Institution picker
    pub fn open_institution_picker(&mut self) {
        if self.institutions.is_empty() {
            return;
        }
        let current_idx = self
            .institutions
            .iter()
            .position(|i| i == self.controller.institution())
            .unwrap_or(0);
        self.institution_picker_state.select(Some(current_idx));
        self.show_institution_picker = true;
    }

    pub fn institution_picker_nav_down(&mut self) {
        let len = self.institutions.len();
        if len > 0 {
            let i = self.institution_picker_state.selected().unwrap_or(0);
            self.institution_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn institution_picker_nav_up(&mut self) {
        let i = self.institution_picker_state.selected().unwrap_or(0);
        self.institution_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Close the picker, switching to the highlighted institution.
    /// Returns it when it differs from the current one.
    pub fn select_institution(&mut self) -> Option<String> {
        self.show_institution_picker = false;
        let chosen = self
            .institution_picker_state
            .selected()
            .and_then(|i| self.institutions.get(i))
            .cloned()?;
        if chosen == self.controller.institution() {
            return None;
        }
        self.controller.set_institution(chosen.clone());
        Some(chosen)
    }
}
