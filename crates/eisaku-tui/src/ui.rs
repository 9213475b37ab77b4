use std::time::Instant;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};
use crate::app::App;
use crate::render::bubble_lines;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_institution_picker {
        render_institution_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" 英作文トレーニング ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}]", app.controller.institution()),
            Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(app.base_url.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Display width of a string, counting wide CJK characters as two columns
fn display_width(s: &str) -> usize {
    Span::raw(s).width()
}

/// Wrap text to fit within a given display width, returning multiple lines.
/// Breaks at spaces where it can and mid-word otherwise, since Japanese text
/// has no spaces to break at.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0;

    for word in text.split_inclusive(' ') {
        let word_width = display_width(word.trim_end());

        if current_width + word_width <= width {
            current_line.push_str(word);
            current_width += display_width(word);
        } else if word_width <= width {
            lines.push(current_line.trim_end().to_string());
            current_line = word.to_string();
            current_width = display_width(word);
        } else {
            // Longer than a whole line, break it by character
            if current_width > 0 {
                lines.push(current_line.trim_end().to_string());
                current_line.clear();
                current_width = 0;
            }
            for c in word.chars() {
                let char_width = display_width(c.encode_utf8(&mut [0; 4]));
                if current_width + char_width > width && current_width > 0 {
                    lines.push(current_line.trim_end().to_string());
                    current_line.clear();
                    current_width = 0;
                }
                current_line.push(c);
                current_width += char_width;
            }
        }
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line.trim_end().to_string());
    }

    lines
}

fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line];
    }
    let style = line.spans.first().map(|s| s.style).unwrap_or_default();
    let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
    wrap_text_to_width(&text, width)
        .into_iter()
        .map(|l| Line::from(Span::styled(l, style)))
        .collect()
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size, borders excluded
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let strings = app.controller.strings();
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let transcript = app.controller.transcript();
    let lines: Vec<Line<'static>> = if transcript.is_empty() {
        vec![Line::from(Span::styled(
            strings.empty_transcript,
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        let width = app.chat_width as usize;
        app.renderer
            .bubbles(transcript, Instant::now())
            .iter()
            .flat_map(|bubble| bubble_lines(bubble, strings, app.animation_frame))
            .flat_map(|line| wrap_line(line, width))
            .collect()
    };

    // Always land on the newest entry
    app.chat_scroll = bottom_scroll(lines.len(), app.chat_height);

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

/// Scroll offset that puts the last line at the bottom of the view.
pub fn bottom_scroll(total_lines: usize, visible_height: u16) -> u16 {
    let total_lines = total_lines.min(u16::MAX as usize) as u16;
    total_lines.saturating_sub(visible_height)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let strings = app.controller.strings();
    let busy = app.controller.is_busy();
    let border_color = if busy { Color::DarkGray } else { Color::Yellow };

    let title = match app.notice {
        Some(notice) => format!(" {} ", notice),
        None => strings.input_title.to_string(),
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let (visible_text, cursor_x) =
        input_view(&app.input, app.cursor, area.width.saturating_sub(2) as usize);

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if !app.show_institution_picker {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Slice of the input that fits `width` columns with the cursor in view,
/// plus the cursor's column inside that slice.
fn input_view(input: &str, cursor: usize, width: usize) -> (String, u16) {
    let chars: Vec<char> = input.chars().collect();
    let cursor = cursor.min(chars.len());
    let char_width = |c: char| display_width(c.encode_utf8(&mut [0; 4]));

    // Walk back from the cursor, keeping one column for the cursor itself
    let mut offset = cursor;
    let mut used = 1;
    while offset > 0 {
        let w = char_width(chars[offset - 1]);
        if used + w > width {
            break;
        }
        used += w;
        offset -= 1;
    }

    let mut visible = String::new();
    let mut visible_width = 0;
    for &c in &chars[offset..] {
        let w = char_width(c);
        if visible_width + w > width {
            break;
        }
        visible.push(c);
        visible_width += w;
    }

    let cursor_x: usize = chars[offset..cursor].iter().map(|&c| char_width(c)).sum();
    (visible, cursor_x as u16)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = if app.controller.is_busy() {
        Style::default().bg(Color::Yellow).fg(Color::Black)
    } else {
        Style::default().bg(Color::Blue).fg(Color::White)
    };
    let mode_text = if app.controller.is_busy() { " WAIT " } else { " READY " };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if app.show_institution_picker {
        vec![
            Span::styled(" ↑↓ ", key_style),
            Span::styled(" move ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" select ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" close ", label_style),
        ]
    } else {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" submit ", label_style),
            Span::styled(" ^N ", key_style),
            Span::styled(" new question ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" institution ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" quit ", label_style),
        ]
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_institution_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    // Centered popup
    let popup_width = 48.min(area.width.saturating_sub(4));
    let popup_height = (app.institutions.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(app.controller.strings().picker_title);

    let current = app.controller.institution();
    let items: Vec<ListItem> = app
        .institutions
        .iter()
        .map(|institution| {
            let style = if institution == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", institution)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.institution_picker_state);
}
