use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use eisaku_core::Config;
use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_institution_picker {
        handle_institution_picker(app, key);
    } else {
        handle_input(app, key);
    }
}

fn handle_institution_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_institution_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => app.institution_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.institution_picker_nav_up(),
        KeyCode::Enter => {
            if let Some(institution) = app.select_institution() {
                tracing::info!(%institution, "institution changed");
                // Remember the choice for next session
                if let Err(e) = Config::save_institution(&institution) {
                    tracing::warn!(error = %e, "failed to persist institution");
                }
            }
        }
        _ => {}
    }
}

fn handle_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.should_quit = true;
        }
        KeyCode::Tab => {
            app.open_institution_picker();
        }
        KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.request_new_question();
        }
        KeyCode::Enter => {
            app.submit_input();
        }
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.insert_char(c);
        }
        _ => {}
    }
}
