use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, Focus};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Apply an editing key to a single-line field. Returns true if the text changed.
fn edit_line(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
                return true;
            }
        }
        KeyCode::Delete => {
            let char_count = text.chars().count();
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
                return true;
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = text.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = text.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
            return true;
        }
        _ => {}
    }
    false
}

/// Insert pasted text at the cursor; fields are single-line so newlines become spaces
fn insert_text(text: &mut String, cursor: &mut usize, pasted: &str) {
    let cleaned: String = pasted
        .trim_end_matches(['\r', '\n'])
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    let byte_pos = char_to_byte_index(text, *cursor);
    text.insert_str(byte_pos, &cleaned);
    *cursor += cleaned.chars().count();
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    app.poll_pending().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        app.should_quit = true;
        return;
    }

    if app.show_confirm_clear {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.answer_clear(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.answer_clear(false),
            _ => {}
        }
        return;
    }

    if ctrl {
        match key.code {
            KeyCode::Char('l') => app.request_clear(),
            KeyCode::Char('r') => app.toggle_remember(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.cancel_or_dismiss(),
        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::BackTab => app.focus = app.focus.prev(),
        KeyCode::PageUp => app.scroll_up(app.page_size()),
        KeyCode::PageDown => app.scroll_down(app.page_size()),
        KeyCode::F(n @ 1..=9) => app.send_suggestion(usize::from(n - 1)),
        _ => match app.focus {
            Focus::Model => handle_model_key(app, key),
            Focus::Credential => handle_credential_key(app, key),
            Focus::Composer => handle_composer_key(app, key),
        },
    }
}

fn handle_model_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            app.save_model_default();
            app.focus = Focus::Composer;
        }
        KeyCode::Up => app.cycle_model(false),
        KeyCode::Down => app.cycle_model(true),
        _ => {
            let mut model = app.widget.state().model.clone();
            if edit_line(&mut model, &mut app.model_cursor, key) {
                app.widget.set_model(model);
            }
        }
    }
}

fn handle_credential_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            app.focus = Focus::Composer;
        }
        _ => {
            let mut credential = app.widget.state().credential.clone();
            if edit_line(&mut credential, &mut app.credential_cursor, key) {
                app.widget.set_credential(credential);
            }
        }
    }
}

fn handle_composer_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit(None),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        _ => {
            let mut draft = app.widget.state().draft.clone();
            if edit_line(&mut draft, &mut app.draft_cursor, key) {
                app.widget.set_draft(draft);
            }
        }
    }
}

fn handle_paste(app: &mut App, pasted: &str) {
    if app.show_confirm_clear {
        return;
    }

    match app.focus {
        Focus::Model => {
            let mut model = app.widget.state().model.clone();
            insert_text(&mut model, &mut app.model_cursor, pasted.trim());
            app.widget.set_model(model);
        }
        Focus::Credential => {
            // Keys are pasted far more often than typed; surrounding whitespace is never part of one
            let mut credential = app.widget.state().credential.clone();
            insert_text(&mut credential, &mut app.credential_cursor, pasted.trim());
            app.widget.set_credential(credential);
        }
        Focus::Composer => {
            let mut draft = app.widget.state().draft.clone();
            insert_text(&mut draft, &mut app.draft_cursor, pasted);
            app.widget.set_draft(draft);
        }
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let Some(area) = app.messages_area else {
        return;
    };
    let inside = mouse.column >= area.x
        && mouse.column < area.x + area.width
        && mouse.row >= area.y
        && mouse.row < area.y + area.height;
    if !inside {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}
