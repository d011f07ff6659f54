use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::App;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => insert_at_cursor(app, &text),
        AppEvent::Resize => app.scroll_chat_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('t') => app.toggle_details(),
            KeyCode::Char('u') => {
                // Clear the draft, readline style
                app.set_draft("");
            }
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,

        KeyCode::Enter => {
            // Submit is disabled while a request is outstanding
            if !app.pending {
                app.submit();
            }
        }

        // Transcript scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => {
            let half = (app.chat_height / 2).max(1);
            app.scroll_up(half);
        }
        KeyCode::PageDown => {
            let half = (app.chat_height / 2).max(1);
            app.scroll_down(half);
        }

        // Draft editing
        KeyCode::Backspace => {
            if app.draft_cursor > 0 {
                app.draft_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.draft, app.draft_cursor);
                app.draft.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.draft.chars().count();
            if app.draft_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.draft, app.draft_cursor);
                app.draft.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.draft_cursor = app.draft_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.draft.chars().count();
            app.draft_cursor = (app.draft_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.draft_cursor = 0;
        }
        KeyCode::End => {
            app.draft_cursor = app.draft.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.draft, app.draft_cursor);
            app.draft.insert(byte_pos, c);
            app.draft_cursor += 1;
        }
        _ => {}
    }
}

/// Insert pasted text at the cursor; the input is a single line
fn insert_at_cursor(app: &mut App, text: &str) {
    let flattened: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let byte_pos = char_to_byte_index(&app.draft, app.draft_cursor);
    app.draft.insert_str(byte_pos, &flattened);
    app.draft_cursor += flattened.chars().count();
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QueryResponse;
    use crate::state::Message;
    use crate::testing::app_with_fake;

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        let s = "día";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 2), 3);
        assert_eq!(char_to_byte_index(s, 3), s.len());
    }

    #[test]
    fn test_typing_edits_draft_at_cursor() {
        let (mut app, _) = app_with_fake();
        type_str(&mut app, "Amélie");
        press(&mut app, KeyCode::Home);
        type_str(&mut app, "X");
        press(&mut app, KeyCode::End);
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Delete);
        assert_eq!(app.draft, "XAmél");
        assert_eq!(app.draft_cursor, 5);
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let (mut app, _) = app_with_fake();
        type_str(&mut app, "Who ?");
        press(&mut app, KeyCode::Left);
        handle_event(&mut app, AppEvent::Paste("acted in\nHeat".to_string()));
        assert_eq!(app.draft, "Who acted in Heat?");
        assert_eq!(app.draft_cursor, 17);
    }

    #[tokio::test]
    async fn test_enter_submits_draft() {
        let (mut app, backend) = app_with_fake();
        backend.queue_response(QueryResponse::default());

        type_str(&mut app, "Top rated movies?");
        press(&mut app, KeyCode::Enter);

        assert!(app.pending);
        assert_eq!(app.draft, "");
        app.settle().await;
        assert_eq!(backend.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_enter_is_ignored_while_pending() {
        let (mut app, backend) = app_with_fake();
        backend.queue_response(QueryResponse::default());

        type_str(&mut app, "first");
        press(&mut app, KeyCode::Enter);
        type_str(&mut app, "second");
        press(&mut app, KeyCode::Enter);

        // Draft stays editable but is not sent
        assert_eq!(app.draft, "second");
        assert_eq!(app.transcript.len(), 1);
        app.settle().await;
        assert_eq!(backend.recorded_requests().len(), 1);
        assert_eq!(app.transcript.len(), 2);
    }

    #[test]
    fn test_quit_keys() {
        let (mut app, _) = app_with_fake();
        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit);

        let (mut app, _) = app_with_fake();
        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert!(app.should_quit);
        assert_eq!(app.draft, "");
    }

    #[test]
    fn test_resize_scrolls_to_newest_turn() {
        let (mut app, _) = app_with_fake();
        app.chat_height = 2;
        app.append_message(Message::assistant("one"));
        app.append_message(Message::assistant("two"));
        app.scroll_up(10);
        assert_eq!(app.chat_scroll, 0);

        handle_event(&mut app, AppEvent::Resize);
        assert_eq!(app.chat_scroll, 4);
    }

    #[test]
    fn test_ctrl_t_toggles_details() {
        let (mut app, _) = app_with_fake();
        let ctrl_t = KeyEvent::new(KeyCode::Char('t'), KeyModifiers::CONTROL);
        handle_event(&mut app, AppEvent::Key(ctrl_t));
        assert!(app.show_details);
        handle_event(&mut app, AppEvent::Key(ctrl_t));
        assert!(!app.show_details);
    }
}
