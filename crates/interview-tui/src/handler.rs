use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use interview_core::{InputBuffer, Slot, View};
use ratatui::layout::Rect;

use crate::app::{App, Focus, InputMode};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Backend(completion) => app.handle_completion(completion),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Popup takes all input while open
    if app.file_picker.open {
        handle_file_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('1') => app.select_view(View::Upload),
        KeyCode::Char('2') => app.select_view(View::Chat),
        KeyCode::Char('o') => app.toggle_overlay(),
        KeyCode::Tab => app.cycle_focus(),
        KeyCode::Char('r') => app.session.check_backend(),
        _ => match app.focused_slot() {
            Some(slot) => handle_conversation_normal(app, slot, key),
            None => handle_upload_normal(app, key),
        },
    }
}

fn handle_upload_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('f') => app.open_file_picker(),
        KeyCode::Char('u') | KeyCode::Enter => app.submit_upload(),
        _ => {}
    }
}

fn handle_conversation_normal(app: &mut App, slot: Slot, key: KeyEvent) {
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(slot, 1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(slot, 1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = (app.scroll_state_mut(slot).height / 2).max(1);
            app.scroll_down(slot, half);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = (app.scroll_state_mut(slot).height / 2).max(1);
            app.scroll_up(slot, half);
        }
        KeyCode::Char('g') => app.scroll_state_mut(slot).offset = 0,
        KeyCode::Char('G') => app.scroll_to_bottom(slot),
        KeyCode::Char('n') if slot == Slot::Overlay => app.reset_overlay(),
        KeyCode::Esc if slot == Slot::Overlay => app.collapse_overlay(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let Some(slot) = app.focused_slot() else {
        app.input_mode = InputMode::Normal;
        return;
    };

    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.send_focused_input(),
        code => {
            let Some(flow) = app.session.coordinator_mut().conversation_mut(slot) else {
                return;
            };
            edit_input(flow.input_mut(), code);
        }
    }
}

fn handle_file_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_file_picker(),
        KeyCode::Enter => app.confirm_file_picker(),
        code => {
            edit_input(&mut app.file_picker.input, code);
            app.file_picker.error = None;
        }
    }
}

fn edit_input(input: &mut InputBuffer, code: KeyCode) {
    match code {
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.left(),
        KeyCode::Right => input.right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        KeyCode::Char(c) => input.insert(c),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // The overlay is drawn on top, so it wins when both contain the point
    let in_overlay = app.overlay_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let slot = if in_overlay {
        Slot::Overlay
    } else if in_chat {
        Slot::Primary
    } else {
        return;
    };

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(slot, 3),
        MouseEventKind::ScrollUp => app.scroll_up(slot, 3),
        MouseEventKind::Down(_) => {
            app.focus = match slot {
                Slot::Primary => Focus::Primary,
                Slot::Overlay => Focus::Overlay,
            };
        }
        _ => {}
    }
}
