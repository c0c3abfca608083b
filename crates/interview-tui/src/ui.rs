use interview_core::{
    BackendStatus, ChatRole, ConversationFlow, OverlayMode, Slot, UploadNotice, UploadState, View,
};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Tabs,
        Wrap,
    },
    Frame,
};

use crate::app::{App, Focus, InputMode};
use crate::markdown::render_markdown;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, tabs, body, footer
    let [header_area, tabs_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_tabs(app, frame, tabs_area);

    match app.view() {
        View::Upload => {
            app.chat_area = None;
            render_upload_view(app, frame, body_area);
        }
        View::Chat => render_chat_view(app, frame, body_area),
    }

    render_overlay(app, frame, body_area);
    render_footer(app, frame, footer_area);

    if app.file_picker.open {
        render_file_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = match app.session.backend_status() {
        BackendStatus::Unknown => Span::styled("backend ?", Style::default().fg(Color::DarkGray)),
        BackendStatus::Checking => {
            Span::styled("checking backend...", Style::default().fg(Color::DarkGray))
        }
        BackendStatus::Online(message) => {
            Span::styled(format!("● {}", message), Style::default().fg(Color::Green))
        }
        BackendStatus::Offline(_) => {
            Span::styled("● backend offline", Style::default().fg(Color::Red))
        }
    };

    let title = Line::from(vec![
        Span::styled(" AI Interview Assistant ", Style::default().fg(Color::Cyan).bold()),
        status,
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn render_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let titles = [View::Upload, View::Chat]
        .iter()
        .enumerate()
        .map(|(i, view)| format!(" {} {} ", i + 1, view.title()));
    let selected = match app.view() {
        View::Upload => 0,
        View::Chat => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .divider("|");

    frame.render_widget(tabs, area);
}

fn render_upload_view(app: &App, frame: &mut Frame, area: Rect) {
    let upload = app.session.coordinator().upload();
    let focused = app.focus == Focus::Primary;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(" Upload Resume ");

    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from("Upload your resume so the assistant can ask about your experience."),
        Line::default(),
    ];

    let file_line = match upload.selected_file() {
        Some(file) => Span::styled(file.file_name.clone(), Style::default().fg(Color::Cyan)),
        None => Span::styled("none (press f to choose)", label),
    };
    lines.push(Line::from(vec![Span::styled("File:   ", label), file_line]));

    let state = match upload.state() {
        UploadState::NoFileSelected => Span::raw("waiting for a file"),
        UploadState::FileSelected(_) => Span::raw("ready to upload"),
        UploadState::Submitting => {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            Span::styled(
                format!("Uploading{}", dots),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            )
        }
        UploadState::Succeeded => Span::styled("uploaded", Style::default().fg(Color::Green)),
        UploadState::Failed(_) => Span::styled("failed", Style::default().fg(Color::Red)),
    };
    lines.push(Line::from(vec![Span::styled("Status: ", label), state]));

    if let Some(notice) = upload.notice() {
        let color = match notice {
            UploadNotice::Validation(_) => Color::Yellow,
            UploadNotice::Success(_) => Color::Green,
            UploadNotice::Failure(_) => Color::Red,
        };
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(notice.text(), Style::default().fg(color))));
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn render_chat_view(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == Focus::Primary;
    let chat_area = render_conversation(app, frame, area, Slot::Primary, " Interview Chat ", focused);
    app.chat_area = chat_area;
}

fn render_overlay(app: &mut App, frame: &mut Frame, body_area: Rect) {
    let coordinator = app.session.coordinator();
    if coordinator.overlay_mode() == OverlayMode::Off {
        app.overlay_area = None;
        return;
    }

    if !coordinator.overlay_expanded() {
        app.overlay_area = None;
        let badge = " o chat ";
        let width = badge.len() as u16;
        if body_area.width <= width + 2 || body_area.height == 0 {
            return;
        }
        let badge_area = Rect::new(
            body_area.x + body_area.width - width - 1,
            body_area.y + body_area.height - 1,
            width,
            1,
        );
        frame.render_widget(
            Paragraph::new(badge).style(Style::default().bg(Color::Cyan).fg(Color::Black)),
            badge_area,
        );
        return;
    }

    // Anchored to the bottom right corner of the body
    let width = 56.min(body_area.width.saturating_sub(2));
    let height = (body_area.height * 3 / 4).max(8).min(body_area.height);
    let popup_area = Rect::new(
        body_area.x + body_area.width - width,
        body_area.y + body_area.height - height,
        width,
        height,
    );

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let focused = app.focus == Focus::Overlay;
    let title = match coordinator.overlay_mode() {
        OverlayMode::Shared => " Chat (shared) ",
        _ => " Chat ",
    };
    render_conversation(app, frame, popup_area, Slot::Overlay, title, focused);
    app.overlay_area = Some(popup_area);
}

/// Transcript with an input box below. Returns the transcript area.
fn render_conversation(
    app: &mut App,
    frame: &mut Frame,
    area: Rect,
    slot: Slot,
    title: &str,
    focused: bool,
) -> Option<Rect> {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    {
        let scroll = app.scroll_state_mut(slot);
        scroll.height = chat_area.height.saturating_sub(2);
        scroll.width = chat_area.width.saturating_sub(2);
    }
    let scroll = *app.scroll_state_mut(slot);

    let flow = app.conversation(slot)?;

    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title.to_string());

    let lines = transcript_lines(flow, app.animation_frame);
    let total_lines = lines.len();

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((scroll.offset, 0));

    frame.render_widget(chat, chat_area);

    if total_lines > scroll.height as usize {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(total_lines).position(scroll.offset as usize);

        frame.render_stateful_widget(
            scrollbar,
            chat_area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }

    let editing = focused && app.input_mode == InputMode::Editing;
    render_input(frame, input_area, flow, editing);

    Some(chat_area)
}

fn transcript_lines(flow: &ConversationFlow, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in flow.transcript().iter() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    "AI:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                lines.extend(render_markdown(&msg.content));
            }
        }
        lines.push(Line::default());
    }

    if flow.is_busy() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_input(frame: &mut Frame, area: Rect, flow: &ConversationFlow, editing: bool) {
    let input_border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = if flow.is_busy() {
        " Waiting for reply... "
    } else {
        " Type your message (i to type) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let input = flow.input();
    let cursor_pos = input.cursor();

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input
        .as_str()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(paragraph, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + 1 + cursor_x, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match (app.focused_slot(), app.input_mode) {
        (_, InputMode::Editing) => " TYPING ",
        (Some(Slot::Overlay), _) => " OVERLAY ",
        (Some(Slot::Primary), _) => " CHAT ",
        (None, _) => " UPLOAD ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let mut hints: Vec<Span> = Vec::new();
    if app.file_picker.open {
        hints.extend(hint("Enter", "choose"));
        hints.extend(hint("Esc", "cancel"));
    } else if app.input_mode == InputMode::Editing {
        hints.extend(hint("Enter", "send"));
        hints.extend(hint("Esc", "stop typing"));
    } else {
        match app.focused_slot() {
            None => {
                hints.extend(hint("f", "choose file"));
                hints.extend(hint("u", "upload"));
            }
            Some(slot) => {
                hints.extend(hint("i", "type"));
                hints.extend(hint("j/k", "scroll"));
                if slot == Slot::Overlay {
                    if app.session.coordinator().overlay_mode() == OverlayMode::Separate {
                        hints.extend(hint("n", "new chat"));
                    }
                    hints.extend(hint("Esc", "hide"));
                }
            }
        }
        hints.extend(hint("1/2", "view"));
        if app.session.coordinator().overlay_mode() != OverlayMode::Off {
            hints.extend(hint("o", "chat"));
            if app.session.coordinator().overlay_expanded() {
                hints.extend(hint("Tab", "focus"));
            }
        }
        hints.extend(hint("r", "recheck"));
        hints.extend(hint("q", "quit"));
    }

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_file_picker(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 70.min(area.width.saturating_sub(4));
    let popup_height = 7;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height.min(area.height));

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Choose Resume ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);
    if inner.height < 3 {
        return;
    }

    let allowed = if app.resume_extensions.is_empty() {
        "any file".to_string()
    } else {
        app.resume_extensions
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let instructions = Paragraph::new(format!("Path to your resume ({}):", allowed))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Input field, scrolled so the cursor stays visible
    let input_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);
    let width = input_area.width as usize;
    let cursor = app.file_picker.input.cursor();
    let offset = if width > 0 && cursor >= width { cursor - width + 1 } else { 0 };
    let visible: String = app
        .file_picker
        .input
        .as_str()
        .chars()
        .skip(offset)
        .take(width)
        .collect();
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
        input_area,
    );
    frame.set_cursor_position((input_area.x + (cursor - offset) as u16, input_area.y));

    if let Some(error) = app.file_picker.error.as_ref().filter(|_| inner.height > 3) {
        let status = Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red));
        frame.render_widget(status, Rect::new(inner.x, inner.y + 3, inner.width, 1));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use interview_core::{Config, HttpBackend};
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    use super::*;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content.iter().map(|cell| cell.symbol()).collect()
    }

    fn app_with(config: &Config) -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let backend = Arc::new(HttpBackend::new(&config.base_url));
        App::new(config, backend, tx)
    }

    #[test]
    fn test_upload_view_renders() {
        let mut app = app_with(&Config::new());
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Upload Resume"));
        assert!(text.contains("press f to choose"));
        assert!(app.chat_area.is_none());
    }

    #[test]
    fn test_chat_view_shows_greeting() {
        let mut config = Config::new();
        config.candidate_name = Some("Ada".to_string());
        let mut app = app_with(&config);
        app.select_view(View::Chat);
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Hi Ada"));
        assert!(text.contains("AI:"));
        assert!(app.chat_area.is_some());
        assert!(app.chat_scroll.height > 0);
    }

    #[test]
    fn test_expanded_overlay_records_area() {
        let mut app = app_with(&Config::new());
        app.toggle_overlay();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(app.overlay_area.is_some());
        assert!(app.overlay_scroll.width > 0);
    }

    #[test]
    fn test_tiny_terminal_does_not_panic() {
        let mut app = app_with(&Config::new());
        app.toggle_overlay();
        app.open_file_picker();
        let mut terminal = Terminal::new(TestBackend::new(10, 5)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();
    }
}
