//! Minimal markdown styling for assistant replies.
//!
//! Handles `**bold**`, `` `code` ``, `#` headings, bullet items and fenced
//! code blocks. Anything else is shown as typed.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

fn code_style() -> Style {
    Style::default().fg(Color::Green)
}

/// Render a whole reply, one `Line` per source line.
pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_fence = false;

    for raw in text.lines() {
        if raw.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            lines.push(Line::from(Span::styled(format!("  {}", raw), code_style())));
            continue;
        }
        lines.push(render_block_line(raw));
    }

    lines
}

fn render_block_line(raw: &str) -> Line<'static> {
    let trimmed = raw.trim_start();

    let heading_level = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&heading_level) && trimmed[heading_level..].starts_with(' ') {
        let title = trimmed[heading_level..].trim().to_string();
        return Line::from(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    }

    for marker in ["- ", "* ", "+ "] {
        if let Some(item) = trimmed.strip_prefix(marker) {
            let indent = raw.len() - trimmed.len();
            let mut spans = vec![Span::raw(format!("{}• ", " ".repeat(indent)))];
            spans.extend(parse_markdown_line(item).spans);
            return Line::from(spans);
        }
    }

    parse_markdown_line(raw)
}

/// Parse a line of text and convert **bold** and `code` markdown to styled spans
pub fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                // Consume the second *
                chars.next();

                // Find closing **
                let mut bold_text = String::new();
                let mut found_close = false;
                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'*') {
                        chars.next();
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                }
            }
            '`' => {
                let mut code = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    if c == '`' {
                        found_close = true;
                        break;
                    }
                    code.push(c);
                }

                if found_close && !code.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(code, code_style()));
                } else {
                    current_text.push('`');
                    current_text.push_str(&code);
                    if found_close {
                        current_text.push('`');
                    }
                }
            }
            _ => current_text.push(c),
        }
    }

    // Push any remaining text
    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}
