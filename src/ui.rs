use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use crate::app::App;
use crate::state::{Message, Role};

const SEND_LABEL: &str = " Send ";
const BUSY_LABEL: &str = " ... ";

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        match after_open.find("**") {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                spans.push(Span::styled(
                    after_open[..end].to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                rest = &after_open[end + 2..];
            }
            // No closing ** (or empty emphasis), treat the rest as literal
            _ => break,
        }
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Movie Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::styled(app.endpoint.clone(), Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn message_lines(msg: &Message, show_details: bool) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match msg.role {
        Role::User => {
            lines.push(
                Line::from(Span::styled(
                    "You",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
                .alignment(Alignment::Right),
            );
            for line in msg.text.lines() {
                lines.push(Line::from(line.to_string()).alignment(Alignment::Right));
            }
        }
        Role::Assistant => {
            lines.push(Line::from(Span::styled(
                "Assistant",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            let text_style = if msg.text.starts_with("Error: ") {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            for line in msg.text.lines() {
                lines.push(parse_markdown_line(line).patch_style(text_style));
            }

            if show_details {
                let detail_style = Style::default().fg(Color::DarkGray);
                if let Some(query) = &msg.structured_query {
                    for line in query.lines() {
                        lines.push(Line::styled(line.to_string(), detail_style));
                    }
                }
                if let Some(results) = &msg.results {
                    lines.push(Line::styled(results.to_string(), detail_style));
                }
            }
        }
    }

    lines.push(Line::default());
    lines
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.pending { Color::Yellow } else { Color::DarkGray }))
        .title(" Conversation ");

    let chat_text = if app.transcript.is_empty() && !app.pending {
        Text::from(
            Line::from(Span::styled(
                "get info from the movie database",
                Style::default().fg(Color::DarkGray),
            ))
            .alignment(Alignment::Center),
        )
    } else {
        let mut lines: Vec<Line> = app
            .transcript
            .iter()
            .flat_map(|msg| message_lines(msg, app.show_details))
            .collect();

        if app.pending {
            lines.push(Line::from(Span::styled(
                "Assistant",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);

    let total_lines = app.transcript_line_count();
    if total_lines > app.chat_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines.saturating_sub(app.chat_height) as usize)
            .position(app.chat_scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let [input_area, button_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(SEND_LABEL.len() as u16 + 2),
    ])
    .areas(area);

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Type your question... ");

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.draft_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.draft
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, input_area);

    let cursor_x = (cursor_pos - scroll_offset) as u16;
    frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));

    // Submit control, disabled while a request is outstanding
    let (label, button_style) = if app.pending {
        (BUSY_LABEL, Style::default().fg(Color::DarkGray))
    } else {
        (SEND_LABEL, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    };
    let button = Paragraph::new(label)
        .style(button_style)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(button_style));

    frame.render_widget(button, button_area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        Span::raw(" "),
    ];
    if !app.pending {
        hints.extend([
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
        ]);
    }
    hints.extend([
        Span::styled(" ↑/↓ ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" ^T ", key_style),
        Span::styled(if app.show_details { " hide query " } else { " show query " }, label_style),
        Span::styled(" ^U ", key_style),
        Span::styled(" clear ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::app_with_fake;
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for row in buffer.content().chunks(buffer.area.width as usize) {
            for cell in row {
                out.push_str(cell.symbol());
            }
            out.push('\n');
        }
        out
    }

    /// Character column of `needle` on the first row whose bordered content is exactly it
    fn column_of(screen: &str, needle: &str) -> usize {
        let row = screen
            .lines()
            .find(|l| l.trim_matches(|c| c == '│' || c == ' ') == needle)
            .unwrap();
        let byte_idx = row.find(needle).unwrap();
        row[..byte_idx].chars().count()
    }

    #[test]
    fn test_parse_markdown_line_bold() {
        let line = parse_markdown_line("Starring **Tom Hanks** and others");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "Tom Hanks");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_parse_markdown_line_unclosed() {
        let line = parse_markdown_line("5 ** 3");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "5 ** 3");
    }

    #[test]
    fn test_empty_transcript_shows_placeholder() {
        let (mut app, _) = app_with_fake();
        let screen = draw(&mut app);
        assert!(screen.contains("get info from the movie database"));
        assert!(screen.contains("Send"));
    }

    #[test]
    fn test_pending_shows_busy_indicator() {
        let (mut app, _) = app_with_fake();
        app.append_message(Message::user("Who directed Heat?"));
        app.set_pending(true);

        let screen = draw(&mut app);
        assert!(screen.contains("Who directed Heat?"));
        assert!(screen.contains("Thinking."));
        assert!(!screen.contains("Send"));
        assert!(!screen.contains("Enter"));
    }

    #[test]
    fn test_user_turns_are_right_aligned() {
        let (mut app, _) = app_with_fake();
        app.append_message(Message::user("hi"));
        app.append_message(Message::assistant("hello"));

        let screen = draw(&mut app);
        assert!(column_of(&screen, "hi") > 40);
        assert!(column_of(&screen, "hello") < 5);
    }

    #[test]
    fn test_details_render_only_when_toggled() {
        let (mut app, _) = app_with_fake();
        app.append_message(Message {
            structured_query: Some("MATCH (m:Movie) RETURN m.title".to_string()),
            results: Some(json!([{ "m.title": "Heat" }])),
            ..Message::assistant("One movie.")
        });

        assert!(!draw(&mut app).contains("MATCH (m:Movie)"));
        app.toggle_details();
        assert!(draw(&mut app).contains("MATCH (m:Movie)"));
    }

    #[test]
    fn test_draft_is_shown_live() {
        let (mut app, _) = app_with_fake();
        app.set_draft("Movies from 1999");
        assert!(draw(&mut app).contains("Movies from 1999"));
    }
}
