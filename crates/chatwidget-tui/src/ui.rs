use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use chatwidget_core::widget::CLEAR_PROMPT;
use chatwidget_core::{Bubble, BubbleKind};
use crate::app::{App, Focus};

// Mint accent
const PRIMARY: Color = Color::Rgb(0x00, 0xbf, 0xa5);

/// Tallest the error banner grows before the tail is cut
const MAX_ERROR_ROWS: usize = 4;

/// Slice of `text` that fits in `width` columns with the cursor kept visible.
/// Returns the visible text and the cursor column within it.
fn visible_window(text: &str, cursor: usize, width: usize) -> (String, u16) {
    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if width == 0 {
        0
    } else if cursor >= width {
        cursor - width + 1
    } else {
        0
    };

    let visible: String = text.chars().skip(scroll_offset).take(width).collect();
    (visible, (cursor - scroll_offset) as u16)
}

/// Mask a credential, showing only the last four characters
fn mask_credential(credential: &str) -> String {
    let len = credential.chars().count();
    if len == 0 {
        String::new()
    } else if len <= 4 {
        "*".repeat(len)
    } else {
        let masked_len = len - 4;
        let last_four: String = credential.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    }
}

/// Word-wrap one line to `width` columns. Whitespace is kept as typed and
/// words longer than a row are broken mid-word.
fn wrap_line(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut row = String::new();
    let mut row_width = 0;
    // Byte offset just past the last space in `row`
    let mut break_at: Option<usize> = None;

    for c in text.chars() {
        let char_width = c.width().unwrap_or(0);
        if row_width + char_width > width && !row.is_empty() {
            match break_at.take() {
                Some(at) if at < row.len() => {
                    let rest = row.split_off(at);
                    rows.push(std::mem::replace(&mut row, rest));
                }
                _ => rows.push(std::mem::take(&mut row)),
            }
            row_width = row.width();
        }

        row.push(c);
        row_width += char_width;
        if c == ' ' {
            break_at = Some(row.len());
        }
    }

    rows.push(row);
    rows
}

fn bubble_lines(bubble: &Bubble, animation_frame: u8, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(bubble.lines.len() + 2);

    let label_style = match bubble.kind {
        BubbleKind::User => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        BubbleKind::Model | BubbleKind::Thinking => {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        }
    };
    lines.push(Line::from(Span::styled(format!("{}:", bubble.label), label_style)));

    let text_style = match bubble.kind {
        BubbleKind::Thinking => Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        BubbleKind::User => Style::default().fg(Color::Green),
        BubbleKind::Model => Style::default(),
    };

    for text in &bubble.lines {
        let text = if bubble.kind == BubbleKind::Thinking {
            // Animated ellipsis: cycles through ".", "..", "..."
            format!("{}{}", text, ".".repeat((animation_frame as usize) + 1))
        } else {
            text.clone()
        };
        for row in wrap_line(&text, width) {
            lines.push(Line::from(Span::styled(row, text_style)));
        }
    }

    lines.push(Line::default());
    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let error_lines = error_rows(app.widget.last_error(), area.width);
    let error_height = error_lines.len() as u16;

    let [header_area, controls_area, messages_area, error_area, composer_area, suggestions_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(error_height),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(app, frame, header_area);
    render_controls(app, frame, controls_area);
    render_messages(app, frame, messages_area);
    if error_height > 0 {
        render_error(error_lines, frame, error_area);
    }
    render_composer(app, frame, composer_area);
    render_suggestions(app, frame, suggestions_area);
    render_footer(app, frame, footer_area);

    if app.show_confirm_clear {
        render_confirm_clear(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let clear_style = if app.widget.is_busy() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::LightRed)
    };

    let title = Line::from(vec![
        Span::styled(" Gemini Chat ", Style::default().fg(Color::Black).bg(PRIMARY).bold()),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::styled("Ctrl-L clear conversation", clear_style),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn field_block(title: String, focused: bool) -> Block<'static> {
    let border_color = if focused { PRIMARY } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
}

fn render_controls(app: &App, frame: &mut Frame, area: Rect) {
    let [model_area, credential_area] = Layout::horizontal([
        Constraint::Percentage(40),
        Constraint::Percentage(60),
    ])
    .areas(area);

    let state = app.widget.state();

    // Model id
    let model_focused = app.focus == Focus::Model;
    let model_block = field_block(" Model (Up/Down to cycle) ".to_string(), model_focused);
    let inner_width = model_block.inner(model_area).width as usize;
    let (visible, cursor_x) = visible_window(&state.model, app.model_cursor, inner_width);
    frame.render_widget(Paragraph::new(visible).block(model_block), model_area);
    if model_focused && !app.show_confirm_clear {
        frame.set_cursor_position((model_area.x + cursor_x + 1, model_area.y + 1));
    }

    // Credential, masked
    let credential_focused = app.focus == Focus::Credential;
    let remember = if state.remember_credential { "[x]" } else { "[ ]" };
    let credential_block = field_block(
        format!(" API Key  {} remember (Ctrl-R) ", remember),
        credential_focused,
    );
    let inner_width = credential_block.inner(credential_area).width as usize;

    let (display, cursor_x) = if credential_focused {
        // One mask char per key char so the cursor lines up
        let masked: String = "*".repeat(state.credential.chars().count());
        visible_window(&masked, app.credential_cursor, inner_width)
    } else if state.credential.is_empty() {
        ("paste your Gemini API key (Tab to focus)".to_string(), 0)
    } else {
        (mask_credential(&state.credential), 0)
    };
    let style = if state.credential.is_empty() && !credential_focused {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    frame.render_widget(
        Paragraph::new(display).style(style).block(credential_block),
        credential_area,
    );
    if credential_focused && !app.show_confirm_clear {
        frame.set_cursor_position((credential_area.x + cursor_x + 1, credential_area.y + 1));
    }
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", app.widget.state().model));

    let inner = block.inner(area);
    app.messages_area = Some(area);
    app.chat_height = inner.height;

    // Wrapped here rather than by the paragraph so the row count is exact
    let mut lines: Vec<Line> = Vec::new();
    for bubble in app.widget.bubbles() {
        lines.extend(bubble_lines(&bubble, app.animation_frame, inner.width as usize));
    }

    let total = lines.len().min(u16::MAX as usize) as u16;
    app.sync_scroll(total, inner.height);

    let messages = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(messages, area);
}

/// Banner rows for the current error, empty when there is none
fn error_rows(error: &str, width: u16) -> Vec<Line<'static>> {
    if error.is_empty() {
        return Vec::new();
    }

    let mut rows: Vec<Line<'static>> = Vec::new();
    for line in format!(" ⚠ {}", error).split('\n') {
        rows.extend(wrap_line(line, width as usize).into_iter().map(Line::from));
    }
    rows.truncate(MAX_ERROR_ROWS);
    rows
}

fn render_error(rows: Vec<Line<'static>>, frame: &mut Frame, area: Rect) {
    let error = Paragraph::new(Text::from(rows)).style(Style::default().fg(Color::Red));
    frame.render_widget(error, area);
}

fn render_composer(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == Focus::Composer;
    let send_hint = if app.widget.can_send() {
        " Message (Enter to send) "
    } else if app.widget.is_busy() {
        " Message (waiting for reply, Esc to cancel) "
    } else {
        " Message "
    };
    let block = field_block(send_hint.to_string(), focused);

    let inner_width = block.inner(area).width as usize;
    let (visible, cursor_x) = visible_window(&app.widget.state().draft, app.draft_cursor, inner_width);

    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if focused && !app.show_confirm_clear {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_suggestions(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::Gray);

    let mut spans = Vec::new();
    for (i, suggestion) in app.suggestions.iter().take(9).enumerate() {
        spans.push(Span::styled(format!(" F{} ", i + 1), key_style));
        spans.push(Span::styled(format!(" {}  ", suggestion), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let esc_label = if app.widget.is_busy() { " cancel " } else { " dismiss " };

    let hints = vec![
        Span::styled(" Tab ", key_style),
        Span::styled(" focus ", label_style),
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(esc_label, label_style),
        Span::styled(" Ctrl-Q ", key_style),
        Span::styled(" quit ", label_style),
    ];

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_confirm_clear(frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 56.min(area.width.saturating_sub(4));
    let popup_height = 5;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::LightRed))
        .title(" Clear conversation ");

    let text = Text::from(vec![
        Line::from(CLEAR_PROMPT),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::LightRed).fg(Color::Black)),
            Span::raw(" yes   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" no"),
        ]),
    ]);

    let popup = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}
