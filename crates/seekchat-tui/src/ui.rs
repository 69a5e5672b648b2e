use std::time::Instant;

use chrono::Local;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use seekchat_core::nav::{self, ROUTES};
use seekchat_core::templates::templates;
use seekchat_core::{BalanceSummary, ChatMessage, ChatRole, ChatSnapshot, NoticeLevel, SettingField};

use crate::app::{App, Popup};
use crate::commands::HELP;
use crate::markdown::{self, BlockContext};

const SIDEBAR_WIDTH: u16 = 24;
const DIM: Style = Style::new().fg(Color::DarkGray);

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let [sidebar_area, main_area] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)]).areas(body_area);

    render_header(app, frame, header_area);
    render_sidebar(app, frame, sidebar_area);

    if app.on_chat() {
        render_chat_screen(app, frame, main_area);
    } else {
        app.chat_area = None;
        render_settings_screen(app, frame, main_area);
    }

    render_footer(app, frame, footer_area);
    render_notices(app, frame, main_area);

    let popup = app.popup;
    match popup {
        Some(Popup::Attach) => render_attach_popup(app, frame, area),
        Some(Popup::EditSetting(field)) => render_setting_popup(app, field, frame, area),
        Some(Popup::Templates) => render_templates_popup(app, frame, area),
        Some(Popup::Help) => render_help_popup(frame, area),
        None => {}
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let settings = app.settings.get();
    let title = Line::from(vec![
        Span::styled(" seekchat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(settings.model, Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(format!("v{}", env!("CARGO_PKG_VERSION")), DIM),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::Gray);

    let hints: &[(&str, &str)] = match app.popup {
        Some(Popup::Attach) | Some(Popup::EditSetting(_)) => &[("Enter", "save"), ("Esc", "cancel")],
        Some(Popup::Templates) => &[("j/k", "move"), ("Enter", "apply"), ("Esc", "close")],
        Some(Popup::Help) => &[("any key", "close")],
        None if app.on_chat() => &[
            ("Enter", "send"),
            ("S-Enter", "newline"),
            ("^K", "clear"),
            ("^E", "export"),
            ("^O", "attach"),
            ("^Y", "copy code"),
            ("^T", "templates"),
            ("Tab", "settings"),
            ("^C", "quit"),
        ],
        None => &[
            ("j/k", "move"),
            ("Enter", "edit"),
            ("^B", "usage page"),
            ("Tab", "chat"),
            ("q", "quit"),
        ],
    };

    let mut spans = Vec::with_capacity(hints.len() * 3);
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let balance = app.balance.current();
    let balance_height = if balance.is_some() { 6 } else { 0 };
    let [nav_area, balance_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(balance_height)]).areas(area);

    let selected = nav::selected_key(&app.path);
    let items: Vec<ListItem> = ROUTES
        .iter()
        .map(|route| ListItem::new(format!(" {} ", route.label)))
        .collect();
    let mut state = ListState::default();
    state.select(ROUTES.iter().position(|r| r.key == selected));

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(DIM)
                .title(" Menu "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, nav_area, &mut state);

    // No summary: no panel and nothing to click.
    app.balance_area = None;
    if let Some(summary) = balance {
        app.balance_area = Some(balance_area);
        render_balance(&summary, frame, balance_area);
    }
}

fn render_balance(summary: &BalanceSummary, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(DIM)
        .title(" Balance ");

    let text = Text::from(vec![
        Line::from(Span::styled(
            summary.total_label(),
            Style::default().fg(Color::Green).bold(),
        )),
        Line::from(Span::styled(format!("granted  {}", summary.granted_label()), DIM)),
        Line::from(Span::styled(format!("topped up {}", summary.topped_up_label()), DIM)),
        Line::from(Span::styled("^B / click: usage", DIM)),
    ]);

    frame.render_widget(Paragraph::new(text).block(block), area);
}

/// Rough number of terminal rows `lines` occupy at `width`.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    rows.min(u16::MAX as usize) as u16
}

fn role_header(message: &ChatMessage) -> Line<'static> {
    let (label, color) = match message.role {
        ChatRole::User => ("You", Color::Cyan),
        ChatRole::Assistant => ("DeepSeek", Color::Yellow),
        ChatRole::System => ("System", Color::Magenta),
    };
    let time = message.timestamp.with_timezone(&Local).format("%H:%M").to_string();
    Line::from(vec![
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {}", time), DIM),
    ])
}

fn reasoning_lines(reasoning: &str, lines: &mut Vec<Line<'static>>) {
    let style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC);
    lines.push(Line::from(Span::styled("Thinking", style.add_modifier(Modifier::BOLD))));
    for line in reasoning.lines() {
        lines.push(Line::from(vec![
            Span::styled("│ ", DIM),
            Span::styled(line.to_string(), style),
        ]));
    }
}

fn chat_lines(app: &App, snapshot: &ChatSnapshot) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut ctx = BlockContext {
        offset: 0,
        copied: app.copy_indicator.copied(Instant::now()),
    };

    for message in &snapshot.messages {
        lines.push(role_header(message));
        match message.role {
            ChatRole::Assistant => {
                if let Some(reasoning) = message.reasoning_content.as_deref() {
                    reasoning_lines(reasoning, &mut lines);
                }
                let rendered = markdown::render(&message.content, ctx);
                ctx.offset += rendered.code_blocks.len();
                lines.extend(rendered.lines);
            }
            _ => {
                for line in message.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
        }
        lines.push(Line::default());
    }

    if snapshot.loading {
        lines.push(Line::from(Span::styled(
            "DeepSeek",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        let reasoning = snapshot.streaming_reasoning.as_deref().unwrap_or_default();
        let content = snapshot.streaming_content.as_deref().unwrap_or_default();
        if !reasoning.is_empty() {
            reasoning_lines(reasoning, &mut lines);
        }
        if content.is_empty() {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Waiting{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        } else {
            lines.extend(markdown::render(content, ctx).lines);
        }
    }

    lines
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let snapshot = app.chat.snapshot();

    let files_height = if snapshot.pending_files.is_empty() {
        0
    } else {
        (snapshot.pending_files.len().min(4) + 2) as u16
    };
    let input_rows = app.input.text.split('\n').count().clamp(1, 6) as u16;

    let [chat_area, files_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(files_height),
        Constraint::Length(input_rows + 2),
    ])
    .areas(area);

    // Store chat area for mouse hit-testing and scroll calculations
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let title = if app.toolbar.can_act() {
        format!(" Chat ({} messages) ", snapshot.messages.len())
    } else {
        " Chat ".to_string()
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    let text = if snapshot.messages.is_empty() && !snapshot.loading {
        Text::from(Span::styled(
            "Ask anything. Enter sends, Shift+Enter adds a line, /help lists commands.",
            DIM,
        ))
    } else {
        let lines = chat_lines(app, &snapshot);
        let total = wrapped_height(&lines, app.chat_width);
        app.settle_scroll(total);
        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    if files_height > 0 {
        let items: Vec<ListItem> = snapshot
            .pending_files
            .iter()
            .enumerate()
            .map(|(i, file)| ListItem::new(format!(" {}. {} ", i + 1, file.name)))
            .collect();
        let files = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta))
                .title(" Attached (/detach n to remove) "),
        );
        frame.render_widget(files, files_area);
    }

    render_input(app, snapshot.loading, frame, input_area);
}

fn render_input(app: &App, loading: bool, frame: &mut Frame, area: Rect) {
    let (title, border) = if loading {
        (" Waiting for response ", Color::DarkGray)
    } else {
        (" Message ", Color::Yellow)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title);
    let inner = block.inner(area);

    // Cursor row/column from the text before it
    let before: String = app.input.text.chars().take(app.input.cursor).collect();
    let row = before.matches('\n').count() as u16;
    let col = before
        .rsplit('\n')
        .next()
        .map(|l| l.chars().count())
        .unwrap_or(0) as u16;
    let offset = row.saturating_sub(inner.height.saturating_sub(1));

    let input = Paragraph::new(app.input.text.as_str())
        .block(block)
        .scroll((offset, 0));
    frame.render_widget(input, area);

    if app.popup.is_none() {
        let x = inner.x + col.min(inner.width.saturating_sub(1));
        frame.set_cursor_position((x, inner.y + row - offset));
    }
}

/// Show only the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let len = secret.chars().count();
    if len == 0 {
        return "(not set)".to_string();
    }
    if len <= 4 {
        return "*".repeat(len);
    }
    let last_four: String = secret.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat((len - 4).min(12)), last_four)
}

fn render_settings_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let settings = app.settings.get();
    let items: Vec<ListItem> = SettingField::all()
        .iter()
        .map(|field| {
            let value = field.value(&settings);
            let shown = if field.is_secret() {
                mask_secret(&value)
            } else if value.is_empty() {
                "(empty)".to_string()
            } else {
                value.lines().next().unwrap_or_default().to_string()
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!(" {:<18}", field.label()), Style::default().bold()),
                Span::raw(shown),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Settings (Enter to edit) "),
        )
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut app.settings_state);
}

fn render_notices(app: &App, frame: &mut Frame, area: Rect) {
    let notices = app.notices.active(Instant::now());
    if notices.is_empty() || area.width < 10 {
        return;
    }

    let width = 48.min(area.width.saturating_sub(2));
    let lines: Vec<Line> = notices
        .iter()
        .map(|notice| {
            let (icon, color) = match notice.level {
                NoticeLevel::Success => ("✓", Color::Green),
                NoticeLevel::Info => ("i", Color::Cyan),
                NoticeLevel::Error => ("✗", Color::Red),
            };
            Line::from(vec![
                Span::styled(format!("{} ", icon), Style::default().fg(color).bold()),
                Span::raw(notice.text.clone()),
            ])
        })
        .collect();

    let height = (wrapped_height(&lines, width.saturating_sub(2)) + 2).min(area.height.saturating_sub(1));
    let toast_area = Rect::new(area.x + area.width - width - 1, area.y + 1, width, height);

    frame.render_widget(Clear, toast_area);
    let toast = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).border_style(DIM));
    frame.render_widget(toast, toast_area);
}

/// Centered popup area, clamped to the frame.
fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_input_popup(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    instructions: &str,
    shown: &str,
    cursor: usize,
) {
    let popup_area = popup_rect(area, 64, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" {} ", title));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new(instructions.to_string()).style(DIM);
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let input = Paragraph::new(shown.to_string()).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    let cursor_x = cursor.min(input_area.width.saturating_sub(1) as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

fn render_attach_popup(app: &App, frame: &mut Frame, area: Rect) {
    render_input_popup(
        frame,
        area,
        "Attach file",
        "Path of a file under 10MB. Enter to upload, Esc to cancel.",
        &app.popup_input.text,
        app.popup_input.cursor,
    );
}

fn render_setting_popup(app: &App, field: SettingField, frame: &mut Frame, area: Rect) {
    let (shown, cursor) = if field.is_secret() {
        let masked = if app.popup_input.text.is_empty() {
            String::new()
        } else {
            mask_secret(&app.popup_input.text)
        };
        let len = masked.chars().count();
        (masked, len)
    } else {
        (app.popup_input.text.clone(), app.popup_input.cursor)
    };
    let instructions = if field.is_secret() {
        "Paste the new value. Leave blank to remove it."
    } else {
        "Enter to save, Esc to cancel."
    };
    render_input_popup(
        frame,
        area,
        &format!("Edit {}", field.label()),
        instructions,
        &shown,
        cursor,
    );
}

fn render_templates_popup(app: &mut App, frame: &mut Frame, area: Rect) {
    let list_templates = templates();
    let popup_area = popup_rect(area, 64, list_templates.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = list_templates
        .iter()
        .map(|t| {
            ListItem::new(Line::from(vec![
                Span::styled(format!(" {:<12}", t.name), Style::default().bold()),
                Span::styled(t.description, DIM),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Templates (resets the conversation) "),
        )
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, popup_area, &mut app.template_state);
}

fn render_help_popup(frame: &mut Frame, area: Rect) {
    let popup_area = popup_rect(area, 60, HELP.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let lines: Vec<Line> = HELP
        .iter()
        .map(|(command, description)| {
            Line::from(vec![
                Span::styled(format!(" {:<18}", command), Style::default().fg(Color::Cyan)),
                Span::raw(*description),
            ])
        })
        .collect();
    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Commands "),
    );
    frame.render_widget(help, popup_area);
}
