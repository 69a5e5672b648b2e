use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use seekchat_core::balance::USAGE_URL;
use seekchat_core::templates::{find_template, templates};
use seekchat_core::Submission;

use crate::app::{App, Popup};
use crate::clipboard;
use crate::commands::{self, SlashCommand};
use crate::shortcuts::{match_shortcut, Shortcut};
use crate::tui::AppEvent;

const SCROLL_STEP: u16 = 3;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) | AppEvent::StateChanged => {}
        AppEvent::Tick => app.on_tick(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work everywhere
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if let Some(popup) = app.popup {
        handle_popup(app, popup, key);
        return;
    }

    if key.code == KeyCode::Tab {
        app.next_route();
        return;
    }
    if key.code == KeyCode::Char('b') && key.modifiers.contains(KeyModifiers::CONTROL) {
        open_usage_page(app);
        return;
    }

    if app.on_chat() {
        handle_chat(app, key);
    } else {
        handle_settings(app, key);
    }
}

fn handle_chat(app: &mut App, key: KeyEvent) {
    match match_shortcut(&key) {
        Some(Shortcut::Send) => {
            submit_input(app);
            return;
        }
        Some(Shortcut::Clear) => {
            app.toolbar.clear();
            return;
        }
        None => {}
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('e') if ctrl => {
            app.toolbar.export();
        }
        KeyCode::Char('o') if ctrl => app.open_popup(Popup::Attach, ""),
        KeyCode::Char('y') if ctrl => copy_code(app, None),
        KeyCode::Char('t') if ctrl => app.open_popup(Popup::Templates, ""),

        // Shift+Enter / Alt+Enter insert a newline
        KeyCode::Enter => app.input.insert('\n'),

        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::Up if ctrl => app.scroll_up(1),
        KeyCode::Down if ctrl => app.scroll_down(1),

        KeyCode::Esc => app.input.clear(),
        KeyCode::Backspace => app.input.backspace(),
        KeyCode::Delete => app.input.delete(),
        KeyCode::Left => app.input.left(),
        KeyCode::Right => app.input.right(),
        KeyCode::Home => app.input.home(),
        KeyCode::End => app.input.end(),
        KeyCode::Char(c) if !ctrl => app.input.insert(c),
        _ => {}
    }
}

fn handle_settings(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => app.settings_down(),
        KeyCode::Char('k') | KeyCode::Up => app.settings_up(),
        KeyCode::Enter | KeyCode::Char('e') => {
            let field = app.selected_setting();
            // Secrets start blank rather than echoing the stored value
            let initial = if field.is_secret() {
                String::new()
            } else {
                field.value(&app.settings.get())
            };
            app.open_popup(Popup::EditSetting(field), &initial);
        }
        KeyCode::Esc => app.navigate(seekchat_core::nav::CHAT),
        _ => {}
    }
}

fn handle_popup(app: &mut App, popup: Popup, key: KeyEvent) {
    match popup {
        Popup::Help => app.close_popup(),
        Popup::Templates => match key.code {
            KeyCode::Esc | KeyCode::Char('q') => app.close_popup(),
            KeyCode::Char('j') | KeyCode::Down => app.templates_down(),
            KeyCode::Char('k') | KeyCode::Up => app.templates_up(),
            KeyCode::Enter => {
                let selected = app.template_state.selected().unwrap_or(0);
                if let Some(template) = templates().get(selected) {
                    app.composer.apply_template(template.prompt);
                }
                app.close_popup();
            }
            _ => {}
        },
        Popup::Attach | Popup::EditSetting(_) => match key.code {
            KeyCode::Esc => app.close_popup(),
            KeyCode::Enter => {
                let value = app.popup_input.take();
                app.close_popup();
                match popup {
                    Popup::Attach => {
                        let raw = value.trim().trim_matches('"');
                        if !raw.is_empty() {
                            attach(app, commands::expand_home(raw));
                        }
                    }
                    Popup::EditSetting(field) => save_setting(app, field, &value),
                    _ => {}
                }
            }
            KeyCode::Backspace => app.popup_input.backspace(),
            KeyCode::Delete => app.popup_input.delete(),
            KeyCode::Left => app.popup_input.left(),
            KeyCode::Right => app.popup_input.right(),
            KeyCode::Home => app.popup_input.home(),
            KeyCode::End => app.popup_input.end(),
            KeyCode::Char(c) => app.popup_input.insert(c),
            _ => {}
        },
    }
}

fn handle_paste(app: &mut App, text: &str) {
    match app.popup {
        Some(Popup::Attach) | Some(Popup::EditSetting(_)) => {
            app.popup_input.insert_str(text.trim_end_matches(['\r', '\n']))
        }
        Some(_) => {}
        None if app.on_chat() => app.input.insert_str(&text.replace("\r\n", "\n")),
        None => {}
    }
}

fn submit_input(app: &mut App) {
    if let Some(parsed) = commands::parse(&app.input.text) {
        app.input.clear();
        match parsed {
            Ok(command) => run_command(app, command),
            Err(message) => app.notices.error(message),
        }
        return;
    }

    match app.composer.begin(&app.input.text) {
        Submission::Ignored | Submission::Rejected => {}
        Submission::Started(pending) => {
            app.input.clear();
            app.follow_bottom = true;
            tokio::spawn(async move {
                pending.run().await;
            });
        }
    }
}

fn run_command(app: &mut App, command: SlashCommand) {
    tracing::debug!(?command, "slash command");
    match command {
        SlashCommand::Attach(path) => attach(app, path),
        SlashCommand::Detach(n) => {
            let files = app.chat.pending_files();
            match files.get(n - 1) {
                Some(file) => {
                    app.composer.remove_file(file.uid);
                    app.notices.info(format!("Removed \"{}\"", file.name));
                }
                None => app.notices.error(format!("No pending file {}", n)),
            }
        }
        SlashCommand::Export => {
            app.toolbar.export();
        }
        SlashCommand::Clear => {
            app.toolbar.clear();
        }
        SlashCommand::Copy(n) => copy_code(app, n),
        SlashCommand::Template(None) => app.open_popup(Popup::Templates, ""),
        SlashCommand::Template(Some(name)) => match find_template(&name) {
            Some(template) => {
                app.composer.apply_template(template.prompt);
            }
            None => app.notices.error(format!("No template named \"{}\"", name)),
        },
        SlashCommand::Help => app.open_popup(Popup::Help, ""),
    }
}

/// Upload in the background; the outcome arrives as a notice.
fn attach(app: &mut App, path: PathBuf) {
    let composer = app.composer.clone();
    tokio::spawn(async move {
        composer.upload_file(&path).await;
    });
}

fn save_setting(app: &mut App, field: seekchat_core::SettingField, value: &str) {
    let result = field
        .to_patch(value)
        .and_then(|patch| app.settings.patch(patch));
    match result {
        Ok(()) => app.notices.success(format!("{} saved", field.label())),
        Err(e) => {
            tracing::warn!(field = field.label(), error = %e, "settings update rejected");
            app.notices.error(e.to_string());
        }
    }
}

/// Copy code block `n` (one-based), or the last one.
fn copy_code(app: &mut App, n: Option<usize>) {
    let blocks = app.code_blocks();
    let index = match n {
        Some(n) => n - 1,
        None if blocks.is_empty() => {
            app.notices.info("No code blocks to copy");
            return;
        }
        None => blocks.len() - 1,
    };
    let Some(block) = blocks.get(index) else {
        app.notices.error(format!("No code block {}", index + 1));
        return;
    };
    clipboard::copy_block(
        app.clipboard.as_mut(),
        &app.notices,
        &mut app.copy_indicator,
        index,
        &block.code,
    );
}

fn open_usage_page(app: &App) {
    if let Err(e) = open_url(USAGE_URL) {
        tracing::warn!(error = %e, "could not open browser");
        app.notices.info(format!("Open {} in your browser", USAGE_URL));
    }
}

fn open_url(url: &str) -> std::io::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        Command::new("xdg-open")
    };
    command
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let (x, y) = (mouse.column, mouse.row);
    let in_chat = app.chat_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_balance = app.balance_area.is_some_and(|r| point_in_rect(x, y, r));

    match mouse.kind {
        MouseEventKind::ScrollDown if in_chat => app.scroll_down(SCROLL_STEP),
        MouseEventKind::ScrollUp if in_chat => app.scroll_up(SCROLL_STEP),
        MouseEventKind::Down(MouseButton::Left) if in_balance => open_usage_page(app),
        _ => {}
    }
}
