//! Conversation toolbar actions: export to JSON and clear.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;

use crate::notice::NoticeBoard;
use crate::settings::SettingsStore;
use crate::state::ChatMessage;
use crate::store::ChatStore;

pub const MSG_EXPORTED: &str = "Export succeeded";
pub const MSG_EXPORT_FAILED: &str = "Export failed";
pub const MSG_CLEARED: &str = "Conversation cleared";

#[derive(Serialize)]
struct ExportEntry<'a> {
    role: &'static str,
    content: &'a str,
    time: String,
}

/// Pretty JSON array of `{role, content, time}` with local, human-readable
/// times.
pub fn export_json(messages: &[ChatMessage]) -> Result<String> {
    let entries: Vec<ExportEntry> = messages
        .iter()
        .map(|m| ExportEntry {
            role: m.role.as_str(),
            content: &m.content,
            time: m
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("chat-history-{}.json", date.format("%Y-%m-%d"))
}

/// Write the export into `dir`, named by today's (UTC) date.
pub fn export_to(dir: &Path, messages: &[ChatMessage]) -> Result<PathBuf> {
    let json = export_json(messages)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating export directory {}", dir.display()))?;
    let path = dir.join(export_file_name(Utc::now().date_naive()));
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[derive(Debug, Clone)]
pub struct ChatToolbar {
    chat: ChatStore,
    settings: SettingsStore,
    notices: NoticeBoard,
}

impl ChatToolbar {
    pub fn new(chat: ChatStore, settings: SettingsStore, notices: NoticeBoard) -> Self {
        Self {
            chat,
            settings,
            notices,
        }
    }

    /// Both actions are unavailable on an empty conversation.
    pub fn can_act(&self) -> bool {
        !self.chat.is_empty()
    }

    fn export_dir(&self) -> PathBuf {
        self.settings
            .get()
            .export_dir
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn export(&self) -> Option<PathBuf> {
        let messages = self.chat.messages();
        if messages.is_empty() {
            return None;
        }
        match export_to(&self.export_dir(), &messages) {
            Ok(path) => {
                tracing::info!(path = %path.display(), count = messages.len(), "conversation exported");
                self.notices
                    .success(format!("{}: {}", MSG_EXPORTED, path.display()));
                Some(path)
            }
            Err(e) => {
                tracing::error!(error = ?e, "export failed");
                self.notices.error(MSG_EXPORT_FAILED);
                None
            }
        }
    }

    /// Empty the conversation. A no-op, without notice, when already empty.
    pub fn clear(&self) -> bool {
        if self.chat.is_empty() {
            return false;
        }
        self.chat.clear_messages();
        self.notices.success(MSG_CLEARED);
        true
    }
}
