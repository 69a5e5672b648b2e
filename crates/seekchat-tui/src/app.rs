use std::sync::Arc;
use std::time::Instant;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use seekchat_core::ai::{BalanceQuery, ChatCompletion, FileUploader};
use seekchat_core::nav::{self, Route};
use seekchat_core::{
    BalanceMonitor, ChatRole, ChatStore, ChatToolbar, Composer, DeepSeekClient, NoticeBoard,
    SettingField, SettingsStore,
};

use crate::clipboard::{Clipboard, CopyIndicator, SystemClipboard};
use crate::markdown::{self, CodeBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    /// Path prompt for a file upload.
    Attach,
    EditSetting(SettingField),
    Templates,
    Help,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// A single-line or multi-line text field with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub text: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn with_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self { text, cursor }
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert_str(byte_pos, s);
        self.cursor += s.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }
}

pub struct App {
    pub should_quit: bool,
    pub path: String,

    // Chat screen
    pub input: TextInput,
    pub chat_scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16,
    pub chat_width: u16,
    pub copy_indicator: CopyIndicator,
    pub animation_frame: u8,

    // Popups
    pub popup: Option<Popup>,
    pub popup_input: TextInput,
    pub template_state: ListState,

    // Settings screen
    pub settings_state: ListState,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub balance_area: Option<Rect>,

    // Shared state and services
    pub chat: ChatStore,
    pub settings: SettingsStore,
    pub notices: NoticeBoard,
    pub composer: Composer,
    pub toolbar: ChatToolbar,
    pub balance: BalanceMonitor,
    pub clipboard: Box<dyn Clipboard>,
}

impl App {
    /// Wire the app to the DeepSeek API and the system clipboard.
    pub fn new(settings: SettingsStore) -> Self {
        let client = Arc::new(DeepSeekClient::new());
        Self::with_backends(
            settings,
            client.clone(),
            client.clone(),
            client,
            Box::new(SystemClipboard::default()),
        )
    }

    pub fn with_backends(
        settings: SettingsStore,
        completion: Arc<dyn ChatCompletion>,
        uploader: Arc<dyn FileUploader>,
        balance: Arc<dyn BalanceQuery>,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        let chat = ChatStore::new();
        let notices = NoticeBoard::new();
        let composer = Composer::new(
            chat.clone(),
            settings.clone(),
            notices.clone(),
            completion,
            uploader,
        );
        let toolbar = ChatToolbar::new(chat.clone(), settings.clone(), notices.clone());
        let balance = BalanceMonitor::spawn(balance, settings.clone());

        let mut settings_state = ListState::default();
        settings_state.select(Some(0));
        let mut template_state = ListState::default();
        template_state.select(Some(0));

        Self {
            should_quit: false,
            path: nav::CHAT.key.to_string(),

            input: TextInput::default(),
            chat_scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_width: 0,
            copy_indicator: CopyIndicator::default(),
            animation_frame: 0,

            popup: None,
            popup_input: TextInput::default(),
            template_state,

            settings_state,

            chat_area: None,
            balance_area: None,

            chat,
            settings,
            notices,
            composer,
            toolbar,
            balance,
            clipboard,
        }
    }

    pub fn route(&self) -> &str {
        nav::selected_key(&self.path)
    }

    pub fn on_chat(&self) -> bool {
        self.route() == nav::CHAT.key
    }

    pub fn navigate(&mut self, route: Route) {
        tracing::debug!(from = %self.path, to = route.key, "navigate");
        self.path = route.key.to_string();
        self.popup = None;
    }

    pub fn next_route(&mut self) {
        let next = nav::next_route(&self.path);
        self.navigate(next);
    }

    pub fn open_popup(&mut self, popup: Popup, initial: &str) {
        self.popup = Some(popup);
        self.popup_input = TextInput::with_text(initial);
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
        self.popup_input.clear();
    }

    pub fn selected_setting(&self) -> SettingField {
        let fields = SettingField::all();
        let i = self.settings_state.selected().unwrap_or(0).min(fields.len() - 1);
        fields[i]
    }

    pub fn settings_down(&mut self) {
        let len = SettingField::all().len();
        let i = self.settings_state.selected().unwrap_or(0);
        self.settings_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn settings_up(&mut self) {
        let i = self.settings_state.selected().unwrap_or(0);
        self.settings_state.select(Some(i.saturating_sub(1)));
    }

    pub fn templates_down(&mut self) {
        let len = seekchat_core::templates::templates().len();
        let i = self.template_state.selected().unwrap_or(0);
        self.template_state.select(Some((i + 1).min(len.saturating_sub(1))));
    }

    pub fn templates_up(&mut self) {
        let i = self.template_state.selected().unwrap_or(0);
        self.template_state.select(Some(i.saturating_sub(1)));
    }

    /// Copyable blocks of every assistant message, in display order.
    pub fn code_blocks(&self) -> Vec<CodeBlock> {
        self.chat
            .messages()
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .flat_map(|m| markdown::code_blocks(&m.content))
            .collect()
    }

    pub fn on_tick(&mut self) {
        if self.chat.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.copy_indicator.expire(Instant::now());
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    /// Clamp the scroll position to `total` rendered lines, pinning to the
    /// bottom while following.
    pub fn settle_scroll(&mut self, total: u16) {
        let max = total.saturating_sub(self.chat_height);
        if self.follow_bottom || self.chat_scroll >= max {
            self.chat_scroll = max;
            self.follow_bottom = true;
        }
    }
}
