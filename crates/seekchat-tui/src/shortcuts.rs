use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Chat-screen key bindings. Only these two combinations are claimed; every
/// other key falls through to the input box. Enter sends unless Shift or Alt
/// is held; Alt+Enter is the newline key on terminals that cannot report
/// Shift+Enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Send,
    Clear,
}

pub fn match_shortcut(key: &KeyEvent) -> Option<Shortcut> {
    match key.code {
        KeyCode::Enter if !key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) => {
            Some(Shortcut::Send)
        }
        KeyCode::Char('k') | KeyCode::Char('K')
            if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER) =>
        {
            Some(Shortcut::Clear)
        }
        _ => None,
    }
}
