use std::time::{Duration, Instant};

use anyhow::Result;
use seekchat_core::NoticeBoard;

/// How long a copied block shows its "copied" label.
pub const COPIED_FOR: Duration = Duration::from_secs(2);

pub const MSG_COPIED: &str = "Code copied";
pub const MSG_COPY_FAILED: &str = "Copy failed";

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// The system clipboard. The handle is kept open so X11 selections survive
/// after the copy.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        if self.inner.is_none() {
            self.inner = Some(arboard::Clipboard::new()?);
        }
        if let Some(clipboard) = self.inner.as_mut() {
            clipboard.set_text(text.to_string())?;
        }
        Ok(())
    }
}

/// Which code block, if any, is showing "copied", and until when.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyIndicator {
    active: Option<(usize, Instant)>,
}

impl CopyIndicator {
    pub fn mark(&mut self, block: usize, now: Instant) {
        self.active = Some((block, now + COPIED_FOR));
    }

    pub fn copied(&self, now: Instant) -> Option<usize> {
        self.active
            .filter(|(_, deadline)| now < *deadline)
            .map(|(block, _)| block)
    }

    /// Drop an expired mark. Returns true when the display needs a redraw.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.active {
            Some((_, deadline)) if now >= deadline => {
                self.active = None;
                true
            }
            _ => false,
        }
    }
}

/// Copy one code block's text, reporting the result as a notice.
pub fn copy_block(
    clipboard: &mut dyn Clipboard,
    notices: &NoticeBoard,
    indicator: &mut CopyIndicator,
    block: usize,
    code: &str,
) -> bool {
    match clipboard.set_text(code) {
        Ok(()) => {
            indicator.mark(block, Instant::now());
            notices.success(MSG_COPIED);
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "clipboard write failed");
            notices.error(MSG_COPY_FAILED);
            false
        }
    }
}
