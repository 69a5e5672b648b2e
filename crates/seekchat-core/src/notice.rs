//! Transient user-facing notifications ("toasts").

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// How long a notice stays visible.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

const MAX_NOTICES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub created: Instant,
}

/// Shared queue of notices. Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    inner: Arc<Mutex<VecDeque<Notice>>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, text: impl Into<String>) {
        self.push(NoticeLevel::Success, text.into());
    }

    pub fn info(&self, text: impl Into<String>) {
        self.push(NoticeLevel::Info, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(NoticeLevel::Error, text.into());
    }

    fn push(&self, level: NoticeLevel, text: String) {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back(Notice {
            level,
            text,
            created: Instant::now(),
        });
        while queue.len() > MAX_NOTICES {
            queue.pop_front();
        }
    }

    /// Drop expired notices and return the ones still visible, oldest first.
    pub fn active(&self, now: Instant) -> Vec<Notice> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.retain(|n| now.saturating_duration_since(n.created) < NOTICE_TTL);
        queue.iter().cloned().collect()
    }

    /// Every notice currently queued, expired or not.
    pub fn snapshot(&self) -> Vec<Notice> {
        let queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.iter().cloned().collect()
    }
}
