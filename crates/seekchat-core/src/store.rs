//! Shared conversation store.
//!
//! Holds the append-only message list, the transient streaming slots, the
//! loading flag and the pending-file list. Every mutation bumps a revision
//! number published on a watch channel so views know when to redraw.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use crate::state::{ChatMessage, PendingFile};

#[derive(Debug, Default)]
struct ChatState {
    messages: Vec<ChatMessage>,
    streaming_content: Option<String>,
    streaming_reasoning: Option<String>,
    loading: bool,
    pending_files: Vec<PendingFile>,
}

/// Point-in-time copy of the store for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    pub messages: Vec<ChatMessage>,
    pub streaming_content: Option<String>,
    pub streaming_reasoning: Option<String>,
    pub loading: bool,
    pub pending_files: Vec<PendingFile>,
}

#[derive(Debug, Clone)]
pub struct ChatStore {
    state: Arc<Mutex<ChatState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(ChatState::default())),
            revision: Arc::new(tx),
        }
    }

    /// Receiver that changes whenever the store is mutated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Number of mutations so far.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> R {
        let result = {
            let mut state = self.lock();
            f(&mut state)
        };
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let state = self.lock();
        ChatSnapshot {
            messages: state.messages.clone(),
            streaming_content: state.streaming_content.clone(),
            streaming_reasoning: state.streaming_reasoning.clone(),
            loading: state.loading,
            pending_files: state.pending_files.clone(),
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    pub fn add_message(&self, message: ChatMessage) {
        self.mutate(|s| s.messages.push(message));
    }

    pub fn clear_messages(&self) {
        self.mutate(|s| s.messages.clear());
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Atomically claim the in-flight slot. Returns false when a request is
    /// already running, leaving the store untouched.
    pub fn try_begin_request(&self) -> bool {
        {
            let mut state = self.lock();
            if state.loading {
                return false;
            }
            state.loading = true;
            state.streaming_content = Some(String::new());
            state.streaming_reasoning = Some(String::new());
        }
        self.revision.send_modify(|rev| *rev += 1);
        true
    }

    /// Release the in-flight slot and drop both streaming buffers.
    pub fn finish_request(&self) {
        self.mutate(|s| {
            s.loading = false;
            s.streaming_content = None;
            s.streaming_reasoning = None;
        });
    }

    pub fn set_streaming_content(&self, text: Option<String>) {
        self.mutate(|s| s.streaming_content = text);
    }

    pub fn set_streaming_reasoning(&self, text: Option<String>) {
        self.mutate(|s| s.streaming_reasoning = text);
    }

    pub fn streaming_content(&self) -> Option<String> {
        self.lock().streaming_content.clone()
    }

    pub fn streaming_reasoning(&self) -> Option<String> {
        self.lock().streaming_reasoning.clone()
    }

    pub fn pending_files(&self) -> Vec<PendingFile> {
        self.lock().pending_files.clone()
    }

    pub fn add_pending_file(&self, file: PendingFile) {
        self.mutate(|s| s.pending_files.push(file));
    }

    /// Remove by unique key. Returns whether anything was removed.
    pub fn remove_pending_file(&self, uid: Uuid) -> bool {
        self.mutate(|s| {
            let before = s.pending_files.len();
            s.pending_files.retain(|f| f.uid != uid);
            s.pending_files.len() != before
        })
    }

    pub fn clear_pending_files(&self) {
        self.mutate(|s| s.pending_files.clear());
    }
}
