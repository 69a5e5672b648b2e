//! The chat input: sending messages, attaching files, applying templates.

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::ai::{ChatCompletion, FileUploader, StreamSink};
use crate::config::Settings;
use crate::notice::NoticeBoard;
use crate::settings::{SettingsPatch, SettingsStore};
use crate::state::{ChatMessage, PendingFile};
use crate::store::ChatStore;
use crate::stream::{StreamBuffer, StreamChannel, StreamDelta};

/// Uploads must be strictly smaller than this.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const MSG_NO_CREDENTIAL: &str = "Set an API key first";
pub const MSG_FILE_TOO_LARGE: &str = "File must be smaller than 10MB";
pub const MSG_SEND_FAILED: &str = "Failed to send message, please retry";
pub const MSG_UPLOAD_FAILED: &str = "File upload failed";
pub const MSG_TEMPLATE_APPLIED: &str = "Template applied, conversation reset";
pub const MSG_TEMPLATE_NOT_SAVED: &str = "Template applied, but settings could not be saved";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty input or a request already in flight. Nothing happened.
    Ignored,
    /// No credential. A notice was shown, nothing was appended.
    Rejected,
    Sent,
    Failed,
}

/// Result of the synchronous half of a send.
pub enum Submission {
    Ignored,
    Rejected,
    Started(PendingSend),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRejection {
    NoCredential,
    TooLarge,
    Unreadable,
    /// The service answered with a non-ok code.
    Refused,
    /// Transport or decoding failure.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Accepted(PendingFile),
    Rejected(UploadRejection),
}

#[derive(Clone)]
pub struct Composer {
    chat: ChatStore,
    settings: SettingsStore,
    notices: NoticeBoard,
    completion: Arc<dyn ChatCompletion>,
    uploader: Arc<dyn FileUploader>,
}

impl Composer {
    pub fn new(
        chat: ChatStore,
        settings: SettingsStore,
        notices: NoticeBoard,
        completion: Arc<dyn ChatCompletion>,
        uploader: Arc<dyn FileUploader>,
    ) -> Self {
        Self {
            chat,
            settings,
            notices,
            completion,
            uploader,
        }
    }

    /// Validate and stage a send: appends the user message and claims the
    /// in-flight slot. The network half runs in [`PendingSend::run`].
    pub fn begin(&self, text: &str) -> Submission {
        let content = text.trim();
        if content.is_empty() || self.chat.is_loading() {
            return Submission::Ignored;
        }

        let settings = self.settings.get();
        let Some(api_key) = settings.credential().map(str::to_string) else {
            self.notices.error(MSG_NO_CREDENTIAL);
            return Submission::Rejected;
        };

        let history = self.chat.messages();
        if !self.chat.try_begin_request() {
            return Submission::Ignored;
        }

        let user_message = ChatMessage::user(content);
        self.chat.add_message(user_message.clone());

        let outbound = build_outbound(&settings, history, user_message);
        tracing::info!(messages = outbound.len(), model = %settings.model, "sending chat request");

        Submission::Started(PendingSend {
            chat: self.chat.clone(),
            notices: self.notices.clone(),
            completion: Arc::clone(&self.completion),
            settings,
            api_key,
            outbound,
        })
    }

    /// Send and wait for the full response.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        match self.begin(text) {
            Submission::Ignored => SubmitOutcome::Ignored,
            Submission::Rejected => SubmitOutcome::Rejected,
            Submission::Started(pending) => pending.run().await,
        }
    }

    /// Gate and upload a file, adding it to the pending list on success.
    pub async fn upload_file(&self, path: &Path) -> UploadOutcome {
        let settings = self.settings.get();
        let Some(api_key) = settings.credential().map(str::to_string) else {
            self.notices.error(MSG_NO_CREDENTIAL);
            return UploadOutcome::Rejected(UploadRejection::NoCredential);
        };

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => {
                self.notices.error(format!("{} is not a file", path.display()));
                return UploadOutcome::Rejected(UploadRejection::Unreadable);
            }
            Err(e) => {
                self.notices.error(format!("Cannot read {}: {}", path.display(), e));
                return UploadOutcome::Rejected(UploadRejection::Unreadable);
            }
        };

        if metadata.len() >= MAX_UPLOAD_BYTES {
            self.notices.error(MSG_FILE_TOO_LARGE);
            return UploadOutcome::Rejected(UploadRejection::TooLarge);
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.notices.error(format!("Cannot read {}: {}", path.display(), e));
                return UploadOutcome::Rejected(UploadRejection::Unreadable);
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match self.uploader.upload(&name, bytes, &settings, &api_key).await {
            Ok(response) => {
                if let Some(id) = response.file_id().map(str::to_string) {
                    tracing::info!(file = %name, file_id = %id, "file uploaded");
                    let file = PendingFile::new(name.clone(), id);
                    self.chat.add_pending_file(file.clone());
                    self.notices.success(format!("File \"{}\" uploaded", name));
                    UploadOutcome::Accepted(file)
                } else {
                    tracing::warn!(file = %name, code = response.code, "upload refused");
                    let message = response
                        .msg
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| MSG_UPLOAD_FAILED.to_string());
                    self.notices.error(message);
                    UploadOutcome::Rejected(UploadRejection::Refused)
                }
            }
            Err(e) => {
                tracing::error!(file = %name, error = %e, "upload failed");
                self.notices
                    .error(e.description().unwrap_or_else(|| MSG_UPLOAD_FAILED.to_string()));
                UploadOutcome::Rejected(UploadRejection::Failed)
            }
        }
    }

    /// Drop a file from the pending list. Local only; the uploaded copy stays
    /// on the server.
    pub fn remove_file(&self, uid: Uuid) -> bool {
        self.chat.remove_pending_file(uid)
    }

    /// Replace the system prompt and start a fresh conversation. Ignored while
    /// a request is in flight.
    pub fn apply_template(&self, prompt: &str) -> bool {
        if self.chat.is_loading() {
            return false;
        }
        let patch = SettingsPatch {
            system_prompt: Some(prompt.to_string()),
            ..SettingsPatch::default()
        };
        let saved = self.settings.patch(patch);
        self.chat.clear_messages();
        match saved {
            Ok(()) => self.notices.success(MSG_TEMPLATE_APPLIED),
            Err(e) => {
                tracing::warn!(error = %e, "could not persist template");
                self.notices.error(format!("{}: {}", MSG_TEMPLATE_NOT_SAVED, e));
            }
        }
        true
    }
}

/// Optional system prompt, then prior history, then the new message.
fn build_outbound(settings: &Settings, history: Vec<ChatMessage>, user: ChatMessage) -> Vec<ChatMessage> {
    let mut outbound = Vec::with_capacity(history.len() + 2);
    if !settings.system_prompt.trim().is_empty() {
        outbound.push(ChatMessage::system(settings.system_prompt.clone()));
    }
    outbound.extend(history);
    outbound.push(user);
    outbound
}

/// Folds streamed fragments and republishes the running buffers.
struct StoreSink {
    chat: ChatStore,
    buffer: StreamBuffer,
}

impl StoreSink {
    fn push(&mut self, delta: StreamDelta) {
        match self.buffer.apply(delta) {
            StreamChannel::Content => {
                self.chat
                    .set_streaming_content(Some(self.buffer.content().to_string()));
            }
            StreamChannel::Reasoning => {
                self.chat
                    .set_streaming_reasoning(Some(self.buffer.reasoning().to_string()));
            }
        }
    }
}

impl StreamSink for StoreSink {
    fn on_content(&mut self, text: &str) {
        self.push(StreamDelta::Content(text.to_string()));
    }

    fn on_reasoning(&mut self, text: &str) {
        self.push(StreamDelta::Reasoning(text.to_string()));
    }
}

/// A staged send whose request has not been issued yet.
pub struct PendingSend {
    chat: ChatStore,
    notices: NoticeBoard,
    completion: Arc<dyn ChatCompletion>,
    settings: Settings,
    api_key: String,
    outbound: Vec<ChatMessage>,
}

impl PendingSend {
    pub async fn run(self) -> SubmitOutcome {
        let mut sink = StoreSink {
            chat: self.chat.clone(),
            buffer: StreamBuffer::new(),
        };
        sink.buffer.reset();

        let result = self
            .completion
            .complete(&self.outbound, &self.settings, &self.api_key, &mut sink)
            .await;
        let (streamed_content, streamed_reasoning) = sink.buffer.finalize();

        let outcome = match result {
            Ok(completion) => {
                // An adapter may return only what it streamed.
                let content = if completion.content.is_empty() {
                    streamed_content
                } else {
                    completion.content
                };
                let reasoning = if completion.reasoning_content.is_empty() {
                    streamed_reasoning
                } else {
                    completion.reasoning_content
                };
                self.chat.add_message(ChatMessage::assistant(content, reasoning));
                self.chat.clear_pending_files();
                SubmitOutcome::Sent
            }
            Err(e) => {
                tracing::error!(error = %e, "chat request failed");
                self.notices
                    .error(e.description().unwrap_or_else(|| MSG_SEND_FAILED.to_string()));
                SubmitOutcome::Failed
            }
        };

        self.chat.finish_request();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Completion, UploadResponse};
    use crate::notice::NoticeLevel;
    use crate::state::ChatRole;
    use crate::testing::{FakeCompletion, FakeUploader};
    use std::fs::File;
    use tempfile::tempdir;

    fn settings_with_key(prompt: &str) -> SettingsStore {
        SettingsStore::new(Settings {
            api_key: Some("sk-test".into()),
            system_prompt: prompt.into(),
            ..Settings::default()
        })
    }

    fn composer(
        settings: SettingsStore,
        completion: Arc<FakeCompletion>,
        uploader: Arc<FakeUploader>,
    ) -> (Composer, ChatStore, NoticeBoard) {
        let chat = completion.store();
        let notices = NoticeBoard::new();
        let composer = Composer::new(
            chat.clone(),
            settings,
            notices.clone(),
            completion,
            uploader,
        );
        (composer, chat, notices)
    }

    fn last_error(notices: &NoticeBoard) -> Option<String> {
        notices
            .snapshot()
            .into_iter()
            .rev()
            .find(|n| n.level == NoticeLevel::Error)
            .map(|n| n.text)
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_assistant() {
        let completion = Arc::new(FakeCompletion::streaming(
            vec![
                StreamDelta::Reasoning("consider".into()),
                StreamDelta::Content("Hi ".into()),
                StreamDelta::Content("there".into()),
            ],
            Ok(Completion {
                content: "Hi there".into(),
                reasoning_content: "consider".into(),
            }),
        ));
        let (composer, chat, _) = composer(settings_with_key(""), completion.clone(), Arc::new(FakeUploader::default()));

        let outcome = composer.submit("  hello  ").await;
        assert_eq!(outcome, SubmitOutcome::Sent);

        // The user message was in the store before the request went out.
        assert_eq!(completion.store_len_at_call(), Some(1));

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, "Hi there");
        assert_eq!(messages[1].reasoning_content.as_deref(), Some("consider"));

        // Running buffers were published while streaming, then cleared.
        assert_eq!(completion.streamed_content_seen(), vec!["Hi ".to_string(), "Hi there".to_string()]);
        assert!(!chat.is_loading());
        assert_eq!(chat.streaming_content(), None);
        assert_eq!(chat.streaming_reasoning(), None);
    }

    #[tokio::test]
    async fn test_outbound_prepends_system_prompt_and_history() {
        let completion = Arc::new(FakeCompletion::answering("ok"));
        let (composer, _, _) = composer(settings_with_key("Be terse."), completion.clone(), Arc::new(FakeUploader::default()));

        composer.submit("first").await;
        composer.submit("second").await;

        let sent = completion.last_request();
        let roles: Vec<_> = sent.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(sent[0].content, "Be terse.");
        assert_eq!(sent[3].content, "second");
    }

    #[tokio::test]
    async fn test_blank_system_prompt_is_omitted() {
        let completion = Arc::new(FakeCompletion::answering("ok"));
        let (composer, _, _) = composer(settings_with_key("   "), completion.clone(), Arc::new(FakeUploader::default()));
        composer.submit("hi").await;
        assert_eq!(completion.last_request().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_does_nothing() {
        let completion = Arc::new(FakeCompletion::answering("ok"));
        let (composer, chat, notices) = composer(settings_with_key(""), completion.clone(), Arc::new(FakeUploader::default()));

        assert_eq!(composer.submit("").await, SubmitOutcome::Ignored);
        assert_eq!(composer.submit(" \n\t ").await, SubmitOutcome::Ignored);
        assert_eq!(chat.message_count(), 0);
        assert_eq!(completion.calls(), 0);
        assert!(notices.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_submit_while_loading_is_ignored() {
        let completion = Arc::new(FakeCompletion::answering("ok"));
        let (composer, chat, _) = composer(settings_with_key(""), completion.clone(), Arc::new(FakeUploader::default()));

        let first = match composer.begin("one") {
            Submission::Started(p) => p,
            _ => panic!("first send should start"),
        };
        assert!(matches!(composer.begin("two"), Submission::Ignored));
        assert_eq!(chat.message_count(), 1);

        first.run().await;
        assert_eq!(completion.calls(), 1);
        assert_eq!(chat.message_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_credential_rejects_before_network() {
        let completion = Arc::new(FakeCompletion::answering("ok"));
        let settings = SettingsStore::new(Settings::default());
        let (composer, chat, notices) = composer(settings, completion.clone(), Arc::new(FakeUploader::default()));

        assert_eq!(composer.submit("hello").await, SubmitOutcome::Rejected);
        assert_eq!(chat.message_count(), 0);
        assert_eq!(completion.calls(), 0);
        assert_eq!(last_error(&notices).as_deref(), Some(MSG_NO_CREDENTIAL));
    }

    #[tokio::test]
    async fn test_failure_keeps_user_message_and_notifies() {
        let completion = Arc::new(FakeCompletion::failing(None));
        let (composer, chat, notices) = composer(settings_with_key(""), completion, Arc::new(FakeUploader::default()));
        chat.add_pending_file(PendingFile::new("notes.txt", "file-1"));

        assert_eq!(composer.submit("hello").await, SubmitOutcome::Failed);
        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(last_error(&notices).as_deref(), Some(MSG_SEND_FAILED));
        // Pending files survive a failed send.
        assert_eq!(chat.pending_files().len(), 1);
        assert!(!chat.is_loading());
        assert_eq!(chat.streaming_content(), None);
    }

    #[tokio::test]
    async fn test_described_failure_uses_service_message() {
        let completion = Arc::new(FakeCompletion::failing(Some("Insufficient balance")));
        let (composer, _, notices) = composer(settings_with_key(""), completion, Arc::new(FakeUploader::default()));
        composer.submit("hello").await;
        assert_eq!(last_error(&notices).as_deref(), Some("Insufficient balance"));
    }

    #[tokio::test]
    async fn test_successful_send_clears_pending_files() {
        let completion = Arc::new(FakeCompletion::answering("ok"));
        let (composer, chat, _) = composer(settings_with_key(""), completion, Arc::new(FakeUploader::default()));
        chat.add_pending_file(PendingFile::new("notes.txt", "file-1"));

        composer.submit("summarize").await;
        assert!(chat.pending_files().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_large_file_before_network() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.bin");
        File::create(&path).unwrap().set_len(MAX_UPLOAD_BYTES).unwrap();

        let uploader = Arc::new(FakeUploader::default());
        let (composer, chat, notices) =
            composer(settings_with_key(""), Arc::new(FakeCompletion::answering("ok")), uploader.clone());

        let outcome = composer.upload_file(&path).await;
        assert_eq!(outcome, UploadOutcome::Rejected(UploadRejection::TooLarge));
        assert_eq!(uploader.calls(), 0);
        assert!(chat.pending_files().is_empty());
        assert_eq!(last_error(&notices).as_deref(), Some(MSG_FILE_TOO_LARGE));
    }

    #[tokio::test]
    async fn test_upload_without_credential_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.txt");
        std::fs::write(&path, "hello").unwrap();

        let uploader = Arc::new(FakeUploader::default());
        let settings = SettingsStore::new(Settings::default());
        let (composer, _, notices) =
            composer(settings, Arc::new(FakeCompletion::answering("ok")), uploader.clone());

        let outcome = composer.upload_file(&path).await;
        assert_eq!(outcome, UploadOutcome::Rejected(UploadRejection::NoCredential));
        assert_eq!(uploader.calls(), 0);
        assert_eq!(last_error(&notices).as_deref(), Some(MSG_NO_CREDENTIAL));
    }

    #[tokio::test]
    async fn test_upload_success_records_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let uploader = Arc::new(FakeUploader::responding(Ok(UploadResponse {
            code: 0,
            data: Some(crate::ai::UploadData {
                biz_data: Some(crate::ai::BizData { id: "file-9".into() }),
            }),
            msg: None,
        })));
        let (composer, chat, notices) =
            composer(settings_with_key(""), Arc::new(FakeCompletion::answering("ok")), uploader.clone());

        let outcome = composer.upload_file(&path).await;
        let UploadOutcome::Accepted(file) = outcome else {
            panic!("upload should be accepted");
        };
        assert_eq!(file.file_id, "file-9");
        assert_eq!(file.name, "notes.txt");
        assert_eq!(uploader.last_bytes(), Some(b"hello".to_vec()));
        assert_eq!(chat.pending_files(), vec![file.clone()]);
        assert_eq!(notices.snapshot()[0].text, "File \"notes.txt\" uploaded");

        assert!(composer.remove_file(file.uid));
        assert!(chat.pending_files().is_empty());
        // Removal is local only.
        assert_eq!(uploader.calls(), 1);
    }

    #[tokio::test]
    async fn test_upload_refused_shows_service_message() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let uploader = Arc::new(FakeUploader::responding(Ok(UploadResponse {
            code: 40001,
            data: None,
            msg: Some("unsupported file type".into()),
        })));
        let (composer, chat, notices) =
            composer(settings_with_key(""), Arc::new(FakeCompletion::answering("ok")), uploader);

        let outcome = composer.upload_file(&path).await;
        assert_eq!(outcome, UploadOutcome::Rejected(UploadRejection::Refused));
        assert!(chat.pending_files().is_empty());
        assert_eq!(last_error(&notices).as_deref(), Some("unsupported file type"));
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let uploader = Arc::new(FakeUploader::default());
        let (composer, _, _) =
            composer(settings_with_key(""), Arc::new(FakeCompletion::answering("ok")), uploader.clone());
        let outcome = composer.upload_file(&dir.path().join("missing.txt")).await;
        assert_eq!(outcome, UploadOutcome::Rejected(UploadRejection::Unreadable));
        assert_eq!(uploader.calls(), 0);
    }

    #[tokio::test]
    async fn test_apply_template_resets_conversation() {
        let settings = settings_with_key("");
        let (composer, chat, notices) = composer(
            settings.clone(),
            Arc::new(FakeCompletion::answering("ok")),
            Arc::new(FakeUploader::default()),
        );
        chat.add_message(ChatMessage::user("old"));

        assert!(composer.apply_template("You are a poet."));
        assert_eq!(settings.get().system_prompt, "You are a poet.");
        assert!(chat.is_empty());
        assert_eq!(notices.snapshot()[0].text, MSG_TEMPLATE_APPLIED);
    }

    #[tokio::test]
    async fn test_apply_template_ignored_while_loading() {
        let settings = settings_with_key("keep");
        let (composer, chat, _) = composer(
            settings.clone(),
            Arc::new(FakeCompletion::answering("ok")),
            Arc::new(FakeUploader::default()),
        );
        assert!(chat.try_begin_request());
        assert!(!composer.apply_template("replace"));
        assert_eq!(settings.get().system_prompt, "keep");
    }

    #[tokio::test]
    async fn test_apply_template_reports_unsaved_settings() {
        let dir = tempdir().unwrap();
        // The config path is a directory, so the write fails.
        let settings = SettingsStore::with_path(
            Settings {
                api_key: Some("sk-test".into()),
                ..Settings::default()
            },
            dir.path().to_path_buf(),
            None,
        );
        let (composer, chat, notices) = composer(
            settings.clone(),
            Arc::new(FakeCompletion::answering("ok")),
            Arc::new(FakeUploader::default()),
        );
        chat.add_message(ChatMessage::user("old"));

        assert!(composer.apply_template("You are a poet."));
        assert_eq!(settings.get().system_prompt, "You are a poet.");
        assert!(chat.is_empty());

        let shown = notices.snapshot();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].level, NoticeLevel::Error);
        assert!(shown[0].text.starts_with(MSG_TEMPLATE_NOT_SAVED));
    }

    #[tokio::test]
    async fn test_streamed_text_used_when_completion_is_empty() {
        let completion = Arc::new(FakeCompletion::streaming(
            vec![
                StreamDelta::Reasoning("hmm".into()),
                StreamDelta::Content("Hel".into()),
                StreamDelta::Content("lo".into()),
            ],
            Ok(Completion::default()),
        ));
        let (composer, chat, _) =
            composer(settings_with_key(""), completion, Arc::new(FakeUploader::default()));

        assert_eq!(composer.submit("hi").await, SubmitOutcome::Sent);
        let messages = chat.messages();
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, "Hello");
        assert_eq!(messages[1].reasoning_content.as_deref(), Some("hmm"));
    }
}
