//! In-memory fakes for the API seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::ai::{
    BalanceQuery, BalanceResponse, BizData, ChatCompletion, Completion, FileUploader, StreamSink,
    UploadData, UploadResponse,
};
use crate::config::Settings;
use crate::error::ApiError;
use crate::state::ChatMessage;
use crate::store::ChatStore;
use crate::stream::StreamDelta;

fn failure(description: &Option<String>) -> ApiError {
    match description {
        Some(message) => ApiError::Api(message.clone()),
        None => ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        },
    }
}

/// Replays fixed fragments, recording what it was asked and what the store
/// looked like while it ran.
pub struct FakeCompletion {
    store: ChatStore,
    deltas: Vec<StreamDelta>,
    result: Result<Completion, Option<String>>,
    calls: AtomicUsize,
    store_len_at_call: Mutex<Option<usize>>,
    streamed_content: Mutex<Vec<String>>,
    last_request: Mutex<Vec<ChatMessage>>,
}

impl FakeCompletion {
    pub fn streaming(deltas: Vec<StreamDelta>, result: Result<Completion, Option<String>>) -> Self {
        Self {
            store: ChatStore::new(),
            deltas,
            result,
            calls: AtomicUsize::new(0),
            store_len_at_call: Mutex::new(None),
            streamed_content: Mutex::new(Vec::new()),
            last_request: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::streaming(
            vec![StreamDelta::Content(text.to_string())],
            Ok(Completion {
                content: text.to_string(),
                reasoning_content: String::new(),
            }),
        )
    }

    pub fn failing(description: Option<&str>) -> Self {
        Self::streaming(Vec::new(), Err(description.map(str::to_string)))
    }

    pub fn store(&self) -> ChatStore {
        self.store.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn store_len_at_call(&self) -> Option<usize> {
        *self.store_len_at_call.lock().unwrap()
    }

    pub fn streamed_content_seen(&self) -> Vec<String> {
        self.streamed_content.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Vec<ChatMessage> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for FakeCompletion {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _settings: &Settings,
        _api_key: &str,
        sink: &mut dyn StreamSink,
    ) -> Result<Completion, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.store_len_at_call.lock().unwrap() = Some(self.store.message_count());
        *self.last_request.lock().unwrap() = messages.to_vec();

        for delta in &self.deltas {
            match delta {
                StreamDelta::Content(text) => {
                    sink.on_content(text);
                    if let Some(running) = self.store.streaming_content() {
                        self.streamed_content.lock().unwrap().push(running);
                    }
                }
                StreamDelta::Reasoning(text) => sink.on_reasoning(text),
            }
        }

        self.result.clone().map_err(|d| failure(&d))
    }
}

pub struct FakeUploader {
    result: Result<UploadResponse, Option<String>>,
    calls: AtomicUsize,
    last_bytes: Mutex<Option<Vec<u8>>>,
}

impl Default for FakeUploader {
    fn default() -> Self {
        Self::responding(Ok(UploadResponse {
            code: 0,
            data: Some(UploadData {
                biz_data: Some(BizData { id: "file-1".into() }),
            }),
            msg: None,
        }))
    }
}

impl FakeUploader {
    pub fn responding(result: Result<UploadResponse, Option<String>>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            last_bytes: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_bytes(&self) -> Option<Vec<u8>> {
        self.last_bytes.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileUploader for FakeUploader {
    async fn upload(
        &self,
        _file_name: &str,
        bytes: Vec<u8>,
        _settings: &Settings,
        _api_key: &str,
    ) -> Result<UploadResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_bytes.lock().unwrap() = Some(bytes);
        self.result.clone().map_err(|d| failure(&d))
    }
}

/// Returns a scripted balance and records the keys it was queried with.
pub struct FakeBalance {
    result: Mutex<Result<BalanceResponse, Option<String>>>,
    keys: Mutex<Vec<String>>,
}

impl FakeBalance {
    pub fn responding(result: Result<BalanceResponse, Option<String>>) -> Self {
        Self {
            result: Mutex::new(result),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn set_result(&self, result: Result<BalanceResponse, Option<String>>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl BalanceQuery for FakeBalance {
    async fn balance(&self, _settings: &Settings, api_key: &str) -> Result<BalanceResponse, ApiError> {
        self.keys.lock().unwrap().push(api_key.to_string());
        self.result.lock().unwrap().clone().map_err(|d| failure(&d))
    }
}
