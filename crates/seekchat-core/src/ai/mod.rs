//! Seams to the remote API, plus the DeepSeek implementation.
//!
//! The send flow, upload gating and balance poller only see these traits, so
//! they can be driven by in-memory fakes.

pub mod deepseek;

pub use deepseek::DeepSeekClient;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::config::Settings;
use crate::error::ApiError;
use crate::state::ChatMessage;

/// Receives incremental text while a completion streams in.
pub trait StreamSink: Send {
    fn on_content(&mut self, text: &str);
    fn on_reasoning(&mut self, text: &str);
}

/// Final result of a streamed completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub reasoning_content: String,
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        settings: &Settings,
        api_key: &str,
        sink: &mut dyn StreamSink,
    ) -> Result<Completion, ApiError>;
}

#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        settings: &Settings,
        api_key: &str,
    ) -> Result<UploadResponse, ApiError>;
}

#[async_trait]
pub trait BalanceQuery: Send + Sync {
    async fn balance(&self, settings: &Settings, api_key: &str) -> Result<BalanceResponse, ApiError>;
}

/// `code == 0` signals success.
pub const UPLOAD_OK: i64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    pub code: i64,
    #[serde(default)]
    pub data: Option<UploadData>,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadData {
    #[serde(default)]
    pub biz_data: Option<BizData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BizData {
    pub id: String,
}

impl UploadResponse {
    /// The uploaded file id, only for a successful response.
    pub fn file_id(&self) -> Option<&str> {
        if self.code != UPLOAD_OK {
            return None;
        }
        self.data
            .as_ref()
            .and_then(|d| d.biz_data.as_ref())
            .map(|b| b.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BalanceResponse {
    pub is_available: bool,
    #[serde(default)]
    pub balance_infos: Vec<BalanceInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BalanceInfo {
    pub currency: String,
    #[serde(deserialize_with = "amount")]
    pub total_balance: f64,
    #[serde(deserialize_with = "amount")]
    pub granted_balance: f64,
    #[serde(deserialize_with = "amount")]
    pub topped_up_balance: f64,
}

/// Amounts come back as decimal strings ("110.00"); accept plain numbers too.
fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
