use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    BalanceQuery, BalanceResponse, ChatCompletion, Completion, FileUploader, StreamSink,
    UploadResponse,
};
use crate::config::Settings;
use crate::error::ApiError;
use crate::state::ChatMessage;

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkError {
    message: String,
}

#[derive(Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

/// One decoded `data:` payload from the event stream.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseFrame {
    Delta {
        content: Option<String>,
        reasoning: Option<String>,
    },
    Done,
}

pub(crate) fn parse_sse_data(data: &str) -> Result<SseFrame, ApiError> {
    if data == "[DONE]" {
        return Ok(SseFrame::Done);
    }
    let chunk: Chunk = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        return Err(ApiError::Api(error.message));
    }
    let (content, reasoning) = chunk
        .choices
        .into_iter()
        .next()
        .map(|c| (c.delta.content, c.delta.reasoning_content))
        .unwrap_or((None, None));
    Ok(SseFrame::Delta {
        content: content.filter(|s| !s.is_empty()),
        reasoning: reasoning.filter(|s| !s.is_empty()),
    })
}

/// Splits a byte stream into the payloads of `data:` lines. Comments
/// (keep-alives) and other fields are dropped.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(data) = data_payload(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Whatever is left once the connection closes without a final newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\n', '\r']);
    text.strip_prefix("data:").map(|d| d.trim().to_string())
}

/// Client for the DeepSeek HTTP API. Endpoints come from [`Settings`] on
/// every call so edits on the settings screen apply immediately.
#[derive(Clone, Default)]
pub struct DeepSeekClient {
    client: Client,
}

impl DeepSeekClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn url(settings: &Settings, path: &str) -> String {
        format!("{}{}", settings.base_url.trim_end_matches('/'), path)
    }
}

fn apply_frame(frame: SseFrame, completion: &mut Completion, sink: &mut dyn StreamSink) -> bool {
    match frame {
        SseFrame::Done => true,
        SseFrame::Delta { content, reasoning } => {
            if let Some(text) = reasoning {
                completion.reasoning_content.push_str(&text);
                sink.on_reasoning(&text);
            }
            if let Some(text) = content {
                completion.content.push_str(&text);
                sink.on_content(&text);
            }
            false
        }
    }
}

#[async_trait]
impl ChatCompletion for DeepSeekClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        settings: &Settings,
        api_key: &str,
        sink: &mut dyn StreamSink,
    ) -> Result<Completion, ApiError> {
        let request = ChatRequest {
            model: &settings.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: true,
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
        };

        let response = self
            .client
            .post(Self::url(settings, "/chat/completions"))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, text));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut completion = Completion::default();

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for data in decoder.push(&chunk) {
                if apply_frame(parse_sse_data(&data)?, &mut completion, sink) {
                    break 'read;
                }
            }
        }
        if let Some(data) = decoder.finish() {
            apply_frame(parse_sse_data(&data)?, &mut completion, sink);
        }

        tracing::debug!(
            content_len = completion.content.len(),
            reasoning_len = completion.reasoning_content.len(),
            "completion finished"
        );
        Ok(completion)
    }
}

#[async_trait]
impl FileUploader for DeepSeekClient {
    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        settings: &Settings,
        api_key: &str,
    ) -> Result<UploadResponse, ApiError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&settings.upload_url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, text));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl BalanceQuery for DeepSeekClient {
    async fn balance(&self, settings: &Settings, api_key: &str) -> Result<BalanceResponse, ApiError> {
        let response = self
            .client
            .get(Self::url(settings, "/user/balance"))
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, text));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        let payloads = decoder.push(b":1}\r\n\r\n: keep-alive\n\ndata: [DONE]\n");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decoder_flushes_unterminated_line() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("[DONE]"));
    }

    #[test]
    fn test_parse_content_and_reasoning() {
        let frame = parse_sse_data(
            r#"{"choices":[{"index":0,"delta":{"content":null,"reasoning_content":"Hmm"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            SseFrame::Delta {
                content: None,
                reasoning: Some("Hmm".into())
            }
        );
    }

    #[test]
    fn test_parse_done_and_error() {
        assert_eq!(parse_sse_data("[DONE]").unwrap(), SseFrame::Done);
        let err = parse_sse_data(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert_eq!(err.description().as_deref(), Some("overloaded"));
    }
}
