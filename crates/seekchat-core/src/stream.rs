//! Accumulation of streamed completion fragments.
//!
//! A response arrives as an ordered sequence of content and reasoning
//! fragments. [`StreamBuffer`] folds them into two running strings with an
//! explicit reset at the start of a request and a finalize at the end.

/// One incremental piece of a streamed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamDelta {
    Content(String),
    Reasoning(String),
}

/// Which half of the response a fragment extended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChannel {
    Content,
    Reasoning,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamBuffer {
    content: String,
    reasoning: String,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request. Anything left from a previous one is discarded.
    pub fn reset(&mut self) {
        self.content.clear();
        self.reasoning.clear();
    }

    /// Append a fragment in arrival order. Returns the channel it went to so
    /// the caller can republish only that buffer.
    pub fn apply(&mut self, delta: StreamDelta) -> StreamChannel {
        match delta {
            StreamDelta::Content(text) => {
                self.content.push_str(&text);
                StreamChannel::Content
            }
            StreamDelta::Reasoning(text) => {
                self.reasoning.push_str(&text);
                StreamChannel::Reasoning
            }
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// End the request, handing back `(content, reasoning)` and leaving the
    /// buffer empty.
    pub fn finalize(&mut self) -> (String, String) {
        (
            std::mem::take(&mut self.content),
            std::mem::take(&mut self.reasoning),
        )
    }
}
