//! OpenAI Chat Completions API driver.
//!
//! This module implements the [`LlmDriver`] trait for the OpenAI Chat
//! Completions API (`/v1/chat/completions`), in both one-shot and streaming
//! form.

use futures::StreamExt;

use super::{LlmDriver, LlmError, LlmRequest, LlmSettings, TextStream};

/// Driver for the OpenAI Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .field("provider", &self.settings.provider)
            .finish()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(LlmError::Transport)?;
        Ok(Self { http, settings })
    }

    fn request_body(&self, req: &LlmRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "stream": stream,
            "messages": req.messages,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });
        if req.json_mode && self.settings.provider.supports_json_mode() {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, LlmError> {
        let url = self.settings.provider.build_chat_url(&self.settings.base_url);

        let mut rb = self.http.post(&url).json(body);
        if let Some(k) = &self.settings.api_key {
            rb = if self.settings.provider.uses_api_key_header() {
                rb.header("api-key", k)
            } else {
                rb.bearer_auth(k)
            };
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Model call rejected");
            return Err(LlmError::from_status(status.as_u16(), body));
        }
        Ok(resp)
    }
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn complete(&self, req: LlmRequest) -> Result<String, LlmError> {
        let body = self.request_body(&req, false);
        let started = std::time::Instant::now();

        let v: serde_json::Value = self.send(&body).await?.json().await?;

        tracing::info!(
            model = %self.settings.model,
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Model responded"
        );

        v["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .ok_or(LlmError::EmptyResponse)
    }

    async fn stream(&self, req: LlmRequest) -> Result<TextStream, LlmError> {
        let body = self.request_body(&req, true);
        let resp = self.send(&body).await?;
        let byte_stream = resp.bytes_stream();

        let out = async_stream::stream! {
            let mut buf = Vec::<u8>::new();

            futures::pin_mut!(byte_stream);
            'frames: loop {
                let at_eof = match byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        buf.extend_from_slice(&chunk);
                        false
                    }
                    Some(Err(e)) => {
                        yield Err(LlmError::from(e));
                        return;
                    }
                    None => true,
                };

                loop {
                    let frame: Vec<u8> = if let Some((pos, delim)) = find_frame_end(&buf) {
                        buf.drain(..pos + delim).collect()
                    } else if at_eof && !buf.is_empty() {
                        tracing::debug!(bytes = buf.len(), "Parsing unterminated final frame");
                        std::mem::take(&mut buf)
                    } else {
                        break;
                    };

                    match parse_frame(&String::from_utf8_lossy(&frame)) {
                        Ok(parsed) => {
                            for delta in parsed.deltas {
                                yield Ok(delta);
                            }
                            if parsed.done {
                                break 'frames;
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }

                if at_eof {
                    break;
                }
            }
        };

        Ok(Box::pin(out))
    }
}

/// Content carried by one SSE frame.
#[derive(Debug, Default, PartialEq)]
struct ParsedFrame {
    deltas: Vec<String>,
    /// The frame held the `[DONE]` sentinel.
    done: bool,
}

/// Decode the `data:` lines of one SSE frame.
fn parse_frame(text: &str) -> Result<ParsedFrame, LlmError> {
    let mut parsed = ParsedFrame::default();

    for line in text.lines() {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();

        if data == "[DONE]" {
            parsed.done = true;
            break;
        }

        let v: serde_json::Value = serde_json::from_str(data)?;
        if let Some(err) = v.get("error") {
            return Err(LlmError::from_status(400, err.to_string()));
        }

        if let Some(s) = v["choices"][0]["delta"]["content"].as_str()
            && !s.is_empty()
        {
            parsed.deltas.push(s.to_string());
        }
    }

    Ok(parsed)
}

/// Find the earliest frame delimiter (`\n\n` or `\r\n\r\n`), returning its
/// position and length.
fn find_frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
