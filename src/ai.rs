use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

/// Per-call-site knobs for the completion endpoint.
#[derive(Debug, Clone, Copy)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Seam for the external text-completion service. Handlers receive this as
/// `Option<&dyn CompletionClient>` so tests can stub it and nothing reaches
/// for a process-global handle.
pub trait CompletionClient {
    fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
        params: &CompletionParams,
    ) -> anyhow::Result<String>;
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireReplyMessage,
}

#[derive(Deserialize)]
struct WireReplyMessage {
    content: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

/// Blocking client for an OpenAI-compatible chat-completions endpoint.
/// One attempt per call, no retry; callers decide whether a failure is
/// surfaced or papered over with a fallback.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// None when no API key is configured; the daemon then runs with
    /// arithmetic scores and canned narrative fallbacks only.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = std::env::var("FORGEED_COMPLETIONS_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model =
            std::env::var("FORGEED_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Some(Self::new(base_url, api_key, model))
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
        params: &CompletionParams,
    ) -> anyhow::Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: prompt,
        });

        let body = WireRequest {
            model: &self.model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            bail!("completion endpoint returned {}", status);
        }

        let parsed: WireResponse = resp.json()?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("completion reply has no choices"))?;
        Ok(content)
    }
}

/// Replies frequently arrive wrapped in markdown code fences, with or
/// without a `json` language tag. Strip one outer fence pair if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = trimmed.trim_start_matches('`');
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = match inner.find("```") {
        Some(end) => &inner[..end],
        None => inner,
    };
    inner.trim_matches('`').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_leaves_plain_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn strip_removes_bare_fences() {
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn strip_removes_json_tagged_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2, 3]\n```"), "[1, 2, 3]");
    }

    #[test]
    fn strip_handles_missing_closing_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }
}
