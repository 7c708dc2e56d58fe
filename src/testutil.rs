use crate::ai::{CompletionClient, CompletionParams};

/// Completion client that always returns the same canned reply.
pub struct StubClient {
    reply: String,
}

impl StubClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl CompletionClient for StubClient {
    fn complete(
        &self,
        _system: Option<&str>,
        _prompt: &str,
        _params: &CompletionParams,
    ) -> anyhow::Result<String> {
        Ok(self.reply.clone())
    }
}

/// Completion client that fails every call, for fallback-path tests.
pub struct FailingClient;

impl CompletionClient for FailingClient {
    fn complete(
        &self,
        _system: Option<&str>,
        _prompt: &str,
        _params: &CompletionParams,
    ) -> anyhow::Result<String> {
        anyhow::bail!("completion backend unavailable")
    }
}
