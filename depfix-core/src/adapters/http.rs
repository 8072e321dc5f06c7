use crate::ports::ReasoningService;
use crate::settings::ReasoningSettings;
use anyhow::{Context, bail};
use async_trait::async_trait;
use depfix_types::request::{ReasoningRequest, ReasoningTask};
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANALYZE_PROMPT: &str = "You are a Python code analyzer. Identify deprecated APIs, \
security vulnerabilities, compatibility issues, bad practices and likely runtime errors.
Return ONLY a JSON array. Each item has:
- category: one of deprecated, security, compatibility, bad_practice, runtime_risk
- severity: one of high, medium, low
- description: what the problem is
- line_number: 1-based line of the issue, or null
Return [] when the file has no issues.";

const FIX_PROMPT: &str = "You are a Python code fixer. You receive a file and a JSON list \
of its issues, each with an index.
Return ONLY a JSON array of fixes. Each item has:
- issue_index: index of the issue being fixed
- operation: one of replace, insert, delete
- anchor: exact text copied from the file that the fix targets
- new_text: replacement or inserted text (omit for delete)
- position: before or after (insert only)
- explanation: why the change is needed
Anchors must not overlap.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct HttpReasoningService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl HttpReasoningService {
    /// Reads the API key from the configured environment variable, if set.
    pub fn new(settings: &ReasoningSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("build HTTP client")?;
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            debug!("{} is not set; sending unauthenticated requests", settings.api_key_env);
        }
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    fn user_message(request: &ReasoningRequest) -> String {
        match request.task {
            ReasoningTask::Analyze => format!(
                "Analyze this Python file: {}\n\n```python\n{}\n```",
                request.file_path, request.content
            ),
            ReasoningTask::GenerateFix => format!(
                "Fix the issues in this Python file: {}\n\n```python\n{}\n```\n\nIssues:\n{}",
                request.file_path, request.content, request.context
            ),
        }
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningService {
    async fn complete(&self, request: &ReasoningRequest) -> anyhow::Result<String> {
        let system = match request.task {
            ReasoningTask::Analyze => ANALYZE_PROMPT,
            ReasoningTask::GenerateFix => FIX_PROMPT,
        };
        let user = Self::user_message(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        debug!(path = %request.file_path, task = request.task.as_str(), "reasoning request");
        let resp = req
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;
        let status = resp.status();
        let text = resp.text().await.context("read response body")?;
        if !status.is_success() {
            bail!("API error {}: {}", status, text.trim());
        }

        let chat: ChatResponse = serde_json::from_str(&text).context("parse chat response")?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("no choices in API response")
    }
}
