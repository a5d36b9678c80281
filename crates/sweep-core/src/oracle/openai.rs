//! OpenAI-compatible chat-completions oracle.

use super::{Oracle, OracleError};
use crate::config::OracleConfig;
use crate::error::Error;
use crate::model::FileRecord;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

const SYSTEM_PROMPT: &str = "You are a macOS system data expert. Return only valid JSON.";

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct ChatCompletionsOracle {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl ChatCompletionsOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("sweep/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::OracleClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.resolved_api_key(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn request_body(&self, record: &FileRecord) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(record) },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
        })
    }
}

impl Oracle for ChatCompletionsOracle {
    fn ask(&self, record: &FileRecord) -> Result<String, OracleError> {
        let mut request = self.client.post(&self.endpoint).json(&self.request_body(record));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Malformed("response has no message content".to_string()))
    }
}

pub(crate) fn build_prompt(record: &FileRecord) -> String {
    format!(
        "You are an expert in macOS system management. Given the following file metadata, \
determine if the file is IMPORTANT (critical for system or app functionality) or NON-IMPORTANT \
(safe to delete, e.g., caches, old logs). For all files, assign an importance level: Low \
(e.g., caches), Medium (e.g., old configs), or High (e.g., critical system files). Provide a \
brief reason. Return *only* a valid JSON object.

Metadata:
- Path: {}
- Size: {:.2} MB
- Last Modified: {}
- Is Directory: {}

Example JSON response:
{{\"important\": false, \"importance\": \"Low\", \"reason\": \"Browser cache, regenerates\"}}
or
{{\"important\": true, \"importance\": \"High\", \"reason\": \"Critical system file\"}}

Return a single JSON object.",
        record.path.display(),
        record.size_mb(),
        record.modified.to_rfc3339(),
        record.is_dir,
    )
}
