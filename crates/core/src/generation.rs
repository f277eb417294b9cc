use crate::models::ChatMessage;
use crate::traits::TextGenerator;
use crate::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub base_url: &'static str,
    pub default_model: &'static str,
    pub requires_key: bool,
}

pub const PROVIDER_PRESETS: [ProviderPreset; 5] = [
    ProviderPreset {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        default_model: "gpt-3.5-turbo",
        requires_key: true,
    },
    ProviderPreset {
        name: "deepseek",
        base_url: "https://api.deepseek.com/v1",
        default_model: "deepseek-chat",
        requires_key: true,
    },
    ProviderPreset {
        name: "kimi",
        base_url: "https://api.moonshot.cn/v1",
        default_model: "moonshot-v1-8k",
        requires_key: true,
    },
    ProviderPreset {
        name: "glm",
        base_url: "https://open.bigmodel.cn/api/paas/v4",
        default_model: "glm-4",
        requires_key: true,
    },
    ProviderPreset {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        default_model: "llama2",
        requires_key: false,
    },
];

pub fn preset(name: &str) -> Option<&'static ProviderPreset> {
    PROVIDER_PRESETS
        .iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub provider: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            base_url: None,
            model: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: 2_000,
            timeout: Duration::from_secs(60),
        }
    }
}

/// One-call client for OpenAI-compatible `/chat/completions` endpoints.
pub struct ChatCompletionsClient {
    client: Client,
    provider: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsClient {
    pub fn from_config(config: GeneratorConfig) -> Result<Self, GenerationError> {
        let preset = preset(&config.provider);

        let base_url = config
            .base_url
            .filter(|url| !url.trim().is_empty())
            .or_else(|| preset.map(|preset| preset.base_url.to_string()))
            .ok_or_else(|| {
                GenerationError::NotConfigured(format!(
                    "provider {} needs a base url",
                    config.provider
                ))
            })?;

        let model = config
            .model
            .filter(|model| !model.trim().is_empty())
            .or_else(|| preset.map(|preset| preset.default_model.to_string()))
            .ok_or_else(|| {
                GenerationError::NotConfigured(format!("provider {} needs a model", config.provider))
            })?;

        let api_key = config.api_key.filter(|key| !key.trim().is_empty());
        if api_key.is_none() && preset.is_some_and(|preset| preset.requires_key) {
            return Err(GenerationError::NotConfigured(format!(
                "provider {} needs an api key",
                config.provider
            )));
        }

        Ok(Self {
            client: Client::builder().timeout(config.timeout).build()?,
            provider: config.provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

fn first_reply(provider: &str, response: CompletionResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| GenerationError::EmptyReply(provider.to_string()))
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                provider: self.provider.clone(),
                details: response.status().to_string(),
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        first_reply(&self.provider, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preset_fills_in_url_and_model() {
        let client = ChatCompletionsClient::from_config(GeneratorConfig {
            provider: "DeepSeek".to_string(),
            api_key: Some("sk-test".to_string()),
            ..GeneratorConfig::default()
        })
        .expect("configured");

        assert_eq!(client.model(), "deepseek-chat");
        assert_eq!(client.base_url, "https://api.deepseek.com/v1");
    }

    #[test]
    fn hosted_provider_without_key_is_not_configured() {
        let result = ChatCompletionsClient::from_config(GeneratorConfig {
            provider: "openai".to_string(),
            ..GeneratorConfig::default()
        });
        assert!(matches!(result, Err(GenerationError::NotConfigured(_))));
    }

    #[test]
    fn custom_provider_requires_url_and_model() {
        let missing = ChatCompletionsClient::from_config(GeneratorConfig {
            provider: "custom".to_string(),
            ..GeneratorConfig::default()
        });
        assert!(missing.is_err());

        let client = ChatCompletionsClient::from_config(GeneratorConfig {
            provider: "custom".to_string(),
            base_url: Some("http://localhost:8080/v1/".to_string()),
            model: Some("local".to_string()),
            ..GeneratorConfig::default()
        })
        .expect("configured");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let body = CompletionRequest {
            model: "m",
            messages: &messages,
            temperature: 0.3,
            max_tokens: 10,
        };
        let value = serde_json::to_value(&body).expect("serializable");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
    }

    #[test]
    fn empty_choices_are_an_error() {
        let response: CompletionResponse =
            serde_json::from_value(json!({ "choices": [] })).expect("valid payload");
        assert!(matches!(
            first_reply("ollama", response),
            Err(GenerationError::EmptyReply(_))
        ));

        let response: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        }))
        .expect("valid payload");
        assert_eq!(first_reply("ollama", response).expect("reply"), "hello");
    }
}
