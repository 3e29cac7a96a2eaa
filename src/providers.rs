//! Hosted LLM chat adapters behind one blocking `chat` contract.
//!
//! Every provider is the same thing to the rest of the program: give it
//! role-tagged messages, get completion text back. The factory picks an
//! implementation from the provider tag in config.

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

pub trait Provider {
    fn name(&self) -> &str;
    fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn Provider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config))),
        "anthropic" => Ok(Box::new(AnthropicProvider::new(config))),
        "gemini" | "google" => Ok(Box::new(GeminiProvider::new(config))),
        "ollama" => Ok(Box::new(OllamaProvider::new(config))),
        other => Err(Error::Provider {
            provider: other.to_string(),
            message: "unknown provider tag".to_string(),
        }),
    }
}

fn provider_error(provider: &str, resp: reqwest::blocking::Response) -> Error {
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Error::Provider {
        provider: provider.to_string(),
        message: format!("{} {}", status, snippet),
    }
}

// OpenAI-style chat completions

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let body = OpenAiRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    content: &m.content,
                })
                .collect(),
        };
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(provider_error(self.name(), resp));
        }
        let parsed: OpenAiResponse = resp.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Provider {
                provider: self.name().to_string(),
                message: "empty completion".to_string(),
            })
    }
}

// Anthropic messages API

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

pub struct AnthropicProvider {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        // system messages travel in their own top-level field here
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: 1024,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| AnthropicMessage {
                    role: match m.role {
                        Role::Assistant => "assistant",
                        _ => "user",
                    },
                    content: &m.content,
                })
                .collect(),
        };
        let url = format!("{}/v1/messages", self.endpoint);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            return Err(provider_error(self.name(), resp));
        }
        let parsed: AnthropicResponse = resp.json()?;
        let text: String = parsed.content.into_iter().map(|c| c.text).collect();
        if text.is_empty() {
            return Err(Error::Provider {
                provider: self.name().to_string(),
                message: "empty completion".to_string(),
            });
        }
        Ok(text)
    }
}

// Google Gemini generateContent API

#[derive(Serialize)]
struct GeminiRequest<'a> {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiProvider {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let system_text = system.join("\n\n");
        let body = GeminiRequest {
            system_instruction: (!system.is_empty()).then(|| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: &system_text }],
            }),
            contents: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| GeminiContent {
                    role: Some(match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }),
                    parts: vec![GeminiPart { text: &m.content }],
                })
                .collect(),
        };
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );
        let resp = self.client.post(&url).json(&body).send()?;
        if !resp.status().is_success() {
            return Err(provider_error(self.name(), resp));
        }
        let parsed: GeminiResponse = resp.json()?;
        parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::Provider {
                provider: self.name().to_string(),
                message: "empty completion".to_string(),
            })
    }
}

// Local Ollama chat endpoint

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: config.model.clone(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = OllamaRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    content: &m.content,
                })
                .collect(),
            stream: false,
        };
        let resp = self.client.post(&url).json(&body).send()?;
        if !resp.status().is_success() {
            return Err(provider_error(self.name(), resp));
        }
        let parsed: OllamaResponse = resp.json()?;
        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            api_key: "test-key".to_string(),
            endpoint: None,
        }
    }

    #[test]
    fn factory_knows_every_tag() {
        for tag in ["openai", "anthropic", "gemini", "google", "ollama"] {
            let provider = create_provider(&config(tag)).unwrap();
            assert!(!provider.name().is_empty());
        }
    }

    #[test]
    fn factory_rejects_unknown_tags() {
        assert!(create_provider(&config("yahoo")).is_err());
    }
}
