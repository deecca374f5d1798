//! Text-generation providers.
//!
//! Defines the [`Generator`] trait and concrete implementations:
//! - **[`OpenAiGenerator`]** — calls an OpenAI-compatible `/v1/chat/completions` endpoint.
//! - **[`OllamaGenerator`]** — calls a local Ollama instance's `/api/chat` endpoint.
//! - **[`DisabledGenerator`]** — always fails; used when generation is not configured.
//!
//! Use [`create_generator`] to build the one selected by `[generation]`.
//!
//! No provider retries. A failed call fails the run and the caller resubmits.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;

/// Produces the audit text for a corpus.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Generate a report for `corpus`, attributing it to `identity`
    /// (e.g. `org/repo`).
    async fn generate(&self, corpus: &str, identity: &str) -> Result<String>;
}

/// Build the generator selected by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        "disabled" => Ok(Box::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// System instructions for the documentation audit.
pub fn system_prompt(identity: &str) -> String {
    format!(
        r#"You are a senior technical writer and developer advocate with years of experience reviewing open source projects.
Your task is a documentation-only audit of the repository {identity}.

GOAL
Judge only whether the documentation is adequate, clear and complete.
Do not judge code quality (style, performance, patterns) unless missing comments make the code impossible to follow.

CONTEXT
Before writing, work out what kind of project this is from its files (README, manifests, etc.) and adapt your criteria:
1. LIBRARY/FRAMEWORK: needs API documentation, quick-start examples, clear installation.
2. END-USER APPLICATION: needs deployment instructions, configuration (.env), architecture.
3. TOOL/CLI: needs a command list, supported flags, input/output examples.

Each file in the material is introduced by a line of the form "--- FILE PATH: <path> ---". Cite those paths when you refer to a file.

Write a Markdown report following exactly this outline:

# Documentation Audit: {identity}
**Project type**: (e.g. "React library", "HTTP backend")
**Verdict**: one sentence on the state of the documentation.

## What works
One or two paragraphs of prose (no bullet lists) on what makes onboarding easy and why.

## What is missing or broken
One or two paragraphs of prose (no bullet lists) on the gaps that would block a new developer. Be specific: name files or missing sections.

## Recommended actions
* [High priority] something to do right away.
* [Medium priority] an improvement.

Be professional, constructive and focused on developer experience."#
    )
}

/// User message carrying the corpus.
pub fn user_message(corpus: &str) -> String {
    format!(
        "Here are the documentation and source files to review:\n\n{}",
        corpus
    )
}

fn http_client(config: &GenerationConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn required_model(config: &GenerationConfig) -> Result<String> {
    config
        .resolved_model()
        .ok_or_else(|| anyhow::anyhow!("generation.model required for {}", config.provider))
}

// ============ Disabled ============

/// A generator that always fails.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _corpus: &str, _identity: &str) -> Result<String> {
        bail!("generation provider is disabled")
    }
}

// ============ OpenAI ============

/// Chat-completions client for OpenAI and compatible gateways.
///
/// The API key is read from the environment variable named by
/// `generation.api_key_env` (default `OPENAI_API_KEY`).
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = required_model(config)?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            client: http_client(config)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }

    fn request_body(&self, corpus: &str, identity: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(identity) },
                { "role": "user", "content": user_message(corpus) },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "top_p": self.top_p,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, corpus: &str, identity: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(corpus, identity))
            .send()
            .await
            .with_context(|| "OpenAI request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_openai_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

/// Chat client for a local Ollama instance (default `http://localhost:11434`).
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = required_model(config)?;
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: http_client(config)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, corpus: &str, identity: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": system_prompt(identity) },
                { "role": "user", "content": user_message(corpus) },
            ],
            "options": {
                "temperature": self.temperature,
                "top_p": self.top_p,
                "num_predict": self.max_tokens,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama request to {} failed", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "# Report" } }]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), "# Report");
    }

    #[test]
    fn rejects_openai_response_without_content() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_openai_response(&json).is_err());
    }

    #[test]
    fn prompt_names_repository() {
        let p = system_prompt("org/repo");
        assert!(p.contains("# Documentation Audit: org/repo"));
        assert!(p.contains("FILE PATH"));
        assert!(user_message("CORPUS").ends_with("CORPUS"));
    }

    #[tokio::test]
    async fn disabled_generator_fails() {
        let g = create_generator(&GenerationConfig {
            provider: "disabled".into(),
            ..GenerationConfig::default()
        })
        .unwrap();
        assert_eq!(g.model_name(), "disabled");
        assert!(g.generate("x", "y").await.is_err());
    }

    #[test]
    fn ollama_needs_no_key() {
        let g = OllamaGenerator::new(&GenerationConfig {
            provider: "ollama".into(),
            model: Some("llama3".into()),
            url: Some("http://127.0.0.1:9/".into()),
            ..GenerationConfig::default()
        })
        .unwrap();
        assert_eq!(g.base_url, "http://127.0.0.1:9");
        assert_eq!(g.model_name(), "llama3");
    }
}
