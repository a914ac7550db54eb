//! Enhancement synthesis: prompt construction + LLM invocation.
//!
//! The [`Synthesizer`] is the one fatal-on-failure stage of the pipeline.
//! A missing credential fails at construction, a failed or empty completion
//! fails the run; there is no fallback content.

use tracing::{info, instrument};

use redraft_shared::{LlmConfig, RedraftError, Reference, Result, resolve_api_key};

mod client;
pub mod prompt;

pub use client::ChatClient;
pub use prompt::{SYSTEM_MESSAGE, build_prompt};

/// Produces enhanced article text from an original plus references.
pub struct Synthesizer {
    client: ChatClient,
}

impl Synthesizer {
    /// Build with an explicit API key.
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: ChatClient::new(api_key, config)?,
        })
    }

    /// Build from config, resolving the key from the configured env var.
    /// Fails fast when the key is unset so a doomed run never reaches the
    /// scraping stages.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.api_key_env).ok_or_else(|| {
            RedraftError::llm_config(format!(
                "LLM API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;
        Self::new(api_key, config)
    }

    /// Synthesize enhanced text grounded in the given references.
    #[instrument(skip_all, fields(original_chars = original_text.len(), references = references.len()))]
    pub async fn synthesize(
        &self,
        original_text: &str,
        references: &[Reference],
    ) -> Result<String> {
        let user_prompt = build_prompt(original_text, references);
        let content = self.client.complete(SYSTEM_MESSAGE, &user_prompt).await?;

        let content = content.trim();
        if content.is_empty() {
            return Err(RedraftError::LlmEmptyResponse);
        }

        info!(chars = content.len(), "synthesized enhanced article");
        Ok(content.to_string())
    }
}
