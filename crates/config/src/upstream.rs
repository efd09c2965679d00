use secrecy::SecretString;
use serde::Deserialize;

const DEFAULT_UPSTREAM_URL: &str = "https://cope.duti.dev";

/// Upstream OpenAI-compatible endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the Chat Completions API the relay forwards to.
    pub base_url: String,

    /// Bearer token injected into upstream requests.
    ///
    /// Usually written as `"{{ env.COPILOT_API_KEY }}"` so the secret stays
    /// out of the configuration file.
    pub api_key: Option<SecretString>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_URL.to_string(),
            api_key: None,
        }
    }
}
