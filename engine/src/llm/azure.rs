use super::{extract_content, status_error, LLMError, LLMProvider, Message};
use crate::config::AzureOpenAIConfig;
use crate::secrets::SecretString;
use async_trait::async_trait;
use serde_json::json;

/// Azure OpenAI deployment. The model is picked by the deployment, so the
/// request body carries no `model` field.
pub struct AzureOpenAIProvider {
    config: AzureOpenAIConfig,
    api_key: SecretString,
    client: reqwest::Client,
}

impl AzureOpenAIProvider {
    pub fn new(config: AzureOpenAIConfig, api_key: SecretString) -> Self {
        Self {
            config,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }
}

#[async_trait]
impl LLMProvider for AzureOpenAIProvider {
    fn name(&self) -> &str {
        "azure"
    }

    fn model(&self) -> &str {
        &self.config.deployment
    }

    async fn check_health(&self) -> bool {
        !self.api_key.is_empty() && !self.config.endpoint.is_empty()
    }

    async fn complete(&self, messages: &[Message]) -> super::Result<String> {
        let payload = json!({
            "messages": messages.iter().map(Message::to_api).collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(self.url())
            .header("api-key", self.api_key.unsecure())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        extract_content(&data)
    }
}
