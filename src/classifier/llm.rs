//! LLM-backed semantic classifier.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::parse::parse_estimate;
use super::prompts::{ClassifierTemplate, DEFAULT_CLASSIFIER_TEMPLATE};
use super::{ClassifyError, SemanticClassifier, SemanticEstimate};
use crate::config::ProbeConfig;
use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest, ProviderError};

pub struct LlmClassifier {
    gateway: Arc<dyn ChatGateway>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    template: ClassifierTemplate,
}

impl LlmClassifier {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: impl Into<String>) -> Self {
        let defaults = ProbeConfig::default();
        Self {
            gateway,
            model: model.into(),
            temperature: defaults.classifier_temperature,
            max_tokens: defaults.max_classifier_tokens,
            template: DEFAULT_CLASSIFIER_TEMPLATE,
        }
    }

    pub fn from_config(gateway: Arc<dyn ChatGateway>, config: &ProbeConfig) -> Self {
        Self {
            temperature: config.classifier_temperature,
            max_tokens: config.max_classifier_tokens,
            ..Self::new(gateway, config.classifier_model.clone())
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl SemanticClassifier for LlmClassifier {
    async fn classify(
        &self,
        probe_id: Uuid,
        description: &str,
        prompt: &str,
        response: &str,
    ) -> Result<SemanticEstimate, ClassifyError> {
        let messages = self.template.render(description, prompt, response);
        let attribution = Attribution::new("classifier::classify").with_probe(probe_id);

        let mut request = ChatRequest::new(ChatModel::openrouter(&self.model), messages, attribution)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .detect_refusals();
        // Only OpenAI models reliably honour response_format=json_object via OpenRouter.
        if self.model.starts_with("openai/") {
            request = request.json();
        }

        // A refusal is an answer without an estimate, not a transport failure.
        let reply = match self.gateway.chat(request).await {
            Ok(reply) => reply,
            Err(ProviderError::Refused { message, .. }) => {
                return Err(ClassifyError::Parse(format!("classifier refused: {message}")));
            }
            Err(err) => return Err(err.into()),
        };
        debug!(
            model = %self.model,
            template = self.template.slug,
            output_tokens = reply.output_tokens,
            "classifier replied"
        );
        parse_estimate(&reply.content)
    }
}
