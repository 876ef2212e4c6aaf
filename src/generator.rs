//! Output generation: asking the evaluated system for fresh samples.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::warn;
use uuid::Uuid;

use crate::config::ProbeConfig;
use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest, Message};

#[async_trait::async_trait]
pub trait OutputGenerator: Send + Sync {
    /// Produce up to `count` independent outputs. Individual failures are
    /// dropped, so fewer than `count` strings may come back.
    async fn generate(
        &self,
        probe_id: Uuid,
        prompt: &str,
        description: &str,
        count: usize,
    ) -> Vec<String>;
}

/// Generates samples by sending the probe prompt to a chat model, with the
/// system description as the system message. Refusals are kept as samples.
pub struct LlmGenerator {
    gateway: Arc<dyn ChatGateway>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    concurrency: usize,
}

impl LlmGenerator {
    pub fn from_config(gateway: Arc<dyn ChatGateway>, config: &ProbeConfig) -> Self {
        Self {
            gateway,
            model: config.generator_model.clone(),
            temperature: config.generation_temperature,
            max_tokens: config.max_generation_tokens,
            concurrency: config.generation_concurrency.max(1),
        }
    }

    fn build_messages(prompt: &str, description: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if !description.trim().is_empty() {
            messages.push(Message::system(description.trim()));
        }
        messages.push(Message::user(prompt));
        messages
    }
}

#[async_trait::async_trait]
impl OutputGenerator for LlmGenerator {
    async fn generate(
        &self,
        probe_id: Uuid,
        prompt: &str,
        description: &str,
        count: usize,
    ) -> Vec<String> {
        let requests = (0..count).map(|index| {
            let req = ChatRequest::new(
                ChatModel::openrouter(&self.model),
                Self::build_messages(prompt, description),
                Attribution::new("generator::generate").with_probe(probe_id),
            )
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);

            async move {
                match self.gateway.chat(req).await {
                    Ok(resp) if !resp.content.trim().is_empty() => Some(resp.content),
                    Ok(_) => {
                        warn!(index, model = %self.model, "generation returned empty content");
                        None
                    }
                    Err(err) => {
                        warn!(index, model = %self.model, error = %err, "generation failed");
                        None
                    }
                }
            }
        });

        stream::iter(requests)
            .buffered(self.concurrency)
            .filter_map(|output| async move { output })
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ChatResponse, FinishReason, ProviderError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails every third call, answers "", then "out-N".
    struct CyclingGateway {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChatGateway for CyclingGateway {
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let content = match n % 3 {
                0 => return Err(ProviderError::provider("test", "down", false)),
                1 => String::new(),
                _ => format!("out-{n}"),
            };
            Ok(ChatResponse {
                content,
                input_tokens: 1,
                output_tokens: 1,
                latency: Duration::from_millis(1),
                finish_reason: FinishReason::Stop,
            })
        }
    }

    #[tokio::test]
    async fn drops_failed_and_empty_generations() {
        let gateway = Arc::new(CyclingGateway {
            calls: AtomicUsize::new(0),
        });
        let config = ProbeConfig {
            generation_concurrency: 1,
            ..ProbeConfig::default()
        };
        let generator = LlmGenerator::from_config(gateway, &config);

        let outputs = generator.generate(Uuid::nil(), "prompt", "desc", 6).await;
        assert_eq!(outputs, vec!["out-2".to_string(), "out-5".to_string()]);
    }

    #[test]
    fn blank_description_skips_system_message() {
        assert_eq!(LlmGenerator::build_messages("p", "  ").len(), 1);
        assert_eq!(LlmGenerator::build_messages("p", "a bot").len(), 2);
    }
}
