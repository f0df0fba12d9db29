use crate::history::{Role, Turn};
use anyhow::{Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the LLM.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent>> + Send>>;

/// A completion provider that can continue a conversation as a stream.
///
/// Implementations are shared by every session, so they must hold no
/// per-call state.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Opens a streaming completion for the next assistant turn.
    async fn stream_reply(&self, history: &[Turn]) -> Result<LLMStream>;

    /// Makes a single, non-streaming call and returns the full text.
    async fn complete(&self, history: &[Turn]) -> Result<String>;
}

/// Converts history turns into chat completion request messages.
pub fn to_request_messages(history: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>> {
    history
        .iter()
        .map(|turn| {
            let message: ChatCompletionRequestMessage = match turn.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
            };
            Ok(message)
        })
        .collect()
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn stream_reply(&self, history: &[Turn]) -> Result<LLMStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(to_request_messages(history)?)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async move {
            match result {
                Ok(response) => {
                    let content = response.choices.first()?.delta.content.clone()?;
                    if content.is_empty() {
                        None
                    } else {
                        Some(Ok(LLMStreamEvent::TextChunk(content)))
                    }
                }
                Err(e) => Some(Err(anyhow::Error::from(e))),
            }
        })))
    }

    async fn complete(&self, history: &[Turn]) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(to_request_messages(history)?)
            .build()?;

        let response = self.client.chat().create(request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("LLM response had no content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_messages_preserve_order_and_roles() {
        let history = vec![
            Turn::new(Role::System, "You are an interviewer."),
            Turn::new(Role::Assistant, "Hello!"),
            Turn::new(Role::User, "Hi there."),
        ];

        let messages = to_request_messages(&history).unwrap();

        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::User(_)));
    }
}
