// file: src/llm/hosted.rs
// description: OpenAI-compatible chat completions backend
// reference: https://platform.openai.com/docs/api-reference/chat

use super::sse::{SseDecoder, SseEvent};
use super::{GenerationParams, TextGenerator, TokenStream};
use crate::config::HostedConfig;
use crate::error::{Result, WorkbenchError};
use crate::utils::Validator;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, stream};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct HostedChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    params: GenerationParams,
}

impl HostedChatClient {
    pub fn new(config: &HostedConfig, api_key: String, params: GenerationParams) -> Result<Self> {
        Validator::validate_url(&config.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WorkbenchError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key,
            model: config.model.clone(),
            params,
        })
    }

    fn body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": self.params.max_tokens,
            "temperature": self.params.temperature,
            "stream": stream,
        })
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        debug!(
            "Chat request to {} ({} prompt chars, stream={})",
            self.endpoint,
            prompt.chars().count(),
            stream
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(prompt, stream))
            .send()
            .await
            .map_err(|e| WorkbenchError::generation_with("chat request failed", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(WorkbenchError::generation(format!(
                "chat request failed with status {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    ready: VecDeque<Result<String>>,
    done: bool,
}

#[async_trait]
impl TextGenerator for HostedChatClient {
    fn name(&self) -> String {
        format!("hosted:{}", self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.send(prompt, false).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| WorkbenchError::generation_with("failed to parse chat response", e))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| WorkbenchError::generation("chat response contained no message"))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
        let response = self.send(prompt, true).await?;
        let state = StreamState {
            bytes: response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()))
                .boxed(),
            decoder: SseDecoder::default(),
            ready: VecDeque::new(),
            done: false,
        };

        let tokens = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.ready.pop_front() {
                    return Some((item, state));
                }
                if state.done {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        for event in state.decoder.push(&chunk) {
                            match event {
                                Ok(SseEvent::Delta(text)) => state.ready.push_back(Ok(text)),
                                Ok(SseEvent::Done) => state.done = true,
                                Err(e) => {
                                    state.ready.push_back(Err(e));
                                    state.done = true;
                                }
                            }
                            if state.done {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state
                            .ready
                            .push_back(Err(WorkbenchError::generation_with("stream interrupted", e)));
                        state.done = true;
                    }
                    None => {
                        if let Some(Ok(SseEvent::Delta(text))) = state.decoder.finish() {
                            state.ready.push_back(Ok(text));
                        }
                        state.done = true;
                    }
                }
            }
        });

        Ok(tokens.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> HostedChatClient {
        HostedChatClient::new(
            &HostedConfig {
                base_url,
                model: "gpt-test".to_string(),
                api_key_env: "UNUSED".to_string(),
                timeout_secs: 5,
            },
            "sk-test".to_string(),
            GenerationParams {
                max_tokens: 1000,
                temperature: 0.2,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-test", "stream": false, "max_tokens": 1000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Resposta"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = client(server.uri()).generate("Pergunta?").await.unwrap();
        assert_eq!(answer, "Resposta");
    }

    #[tokio::test]
    async fn test_stream_yields_deltas_in_order() {
        let server = MockServer::start().await;
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"Bom\"}}]}\n\n\
                   data: {\"choices\":[{\"delta\":{\"content\":\" dia\"}}]}\n\n\
                   data: [DONE]\n\n";
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let stream = client(server.uri()).generate_stream("oi").await.unwrap();
        let pieces: Vec<String> = stream.map(|p| p.unwrap()).collect().await;
        assert_eq!(pieces, vec!["Bom", " dia"]);
    }

    #[tokio::test]
    async fn test_error_status_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client(server.uri()).generate("x").await.unwrap_err();
        assert!(matches!(err, WorkbenchError::Generation { .. }));
        assert!(err.to_string().contains("401"));
    }
}
