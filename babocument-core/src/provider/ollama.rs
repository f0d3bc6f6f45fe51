//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements the Provider trait.

use super::types::*;
use async_trait::async_trait;
use tracing::debug;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a new Ollama provider talking to `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    async fn request_embeddings(&self, input: Vec<String>, model: &str) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        let embed_request = EmbedRequest {
            model: model.to_string(),
            input,
        };

        debug!(model = %model, inputs = embed_request.input.len(), "Requesting embeddings from Ollama");

        let response = self.http_client
            .post(&url)
            .json(&embed_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let body = response.text().await?;
        parse_embed_response(&body)
    }
}

/// Decodes an `/api/embed` response body.
fn parse_embed_response(body: &str) -> Result<Vec<Vec<f32>>> {
    let embed_response: EmbedResponse = serde_json::from_str(body)?;
    Ok(embed_response.embeddings)
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new("http://localhost:11434")
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        self.request_embeddings(vec![text.to_string()], model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No embeddings returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let input = texts.iter().map(|t| t.to_string()).collect();
        self.request_embeddings(input, model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = OllamaProvider::new("http://localhost:11434/");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_embed_request_shape() {
        let request = EmbedRequest {
            model: "all-minilm".to_string(),
            input: vec!["hydrogel bioink".to_string()],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "all-minilm");
        assert_eq!(json["input"][0], "hydrogel bioink");
    }

    #[test]
    fn test_embed_response_without_embeddings() {
        let response: EmbedResponse = serde_json::from_str(r#"{"model":"all-minilm"}"#).unwrap();
        assert!(response.embeddings.is_empty());
    }

    #[test]
    fn test_parse_embed_response() {
        let embeddings =
            parse_embed_response(r#"{"model":"all-minilm","embeddings":[[0.5,-0.25],[1.0,0.0]]}"#)
                .unwrap();
        assert_eq!(embeddings, vec![vec![0.5, -0.25], vec![1.0, 0.0]]);
    }

    #[test]
    fn test_malformed_body_is_json_error() {
        let result = parse_embed_response("<html>502 Bad Gateway</html>");
        assert!(matches!(result, Err(ProviderError::Json(_))));

        let result = parse_embed_response(r#"{"embeddings":"not a list"}"#);
        assert!(matches!(result, Err(ProviderError::Json(_))));
    }

    #[tokio::test]
    #[ignore] // Requires Ollama running with all-minilm pulled
    async fn test_ollama_embed() {
        let provider = OllamaProvider::default();
        let embedding = provider.embed("CRISPR gene editing", "all-minilm").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
