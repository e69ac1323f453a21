//! Query Synthesizer
//!
//! Translates a natural-language question into a candidate SQL string via a
//! single chat-completion call. The response is trimmed and returned
//! verbatim; it is untrusted text and nothing here validates it — execution
//! errors are caught downstream.

use crate::error::{QueryBotError, Result};
use crate::llm::{ChatModel, ChatRequest};
use std::sync::Arc;
use tracing::info;

const SYSTEM_INSTRUCTION: &str = "You are an SQL and 2D graph expert. Generate SQL queries \
that can be executed directly on an in-memory SQLite database created from a CSV file. Use \
'data' as the table name. Do not include any markdown formatting or explanations, just \
return the SQL query.";

const MODEL: &str = "gpt-3.5-turbo";
const TEMPERATURE: f32 = 0.5;
const MAX_TOKENS: u32 = 150;
const FREQUENCY_PENALTY: f32 = 0.1;

pub struct QuerySynthesizer {
    model: Arc<dyn ChatModel>,
}

impl QuerySynthesizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Produce a Query Candidate for the question. One request, no retries.
    pub async fn synthesize(&self, question: &str) -> Result<String> {
        let request = ChatRequest {
            model: MODEL.to_string(),
            system: Some(SYSTEM_INSTRUCTION.to_string()),
            user: question.to_string(),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            frequency_penalty: FREQUENCY_PENALTY,
        };
        let response = self.model.complete(&request).await?;
        let candidate = response.trim().to_string();
        if candidate.is_empty() {
            return Err(QueryBotError::Synthesis(
                "Model returned an empty completion".to_string(),
            ));
        }
        info!(sql = %candidate, "synthesized query candidate");
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        response: String,
        requests: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn response_is_trimmed_and_otherwise_verbatim() {
        let model = Arc::new(ScriptedModel {
            response: "  SELECT * FROM data  \n".to_string(),
            requests: Mutex::new(Vec::new()),
        });
        let synthesizer = QuerySynthesizer::new(model.clone());
        let sql = synthesizer.synthesize("show everything").await.unwrap();
        assert_eq!(sql, "SELECT * FROM data");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user, "show everything");
        assert!(requests[0]
            .system
            .as_deref()
            .unwrap()
            .contains("'data' as the table name"));
        assert_eq!(requests[0].max_tokens, 150);
    }

    #[tokio::test]
    async fn empty_completion_is_a_synthesis_error() {
        let model = Arc::new(ScriptedModel {
            response: "   ".to_string(),
            requests: Mutex::new(Vec::new()),
        });
        let synthesizer = QuerySynthesizer::new(model);
        let err = synthesizer.synthesize("anything").await.unwrap_err();
        assert!(matches!(err, QueryBotError::Synthesis(_)));
    }
}
