//! Query responder: one question in, one answer string out.
//!
//! Wraps a fresh `SqlDatabaseChain` in a `UsageTracker`, logs the token and
//! cost totals, and turns any chain failure into the fixed apology so the
//! caller always has an assistant turn to record.

use crate::chain::{ChainOptions, SqlDatabaseChain};
use crate::config::PgAssistConfig;
use crate::db::SqlDatabase;
use crate::llm::ChatModel;
use crate::transcript::Transcript;
use crate::usage::{Pricing, UsageTracker};

pub const APOLOGY: &str = "Sorry, I couldn't process your request.";

/// Outcome of one query cycle. `error` is the inline message shown next to
/// the apology when the chain failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub error: Option<String>,
}

impl Answer {
    pub fn is_apology(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryResponder {
    options: ChainOptions,
    pricing: Pricing,
}

impl QueryResponder {
    pub fn new(options: ChainOptions, pricing: Pricing) -> Self {
        Self { options, pricing }
    }

    pub fn from_config(config: &PgAssistConfig) -> Self {
        Self::new(ChainOptions::from(&config.chain), Pricing::from(&config.model))
    }

    /// `history` is the transcript before this question. The chain does not
    /// read it; it is only logged.
    pub async fn answer(
        &self,
        question: &str,
        history: &Transcript,
        database: &dyn SqlDatabase,
        model: &dyn ChatModel,
    ) -> Answer {
        tracing::info!(history_len = history.len(), "Answering question");

        let tracker = UsageTracker::new(model, self.pricing);
        let result = match SqlDatabaseChain::new(&tracker, database, self.options) {
            Ok(chain) => chain.invoke(question).await,
            Err(e) => Err(e),
        };

        let summary = tracker.summary();
        tracing::info!(
            model = tracker.model_name(),
            total_tokens = summary.usage.total_tokens,
            prompt_tokens = summary.usage.prompt_tokens,
            completion_tokens = summary.usage.completion_tokens,
            requests = summary.successful_requests,
            "Total Cost (USD): ${:.6}",
            summary.total_cost
        );

        match result {
            Ok(output) => {
                if let Some(steps) = &output.intermediate_steps {
                    tracing::debug!(steps = ?steps, "Chain intermediate steps");
                }
                Answer {
                    text: output.result,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Query cycle failed");
                Answer {
                    text: APOLOGY.to_string(),
                    error: Some(format!("An error occurred: {}", e)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, ModelError, TokenUsage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every prompt: SQL for generation/check prompts, prose otherwise.
    struct CountingModel {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ChatModel for CountingModel {
        async fn complete(&self, prompt: &str, _stop: &[&str]) -> Result<Completion, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ModelError::Api {
                    code: 500,
                    message: "upstream unavailable".into(),
                });
            }
            let text = if prompt.ends_with("Answer:") {
                "There are 3 orders."
            } else {
                "SELECT COUNT(*) FROM \"orders\""
            };
            Ok(Completion {
                text: text.to_string(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 2,
                    total_tokens: 12,
                },
            })
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    struct OrdersDatabase;

    #[async_trait]
    impl SqlDatabase for OrdersDatabase {
        fn dialect(&self) -> &str {
            "postgresql"
        }

        async fn table_info(&self) -> Result<String, sqlx::Error> {
            Ok("CREATE TABLE \"orders\" (\n\t\"id\" INTEGER NOT NULL\n)".into())
        }

        async fn run(&self, _sql: &str) -> Result<String, sqlx::Error> {
            Ok(r#"[{"count":3}]"#.into())
        }
    }

    fn responder() -> QueryResponder {
        QueryResponder::from_config(&PgAssistConfig::default())
    }

    #[tokio::test]
    async fn test_answer_returns_chain_result() {
        let model = CountingModel {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let answer = responder()
            .answer("How many orders?", &Transcript::new(), &OrdersDatabase, &model)
            .await;

        assert_eq!(answer.text, "There are 3 orders.");
        assert!(!answer.is_apology());
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_becomes_apology_with_inline_error() {
        let model = CountingModel {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let answer = responder()
            .answer("How many orders?", &Transcript::new(), &OrdersDatabase, &model)
            .await;

        assert_eq!(answer.text, APOLOGY);
        let error = answer.error.expect("inline error");
        assert!(error.starts_with("An error occurred: "));
        assert!(error.contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn test_repeated_questions_invoke_the_chain_each_time() {
        let model = CountingModel {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let r = responder();
        let history = Transcript::new();

        let first = r.answer("How many orders?", &history, &OrdersDatabase, &model).await;
        let second = r.answer("How many orders?", &history, &OrdersDatabase, &model).await;

        assert_eq!(first.text, second.text);
        assert_eq!(model.calls.load(Ordering::SeqCst), 6);
    }
}
