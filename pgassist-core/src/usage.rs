//! Token and cost accounting for one query cycle.
//!
//! `UsageTracker` wraps a `ChatModel` and sums the usage reported by every
//! call made through it. The responder creates one per cycle and logs the
//! totals when the cycle ends.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::llm::{ChatModel, Completion, ModelError, TokenUsage};

/// USD prices per 1K tokens.
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl From<&crate::config::ModelConfig> for Pricing {
    fn from(config: &crate::config::ModelConfig) -> Self {
        Self {
            prompt_per_1k: config.prompt_cost_per_1k,
            completion_per_1k: config.completion_cost_per_1k,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSummary {
    pub usage: TokenUsage,
    pub successful_requests: u64,
    pub total_cost: f64,
}

pub struct UsageTracker<'a> {
    inner: &'a dyn ChatModel,
    pricing: Pricing,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
    successful_requests: AtomicU64,
}

impl<'a> UsageTracker<'a> {
    pub fn new(inner: &'a dyn ChatModel, pricing: Pricing) -> Self {
        Self {
            inner,
            pricing,
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
        }
    }

    pub fn summary(&self) -> UsageSummary {
        let usage = TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        };
        let total_cost = usage.prompt_tokens as f64 / 1000.0 * self.pricing.prompt_per_1k
            + usage.completion_tokens as f64 / 1000.0 * self.pricing.completion_per_1k;

        UsageSummary {
            usage,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            total_cost,
        }
    }

    fn record(&self, usage: &TokenUsage) {
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens, Ordering::Relaxed);
        self.total_tokens.fetch_add(usage.total_tokens, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl ChatModel for UsageTracker<'_> {
    async fn complete(&self, prompt: &str, stop: &[&str]) -> Result<Completion, ModelError> {
        let completion = self.inner.complete(prompt, stop).await?;
        self.record(&completion.usage);
        Ok(completion)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
