//! Language model collaborator.
//!
//! The recommendation stage hands a single free-text prompt to a
//! [`Recommender`] and keeps the text it answers with.
//! [`ChatCompletionsClient`] talks to any OpenAI-style `/chat/completions`
//! endpoint (GigaChat by default).

mod chat;

use async_trait::async_trait;
use serpwatch_shared::Result;

pub use chat::{ChatCompletionsClient, failure_text};

/// The model's answer to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub text: String,
}

/// Anything that can answer a free-text prompt.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, prompt: &str) -> Result<Recommendation>;
}
