//! In-memory collaborators for pipeline tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use serpwatch_llm::{Recommendation, Recommender};
use serpwatch_search::{SearchProvider, SearchRequest};
use serpwatch_shared::{RankingSnapshot, Result, SearchResult, SearchResults, SerpwatchError};
use serpwatch_storage::RankingSink;

/// Three results, none of which belong to `example.com`.
pub fn three_results() -> SearchResults {
    SearchResults::new(vec![
        SearchResult::new("https://a.example/one").with_title("A"),
        SearchResult::new("https://b.example/two").with_title("B"),
        SearchResult::new("https://c.example/three").with_title("C"),
    ])
}

enum Reply<T> {
    Ok(T),
    Fail(String),
    Slow(Duration),
}

pub struct FakeSearch {
    reply: Reply<SearchResults>,
    calls: AtomicUsize,
    last: Mutex<Option<SearchRequest>>,
}

impl FakeSearch {
    fn with(reply: Reply<SearchResults>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn returning(results: SearchResults) -> Self {
        Self::with(Reply::Ok(results))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Reply::Fail(message.to_string()))
    }

    pub fn slow(delay: Duration) -> Self {
        Self::with(Reply::Slow(delay))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SearchRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        match &self.reply {
            Reply::Ok(results) => Ok(results.clone()),
            Reply::Fail(message) => Err(SerpwatchError::Search(message.clone())),
            Reply::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(SearchResults::default())
            }
        }
    }
}

pub struct FakeRecommender {
    reply: Reply<String>,
    calls: AtomicUsize,
    last: Mutex<Option<String>>,
}

impl FakeRecommender {
    fn with(reply: Reply<String>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::with(Reply::Ok(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Reply::Fail(message.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recommender for FakeRecommender {
    async fn recommend(&self, prompt: &str) -> Result<Recommendation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(prompt.to_string());
        match &self.reply {
            Reply::Ok(text) => Ok(Recommendation { text: text.clone() }),
            Reply::Fail(message) => Err(SerpwatchError::Model(message.clone())),
            Reply::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Recommendation {
                    text: String::new(),
                })
            }
        }
    }
}

#[derive(Default)]
pub struct FakeSink {
    fail_with: Option<String>,
    saved: Mutex<Vec<RankingSnapshot>>,
}

impl FakeSink {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn saved(&self) -> Vec<RankingSnapshot> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl RankingSink for FakeSink {
    async fn save(&self, snapshot: &RankingSnapshot) -> Result<()> {
        if let Some(message) = &self.fail_with {
            return Err(SerpwatchError::Storage(message.clone()));
        }
        self.saved.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}
