//! Scripted stand-ins for the model and the news backends.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use newsdigest_shared::{RawArticle, Result, SourceKind};
use newsdigest_sources::NewsBackend;

use crate::llm::{ChatModel, ChatRequest};

type Reply = dyn Fn(&ChatRequest) -> Result<String> + Send + Sync;

/// A [`ChatModel`] answering from a closure, recording every request.
pub struct ScriptedModel {
    reply: Box<Reply>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ChatRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(reply: impl Fn(&ChatRequest) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of calls observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.reply)(&request)
    }
}

/// True when `request` comes from the sentiment classifier.
pub fn is_sentiment_request(request: &ChatRequest) -> bool {
    request.system.contains("sentiment")
}

type Answer = dyn Fn(&str, usize) -> Result<Vec<RawArticle>> + Send + Sync;

/// A [`NewsBackend`] answering from a closure, recording every query.
pub struct ScriptedBackend {
    kind: SourceKind,
    answer: Box<Answer>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(
        kind: SourceKind,
        answer: impl Fn(&str, usize) -> Result<Vec<RawArticle>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            answer: Box::new(answer),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Backend that never finds anything.
    pub fn empty(kind: SourceKind) -> Self {
        Self::new(kind, |_, _| Ok(Vec::new()))
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl NewsBackend for ScriptedBackend {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawArticle>> {
        self.queries.lock().unwrap().push(query.to_string());
        (self.answer)(query, limit)
    }
}

/// `count` distinct articles about `topic`.
pub fn articles(topic: &str, count: usize) -> Vec<RawArticle> {
    (1..=count)
        .map(|i| RawArticle {
            title: format!("{topic} story {i}"),
            url: format!("https://news.example.com/{i}"),
            published: "Mon, 03 Mar 2025 10:00:00 +0000".into(),
            source: format!("Outlet {}", i % 2),
            summary: format!("Excerpt {i} about {topic}."),
        })
        .collect()
}
