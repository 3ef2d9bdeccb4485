//! Scripted generator for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::generate::{GenerationError, Generator};

pub struct FakeGenerator {
    replies: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl FakeGenerator {
    /// Answers each call with the next reply, in order
    pub fn replying<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self::with_replies(
            replies.into_iter().map(|r| Some(r.into())).collect(),
        ))
    }

    /// Fails every call
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::with_replies(VecDeque::new()))
    }

    fn with_replies(replies: VecDeque<Option<String>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn with_delay_ms(self: Arc<Self>, ms: u64) -> Arc<Self> {
        let mut fake = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("fake already shared"));
        fake.delay = Duration::from_millis(ms);
        Arc::new(fake)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Calls that ran to the end instead of being cancelled
    pub fn completions(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.replies.lock().unwrap().pop_front().flatten();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        reply.ok_or_else(|| GenerationError::Api {
            status: 500,
            body: "scripted failure".to_string(),
        })
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}
