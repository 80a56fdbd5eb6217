// File: src/learning.rs
//! Hand-off of learn and train submissions to per-language consumers.

use crate::core::types::{Language, TrainingRequest};
use crate::error::{CorpusError, DispatchError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub type LearnReceiver = mpsc::Receiver<TrainingRequest>;

/// What `submit` does when a language's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail the submission with [`DispatchError::QueueFull`].
    Reject,
    /// Accept the submission and discard it.
    DropNewest,
    /// Accept the submission and let a background task wait for space,
    /// dropping the word if none frees up in time.
    Defer { timeout_ms: u64 },
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::Defer { timeout_ms: 5000 }
    }
}

/// Applies training requests to persistent storage.
pub trait Trainer: Send + Sync {
    fn train(&self, request: &TrainingRequest) -> Result<(), CorpusError>;
}

/// Routes training requests to one bounded channel per configured language.
///
/// The language set is fixed at construction. `submit` never waits on the
/// consumer.
pub struct LearnDispatcher {
    channels: HashMap<Language, mpsc::Sender<TrainingRequest>>,
    policy: OverflowPolicy,
    runtime: Option<Handle>,
    dropped: Arc<AtomicU64>,
}

impl LearnDispatcher {
    /// Creates the dispatcher and the receiving end for every language.
    ///
    /// Deferred hand-offs are spawned on the runtime current at construction.
    /// Without one, `Defer` behaves like `Reject`.
    pub fn new<I>(
        languages: I,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> (Self, HashMap<Language, LearnReceiver>)
    where
        I: IntoIterator<Item = Language>,
    {
        let mut channels = HashMap::new();
        let mut receivers = HashMap::new();
        for language in languages {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            channels.insert(language.clone(), tx);
            receivers.insert(language, rx);
        }

        let dispatcher = Self {
            channels,
            policy,
            runtime: Handle::try_current().ok(),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (dispatcher, receivers)
    }

    /// Queues `word` for the language's consumer.
    pub fn submit(&self, language: &str, word: impl Into<String>) -> Result<(), DispatchError> {
        self.dispatch(TrainingRequest::learn(Language::new(language), word))
    }

    /// Queues an explicit pattern to word training request.
    pub fn submit_training(
        &self,
        language: &str,
        pattern: impl Into<String>,
        word: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.dispatch(TrainingRequest::train(Language::new(language), pattern, word))
    }

    pub fn dispatch(&self, request: TrainingRequest) -> Result<(), DispatchError> {
        let tx = self
            .channels
            .get(&request.language)
            .ok_or_else(|| DispatchError::UnknownLanguage(request.language.to_string()))?;

        let request = match tx.try_send(request) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(r)) => return Err(DispatchError::Closed(r.language.to_string())),
            Err(TrySendError::Full(r)) => r,
        };

        match self.policy {
            OverflowPolicy::Reject => Err(DispatchError::QueueFull(request.language.to_string())),
            OverflowPolicy::DropNewest => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(language = %request.language, word = %request.word, "learn queue full, dropping word");
                Ok(())
            }
            OverflowPolicy::Defer { timeout_ms } => {
                let Some(runtime) = &self.runtime else {
                    return Err(DispatchError::QueueFull(request.language.to_string()));
                };
                let tx = tx.clone();
                let dropped = Arc::clone(&self.dropped);
                debug!(language = %request.language, "learn queue full, deferring hand-off");

                runtime.spawn(async move {
                    match tx.send_timeout(request, Duration::from_millis(timeout_ms)).await {
                        Ok(()) => {}
                        Err(SendTimeoutError::Timeout(r)) => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                            warn!(language = %r.language, word = %r.word, timeout_ms, "learn hand-off timed out, dropping word");
                        }
                        Err(SendTimeoutError::Closed(r)) => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                            warn!(language = %r.language, "learn consumer gone, dropping word");
                        }
                    }
                });
                Ok(())
            }
        }
    }

    /// Submissions accepted but never delivered.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drains one language's queue into `trainer`, one request at a time.
///
/// Failures are logged and skipped. The task ends when every sender is gone
/// and returns how many requests were applied. Fails with
/// [`DispatchError::NoRuntime`] when called outside a tokio runtime.
pub fn spawn_trainer<T>(mut receiver: LearnReceiver, trainer: Arc<T>) -> Result<JoinHandle<u64>, DispatchError>
where
    T: Trainer + ?Sized + 'static,
{
    let runtime = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
    Ok(runtime.spawn(async move {
        let mut applied = 0u64;
        while let Some(request) = receiver.recv().await {
            match trainer.train(&request) {
                Ok(()) => applied += 1,
                Err(e) => warn!(language = %request.language, word = %request.word, "training failed: {}", e),
            }
        }
        applied
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryCorpus;
    use std::time::Instant;
    use tokio::sync::mpsc::error::TryRecvError;

    fn languages() -> Vec<Language> {
        vec![Language::new("ml"), Language::new("hi")]
    }

    #[tokio::test]
    async fn test_unknown_language_rejected_without_send() {
        let (dispatcher, mut receivers) = LearnDispatcher::new(languages(), 8, OverflowPolicy::Reject);

        let err = dispatcher.submit("xx", "word").unwrap_err();
        assert_eq!(err, DispatchError::UnknownLanguage("xx".to_string()));

        for rx in receivers.values_mut() {
            assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
        }
    }

    #[tokio::test]
    async fn test_submit_routes_to_language() {
        let (dispatcher, mut receivers) = LearnDispatcher::new(languages(), 8, OverflowPolicy::Reject);
        dispatcher.submit("ml", "അമ്മ").unwrap();

        let got = receivers.get_mut(&Language::new("ml")).unwrap().try_recv().unwrap();
        assert_eq!(got, TrainingRequest::learn(Language::new("ml"), "അമ്മ"));
        assert!(receivers.get_mut(&Language::new("hi")).unwrap().try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rapid_submissions_do_not_block() {
        let (dispatcher, _receivers) = LearnDispatcher::new(languages(), 4096, OverflowPolicy::default());

        let started = Instant::now();
        for i in 0..1000 {
            dispatcher.submit("ml", format!("word{}", i)).unwrap();
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_deferred_submissions_do_not_block_on_full_queue() {
        let (dispatcher, mut receivers) =
            LearnDispatcher::new(languages(), 4, OverflowPolicy::Defer { timeout_ms: 10_000 });

        let started = Instant::now();
        for i in 0..1000 {
            dispatcher.submit("ml", format!("word{}", i)).unwrap();
        }
        assert!(started.elapsed() < Duration::from_secs(1));

        let rx = receivers.get_mut(&Language::new("ml")).unwrap();
        let mut received = 0;
        while received < 1000 {
            tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
            received += 1;
        }
        assert_eq!(dispatcher.dropped(), 0);
    }

    #[tokio::test]
    async fn test_reject_policy_on_full_queue() {
        let (dispatcher, _receivers) = LearnDispatcher::new(languages(), 1, OverflowPolicy::Reject);
        dispatcher.submit("ml", "a").unwrap();
        assert_eq!(dispatcher.submit("ml", "b"), Err(DispatchError::QueueFull("ml".to_string())));
    }

    #[tokio::test]
    async fn test_drop_newest_policy_counts_drops() {
        let (dispatcher, mut receivers) = LearnDispatcher::new(languages(), 1, OverflowPolicy::DropNewest);
        dispatcher.submit("ml", "a").unwrap();
        dispatcher.submit("ml", "b").unwrap();
        assert_eq!(dispatcher.dropped(), 1);

        let rx = receivers.get_mut(&Language::new("ml")).unwrap();
        assert_eq!(rx.try_recv().unwrap().word, "a");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_consumer() {
        let (dispatcher, receivers) = LearnDispatcher::new(languages(), 4, OverflowPolicy::Reject);
        drop(receivers);
        assert_eq!(dispatcher.submit("hi", "a"), Err(DispatchError::Closed("hi".to_string())));
    }

    #[tokio::test]
    async fn test_trainer_applies_submissions() {
        let corpus = Arc::new(MemoryCorpus::new(languages()));
        let (dispatcher, mut receivers) = LearnDispatcher::new(languages(), 16, OverflowPolicy::Reject);
        let rx = receivers.remove(&Language::new("ml")).unwrap();
        let consumer = spawn_trainer(rx, Arc::clone(&corpus)).unwrap();

        dispatcher.submit("ml", "a").unwrap();
        dispatcher.submit_training("ml", "b", "ബ").unwrap();
        dispatcher.submit("ml", "a").unwrap();
        drop(dispatcher);

        assert_eq!(consumer.await.unwrap(), 3);
        assert_eq!(corpus.len(&Language::new("ml")), 2);
    }

    #[test]
    fn test_trainer_needs_runtime() {
        let corpus = Arc::new(MemoryCorpus::new(languages()));
        let (_dispatcher, mut receivers) = LearnDispatcher::new(languages(), 4, OverflowPolicy::Reject);
        let rx = receivers.remove(&Language::new("ml")).unwrap();
        assert_eq!(spawn_trainer(rx, corpus).unwrap_err(), DispatchError::NoRuntime);
    }

    #[test]
    fn test_policy_serde() {
        let policy: OverflowPolicy = serde_json::from_str(r#"{"policy":"defer","timeout_ms":250}"#).unwrap();
        assert_eq!(policy, OverflowPolicy::Defer { timeout_ms: 250 });
        let policy: OverflowPolicy = serde_json::from_str(r#"{"policy":"reject"}"#).unwrap();
        assert_eq!(policy, OverflowPolicy::Reject);
    }
}
