use async_trait::async_trait;
use relay_core::{InMemoryTopicNetwork, NetworkError, TopicNetwork, TopicStream};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Wraps the sandbox network with call counters and scripted failures.
#[derive(Clone)]
pub struct ScriptedNetwork {
    pub inner: InMemoryTopicNetwork,
    create_topic_calls: Arc<AtomicUsize>,
    create_account_calls: Arc<AtomicUsize>,
    publish_calls: Arc<AtomicUsize>,
    failing_publishes: Arc<Mutex<HashSet<usize>>>,
    fail_create_topic: Arc<Mutex<bool>>,
    fail_create_account: Arc<Mutex<bool>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::wrap(InMemoryTopicNetwork::new("0.0.2"))
    }

    pub fn wrap(inner: InMemoryTopicNetwork) -> Self {
        Self {
            inner,
            create_topic_calls: Arc::new(AtomicUsize::new(0)),
            create_account_calls: Arc::new(AtomicUsize::new(0)),
            publish_calls: Arc::new(AtomicUsize::new(0)),
            failing_publishes: Arc::new(Mutex::new(HashSet::new())),
            fail_create_topic: Arc::new(Mutex::new(false)),
            fail_create_account: Arc::new(Mutex::new(false)),
        }
    }

    /// Makes the `nth` publish call (1-based) fail with a transport error.
    pub fn fail_publish(&self, nth: usize) {
        self.failing_publishes.lock().unwrap().insert(nth);
    }

    pub fn fail_create_topic(&self) {
        *self.fail_create_topic.lock().unwrap() = true;
    }

    pub fn fail_create_account(&self) {
        *self.fail_create_account.lock().unwrap() = true;
    }

    pub fn create_topic_calls(&self) -> usize {
        self.create_topic_calls.load(Ordering::SeqCst)
    }

    pub fn create_account_calls(&self) -> usize {
        self.create_account_calls.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicNetwork for ScriptedNetwork {
    async fn create_topic(&self) -> Result<String, NetworkError> {
        self.create_topic_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_create_topic.lock().unwrap() {
            return Err(NetworkError::Rejected("INSUFFICIENT_PAYER_BALANCE".to_string()));
        }
        self.inner.create_topic().await
    }

    async fn create_account(&self) -> Result<String, NetworkError> {
        self.create_account_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_create_account.lock().unwrap() {
            return Err(NetworkError::Rejected("INVALID_SIGNATURE".to_string()));
        }
        self.inner.create_account().await
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<u64, NetworkError> {
        let call = self.publish_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_publishes.lock().unwrap().contains(&call) {
            return Err(NetworkError::Transport(format!("publish #{} timed out", call)));
        }
        self.inner.publish(topic, payload).await
    }

    async fn subscribe(&self, topic: &str) -> Result<TopicStream, NetworkError> {
        self.inner.subscribe(topic).await
    }
}
