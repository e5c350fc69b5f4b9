//! The ordered-log service the bridge talks to.
//!
//! [`TopicNetwork`] is the whole surface the bridge needs: create a topic,
//! provision an account, publish and subscribe. [`InMemoryTopicNetwork`] is a
//! local sandbox that honours the same contract: sequences start at 1 per
//! topic, and a new subscription replays the topic's history before
//! delivering live messages.

use crate::error::NetworkError;
use crate::types::TopicMessage;
use crate::utils::{key_fingerprint, write_atomic_blocking};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Messages delivered by a subscription. An `Err` item ends the subscription.
pub type TopicStream = mpsc::UnboundedReceiver<Result<TopicMessage, NetworkError>>;

type TopicSender = mpsc::UnboundedSender<Result<TopicMessage, NetworkError>>;

#[async_trait]
pub trait TopicNetwork: Send + Sync {
    async fn create_topic(&self) -> Result<String, NetworkError>;

    async fn create_account(&self) -> Result<String, NetworkError>;

    /// Publishes `payload` and returns the sequence the topic assigned to it.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<u64, NetworkError>;

    async fn subscribe(&self, topic: &str) -> Result<TopicStream, NetworkError>;
}

const FIRST_ENTITY_NUM: u64 = 1001;
const SNAPSHOT_FILE: &str = "topics.json";

#[derive(Serialize, Deserialize)]
struct NetworkState {
    next_entity: u64,
    topics: BTreeMap<String, TopicLog>,
    accounts: Vec<String>,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            next_entity: FIRST_ENTITY_NUM,
            topics: BTreeMap::new(),
            accounts: Vec::new(),
        }
    }
}

impl NetworkState {
    fn allocate_id(&mut self) -> String {
        let id = format!("0.0.{}", self.next_entity);
        self.next_entity += 1;
        id
    }
}

#[derive(Serialize, Deserialize, Default)]
struct TopicLog {
    owner: String,
    /// Fingerprint of the key allowed to administer the topic.
    #[serde(default)]
    admin_key: Option<String>,
    messages: Vec<TopicMessage>,
    #[serde(skip)]
    subscribers: Vec<TopicSender>,
}

impl TopicLog {
    fn broadcast(&mut self, item: Result<TopicMessage, NetworkError>) {
        self.subscribers.retain(|tx| tx.send(item.clone()).is_ok());
    }
}

#[derive(Clone)]
pub struct InMemoryTopicNetwork {
    state: Arc<RwLock<NetworkState>>,
    operator: String,
    admin_key: Option<String>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryTopicNetwork {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(NetworkState::default())),
            operator: operator.into(),
            admin_key: None,
            snapshot_path: None,
        }
    }

    /// Opens a sandbox whose topics are kept in `data_dir` across restarts.
    pub fn open(data_dir: &Path, operator: impl Into<String>) -> Result<Self> {
        let snapshot_path = data_dir.join(SNAPSHOT_FILE);
        let state = if snapshot_path.exists() {
            let content = fs::read(&snapshot_path)
                .with_context(|| format!("reading {}", snapshot_path.display()))?;
            serde_json::from_slice(&content)
                .with_context(|| format!("parsing {}", snapshot_path.display()))?
        } else {
            NetworkState::default()
        };

        info!(
            path = %snapshot_path.display(),
            topics = state.topics.len(),
            "sandbox network opened"
        );

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            operator: operator.into(),
            admin_key: None,
            snapshot_path: Some(snapshot_path),
        })
    }

    /// Signs for the operator with `private_key`: topics created afterwards carry its
    /// fingerprint as their admin key.
    pub fn with_admin_key(mut self, private_key: &str) -> Self {
        self.admin_key = Some(key_fingerprint(private_key));
        self
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub async fn topic_admin_key(&self, topic: &str) -> Option<String> {
        self.state
            .read()
            .await
            .topics
            .get(topic)
            .and_then(|log| log.admin_key.clone())
    }

    pub async fn topic_exists(&self, topic: &str) -> bool {
        self.state.read().await.topics.contains_key(topic)
    }

    pub async fn message_count(&self, topic: &str) -> usize {
        self.state
            .read()
            .await
            .topics
            .get(topic)
            .map(|log| log.messages.len())
            .unwrap_or(0)
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .read()
            .await
            .topics
            .get(topic)
            .map(|log| log.subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Delivers `message` verbatim to live subscribers without recording it on the topic.
    ///
    /// Mirrors what an at-least-once delivery layer may do: repeat or reorder messages.
    pub async fn inject(&self, topic: &str, message: TopicMessage) -> Result<(), NetworkError> {
        let mut state = self.state.write().await;
        let log = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| NetworkError::TopicNotFound(topic.to_string()))?;
        log.broadcast(Ok(message));
        Ok(())
    }

    /// Re-delivers the already recorded message `sequence` to live subscribers.
    pub async fn redeliver(&self, topic: &str, sequence: u64) -> Result<(), NetworkError> {
        let mut state = self.state.write().await;
        let log = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| NetworkError::TopicNotFound(topic.to_string()))?;
        let message = sequence
            .checked_sub(1)
            .and_then(|idx| log.messages.get(idx as usize))
            .cloned()
            .ok_or_else(|| NetworkError::Rejected(format!("no message {} on topic {}", sequence, topic)))?;
        log.broadcast(Ok(message));
        Ok(())
    }

    /// Sends `error` to every subscriber of `topic` and drops them.
    pub async fn fail_subscriptions(&self, topic: &str, error: NetworkError) {
        let mut state = self.state.write().await;
        if let Some(log) = state.topics.get_mut(topic) {
            for tx in log.subscribers.drain(..) {
                let _ = tx.send(Err(error.clone()));
            }
        }
    }

    /// Writes the snapshot, if any. Callers hold the state lock across the await, so
    /// a mutation is only committed once it is on disk.
    async fn persist(&self, state: &NetworkState) -> Result<(), NetworkError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| NetworkError::Transport(format!("encoding sandbox snapshot: {}", e)))?;
        write_atomic_blocking(path.clone(), json)
            .await
            .map_err(|e| NetworkError::Transport(format!("writing {}: {}", path.display(), e)))
    }
}

#[async_trait]
impl TopicNetwork for InMemoryTopicNetwork {
    async fn create_topic(&self) -> Result<String, NetworkError> {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        state.topics.insert(
            id.clone(),
            TopicLog {
                owner: self.operator.clone(),
                admin_key: self.admin_key.clone(),
                ..TopicLog::default()
            },
        );
        if let Err(e) = self.persist(&state).await {
            state.topics.remove(&id);
            state.next_entity -= 1;
            return Err(e);
        }

        info!(topic = %id, owner = %self.operator, admin_key = self.admin_key.is_some(), "topic created");
        Ok(id)
    }

    async fn create_account(&self) -> Result<String, NetworkError> {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        state.accounts.push(id.clone());
        if let Err(e) = self.persist(&state).await {
            state.accounts.pop();
            state.next_entity -= 1;
            return Err(e);
        }

        info!(account = %id, "account created");
        Ok(id)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<u64, NetworkError> {
        let mut state = self.state.write().await;
        let log = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| NetworkError::TopicNotFound(topic.to_string()))?;

        let sequence = log.messages.len() as u64 + 1;
        let message = TopicMessage::new(sequence, payload);
        log.messages.push(message.clone());

        let persisted = self.persist(&state).await;
        let Some(log) = state.topics.get_mut(topic) else {
            return Err(NetworkError::TopicNotFound(topic.to_string()));
        };
        if let Err(e) = persisted {
            log.messages.pop();
            return Err(e);
        }
        log.broadcast(Ok(message));

        debug!(topic, sequence, "message published");
        Ok(sequence)
    }

    async fn subscribe(&self, topic: &str) -> Result<TopicStream, NetworkError> {
        let mut state = self.state.write().await;
        let log = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| NetworkError::TopicNotFound(topic.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        for message in &log.messages {
            let _ = tx.send(Ok(message.clone()));
        }
        log.subscribers.push(tx);

        debug!(topic, replayed = log.messages.len(), "subscription opened");
        Ok(rx)
    }
}
