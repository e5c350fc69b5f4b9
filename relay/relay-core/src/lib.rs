pub mod types;
pub mod error;
pub mod codec;
pub mod config;
pub mod ledger;
pub mod network;
pub mod submitter;
pub mod subscriber;
pub mod orchestrator;
pub mod utils;

pub use types::*;
pub use error::*;
pub use config::*;
pub use ledger::PersistentLedger;
pub use network::{InMemoryTopicNetwork, TopicNetwork, TopicStream};
pub use submitter::{BatchOutcome, MessageSubmitter};
pub use subscriber::{IngestProgress, SubscriptionHandle, SubscriptionState, TopicSubscriber};
pub use orchestrator::{BridgeOrchestrator, RunReport, TerminationReason};
