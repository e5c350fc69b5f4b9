use anyhow::{Context, Result};
use clap::Parser;
use relay_core::utils::signature_hash;
use relay_core::{
    BridgeConfig, BridgeOrchestrator, InMemoryTopicNetwork, PersistentLedger, TopicNetwork, TransferRecord,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Relays transfer records to an ordered topic and records what comes back.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of outbound transfer records to submit this run
    count: u64,

    /// Configuration file path
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,

    /// Log level, overrides the configured one
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = BridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.monitoring.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("relay_core={0},topic_relay={0}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        network = %config.network.name,
        operator = %config.operator.account_id,
        "topic relay starting"
    );

    let network = match &config.network.data_dir {
        Some(dir) => InMemoryTopicNetwork::open(dir, config.operator.account_id.clone())?,
        None => InMemoryTopicNetwork::new(config.operator.account_id.clone()),
    };
    let network: Arc<dyn TopicNetwork> = Arc::new(network.with_admin_key(&config.operator.private_key));

    let ledger = PersistentLedger::open(&config.ledger.path, config.ledger.ordering, config.ledger.save_policy);
    let policy = config.termination.policy();
    let orchestrator = BridgeOrchestrator::new(network, ledger, policy);

    let records = outbound_batch(args.count);
    let report = orchestrator.run(&records).await?;

    tracing::info!(
        bridge = %report.bridge_identity,
        topic = %report.topic_identity,
        submitted = report.submitted.len(),
        failed = report.failed_submissions,
        accepted = report.ingest.accepted,
        duplicates = report.ingest.duplicates,
        malformed = report.ingest.malformed,
        termination = ?report.termination,
        "run finished"
    );

    if let Some(e) = &report.persistence_error {
        tracing::warn!(
            error = %e,
            path = %config.ledger.path.display(),
            "ledger was not saved; transactions ingested in this run may be lost"
        );
    }

    Ok(())
}

fn outbound_batch(count: u64) -> Vec<TransferRecord> {
    (0..count)
        .map(|i| {
            let from = format!("0x123{}", i);
            let amount = "100";
            let hash = signature_hash(&from, amount);
            TransferRecord::new(from, amount, hash)
        })
        .collect()
}
