//! Runtime services and shared state for the ticket-bot.

use std::num::NonZeroUsize;

use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    ledger::DedupLedger,
    registry::TicketRegistry,
    service::{chat::ChatClient, store::TicketStore},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the ticket registry, the deduplication ledger, the chat client,
/// and configuration. It is designed to be trivially cloneable, allowing it to be
/// passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The ticket registry.
    pub registry: TicketRegistry,
    /// The deduplication ledger for outbound relays.
    pub ledger: DedupLedger,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Load the registry.
        let store = TicketStore::json(config.tickets_path.clone());
        let registry = TicketRegistry::load(store).await;

        // Initialize the ledger.
        let ledger = DedupLedger::new(dedup_capacity(&config)?);

        // Initialize the discord client.
        let chat = ChatClient::discord(&config, registry.clone(), ledger.clone()).await?;

        info!("Runtime ready with {} known tickets.", registry.len().await);

        Ok(Self { config, registry, ledger, chat })
    }

    pub async fn start(&self) -> Void {
        self.chat.start().await
    }

    /// Whether any of `role_ids` grants the staff capability.
    pub fn is_staff(&self, role_ids: &[u64]) -> bool {
        role_ids.contains(&self.config.staff_role_id)
    }
}

/// The configured ledger capacity.
pub fn dedup_capacity(config: &Config) -> Res<NonZeroUsize> {
    NonZeroUsize::new(config.dedup_capacity).ok_or_else(|| anyhow::anyhow!("Deduplication capacity must be at least 1."))
}
