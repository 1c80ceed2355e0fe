//! The in-memory ticket registry.
//!
//! Every ticket the bot has opened is held in memory and mirrored to the ticket store
//! after each mutation. All mutations go through one async lock that also covers the
//! snapshot write, so concurrent operations on the same ticket are serialized and the
//! store always receives snapshots in the order the mutations happened.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::{
    base::types::{Category, Res, Ticket, TicketStatus},
    service::store::{TicketMap, TicketStore},
};

/// Result of a close request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// This call moved the ticket from `open` to `closed`.
    Closed(Ticket),
    /// The ticket was already closed; nothing changed.
    AlreadyClosed(Ticket),
    NotFound,
}

/// Ticket registry.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct TicketRegistry {
    tickets: Arc<Mutex<TicketMap>>,
    store: TicketStore,
}

impl TicketRegistry {
    /// Loads the registry from `store`.
    ///
    /// A snapshot that cannot be read leaves the registry empty; the tickets it held are
    /// no longer tracked.
    #[instrument(name = "TicketRegistry::load", skip_all)]
    pub async fn load(store: TicketStore) -> Self {
        let tickets = match store.load().await {
            Ok(Some(tickets)) => {
                info!("Loaded {} tickets from the store.", tickets.len());
                tickets
            }
            Ok(None) => {
                info!("No persisted tickets found; starting empty.");
                TicketMap::new()
            }
            Err(err) => {
                error!("Failed to load persisted tickets; starting empty: {:#}", err);
                TicketMap::new()
            }
        };

        Self {
            tickets: Arc::new(Mutex::new(tickets)),
            store,
        }
    }

    /// Opens a new ticket and persists the registry.
    #[instrument(skip(self))]
    pub async fn create(&self, user_id: u64, thread_id: u64, category: Category) -> Res<Ticket> {
        let mut tickets = self.tickets.lock().await;

        if let Some(existing) = tickets.values().find(|t| t.thread_id == thread_id) {
            return Err(anyhow::anyhow!("Thread {} already belongs to ticket {}.", thread_id, existing.id));
        }

        let id = next_id(&tickets, chrono::Utc::now().timestamp_millis());
        let ticket = Ticket {
            id: id.clone(),
            user_id,
            thread_id,
            category,
            status: TicketStatus::Open,
        };

        tickets.insert(id.clone(), ticket.clone());

        if let Err(err) = self.store.save(&tickets).await {
            tickets.remove(&id);
            return Err(err);
        }

        info!("Opened ticket {} for user {} in thread {}.", id, user_id, thread_id);

        Ok(ticket)
    }

    /// Closes a ticket and persists the registry.
    ///
    /// Closing is idempotent: a second close reports [`CloseOutcome::AlreadyClosed`] and
    /// rewrites nothing, which lets callers skip duplicate notifications.
    #[instrument(skip(self))]
    pub async fn close(&self, ticket_id: &str) -> Res<CloseOutcome> {
        let mut tickets = self.tickets.lock().await;

        let Some(ticket) = tickets.get_mut(ticket_id) else {
            return Ok(CloseOutcome::NotFound);
        };

        if !ticket.is_open() {
            warn!("Ticket {} is already closed.", ticket_id);
            return Ok(CloseOutcome::AlreadyClosed(ticket.clone()));
        }

        ticket.status = TicketStatus::Closed;
        let closed = ticket.clone();

        if let Err(err) = self.store.save(&tickets).await {
            if let Some(ticket) = tickets.get_mut(ticket_id) {
                ticket.status = TicketStatus::Open;
            }
            return Err(err);
        }

        info!("Closed ticket {}.", ticket_id);

        Ok(CloseOutcome::Closed(closed))
    }

    pub async fn get(&self, ticket_id: &str) -> Option<Ticket> {
        self.tickets.lock().await.get(ticket_id).cloned()
    }

    /// Finds the ticket bound to a thread, whatever its status.
    pub async fn find_by_thread(&self, thread_id: u64) -> Option<Ticket> {
        self.tickets.lock().await.values().find(|t| t.thread_id == thread_id).cloned()
    }

    /// Finds the most recently opened ticket of `user_id` that is still open.
    pub async fn find_open_by_owner(&self, user_id: u64) -> Option<Ticket> {
        self.tickets
            .lock()
            .await
            .values()
            .filter(|t| t.user_id == user_id && t.is_open())
            .max_by_key(|t| (t.id.len(), t.id.clone()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.tickets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tickets.lock().await.is_empty()
    }
}

/// Picks the first unused identifier at or after `millis`.
fn next_id(tickets: &TicketMap, millis: i64) -> String {
    let mut candidate = millis;

    while tickets.contains_key(&candidate.to_string()) {
        candidate += 1;
    }

    candidate.to_string()
}
