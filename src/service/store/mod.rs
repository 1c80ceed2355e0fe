pub mod json;

use std::{collections::BTreeMap, ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Res, Ticket, Void};

// Types.

/// Every ticket the bot has ever opened, keyed by ticket identifier.
pub type TicketMap = BTreeMap<String, Ticket>;

// Traits.

/// Generic ticket store trait that backends must implement.
///
/// A store holds whole-registry snapshots: the registry reads one at startup and
/// overwrites it after every mutation. There is no incremental update.
#[async_trait]
pub trait GenericTicketStore: Send + Sync + 'static {
    /// Reads the last snapshot.
    ///
    /// Returns `None` when nothing has been persisted yet, and an error when a
    /// snapshot exists but cannot be read or parsed.
    async fn load(&self) -> Res<Option<TicketMap>>;

    /// Replaces the persisted snapshot with `tickets`.
    async fn save(&self, tickets: &TicketMap) -> Void;
}

// Structs.

/// Ticket store for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct TicketStore {
    inner: Arc<dyn GenericTicketStore>,
}

impl Deref for TicketStore {
    type Target = dyn GenericTicketStore;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl TicketStore {
    pub fn new(inner: Arc<dyn GenericTicketStore>) -> Self {
        Self { inner }
    }
}
