//! JSON file implementation of the ticket store.
//!
//! The whole registry lives in one pretty-printed JSON object keyed by ticket id.
//! Snapshots are written to a sibling temporary file and renamed over the target, so
//! a crash mid-write leaves the previous snapshot intact.

use std::{
    ffi::OsString,
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::base::types::{Res, Void};

use super::{GenericTicketStore, TicketMap, TicketStore};

// Extra methods on `TicketStore` applied by the JSON implementation.

impl TicketStore {
    /// Creates a ticket store backed by the JSON file at `path`.
    pub fn json(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(JsonTicketStore::new(path)),
        }
    }
}

/// JSON file ticket store.
#[derive(Debug, Clone)]
pub struct JsonTicketStore {
    path: PathBuf,
}

impl JsonTicketStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The sibling file a snapshot is staged in before the rename.
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(OsString::from).unwrap_or_else(|| OsString::from("tickets.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl GenericTicketStore for JsonTicketStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Res<Option<TicketMap>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let raw = tokio::fs::read_to_string(&self.path).await.with_context(|| format!("Failed to read `{}`", self.path.display()))?;
        let mut tickets: TicketMap = serde_json::from_str(&raw).with_context(|| format!("Failed to parse `{}`", self.path.display()))?;

        // The id is the map key; copy it into each record.
        for (id, ticket) in tickets.iter_mut() {
            ticket.id = id.clone();
        }

        debug!("Loaded {} tickets.", tickets.len());

        Ok(Some(tickets))
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn save(&self, tickets: &TicketMap) -> Void {
        let json = serde_json::to_string_pretty(tickets)?;
        let staging = self.staging_path();

        tokio::fs::write(&staging, json).await.with_context(|| format!("Failed to write `{}`", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("Failed to replace `{}`", self.path.display()))?;

        debug!("Saved {} tickets.", tickets.len());

        Ok(())
    }
}
