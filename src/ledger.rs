//! Duplicate suppression for outbound relays.
//!
//! Each outbound message is reduced to a fingerprint of its recipient and content. A
//! fingerprint is reserved before the send and released again if the send fails, so two
//! identical relays racing each other still produce one delivery. The ledger remembers
//! a bounded number of fingerprints and forgets the least recently seen first.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
};

use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::base::types::{Destination, OutboundMessage, Res};

/// Deduplication ledger.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DedupLedger {
    seen: Arc<Mutex<LruCache<String, ()>>>,
}

impl DedupLedger {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            seen: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Computes the fingerprint of `message` sent to `destination`.
    ///
    /// Card timestamps do not take part, so the same text relayed twice matches.
    pub fn fingerprint(destination: &Destination, message: &OutboundMessage) -> Res<String> {
        let content = serde_json::to_string(message)?;

        let mut hasher = Sha256::new();
        hasher.update(destination.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(content.as_bytes());

        Ok(hex::encode(hasher.finalize()))
    }

    /// Records `fingerprint`, returning `false` if it was already present.
    pub fn reserve(&self, fingerprint: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);

        if seen.get(fingerprint).is_some() {
            return false;
        }

        seen.put(fingerprint.to_string(), ());
        true
    }

    /// Forgets `fingerprint` so the message may be sent again.
    pub fn release(&self, fingerprint: &str) {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).pop(fingerprint);
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
