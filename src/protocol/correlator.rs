//! Request/response correlation for the client side.
//!
//! Every outgoing request gets an id of the form `<prefix><counter>`. A pending
//! record (a oneshot sender) is registered under that id before the request is
//! written; the receive loop hands each incoming packet to [`Correlator::resolve`],
//! which completes the matching waiter or returns the packet for broadcast
//! routing. Responses may arrive in any order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};

#[derive(Debug)]
pub struct Correlator {
    prefix: char,
    next_id: AtomicU64,
    pending: Mutex<HashMap<String, oneshot::Sender<Packet>>>,
}

impl Correlator {
    pub fn new(prefix: char) -> Self {
        Self {
            prefix,
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<String, oneshot::Sender<Packet>>>> {
        self.pending
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.to_string()))
    }

    /// Allocate the next correlation id. Never repeats for this correlator.
    pub fn next_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }

    /// Register a waiter for `id`. Must happen before the request is written.
    pub fn register(&self, id: &str) -> Result<oneshot::Receiver<Packet>> {
        let (tx, rx) = oneshot::channel();
        self.table()?.insert(id.to_string(), tx);
        trace!(request_id = id, "Registered pending request");
        Ok(rx)
    }

    /// Route an incoming packet.
    ///
    /// Returns `None` when the packet completed a pending request, or gives the
    /// packet back when nothing was waiting for it.
    pub fn resolve(&self, packet: Packet) -> Result<Option<Packet>> {
        let waiter = match packet.id.as_deref() {
            Some(id) => self.table()?.remove(id),
            None => None,
        };

        match waiter {
            Some(tx) => {
                if let Err(packet) = tx.send(packet) {
                    // Caller gave up (timeout or dropped future)
                    debug!(packet = %packet, "Response arrived for abandoned request");
                }
                Ok(None)
            }
            None => Ok(Some(packet)),
        }
    }

    /// Drop the pending record for `id`, if any.
    pub fn forget(&self, id: &str) -> bool {
        match self.table() {
            Ok(mut table) => table.remove(id).is_some(),
            Err(_) => false,
        }
    }

    /// Ids of requests still waiting for a response (for diagnostics).
    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = match self.table() {
            Ok(table) => table.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        ids.sort();
        ids
    }

    pub fn pending_len(&self) -> usize {
        self.table().map(|table| table.len()).unwrap_or(0)
    }
}
