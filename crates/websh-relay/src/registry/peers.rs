//! Registered peers
//!
//! All mutations go through one mutex so that two connections racing for
//! the same name see exactly one winner, and pairing changes never
//! interleave with removals.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use websh_core::error::RegistryError;
use websh_core::PeerKind;
use websh_protocol::RelayNotice;

use super::pairing::PairingTable;

/// Identifier of one accepted socket
pub type ConnectionId = u64;

/// Item queued for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text frame
    Text(String),
    /// Close the socket after flushing what was queued before
    Close,
}

/// Sending side of a connection's outbound queue
#[derive(Debug, Clone)]
pub struct PeerHandle {
    conn_id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl PeerHandle {
    pub fn new(conn_id: ConnectionId, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { conn_id, tx }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Queue a text frame. Never blocks; returns false if the writer is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.tx.send(Outbound::Text(text)).is_ok()
    }

    /// Queue a relay notice
    pub fn send_notice(&self, notice: &RelayNotice) -> bool {
        match notice.to_json() {
            Ok(json) => self.send_text(json),
            Err(e) => {
                tracing::error!("Failed to encode notice: {}", e);
                false
            }
        }
    }

    /// Ask the writer to close the socket
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

/// A registered endpoint
#[derive(Debug, Clone)]
struct PeerEntry {
    kind: PeerKind,
    handle: PeerHandle,
}

/// Outcome of removing a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub kind: PeerKind,
    /// Partner that was notified and unpaired
    pub partner: Option<String>,
}

#[derive(Default)]
struct Inner {
    peers: HashMap<String, PeerEntry>,
    pairings: PairingTable,
}

/// In-memory map from peer name to connection and pairing state
#[derive(Default)]
pub struct PeerRegistry {
    inner: Mutex<Inner>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` for the connection behind `handle`
    pub fn register(
        &self,
        name: &str,
        kind: PeerKind,
        handle: PeerHandle,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.peers.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        inner
            .peers
            .insert(name.to_string(), PeerEntry { kind, handle });
        Ok(())
    }

    /// Handle of a registered peer
    pub fn lookup(&self, name: &str) -> Option<PeerHandle> {
        self.inner.lock().peers.get(name).map(|e| e.handle.clone())
    }

    pub fn kind_of(&self, name: &str) -> Option<PeerKind> {
        self.inner.lock().peers.get(name).map(|e| e.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().peers.contains_key(name)
    }

    /// Pair two registered peers
    pub fn pair(&self, a: &str, b: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        for name in [a, b] {
            if !inner.peers.contains_key(name) {
                return Err(RegistryError::UnknownPeer(name.to_string()));
            }
        }
        inner.pairings.link(a, b);
        Ok(())
    }

    /// Clear `name`'s pairing on both sides; returns the former partner
    pub fn unpair(&self, name: &str) -> Option<String> {
        self.inner.lock().pairings.unlink(name)
    }

    pub fn partner_of(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .pairings
            .partner_of(name)
            .map(str::to_string)
    }

    /// Remove `name`, notifying and unpairing its partner
    pub fn remove(&self, name: &str) -> Option<Removed> {
        self.remove_inner(name, None)
    }

    /// Remove `name` only if it is still owned by `conn_id`
    pub fn remove_connection(&self, name: &str, conn_id: ConnectionId) -> Option<Removed> {
        self.remove_inner(name, Some(conn_id))
    }

    fn remove_inner(&self, name: &str, conn_id: Option<ConnectionId>) -> Option<Removed> {
        let mut inner = self.inner.lock();

        let owned = inner
            .peers
            .get(name)
            .is_some_and(|e| conn_id.map_or(true, |id| e.handle.conn_id() == id));
        if !owned {
            return None;
        }

        let entry = inner.peers.remove(name)?;
        let partner = inner.pairings.unlink(name);

        if let Some(partner_name) = partner.as_deref() {
            if let Some(partner_entry) = inner.peers.get(partner_name) {
                partner_entry.handle.send_notice(&RelayNotice::PeerDisconnected {
                    name: name.to_string(),
                });
            }
        }

        Some(Removed {
            kind: entry.kind,
            partner,
        })
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.inner.lock().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().peers.is_empty()
    }
}
