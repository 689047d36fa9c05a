//! Per-connection message handling
//!
//! A connection moves through `Unregistered -> Registered -> Closed`.
//! Pairing is tracked by the registry; the handler only remembers the name
//! it registered under so that cleanup can remove exactly that entry.

use std::sync::Arc;

use websh_core::error::RegistryError;
use websh_core::PeerKind;
use websh_protocol::{Envelope, ForwardKind, RelayNotice, RelayRequest};

use crate::registry::PeerHandle;
use crate::state::RelayState;

/// Error texts sent back to clients
pub mod replies {
    pub const NAME_TAKEN: &str = "Name already taken";
    pub const TARGET_NOT_FOUND: &str = "Target not found";
    pub const TARGET_PEER_NOT_FOUND: &str = "Target peer not found";
    pub const NAME_DOES_NOT_EXIST: &str = "Name doesn't exist";
    pub const UNKNOWN_TYPE: &str = "Unknown message type";
    pub const NOT_REGISTERED: &str = "Not registered";
    pub const ALREADY_REGISTERED: &str = "Already registered";
}

/// What the read loop should do after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// State of one relay connection
pub struct ConnectionHandler {
    state: Arc<RelayState>,
    handle: PeerHandle,
    /// Name this connection registered under
    name: Option<String>,
}

impl ConnectionHandler {
    pub fn new(state: Arc<RelayState>, handle: PeerHandle) -> Self {
        Self {
            state,
            handle,
            name: None,
        }
    }

    /// Registered name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn handle(&self) -> &PeerHandle {
        &self.handle
    }

    /// Process one text frame
    pub fn handle_text(&mut self, text: &str) -> Flow {
        let request = match RelayRequest::parse(text) {
            Ok(request) => request,
            Err(e) if e.is_malformed() => {
                tracing::warn!(
                    "Dropping malformed message on connection {}: {}",
                    self.handle.conn_id(),
                    e
                );
                return Flow::Continue;
            }
            Err(e) => {
                tracing::debug!("Connection {}: {}", self.handle.conn_id(), e);
                self.reply_error(replies::UNKNOWN_TYPE);
                return Flow::Continue;
            }
        };

        tracing::trace!(
            "Connection {} sent {}",
            self.handle.conn_id(),
            request.kind()
        );

        let Some(me) = self.name.clone() else {
            return self.handle_unregistered(request);
        };

        match request {
            RelayRequest::Register { .. } => {
                self.reply_error(replies::ALREADY_REGISTERED);
                Flow::Continue
            }
            RelayRequest::Connect { target } => {
                self.handle_connect(&me, &target);
                Flow::Continue
            }
            RelayRequest::Forward {
                kind,
                target,
                name,
                session,
                data,
            } => {
                if kind == ForwardKind::Candidate {
                    if let Some(claimed) = name.as_deref() {
                        if !self.state.registry.contains(claimed) {
                            tracing::warn!(
                                "Candidate from {} claims unregistered name {}",
                                me,
                                claimed
                            );
                            return self.reject(replies::NAME_DOES_NOT_EXIST);
                        }
                    }
                }
                self.handle_forward(&me, kind, target.as_deref(), session, data);
                Flow::Continue
            }
        }
    }

    fn handle_unregistered(&mut self, request: RelayRequest) -> Flow {
        match request {
            RelayRequest::Register { name, kind } => self.handle_register(name, kind),
            RelayRequest::Forward {
                kind: ForwardKind::Candidate,
                ..
            } => self.reject(replies::NAME_DOES_NOT_EXIST),
            other => {
                tracing::debug!(
                    "Connection {} sent {} before registering",
                    self.handle.conn_id(),
                    other.kind()
                );
                self.reply_error(replies::NOT_REGISTERED);
                Flow::Continue
            }
        }
    }

    fn handle_register(&mut self, name: String, kind: PeerKind) -> Flow {
        match self
            .state
            .registry
            .register(&name, kind, self.handle.clone())
        {
            Ok(()) => {
                tracing::info!(
                    "Registered {} peer {} (connection {})",
                    kind,
                    name,
                    self.handle.conn_id()
                );
                self.send_credentials(&name);
                self.name = Some(name);
                Flow::Continue
            }
            Err(RegistryError::DuplicateName(name)) => {
                tracing::warn!(
                    "Rejecting connection {}: name {} already taken",
                    self.handle.conn_id(),
                    name
                );
                self.reject(replies::NAME_TAKEN)
            }
            Err(e) => {
                tracing::warn!("Registration failed: {}", e);
                self.reply_error(&e.to_string());
                Flow::Continue
            }
        }
    }

    fn send_credentials(&self, name: &str) {
        match self.state.issue_credential(name) {
            None => {}
            Some(Ok(credential)) => match serde_json::to_string(&credential) {
                Ok(data) => {
                    self.handle
                        .send_notice(&RelayNotice::TurnCredentials { data });
                }
                Err(e) => tracing::error!("Failed to encode credential: {}", e),
            },
            Some(Err(e)) => tracing::warn!("Failed to issue credential for {}: {}", name, e),
        }
    }

    fn handle_connect(&self, me: &str, target: &str) {
        if let Err(e) = self.state.registry.pair(me, target) {
            tracing::debug!("Connect from {} failed: {}", me, e);
            self.reply_error(replies::TARGET_NOT_FOUND);
            return;
        }

        tracing::info!("Paired {} with {}", me, target);

        match self.state.registry.lookup(target) {
            Some(peer) => {
                peer.send_notice(&RelayNotice::ConnectionRequest {
                    from: me.to_string(),
                });
            }
            None => tracing::debug!("{} left before connection request was delivered", target),
        }
    }

    fn handle_forward(
        &self,
        me: &str,
        kind: ForwardKind,
        target: Option<&str>,
        session: Option<String>,
        data: Option<Box<serde_json::value::RawValue>>,
    ) {
        let Some(peer) = target.and_then(|t| self.state.registry.lookup(t)) else {
            tracing::debug!("{} from {} to unknown target {:?}", kind, me, target);
            self.reply_error(replies::TARGET_PEER_NOT_FOUND);
            return;
        };

        match Envelope::relabeled(kind, me, session, data).to_json() {
            Ok(json) => {
                tracing::debug!("Forwarding {} from {} to {:?}", kind, me, target);
                if !peer.send_text(json) {
                    tracing::debug!("Target {:?} is closing, dropped {}", target, kind);
                }
            }
            Err(e) => tracing::error!("Failed to encode forwarded {}: {}", kind, e),
        }
    }

    fn reply_error(&self, message: &str) {
        self.handle.send_notice(&RelayNotice::error(message));
    }

    /// Reply with an error and close the connection
    fn reject(&self, message: &str) -> Flow {
        self.reply_error(message);
        self.handle.close();
        Flow::Close
    }

    /// Remove this connection's registry entry. Safe to call repeatedly;
    /// only the first call has an effect.
    pub fn cleanup(&mut self) {
        let Some(name) = self.name.take() else {
            return;
        };

        match self
            .state
            .registry
            .remove_connection(&name, self.handle.conn_id())
        {
            Some(removed) => match removed.partner {
                Some(partner) => {
                    tracing::info!("{} disconnected, notified partner {}", name, partner)
                }
                None => tracing::info!("{} disconnected", name),
            },
            None => tracing::warn!("{} was not registered at cleanup", name),
        }
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        self.cleanup();
    }
}
