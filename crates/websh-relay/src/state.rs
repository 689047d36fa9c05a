//! Shared relay state

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use websh_core::config::RelayConfig;
use websh_core::error::CredentialError;
use websh_core::{Credential, CredentialIssuer, HmacCredentialIssuer};

use crate::registry::{ConnectionId, PeerRegistry};

/// State shared by every connection of one relay instance
pub struct RelayState {
    /// Configuration
    pub config: RelayConfig,
    /// Registered peers
    pub registry: Arc<PeerRegistry>,
    /// Issuer for relay-assisted transport credentials
    credentials: Option<Arc<dyn CredentialIssuer>>,
    next_connection: AtomicU64,
}

impl RelayState {
    /// Create relay state without credential issuance
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            registry: Arc::new(PeerRegistry::new()),
            credentials: None,
            next_connection: AtomicU64::new(1),
        }
    }

    /// Create relay state with the provided credential issuer
    pub fn with_credentials(config: RelayConfig, issuer: Arc<dyn CredentialIssuer>) -> Self {
        Self {
            credentials: Some(issuer),
            ..Self::new(config)
        }
    }

    /// Create relay state, minting credentials when `turn` is configured
    pub fn from_config(config: RelayConfig) -> Result<Self, CredentialError> {
        match &config.turn {
            Some(turn) => {
                let issuer = HmacCredentialIssuer::new(turn.secret.clone(), turn.urls.clone())?;
                Ok(Self::with_credentials(config, Arc::new(issuer)))
            }
            None => Ok(Self::new(config)),
        }
    }

    /// Allocate an id for a new connection
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Lifetime of issued credentials
    pub fn credential_ttl(&self) -> Duration {
        self.config
            .turn
            .as_ref()
            .map(|t| t.ttl)
            .unwrap_or(Duration::from_secs(86400))
    }

    /// Mint a credential for `identity`; `None` when issuance is disabled
    pub fn issue_credential(&self, identity: &str) -> Option<Result<Credential, CredentialError>> {
        let issuer = self.credentials.as_ref()?;
        Some(issuer.issue_credential(identity, self.credential_ttl()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use websh_core::config::TurnConfig;

    #[test]
    fn test_connection_ids_are_unique() {
        let state = RelayState::new(RelayConfig::default());
        let a = state.next_connection_id();
        let b = state.next_connection_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_no_credentials_without_turn() {
        let state = RelayState::from_config(RelayConfig::default()).unwrap();
        assert!(state.issue_credential("u1").is_none());
    }

    #[test]
    fn test_turn_config_enables_credentials() {
        let config = RelayConfig {
            turn: Some(TurnConfig {
                secret: "s3cret".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let state = RelayState::from_config(config).unwrap();
        let cred = state.issue_credential("u1").unwrap().unwrap();
        assert!(cred.username.ends_with(":u1"));
    }

    #[test]
    fn test_empty_turn_secret_rejected() {
        let config = RelayConfig {
            turn: Some(TurnConfig::default()),
            ..Default::default()
        };
        assert!(RelayState::from_config(config).is_err());
    }
}
