//! Relay-assisted transport credentials
//!
//! Credentials follow the TURN REST scheme understood by coturn's
//! `use-auth-secret` mode: the username is `"<expiry>:<identity>"` and the
//! password is the base64 HMAC-SHA1 of the username keyed with the shared
//! secret.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::error::CredentialError;
use crate::time::{current_time_secs, expiry_secs};

type HmacSha1 = Hmac<Sha1>;

/// A time-boxed username/password pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    /// Relay servers the credential is valid for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

/// Mints credentials for registered peers
pub trait CredentialIssuer: Send + Sync {
    /// Issue a credential for `identity`, valid for `ttl`
    fn issue_credential(&self, identity: &str, ttl: Duration) -> Result<Credential, CredentialError>;
}

/// HMAC-SHA1 issuer keyed with a shared secret
pub struct HmacCredentialIssuer {
    secret: Vec<u8>,
    urls: Vec<String>,
}

impl HmacCredentialIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, urls: Vec<String>) -> Result<Self, CredentialError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CredentialError::InvalidSecret);
        }
        Ok(Self { secret, urls })
    }

    /// Issue a credential as of `now_secs`
    pub fn issue_at(
        &self,
        identity: &str,
        ttl: Duration,
        now_secs: u64,
    ) -> Result<Credential, CredentialError> {
        let username = format!("{}:{}", expiry_secs(now_secs, ttl), identity);
        let mut mac =
            HmacSha1::new_from_slice(&self.secret).map_err(|_| CredentialError::InvalidSecret)?;
        mac.update(username.as_bytes());
        let password = STANDARD.encode(mac.finalize().into_bytes());

        tracing::debug!("Issued relay credential for {}", identity);

        Ok(Credential {
            username,
            password,
            urls: self.urls.clone(),
        })
    }
}

impl CredentialIssuer for HmacCredentialIssuer {
    fn issue_credential(&self, identity: &str, ttl: Duration) -> Result<Credential, CredentialError> {
        self.issue_at(identity, ttl, current_time_secs())
    }
}

impl std::fmt::Debug for HmacCredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacCredentialIssuer")
            .field("urls", &self.urls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_credential() {
        let issuer = HmacCredentialIssuer::new("north-secret", vec![]).unwrap();
        let cred = issuer
            .issue_at("u1", Duration::from_secs(86400), 1_700_000_000)
            .unwrap();
        assert_eq!(cred.username, "1700086400:u1");
        assert_eq!(cred.password, "8aag6GjUD7XMNMFwnfcA2SmPB28=");
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(
            HmacCredentialIssuer::new("", vec![]).unwrap_err(),
            CredentialError::InvalidSecret
        );
    }

    #[test]
    fn test_credential_json_carries_urls() {
        let issuer =
            HmacCredentialIssuer::new("s", vec!["turn:turn.example.com:3478".into()]).unwrap();
        let cred = issuer.issue_credential("srv1", Duration::from_secs(60)).unwrap();
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["urls"][0], "turn:turn.example.com:3478");
        assert!(cred.username.ends_with(":srv1"));
    }

    #[test]
    fn test_debug_hides_secret() {
        let issuer = HmacCredentialIssuer::new("hunter2", vec![]).unwrap();
        assert!(!format!("{:?}", issuer).contains("hunter2"));
    }
}
