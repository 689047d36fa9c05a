//! websh-core: Core abstractions and configuration for websh
//!
//! This crate provides shared types, errors, configuration structures and
//! relay-assisted credential issuance used by the relay and the client.

pub mod config;
pub mod credentials;
pub mod error;
pub mod time;
pub mod types;

pub use credentials::{Credential, CredentialIssuer, HmacCredentialIssuer};
pub use error::WebshError;
pub use types::{ConnectionStatus, PeerKind, PeerName};
