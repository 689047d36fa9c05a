//! Relay envelope messages
//!
//! Every message exchanged with the signaling relay is one JSON object with
//! a `type` field selecting the handler. The relay never interprets the
//! `data` payload: it is carried as a raw JSON fragment so that forwarding
//! preserves it byte-for-byte.
//!
//! # Message Flow
//!
//! 1. Client opens the socket and sends `register { name, peer_type }`
//! 2. A user peer sends `connect { target }`; the target receives
//!    `connection_request { from }`
//! 3. `offer` / `answer` / `signal` / `candidate` are forwarded to `target`,
//!    relabeled with `from`
//! 4. When one side disconnects its partner receives `peer_disconnected { name }`

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::ProtocolError;

/// Which side of a session a registered endpoint plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerKind {
    /// Interactive client that initiates connections
    User,
    /// Machine exposing terminal and video sessions
    Server,
}

impl PeerKind {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerKind::User => "user",
            PeerKind::Server => "server",
        }
    }
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeerKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(PeerKind::User),
            "server" => Ok(PeerKind::Server),
            other => Err(ProtocolError::InvalidField {
                field: "peer_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Envelope types the relay forwards to a target peer without interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardKind {
    /// Session offer descriptor
    Offer,
    /// Session answer descriptor
    Answer,
    /// Free-form signaling payload
    Signal,
    /// Network candidate descriptor
    Candidate,
}

impl ForwardKind {
    /// Wire `type` value
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardKind::Offer => "offer",
            ForwardKind::Answer => "answer",
            ForwardKind::Signal => "signal",
            ForwardKind::Candidate => "candidate",
        }
    }

    /// Parse a wire `type` value
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "offer" => Some(ForwardKind::Offer),
            "answer" => Some(ForwardKind::Answer),
            "signal" => Some(ForwardKind::Signal),
            "candidate" => Some(ForwardKind::Candidate),
            _ => None,
        }
    }
}

impl fmt::Display for ForwardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One relay-protocol message in its loose wire shape.
///
/// All fields except `type` are optional; which ones are required depends on
/// the type and is checked when converting into [`RelayRequest`] or
/// [`RelayEvent`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type selecting the handler
    #[serde(rename = "type")]
    pub kind: String,

    /// Originating peer on relay-to-client messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Sender's own name (`register`, `candidate`) or disconnected peer (`peer_disconnected`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Addressee of `connect` and forwarded types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Logical session the payload belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,

    /// Peer kind on `register`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_type: Option<String>,

    /// Human-readable text on `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Opaque payload, preserved verbatim by the relay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,
}

impl Envelope {
    fn of_kind(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    /// Decode an envelope from a text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    /// Encode to a text frame
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// `register { name, peer_type }`
    pub fn register(name: impl Into<String>, kind: PeerKind) -> Self {
        Self {
            name: Some(name.into()),
            peer_type: Some(kind.as_str().to_string()),
            ..Self::of_kind("register")
        }
    }

    /// `connect { target }`
    pub fn connect(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::of_kind("connect")
        }
    }

    /// A client-originated forwarded message. `data` is stored as a JSON
    /// string holding the serialized payload.
    pub fn forward(
        kind: ForwardKind,
        target: impl Into<String>,
        session: Option<String>,
        payload: &str,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            target: Some(target.into()),
            session,
            data: Some(serde_json::value::to_raw_value(payload)?),
            ..Self::of_kind(kind.as_str())
        })
    }

    /// Attach the sender's own name (candidate messages carry it)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The relabeled copy delivered to the target: `{type, from, session?, data?}`
    pub fn relabeled(
        kind: ForwardKind,
        from: &str,
        session: Option<String>,
        data: Option<Box<RawValue>>,
    ) -> Self {
        Self {
            from: Some(from.to_string()),
            session,
            data,
            ..Self::of_kind(kind.as_str())
        }
    }

    /// Raw JSON text of the payload, if any
    pub fn data_raw(&self) -> Option<&str> {
        self.data.as_deref().map(RawValue::get)
    }

    /// Decode the payload as `T`.
    ///
    /// Payloads are usually a JSON string wrapping a serialized object;
    /// a bare JSON object is accepted as well.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let raw = self.data.as_deref().ok_or(ProtocolError::MissingField("data"))?;
        decode_payload(raw)
    }
}

fn decode_payload<T: DeserializeOwned>(raw: &RawValue) -> Result<T, ProtocolError> {
    match serde_json::from_str::<String>(raw.get()) {
        Ok(inner) => serde_json::from_str(&inner).map_err(ProtocolError::Malformed),
        Err(_) => serde_json::from_str(raw.get()).map_err(ProtocolError::Malformed),
    }
}

/// A client-to-relay message after validation
#[derive(Debug, Clone)]
pub enum RelayRequest {
    /// Claim a name
    Register { name: String, kind: PeerKind },

    /// Pair with a registered peer
    Connect { target: String },

    /// Forward an opaque payload to `target`
    Forward {
        kind: ForwardKind,
        /// Addressee; absence is reported to the sender, not treated as malformed
        target: Option<String>,
        /// Sender's claimed name (candidate messages)
        name: Option<String>,
        session: Option<String>,
        data: Option<Box<RawValue>>,
    },
}

impl RelayRequest {
    /// Decode and validate a text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::try_from(Envelope::parse(text)?)
    }

    /// Envelope type of this request
    pub fn kind(&self) -> &'static str {
        match self {
            RelayRequest::Register { .. } => "register",
            RelayRequest::Connect { .. } => "connect",
            RelayRequest::Forward { kind, .. } => kind.as_str(),
        }
    }
}

impl TryFrom<Envelope> for RelayRequest {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        match envelope.kind.as_str() {
            "register" => {
                let name = envelope.name.ok_or(ProtocolError::MissingField("name"))?;
                let kind = envelope
                    .peer_type
                    .ok_or(ProtocolError::MissingField("peer_type"))?
                    .parse()?;
                Ok(RelayRequest::Register { name, kind })
            }
            "connect" => {
                let target = envelope.target.ok_or(ProtocolError::MissingField("target"))?;
                Ok(RelayRequest::Connect { target })
            }
            other => match ForwardKind::from_type(other) {
                Some(kind) => Ok(RelayRequest::Forward {
                    kind,
                    target: envelope.target,
                    name: envelope.name,
                    session: envelope.session,
                    data: envelope.data,
                }),
                None => Err(ProtocolError::UnknownType(other.to_string())),
            },
        }
    }
}

/// Relay-originated notices (never forwarded from a peer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayNotice {
    /// A user peer paired with the recipient
    ConnectionRequest { from: String },
    /// The recipient's partner went away
    PeerDisconnected { name: String },
    /// Request failed
    Error { message: String },
    /// Time-boxed relay-assisted transport credential, JSON-encoded
    TurnCredentials { data: String },
}

impl RelayNotice {
    /// Shorthand for an `error` notice
    pub fn error(message: impl Into<String>) -> Self {
        RelayNotice::Error {
            message: message.into(),
        }
    }

    /// Encode to a text frame
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A relay-to-client message after validation
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Notice originated by the relay itself
    Notice(RelayNotice),

    /// Payload forwarded from another peer
    Forwarded {
        kind: ForwardKind,
        from: String,
        session: Option<String>,
        data: Option<Box<RawValue>>,
    },
}

impl RelayEvent {
    /// Decode and validate a text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::try_from(Envelope::parse(text)?)
    }

    /// Decode a forwarded payload as `T`
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        match self {
            RelayEvent::Forwarded { data: Some(raw), .. } => decode_payload(raw),
            _ => Err(ProtocolError::MissingField("data")),
        }
    }
}

impl TryFrom<Envelope> for RelayEvent {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let notice = match envelope.kind.as_str() {
            "connection_request" => RelayNotice::ConnectionRequest {
                from: envelope.from.ok_or(ProtocolError::MissingField("from"))?,
            },
            "peer_disconnected" => RelayNotice::PeerDisconnected {
                name: envelope.name.ok_or(ProtocolError::MissingField("name"))?,
            },
            "error" => RelayNotice::Error {
                message: envelope.message.unwrap_or_default(),
            },
            "turn_credentials" => {
                let raw = envelope.data.ok_or(ProtocolError::MissingField("data"))?;
                let data = serde_json::from_str::<String>(raw.get())
                    .unwrap_or_else(|_| raw.get().to_string());
                RelayNotice::TurnCredentials { data }
            }
            other => {
                let kind = ForwardKind::from_type(other)
                    .ok_or_else(|| ProtocolError::UnknownType(other.to_string()))?;
                return Ok(RelayEvent::Forwarded {
                    kind,
                    from: envelope.from.ok_or(ProtocolError::MissingField("from"))?,
                    session: envelope.session,
                    data: envelope.data,
                });
            }
        };
        Ok(RelayEvent::Notice(notice))
    }
}
