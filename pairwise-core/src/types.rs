use std::fmt::Display;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::with_errors::thiserror::{self, Error};

use crate::connection::types::ConnectOptions;
use crate::registry::Handle;

pub const DEFAULT_LABEL: &str = "pairwise-agent";

/// ErrorKind is a flat classification of [`PairwiseError`] used by callers that
/// only need to branch on the failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidHandle,
    InvalidState,
    NotReady,
    ActionNotSupported,
    InvalidJson,
    EmptyResponse,
    InvalidOption,
    Collaborator,
    Serialization,
}

/// PairwiseError is a base error types for all pairwise operations
///
/// The first six variants are the protocol level taxonomy. Collaborator failures
/// (transport, wallet and ledger) are surfaced with their own variants so a caller
/// can tell a rejected transition apart from an unavailable dependency.
#[derive(Debug, PartialEq, Error, Serialize, Deserialize, Clone)]
#[serde(crate = "self::serde")]
pub enum PairwiseError {
    #[error("invalid handle: {0}")]
    InvalidHandle(u32),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("action not supported: {0}")]
    ActionNotSupported(String),

    #[error("invalid json: {0}")]
    InvalidJson(String),

    #[error("empty response: {0}")]
    EmptyResponse(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("wallet error: {0}")]
    WalletError(String),

    #[error("ledger error: {0}")]
    LedgerError(String),

    #[error("serialize error: {0}")]
    SerializeError(String),

    #[error("no handle left to register a new object")]
    HandlesExhausted,
}

impl PairwiseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PairwiseError::InvalidHandle(_) | PairwiseError::HandlesExhausted => {
                ErrorKind::InvalidHandle
            }
            PairwiseError::InvalidState(_) => ErrorKind::InvalidState,
            PairwiseError::NotReady(_) => ErrorKind::NotReady,
            PairwiseError::ActionNotSupported(_) => ErrorKind::ActionNotSupported,
            PairwiseError::InvalidJson(_) => ErrorKind::InvalidJson,
            PairwiseError::EmptyResponse(_) => ErrorKind::EmptyResponse,
            PairwiseError::InvalidOption(_) => ErrorKind::InvalidOption,
            PairwiseError::TransportError(_)
            | PairwiseError::WalletError(_)
            | PairwiseError::LedgerError(_) => ErrorKind::Collaborator,
            PairwiseError::SerializeError(_) => ErrorKind::Serialization,
        }
    }
}

/// RetainedError is the failure of a call that registers an object and then acts on it
///
/// `handle` is set when the object was registered before the failure. That object stays
/// live in its registry, so the caller can retry the second step or delete it.
#[derive(Debug, PartialEq, Error, Clone)]
#[error("{source}")]
pub struct RetainedError {
    pub handle: Option<Handle>,
    pub source: PairwiseError,
}

impl RetainedError {
    pub fn retained(handle: Handle, source: PairwiseError) -> Self {
        Self {
            handle: Some(handle),
            source,
        }
    }
}

impl From<PairwiseError> for RetainedError {
    fn from(source: PairwiseError) -> Self {
        Self {
            handle: None,
            source,
        }
    }
}

/// Protocol is the wire family a pairwise object speaks for its whole lifetime
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(crate = "self::serde", rename_all = "lowercase")]
pub enum Protocol {
    Proprietary,
    Aries,
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Proprietary => write!(f, "proprietary"),
            Protocol::Aries => write!(f, "aries"),
        }
    }
}

/// Role is fixed at creation time
///
/// - [`Role::Inviter`] is the party that created the invitation
/// - [`Role::Invitee`] is the party that received it
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(crate = "self::serde", rename_all = "lowercase")]
pub enum Role {
    Inviter,
    Invitee,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Inviter => write!(f, "inviter"),
            Role::Invitee => write!(f, "invitee"),
        }
    }
}

/// AgencyInfo is the cloud agency that relays messages for this agent
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct AgencyInfo {
    pub did: String,
    pub verkey: String,
    pub endpoint: String,
}

impl AgencyInfo {
    pub fn new(did: String, verkey: String, endpoint: String) -> Self {
        Self {
            did,
            verkey,
            endpoint,
        }
    }

    pub fn routing_keys(&self) -> Vec<String> {
        if self.verkey.is_empty() {
            return Vec::new();
        }

        vec![self.verkey.clone()]
    }
}

/// Settings carries the process wide values the state machines read when they
/// create invitations or pick the protocol for a new object
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Settings {
    protocol: Protocol,
    label: String,

    #[serde(default)]
    public_did: Option<String>,

    #[serde(default)]
    logo_url: Option<String>,

    #[serde(default)]
    agency: AgencyInfo,

    #[serde(default)]
    connect_defaults: ConnectOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol: Protocol::Aries,
            label: DEFAULT_LABEL.to_string(),
            public_did: None,
            logo_url: None,
            agency: AgencyInfo::default(),
            connect_defaults: ConnectOptions::default(),
        }
    }
}

impl Settings {
    pub fn new(protocol: Protocol, label: String) -> Self {
        Self {
            protocol,
            label,
            ..Default::default()
        }
    }

    pub fn with_public_did(mut self, did: Option<String>) -> Self {
        self.public_did = did;
        self
    }

    pub fn with_logo_url(mut self, url: Option<String>) -> Self {
        self.logo_url = url;
        self
    }

    pub fn with_agency(mut self, agency: AgencyInfo) -> Self {
        self.agency = agency;
        self
    }

    pub fn with_connect_defaults(mut self, options: ConnectOptions) -> Self {
        self.connect_defaults = options;
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn public_did(&self) -> Option<String> {
        self.public_did.clone()
    }

    pub fn logo_url(&self) -> Option<String> {
        self.logo_url.clone()
    }

    pub fn agency(&self) -> &AgencyInfo {
        &self.agency
    }

    pub fn connect_defaults(&self) -> &ConnectOptions {
        &self.connect_defaults
    }
}

/// PairwiseKey is a freshly generated DID and verkey used for a single relationship
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(crate = "self::serde")]
pub struct PairwiseKey {
    pub did: String,
    pub verkey: String,
}

impl PairwiseKey {
    pub fn new(did: String, verkey: String) -> Self {
        Self { did, verkey }
    }
}

/// Destination describes where an outbound message must be delivered
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(crate = "self::serde")]
pub struct Destination {
    pub endpoint: String,
    pub recipient_keys: Vec<String>,

    #[serde(default)]
    pub routing_keys: Vec<String>,

    #[serde(default)]
    pub did: Option<String>,
}

impl Destination {
    pub fn new(endpoint: String, recipient_keys: Vec<String>, routing_keys: Vec<String>) -> Self {
        Self {
            endpoint,
            recipient_keys,
            routing_keys,
            did: None,
        }
    }

    pub fn with_did(mut self, did: Option<String>) -> Self {
        self.did = did;
        self
    }

    pub fn primary_key(&self) -> Option<String> {
        self.recipient_keys.first().cloned()
    }
}

/// ServiceEndpoint is the service record a public DID resolves to
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(crate = "self::serde")]
pub struct ServiceEndpoint {
    pub endpoint: String,
    pub recipient_keys: Vec<String>,

    #[serde(default)]
    pub routing_keys: Vec<String>,
}

impl ServiceEndpoint {
    pub fn into_destination(self, did: Option<String>) -> Destination {
        Destination::new(self.endpoint, self.recipient_keys, self.routing_keys).with_did(did)
    }
}

/// InboundMessage is a single message downloaded from the agency
///
/// The `uid` is the agency side identifier, used to mark the message as reviewed
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct InboundMessage {
    pub uid: String,

    #[serde(default)]
    pub msg_type: Option<String>,

    pub payload: Value,
}

impl InboundMessage {
    pub fn new(uid: String, msg_type: Option<String>, payload: Value) -> Self {
        Self {
            uid,
            msg_type,
            payload,
        }
    }
}

/// CredentialRequestData is the wallet output of a credential request creation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CredentialRequestData {
    pub request: Value,
    pub metadata: Value,
}

/// TransportBuilder is the agency facing collaborator
#[async_trait]
pub trait TransportBuilder: Clone + Send + Sync {
    async fn send(
        &self,
        sender_verkey: String,
        message: Value,
        destination: Destination,
    ) -> Result<(), PairwiseError>;

    async fn poll_inbound(
        &self,
        pairwise_did: String,
        thread_id: Option<String>,
    ) -> Result<Vec<InboundMessage>, PairwiseError>;

    async fn update_message_status(
        &self,
        pairwise_did: String,
        uids: Vec<String>,
    ) -> Result<(), PairwiseError>;
}

/// WalletBuilder is the key and credential storage collaborator
#[async_trait]
pub trait WalletBuilder: Clone + Send + Sync {
    async fn create_pairwise_key(&self) -> Result<PairwiseKey, PairwiseError>;

    async fn sign(&self, verkey: String, data: Vec<u8>) -> Result<Vec<u8>, PairwiseError>;

    async fn verify(
        &self,
        verkey: String,
        data: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<bool, PairwiseError>;

    async fn create_credential_request(
        &self,
        prover_did: String,
        offer: Value,
    ) -> Result<CredentialRequestData, PairwiseError>;

    async fn store_credential(
        &self,
        request_metadata: Value,
        credential: Value,
    ) -> Result<String, PairwiseError>;
}

/// LedgerBuilder resolves public DIDs into their service records
#[async_trait]
pub trait LedgerBuilder: Clone + Send + Sync {
    async fn resolve_service_endpoint(&self, did: String)
        -> Result<ServiceEndpoint, PairwiseError>;
}

pub(crate) fn require_key(key: PairwiseKey) -> Result<PairwiseKey, PairwiseError> {
    if key.did.is_empty() || key.verkey.is_empty() {
        return Err(PairwiseError::EmptyResponse(
            "wallet returned an empty pairwise key".to_string(),
        ));
    }

    Ok(key)
}

pub(crate) fn require_bytes(data: Vec<u8>, what: &str) -> Result<Vec<u8>, PairwiseError> {
    if data.is_empty() {
        return Err(PairwiseError::EmptyResponse(format!(
            "wallet returned an empty {}",
            what
        )));
    }

    Ok(data)
}

pub(crate) fn require_endpoint(
    endpoint: ServiceEndpoint,
    did: &str,
) -> Result<ServiceEndpoint, PairwiseError> {
    if endpoint.endpoint.is_empty() || endpoint.recipient_keys.is_empty() {
        return Err(PairwiseError::EmptyResponse(format!(
            "ledger returned no service for: {}",
            did
        )));
    }

    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_test::table_test;

    #[test]
    fn test_error_kind() {
        let table = vec![
            (PairwiseError::InvalidHandle(1), ErrorKind::InvalidHandle),
            (
                PairwiseError::InvalidState("x".to_string()),
                ErrorKind::InvalidState,
            ),
            (PairwiseError::NotReady("x".to_string()), ErrorKind::NotReady),
            (
                PairwiseError::ActionNotSupported("x".to_string()),
                ErrorKind::ActionNotSupported,
            ),
            (
                PairwiseError::InvalidJson("x".to_string()),
                ErrorKind::InvalidJson,
            ),
            (
                PairwiseError::EmptyResponse("x".to_string()),
                ErrorKind::EmptyResponse,
            ),
            (
                PairwiseError::WalletError("x".to_string()),
                ErrorKind::Collaborator,
            ),
            (
                PairwiseError::LedgerError("x".to_string()),
                ErrorKind::Collaborator,
            ),
        ];

        for (validator, input, expected) in table_test!(table) {
            let kind = input.kind();

            validator
                .given(&format!("{:?}", input))
                .when("classify error")
                .then(&format!("it should be: {:?}", expected))
                .assert_eq(expected, kind);
        }
    }

    #[test]
    fn test_settings_from_toml() {
        let raw = r#"
            protocol = "proprietary"
            label = "alice"
            public_did = "did:sov:alice"

            [agency]
            did = "agency-did"
            verkey = "agency-verkey"
            endpoint = "http://localhost:8080/agency/msg"
        "#;

        let settings: Settings = toml::from_str(raw).unwrap();
        assert_eq!(settings.protocol(), Protocol::Proprietary);
        assert_eq!(settings.label(), "alice");
        assert_eq!(settings.public_did(), Some("did:sov:alice".to_string()));
        assert_eq!(
            settings.agency().routing_keys(),
            vec!["agency-verkey".to_string()]
        );
        assert_eq!(settings.connect_defaults(), &ConnectOptions::default());
    }

    #[test]
    fn test_require_helpers() {
        let key = require_key(PairwiseKey::new("".to_string(), "verkey".to_string()));
        assert!(matches!(key, Err(PairwiseError::EmptyResponse(_))));

        let bytes = require_bytes(vec![], "signature");
        assert!(matches!(bytes, Err(PairwiseError::EmptyResponse(_))));

        let endpoint = require_endpoint(ServiceEndpoint::default(), "did:sov:bob");
        assert!(matches!(endpoint, Err(PairwiseError::EmptyResponse(_))));
    }
}
