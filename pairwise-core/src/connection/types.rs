use std::fmt::{Debug, Display};

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;

use rstdev_domain::entity::ToJSON;

use crate::invitation::Invitation;
use crate::problem_report::ProblemReport;
use crate::registry::Handle;
use crate::types::{
    Destination, LedgerBuilder, PairwiseError, Protocol, RetainedError, Role, TransportBuilder,
    WalletBuilder,
};

/// State represents the lifecycle of a pairwise connection
///
/// The numeric codes are stable and exposed through [`State::code`]:
///
/// - `None` (0), terminal after a rejection or a problem report
/// - `Initialized` (1)
/// - `OfferSent` (2)
/// - `RequestReceived` (3)
/// - `Accepted` (4), the relationship is usable
/// - `Redirected` (8), the peer was pointed at an existing relationship
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(crate = "self::serde")]
pub enum State {
    None,
    Initialized,
    OfferSent,
    RequestReceived,
    Accepted,
    Redirected,
}

impl State {
    pub fn code(&self) -> u32 {
        match self {
            State::None => 0,
            State::Initialized => 1,
            State::OfferSent => 2,
            State::RequestReceived => 3,
            State::Accepted => 4,
            State::Redirected => 8,
        }
    }

    /// States reachable after this one through inbound messages
    pub fn later(&self) -> &'static [State] {
        match self {
            State::Initialized => &[State::OfferSent, State::RequestReceived, State::Accepted],
            State::OfferSent => &[State::RequestReceived, State::Accepted],
            State::RequestReceived => &[State::Accepted],
            _ => &[],
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde")]
pub enum ConnectionType {
    #[serde(rename = "SMS")]
    Sms,

    #[serde(rename = "QR")]
    Qr,
}

/// ConnectOptions is the resolved set of options used by `connect`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ConnectOptions {
    #[serde(default)]
    pub connection_type: Option<ConnectionType>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub use_public_did: bool,

    #[serde(default = "default_true")]
    pub update_agent_info: bool,

    #[serde(default = "default_true")]
    pub wait_remote_agent_responses: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connection_type: None,
            phone: None,
            use_public_did: false,
            update_agent_info: true,
            wait_remote_agent_responses: true,
        }
    }
}

impl ConnectOptions {
    pub fn validate(&self) -> Result<(), PairwiseError> {
        let missing_phone = self
            .phone
            .as_ref()
            .map(|phone| phone.trim().is_empty())
            .unwrap_or(true);

        if self.connection_type == Some(ConnectionType::Sms) && missing_phone {
            return Err(PairwiseError::InvalidOption(
                "sms connection requires a phone number".to_string(),
            ));
        }

        Ok(())
    }
}

/// ConnectOptionsParams is the caller side, partially filled, set of connect options
///
/// Missing fields fall back to the configured defaults through [`ConnectOptionsParams::merge`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct ConnectOptionsParams {
    #[serde(default)]
    pub connection_type: Option<ConnectionType>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub use_public_did: Option<bool>,

    #[serde(default)]
    pub update_agent_info: Option<bool>,

    #[serde(default)]
    pub wait_remote_agent_responses: Option<bool>,
}

impl ConnectOptionsParams {
    pub fn from_json(raw: &str) -> Result<Self, PairwiseError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(raw).map_err(|err| PairwiseError::InvalidOption(err.to_string()))
    }

    pub fn merge(self, defaults: &ConnectOptions) -> ConnectOptions {
        ConnectOptions {
            connection_type: self.connection_type.or(defaults.connection_type),
            phone: self.phone.or_else(|| defaults.phone.clone()),
            use_public_did: self.use_public_did.unwrap_or(defaults.use_public_did),
            update_agent_info: self.update_agent_info.unwrap_or(defaults.update_agent_info),
            wait_remote_agent_responses: self
                .wait_remote_agent_responses
                .unwrap_or(defaults.wait_remote_agent_responses),
        }
    }
}

/// OutofbandOptions drives the creation of an out-of-band invitation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct OutofbandOptions {
    #[serde(default)]
    pub goal_code: Option<String>,

    #[serde(default)]
    pub goal: Option<String>,

    #[serde(default)]
    pub handshake: bool,

    #[serde(default)]
    pub request_attach: Option<String>,
}

/// SendMessageOptions only matters for the legacy protocol, Aries messages carry their own type
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct SendMessageOptions {
    #[serde(default)]
    pub msg_type: Option<String>,

    #[serde(default)]
    pub msg_title: Option<String>,

    #[serde(default)]
    pub ref_msg_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct InviteActionData {
    pub goal_code: String,

    #[serde(default)]
    pub ack_on: Option<Vec<String>>,
}

/// RemoteInfo is everything learned about the other party
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RemoteInfo {
    #[serde(default)]
    pub did: Option<String>,

    pub verkey: String,
    pub endpoint: String,

    #[serde(default)]
    pub routing_keys: Vec<String>,

    #[serde(default)]
    pub public_did: Option<String>,

    #[serde(default)]
    pub label: Option<String>,
}

impl RemoteInfo {
    pub fn from_destination(destination: Destination, label: Option<String>) -> Self {
        let verkey = destination.primary_key().unwrap_or_default();
        Self {
            did: destination.did,
            verkey,
            endpoint: destination.endpoint,
            routing_keys: destination.routing_keys,
            public_did: None,
            label,
        }
    }

    pub fn destination(&self) -> Destination {
        Destination::new(
            self.endpoint.clone(),
            vec![self.verkey.clone()],
            self.routing_keys.clone(),
        )
        .with_did(self.did.clone())
    }
}

/// PairwiseInfo is a read only summary of a connection
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct PairwiseInfo {
    pub source_id: String,
    pub protocol: Protocol,
    pub role: Role,
    pub state: State,
    pub pairwise_did: Option<String>,
    pub pairwise_verkey: Option<String>,
    pub their_did: Option<String>,
    pub their_verkey: Option<String>,
    pub their_endpoint: Option<String>,
    pub thread_id: Option<String>,
    pub one_time: bool,
    pub options: ConnectOptions,
}

/// CompletedConnection is the snapshot of an accepted connection handed to
/// the credential exchange
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct CompletedConnection {
    pub handle: Handle,
    pub protocol: Protocol,
    pub pairwise_did: String,
    pub pairwise_verkey: String,
    pub destination: Destination,
}

/// `ConnectionEntityAccessor` is used to access the main Connection entity property fields
///
/// The entity itself keeps its properties private, outside of this crate the fields can
/// only be read through this trait.
pub trait ConnectionEntityAccessor:
    Clone + Debug + ToJSON + TryInto<Vec<u8>> + TryFrom<Vec<u8>>
{
    fn get_source_id(&self) -> String;
    fn get_protocol(&self) -> Protocol;
    fn get_role(&self) -> Role;
    fn get_state(&self) -> State;
    fn get_pairwise_did(&self) -> Option<String>;
    fn get_pairwise_verkey(&self) -> Option<String>;
    fn get_their_did(&self) -> Option<String>;
    fn get_their_verkey(&self) -> Option<String>;
    fn get_invitation(&self) -> Option<Invitation>;
    fn get_thread_id(&self) -> Option<String>;
    fn get_problem_report(&self) -> Option<ProblemReport>;
    fn is_one_time(&self) -> bool;
    fn get_created_at(&self) -> DateTime<Utc>;
    fn get_updated_at(&self) -> DateTime<Utc>;
}

/// ConnectionChannel is the narrow surface other machines need from a connection
///
/// The credential exchange uses it to obtain the accepted relationship and to send
/// its own messages over it.
#[async_trait]
pub trait ConnectionChannel: Clone + Send + Sync {
    async fn get_pairwise_info(&self, handle: Handle) -> Result<PairwiseInfo, PairwiseError>;

    async fn get_completed_connection(
        &self,
        handle: Handle,
    ) -> Result<CompletedConnection, PairwiseError>;

    /// Sends a message over an accepted connection and returns its message id
    async fn send_message(
        &self,
        handle: Handle,
        message: String,
        options: SendMessageOptions,
    ) -> Result<String, PairwiseError>;
}

/// ConnectionAPI is the main entrypoint to the `Connection` domain
#[async_trait]
pub trait ConnectionAPI: ConnectionChannel {
    type EntityAccessor: ConnectionEntityAccessor;

    /// Creates an inviter connection using the configured protocol
    async fn create(&self, source_id: String) -> Result<Handle, PairwiseError>;

    /// Creates an invitee connection, the protocol follows the invite shape
    async fn create_with_invite(
        &self,
        source_id: String,
        invite: String,
    ) -> Result<Handle, PairwiseError>;

    /// Creates an invitee connection and connects it in one call
    ///
    /// When `connect` fails the connection stays registered in its invitation state,
    /// the returned [`RetainedError`] carries its handle.
    async fn accept_invite(
        &self,
        source_id: String,
        invite: String,
        options: Option<ConnectOptionsParams>,
    ) -> Result<Handle, RetainedError>;

    async fn create_outofband(
        &self,
        source_id: String,
        options: OutofbandOptions,
    ) -> Result<Handle, PairwiseError>;

    async fn create_with_outofband_invite(
        &self,
        source_id: String,
        invite: String,
    ) -> Result<Handle, PairwiseError>;

    /// Drives the connection forward from `Initialized` (inviter) or from the
    /// invitation state (invitee). The inviter receives its invitation back.
    async fn connect(
        &self,
        handle: Handle,
        options: Option<ConnectOptionsParams>,
    ) -> Result<Option<String>, PairwiseError>;

    /// Polls the transport for messages of this connection and applies the first relevant one
    async fn update_state(&self, handle: Handle) -> Result<State, PairwiseError>;

    async fn update_state_with_message(
        &self,
        handle: Handle,
        message: String,
    ) -> Result<State, PairwiseError>;

    /// Finds the connection owning an inbound message and applies it there
    async fn route_message(&self, message: String)
        -> Result<Option<(Handle, State)>, PairwiseError>;

    async fn send_ping(&self, handle: Handle, comment: Option<String>)
        -> Result<(), PairwiseError>;

    async fn send_discovery_features(
        &self,
        handle: Handle,
        query: Option<String>,
        comment: Option<String>,
    ) -> Result<(), PairwiseError>;

    async fn send_reuse(&self, handle: Handle, invite: String) -> Result<(), PairwiseError>;

    async fn send_answer(
        &self,
        handle: Handle,
        question: String,
        answer: String,
    ) -> Result<(), PairwiseError>;

    async fn send_invite_action(
        &self,
        handle: Handle,
        data: InviteActionData,
    ) -> Result<String, PairwiseError>;

    async fn sign_data(&self, handle: Handle, data: Vec<u8>) -> Result<Vec<u8>, PairwiseError>;

    async fn verify_signature(
        &self,
        handle: Handle,
        data: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<bool, PairwiseError>;

    /// Moves `handle` to `Redirected`, pointing the peer at the `existing` relationship
    async fn redirect(&self, handle: Handle, existing: Handle) -> Result<(), PairwiseError>;

    async fn get_redirect_details(&self, handle: Handle) -> Result<String, PairwiseError>;

    async fn delete(&self, handle: Handle) -> Result<(), PairwiseError>;

    async fn get_state(&self, handle: Handle) -> Result<State, PairwiseError>;

    async fn get_source_id(&self, handle: Handle) -> Result<String, PairwiseError>;

    async fn get_thread_id(&self, handle: Handle) -> Result<Option<String>, PairwiseError>;

    async fn get_invite_details(
        &self,
        handle: Handle,
        abbreviated: bool,
    ) -> Result<String, PairwiseError>;

    async fn get_problem_report(
        &self,
        handle: Handle,
    ) -> Result<Option<ProblemReport>, PairwiseError>;

    async fn get_remote_protocols(&self, handle: Handle) -> Result<Vec<String>, PairwiseError>;

    async fn get_connection(&self, handle: Handle) -> Result<Self::EntityAccessor, PairwiseError>;

    async fn list_connections(&self) -> Result<Vec<(Handle, PairwiseInfo)>, PairwiseError>;

    async fn serialize(&self, handle: Handle) -> Result<String, PairwiseError>;

    async fn deserialize(&self, data: String) -> Result<Handle, PairwiseError>;
}

/// `UsecaseBuilder` is a trait behavior that provides base application logic's handlers
pub trait UsecaseBuilder<TEntityAccessor>: ConnectionAPI<EntityAccessor = TEntityAccessor>
where
    TEntityAccessor: ConnectionEntityAccessor,
{
    type TransportImplementer: TransportBuilder;
    type WalletImplementer: WalletBuilder;
    type LedgerImplementer: LedgerBuilder;

    fn transport(&self) -> Self::TransportImplementer;
    fn wallet(&self) -> Self::WalletImplementer;
    fn ledger(&self) -> Self::LedgerImplementer;
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_test::table_test;

    #[test]
    fn test_state_codes() {
        let table = vec![
            (State::None, 0),
            (State::Initialized, 1),
            (State::OfferSent, 2),
            (State::RequestReceived, 3),
            (State::Accepted, 4),
            (State::Redirected, 8),
        ];

        for (validator, input, expected) in table_test!(table) {
            let code = input.code();

            validator
                .given(&format!("{:?}", input))
                .when("get state code")
                .then(&format!("it should be: {}", expected))
                .assert_eq(expected, code);
        }
    }

    #[test]
    fn test_merge_options() {
        let defaults = ConnectOptions::default();
        let params = ConnectOptionsParams::from_json(r#"{"use_public_did": true}"#).unwrap();

        let options = params.merge(&defaults);
        assert!(options.use_public_did);
        assert!(options.update_agent_info);
        assert!(options.wait_remote_agent_responses);
        assert_eq!(options.connection_type, None)
    }

    #[test]
    fn test_options_from_empty_json() {
        let params = ConnectOptionsParams::from_json("");
        assert_eq!(params, Ok(ConnectOptionsParams::default()))
    }

    #[test]
    fn test_options_invalid_json() {
        let params = ConnectOptionsParams::from_json("{invalid");
        assert!(matches!(params, Err(PairwiseError::InvalidOption(_))))
    }

    #[test]
    fn test_validate_sms_without_phone() {
        let params = ConnectOptionsParams {
            connection_type: Some(ConnectionType::Sms),
            ..Default::default()
        };

        let options = params.merge(&ConnectOptions::default());
        assert!(matches!(
            options.validate(),
            Err(PairwiseError::InvalidOption(_))
        ));

        let with_phone = ConnectOptions {
            phone: Some("8014710072".to_string()),
            ..options
        };
        assert!(with_phone.validate().is_ok())
    }
}
