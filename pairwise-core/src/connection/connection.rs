//! # Connection Entity
//!
//! A [`Connection`] is one pairwise relationship between this agent and a remote party.
//! It keeps the relationship's protocol and role, its current [`State`], the pairwise key
//! generated for it, and whatever is known about the other party.
//!
//! ## Lifecycle
//!
//! - Inviters start in `Initialized`, send an invitation and move to `OfferSent`
//! - Aries invitees start in `OfferSent` (the invitation was received), send a request and
//!   wait in `RequestReceived`
//! - Legacy invitees start in `RequestReceived` and accept directly into `Accepted`
//! - A problem report or a rejection moves any state to the terminal `None`
//!
//! ## Persistence
//!
//! Connections are persisted with a versioned envelope, `{"version": "1.0", "data": {...}}`,
//! see [`Connection::to_snapshot`] and [`Connection::from_snapshot`].
use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use super::types::{
    CompletedConnection, ConnectOptions, ConnectionEntityAccessor, PairwiseInfo, RemoteInfo,
    State,
};
use crate::invitation::Invitation;
use crate::messages::legacy::RedirectDetail;
use crate::messages::{MessageKind, ParsedMessage};
use crate::problem_report::{ProblemReport, ProblemReportHolder};
use crate::registry::Handle;
use crate::router::MessageLog;
use crate::types::{Destination, PairwiseError, PairwiseKey, Protocol, Role};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Connection {
    /// Caller provided label, opaque to the state machine
    pub(super) source_id: String,

    pub(super) protocol: Protocol,
    pub(super) role: Role,
    pub(super) state: State,

    /// Our pairwise key, generated when the connection first needs it
    #[serde(default)]
    pub(super) pairwise: Option<PairwiseKey>,

    /// The other party, set exactly once
    #[serde(default)]
    pub(super) remote: Option<RemoteInfo>,

    #[serde(default)]
    pub(super) invitation: Option<Invitation>,

    /// Service the invitee sent its request to, its key must sign the response
    #[serde(default)]
    pub(super) invitation_service: Option<Destination>,

    #[serde(default)]
    pub(super) thread_id: Option<String>,

    #[serde(default)]
    pub(super) one_time: bool,

    #[serde(default)]
    pub(super) one_time_used: bool,

    #[serde(default)]
    pub(super) options: ConnectOptions,

    #[serde(default)]
    pub(super) public_did: Option<String>,

    #[serde(default)]
    pub(super) problem_report: Option<ProblemReport>,

    #[serde(default)]
    pub(super) redirect: Option<RedirectDetail>,

    #[serde(default)]
    pub(super) remote_protocols: Vec<String>,

    /// Next `sender_order` stamped on our threaded messages
    #[serde(default)]
    pub(super) sender_order: u32,

    #[serde(default)]
    pub(super) log: MessageLog,

    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

/// ConnectionSnapshot is the versioned persistence envelope
#[derive(Debug, Serialize, Deserialize)]
#[serde(crate = "self::serde", tag = "version", content = "data")]
enum ConnectionSnapshot {
    #[serde(rename = "1.0")]
    V1(Connection),
}

impl Connection {
    pub fn new(source_id: String, protocol: Protocol, role: Role, state: State) -> Self {
        let now = Utc::now();
        Self {
            source_id,
            protocol,
            role,
            state,
            pairwise: None,
            remote: None,
            invitation: None,
            invitation_service: None,
            thread_id: None,
            one_time: false,
            one_time_used: false,
            options: ConnectOptions::default(),
            public_did: None,
            problem_report: None,
            redirect: None,
            remote_protocols: Vec::new(),
            sender_order: 0,
            log: MessageLog::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_state(&mut self, state: State) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    pub(super) fn with_invitation(mut self, invitation: Invitation) -> Self {
        self.invitation = Some(invitation);
        self
    }

    /// Sets the remote party, a second, different, value is refused
    pub(super) fn set_remote(&mut self, remote: RemoteInfo) -> Result<(), PairwiseError> {
        match &self.remote {
            Some(existing) if existing != &remote => Err(PairwiseError::InvalidState(
                "remote party is already known".to_string(),
            )),
            _ => {
                self.remote = Some(remote);
                Ok(())
            }
        }
    }

    pub(super) fn next_sender_order(&mut self) -> Result<u32, PairwiseError> {
        let order = self.sender_order;
        self.sender_order = order.checked_add(1).ok_or(PairwiseError::InvalidState(
            "sender order is exhausted on this thread".to_string(),
        ))?;

        Ok(order)
    }

    pub(super) fn pairwise_key(&self) -> Result<&PairwiseKey, PairwiseError> {
        self.pairwise.as_ref().ok_or(PairwiseError::NotReady(
            "connection has no pairwise key yet".to_string(),
        ))
    }

    /// Our key and the remote destination, both are required to send anything
    pub(super) fn channel(&self) -> Result<(PairwiseKey, Destination), PairwiseError> {
        let key = self.pairwise_key()?.clone();
        let remote = self.remote.as_ref().ok_or(PairwiseError::NotReady(
            "connection has no remote party yet".to_string(),
        ))?;

        Ok((key, remote.destination()))
    }

    /// Decides whether an inbound message belongs to this connection
    ///
    /// A message is owned when it is threaded to this connection, to its invitation,
    /// or to one of our own outbound messages. A few kinds open a new thread and are
    /// accepted by state instead, but only while they carry no `~thread.thid`.
    pub fn owns(&self, message: &ParsedMessage) -> bool {
        let invitation_id = self.invitation.as_ref().map(|invitation| invitation.id());
        let thid = message.thread_id();
        let explicit_thid = message
            .thread
            .as_ref()
            .and_then(|thread| thread.thid.clone());

        if thid.is_some() && (thid == self.thread_id || thid == invitation_id) {
            return true;
        }

        if let Some(pthid) = message.parent_thread_id() {
            if Some(pthid) == invitation_id {
                return true;
            }
        }

        if let Some(thid) = &explicit_thid {
            if self.log.was_sent(thid) {
                return true;
            }
        }

        if let Some(reply_to) = message
            .payload
            .get("replyToMsgId")
            .and_then(|reply_to| reply_to.as_str())
        {
            return Some(reply_to.to_string()) == invitation_id;
        }

        match message.kind {
            MessageKind::ConnectionRequest => {
                explicit_thid.is_none()
                    && self.protocol == Protocol::Aries
                    && self.role == Role::Inviter
                    && self.state == State::OfferSent
            }
            MessageKind::Ping | MessageKind::Query => {
                explicit_thid.is_none()
                    && matches!(self.state, State::RequestReceived | State::Accepted)
            }
            // threaded to somebody else when a thid is present and did not match above
            MessageKind::Ack | MessageKind::ProblemReport | MessageKind::ConnectionProblemReport => {
                explicit_thid.is_none() && self.thread_id.is_none() && self.state != State::None
            }
            _ => false,
        }
    }

    pub fn to_pairwise_info(&self) -> PairwiseInfo {
        PairwiseInfo {
            source_id: self.source_id.clone(),
            protocol: self.protocol,
            role: self.role,
            state: self.state,
            pairwise_did: self.pairwise.as_ref().map(|key| key.did.clone()),
            pairwise_verkey: self.pairwise.as_ref().map(|key| key.verkey.clone()),
            their_did: self.remote.as_ref().and_then(|remote| remote.did.clone()),
            their_verkey: self.remote.as_ref().map(|remote| remote.verkey.clone()),
            their_endpoint: self.remote.as_ref().map(|remote| remote.endpoint.clone()),
            thread_id: self.thread_id.clone(),
            one_time: self.one_time,
            options: self.options.clone(),
        }
    }

    pub fn to_completed(&self, handle: Handle) -> Result<CompletedConnection, PairwiseError> {
        if self.state != State::Accepted {
            return Err(PairwiseError::NotReady(format!(
                "connection is not accepted: {}",
                self.state
            )));
        }

        let (key, destination) = self.channel()?;
        Ok(CompletedConnection {
            handle,
            protocol: self.protocol,
            pairwise_did: key.did,
            pairwise_verkey: key.verkey,
            destination,
        })
    }

    pub fn get_redirect(&self) -> Option<RedirectDetail> {
        self.redirect.clone()
    }

    pub fn get_remote_protocols(&self) -> Vec<String> {
        self.remote_protocols.clone()
    }

    pub fn to_snapshot(&self) -> Result<String, PairwiseError> {
        serde_json::to_string(&ConnectionSnapshot::V1(self.clone()))
            .map_err(|err| PairwiseError::SerializeError(err.to_string()))
    }

    pub fn from_snapshot(raw: &str) -> Result<Self, PairwiseError> {
        let snapshot: ConnectionSnapshot =
            serde_json::from_str(raw).map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;

        match snapshot {
            ConnectionSnapshot::V1(connection) => Ok(connection),
        }
    }
}

impl ProblemReportHolder for Connection {
    fn store_problem_report(&mut self, report: ProblemReport) {
        self.problem_report = Some(report);
    }
}

impl ConnectionEntityAccessor for Connection {
    fn get_source_id(&self) -> String {
        self.source_id.clone()
    }

    fn get_protocol(&self) -> Protocol {
        self.protocol
    }

    fn get_role(&self) -> Role {
        self.role
    }

    fn get_state(&self) -> State {
        self.state
    }

    fn get_pairwise_did(&self) -> Option<String> {
        self.pairwise.as_ref().map(|key| key.did.clone())
    }

    fn get_pairwise_verkey(&self) -> Option<String> {
        self.pairwise.as_ref().map(|key| key.verkey.clone())
    }

    fn get_their_did(&self) -> Option<String> {
        self.remote.as_ref().and_then(|remote| remote.did.clone())
    }

    fn get_their_verkey(&self) -> Option<String> {
        self.remote.as_ref().map(|remote| remote.verkey.clone())
    }

    fn get_invitation(&self) -> Option<Invitation> {
        self.invitation.clone()
    }

    fn get_thread_id(&self) -> Option<String> {
        self.thread_id.clone()
    }

    fn get_problem_report(&self) -> Option<ProblemReport> {
        self.problem_report.clone()
    }

    fn is_one_time(&self) -> bool {
        self.one_time
    }

    fn get_created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn get_updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl ToJSON for Connection {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|e| BaseError::ToJSONError(e.to_string()))
    }
}

impl TryInto<Vec<u8>> for Connection {
    type Error = PairwiseError;

    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(&self).map_err(|e| PairwiseError::SerializeError(e.to_string()))
    }
}

impl TryFrom<Vec<u8>> for Connection {
    type Error = PairwiseError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&bytes).map_err(|e| PairwiseError::InvalidJson(e.to_string()))
    }
}
