//! # Credential Entity
//!
//! A [`Credential`] is the holder side of one issuance exchange. It starts from a received
//! offer, sends one request over an accepted connection and stores the credential the issuer
//! answers with.
//!
//! ## Persistence
//!
//! Credentials use the same versioned envelope as connections, `{"version": "1.0", "data": {...}}`.
use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Value};

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use super::types::{CredentialEntityAccessor, OfferPayload, State};
use crate::connection::types::CompletedConnection;
use crate::messages::legacy::PaymentInfo;
use crate::messages::{MessageKind, ParsedMessage};
use crate::problem_report::{ProblemReport, ProblemReportHolder};
use crate::router::MessageLog;
use crate::types::{PairwiseError, Protocol};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(crate = "self::serde")]
pub struct Credential {
    pub(super) source_id: String,
    pub(super) state: State,

    /// Unknown until the request decides it, a legacy offer can go either way
    #[serde(default)]
    pub(super) protocol: Option<Protocol>,

    pub(super) offer: OfferPayload,
    pub(super) thread_id: String,

    #[serde(default)]
    pub(super) payment_txn: Option<String>,

    /// Snapshot of the connection the request went over
    #[serde(default)]
    pub(super) connection: Option<CompletedConnection>,

    #[serde(default)]
    pub(super) request: Option<Value>,

    #[serde(default)]
    pub(super) request_metadata: Option<Value>,

    #[serde(default)]
    pub(super) credential: Option<Value>,

    #[serde(default)]
    pub(super) credential_id: Option<String>,

    #[serde(default)]
    pub(super) problem_report: Option<ProblemReport>,

    #[serde(default)]
    pub(super) log: MessageLog,

    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(crate = "self::serde", tag = "version", content = "data")]
enum CredentialSnapshot {
    #[serde(rename = "1.0")]
    V1(Credential),
}

impl Credential {
    /// A new credential waits in `RequestReceived` for its request to be sent
    pub fn new(source_id: String, offer: OfferPayload) -> Self {
        let now = Utc::now();
        Self {
            source_id,
            state: State::RequestReceived,
            protocol: offer.protocol(),
            thread_id: offer.thread_id(),
            offer,
            payment_txn: None,
            connection: None,
            request: None,
            request_metadata: None,
            credential: None,
            credential_id: None,
            problem_report: None,
            log: MessageLog::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_state(&mut self, state: State) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Decides whether an inbound message belongs to this exchange
    ///
    /// Aries messages are matched by thread. A legacy credential carries the claim id
    /// of the offer it answers.
    pub fn owns(&self, message: &ParsedMessage) -> bool {
        match message.kind {
            MessageKind::Credential
            | MessageKind::CredentialProblemReport
            | MessageKind::ProblemReport => {
                let explicit_thid = message
                    .thread
                    .as_ref()
                    .and_then(|thread| thread.thid.clone());
                explicit_thid.as_deref() == Some(self.thread_id.as_str())
            }
            MessageKind::LegacyCredential => {
                let claim_offer_id = message
                    .payload
                    .get("claim_offer_id")
                    .and_then(|id| id.as_str());

                match &self.offer {
                    OfferPayload::Legacy { offer, .. } => {
                        claim_offer_id == Some(offer.claim_id.as_str())
                            || message.thread_id().as_deref() == Some(self.thread_id.as_str())
                    }
                    OfferPayload::Aries(_) => false,
                }
            }
            _ => false,
        }
    }

    pub(super) fn require_connection(&self) -> Result<&CompletedConnection, PairwiseError> {
        self.connection.as_ref().ok_or(PairwiseError::NotReady(
            "credential request was not sent yet".to_string(),
        ))
    }

    pub(super) fn require_accepted(&self, action: &str) -> Result<(), PairwiseError> {
        if self.state != State::Accepted {
            return Err(PairwiseError::InvalidState(format!(
                "{} requires an accepted credential, state: {}",
                action, self.state
            )));
        }

        Ok(())
    }

    pub fn to_snapshot(&self) -> Result<String, PairwiseError> {
        serde_json::to_string(&CredentialSnapshot::V1(self.clone()))
            .map_err(|err| PairwiseError::SerializeError(err.to_string()))
    }

    pub fn from_snapshot(raw: &str) -> Result<Self, PairwiseError> {
        let snapshot: CredentialSnapshot =
            serde_json::from_str(raw).map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;

        match snapshot {
            CredentialSnapshot::V1(credential) => Ok(credential),
        }
    }
}

impl ProblemReportHolder for Credential {
    fn store_problem_report(&mut self, report: ProblemReport) {
        self.problem_report = Some(report);
    }
}

impl CredentialEntityAccessor for Credential {
    fn get_source_id(&self) -> String {
        self.source_id.clone()
    }

    fn get_state(&self) -> State {
        self.state
    }

    fn get_protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    fn get_thread_id(&self) -> String {
        self.thread_id.clone()
    }

    fn get_offer(&self) -> OfferPayload {
        self.offer.clone()
    }

    fn get_connection(&self) -> Option<CompletedConnection> {
        self.connection.clone()
    }

    fn get_credential_id(&self) -> Option<String> {
        self.credential_id.clone()
    }

    fn get_payment_info(&self) -> Option<PaymentInfo> {
        self.offer.payment_info()
    }

    fn get_payment_txn(&self) -> Option<String> {
        self.payment_txn.clone()
    }

    fn get_problem_report(&self) -> Option<ProblemReport> {
        self.problem_report.clone()
    }

    fn get_created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn get_updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl ToJSON for Credential {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|e| BaseError::ToJSONError(e.to_string()))
    }
}

impl TryInto<Vec<u8>> for Credential {
    type Error = PairwiseError;

    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(&self).map_err(|e| PairwiseError::SerializeError(e.to_string()))
    }
}

impl TryFrom<Vec<u8>> for Credential {
    type Error = PairwiseError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&bytes).map_err(|e| PairwiseError::InvalidJson(e.to_string()))
    }
}
