use std::fmt::{Debug, Display};

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Map, Value};

use rstdev_domain::entity::ToJSON;

use crate::connection::types::{CompletedConnection, ConnectionChannel};
use crate::messages::issuance::{CredentialOffer, CredentialPreview, PreviewAttribute};
use crate::messages::legacy::{LegacyCredentialOffer, PaymentInfo};
use crate::messages::{MessageKind, MessageType, Thread};
use crate::problem_report::ProblemReport;
use crate::registry::Handle;
use crate::types::{PairwiseError, Protocol, RetainedError, TransportBuilder, WalletBuilder};

/// Payment value marking an offer that must be paid before the request is sent
pub const PAYMENT_REQUIRED: &str = "one-time";

/// State represents the holder side lifecycle of a credential exchange
///
/// `RequestReceived` means the offer was received and our request is awaited, the
/// name is kept for its stable numeric code.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(crate = "self::serde")]
pub enum State {
    None,
    OfferSent,
    RequestReceived,
    Accepted,
}

impl State {
    pub fn code(&self) -> u32 {
        match self {
            State::None => 0,
            State::OfferSent => 2,
            State::RequestReceived => 3,
            State::Accepted => 4,
        }
    }

    pub fn later(&self) -> &'static [State] {
        match self {
            State::RequestReceived => &[State::OfferSent, State::Accepted],
            State::OfferSent => &[State::Accepted],
            _ => &[],
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// OfferPayload is the offer a credential was created with
///
/// A legacy offer does not decide the protocol by itself, it follows the connection
/// the request is eventually sent over.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", tag = "kind", content = "offer")]
pub enum OfferPayload {
    Legacy {
        offer: LegacyCredentialOffer,
        payment: Option<PaymentInfo>,
    },
    Aries(CredentialOffer),
}

impl OfferPayload {
    /// Parses either an Aries offer message or a legacy `[offer, payment_info?]` array
    pub fn parse(raw: &str) -> Result<Self, PairwiseError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;

        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, PairwiseError> {
        match value {
            Value::Array(items) => Self::from_items(items),
            Value::Object(_) if is_aries_offer(&value) => Self::aries(value),
            Value::Object(_) => Self::from_items(vec![value]),
            _ => Err(PairwiseError::InvalidJson(
                "credential offer must be a json object or array".to_string(),
            )),
        }
    }

    fn aries(value: Value) -> Result<Self, PairwiseError> {
        serde_json::from_value(value)
            .map(OfferPayload::Aries)
            .map_err(|err| PairwiseError::InvalidJson(err.to_string()))
    }

    fn from_items(items: Vec<Value>) -> Result<Self, PairwiseError> {
        if let Some(aries) = items.iter().find(|item| is_aries_offer(item)) {
            return Self::aries(aries.clone());
        }

        let mut offer = None;
        let mut payment = None;
        for item in items {
            if item.get("payment_required").is_some() {
                payment = Some(
                    serde_json::from_value::<PaymentInfo>(item)
                        .map_err(|err| PairwiseError::InvalidJson(err.to_string()))?,
                );
            } else if offer.is_none() {
                offer = Some(
                    serde_json::from_value::<LegacyCredentialOffer>(item)
                        .map_err(|err| PairwiseError::InvalidJson(err.to_string()))?,
                );
            }
        }

        let offer = offer.ok_or(PairwiseError::InvalidJson(
            "credential offer array has no offer".to_string(),
        ))?;

        Ok(OfferPayload::Legacy { offer, payment })
    }

    /// The protocol implied by the offer alone, legacy offers stay undecided
    pub fn protocol(&self) -> Option<Protocol> {
        match self {
            OfferPayload::Aries(_) => Some(Protocol::Aries),
            OfferPayload::Legacy { .. } => None,
        }
    }

    pub fn thread_id(&self) -> String {
        match self {
            OfferPayload::Aries(offer) => offer.thread_id(),
            OfferPayload::Legacy { offer, .. } => offer
                .thread_id
                .clone()
                .unwrap_or_else(|| offer.claim_id.clone()),
        }
    }

    pub fn payment_info(&self) -> Option<PaymentInfo> {
        match self {
            OfferPayload::Legacy { payment, .. } => payment.clone(),
            OfferPayload::Aries(_) => None,
        }
    }

    pub fn cred_def_id(&self) -> Option<String> {
        match self {
            OfferPayload::Aries(offer) => offer.cred_def_id(),
            OfferPayload::Legacy { offer, .. } => Some(offer.cred_def_id.clone()),
        }
    }

    /// The offer content handed to the wallet to build a credential request
    pub fn offer_content(&self) -> Result<Value, PairwiseError> {
        match self {
            OfferPayload::Aries(offer) => offer.offer_content(),
            OfferPayload::Legacy { offer, .. } => serde_json::from_str(&offer.libindy_offer)
                .map_err(|err| PairwiseError::InvalidJson(err.to_string())),
        }
    }

    /// Attribute names and values announced by the issuer
    pub fn attributes(&self) -> Vec<(String, String)> {
        match self {
            OfferPayload::Aries(offer) => offer
                .credential_preview
                .attributes
                .iter()
                .map(|attribute| (attribute.name.clone(), attribute.value.clone()))
                .collect(),
            OfferPayload::Legacy { offer, .. } => legacy_attributes(&offer.credential_attrs),
        }
    }

    /// Converts a legacy offer into the Aries offer sent over an Aries connection
    pub fn to_aries(&self) -> Result<CredentialOffer, PairwiseError> {
        let offer = match self {
            OfferPayload::Aries(offer) => return Ok(offer.clone()),
            OfferPayload::Legacy { offer, .. } => offer,
        };

        let preview = CredentialPreview::new(
            self.attributes()
                .into_iter()
                .map(|(name, value)| PreviewAttribute {
                    name,
                    mime_type: None,
                    value,
                })
                .collect(),
        );

        let thread = Thread::new().with_thid(self.thread_id());
        Ok(CredentialOffer::new(
            Some(offer.claim_name.clone()),
            preview,
            self.offer_content()?,
            Some(thread),
        ))
    }

    /// Wire form, an Aries message or the legacy `[offer, payment_info?]` array
    pub fn to_wire(&self) -> Result<String, PairwiseError> {
        let value = match self {
            OfferPayload::Aries(offer) => serde_json::to_value(offer),
            OfferPayload::Legacy { offer, payment } => {
                let mut items = vec![serde_json::to_value(offer)
                    .map_err(|err| PairwiseError::SerializeError(err.to_string()))?];

                if let Some(payment) = payment {
                    items.push(
                        serde_json::to_value(payment)
                            .map_err(|err| PairwiseError::SerializeError(err.to_string()))?,
                    );
                }

                Ok(Value::Array(items))
            }
        }
        .map_err(|err| PairwiseError::SerializeError(err.to_string()))?;

        serde_json::to_string(&value).map_err(|err| PairwiseError::SerializeError(err.to_string()))
    }
}

fn is_aries_offer(value: &Value) -> bool {
    value
        .get("@type")
        .and_then(|tag| tag.as_str())
        .and_then(MessageType::parse)
        .map(|message_type| MessageKind::from_type(&message_type) == MessageKind::CredentialOffer)
        .unwrap_or(false)
}

/// Legacy attributes are either plain values or `[value, encoded]` pairs
fn legacy_attributes(attrs: &Map<String, Value>) -> Vec<(String, String)> {
    attrs
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(value) => value.clone(),
                Value::Array(items) => items
                    .first()
                    .map(|item| match item {
                        Value::String(value) => value.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default(),
                other => other.to_string(),
            };

            (name.clone(), value)
        })
        .collect()
}

/// PendingOffer is an offer waiting in the connection's inbox
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct PendingOffer {
    /// Agency message uid, usable with `create_with_msg_id`
    pub uid: String,
    pub protocol: Protocol,
    pub offer: String,
}

/// OfferAcceptance is the result of accepting an offer in a single call
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct OfferAcceptance {
    pub handle: Handle,
    pub serialized: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct IssuedCredential {
    pub credential_id: String,
    pub credential: Value,
}

/// `CredentialEntityAccessor` is used to access the main Credential entity property fields
pub trait CredentialEntityAccessor:
    Clone + Debug + ToJSON + TryInto<Vec<u8>> + TryFrom<Vec<u8>>
{
    fn get_source_id(&self) -> String;
    fn get_state(&self) -> State;
    fn get_protocol(&self) -> Option<Protocol>;
    fn get_thread_id(&self) -> String;
    fn get_offer(&self) -> OfferPayload;
    fn get_connection(&self) -> Option<CompletedConnection>;
    fn get_credential_id(&self) -> Option<String>;
    fn get_payment_info(&self) -> Option<PaymentInfo>;
    fn get_payment_txn(&self) -> Option<String>;
    fn get_problem_report(&self) -> Option<ProblemReport>;
    fn get_created_at(&self) -> DateTime<Utc>;
    fn get_updated_at(&self) -> DateTime<Utc>;
}

/// CredentialAPI is the main entrypoint to the holder side credential exchange
#[async_trait]
pub trait CredentialAPI: Clone {
    type EntityAccessor: CredentialEntityAccessor;

    async fn create_with_offer(&self, source_id: String, offer: String)
        -> Result<Handle, PairwiseError>;

    /// Creates a credential from an offer waiting in the connection's inbox,
    /// returns the handle and the offer it was created with
    async fn create_with_msg_id(
        &self,
        source_id: String,
        connection: Handle,
        msg_id: String,
    ) -> Result<(Handle, String), PairwiseError>;

    /// Creates the credential and sends its request
    ///
    /// A failed request keeps the credential registered in `RequestReceived`, the
    /// returned [`RetainedError`] carries its handle for a retry with `send_request`.
    async fn accept_offer(
        &self,
        source_id: String,
        offer: String,
        connection: Handle,
    ) -> Result<OfferAcceptance, RetainedError>;

    async fn get_offers(&self, connection: Handle) -> Result<Vec<PendingOffer>, PairwiseError>;

    async fn send_request(
        &self,
        handle: Handle,
        connection: Handle,
        payment: Option<String>,
    ) -> Result<(), PairwiseError>;

    async fn reject(
        &self,
        handle: Handle,
        connection: Handle,
        comment: Option<String>,
    ) -> Result<(), PairwiseError>;

    async fn update_state(&self, handle: Handle) -> Result<State, PairwiseError>;

    async fn update_state_with_message(
        &self,
        handle: Handle,
        message: String,
    ) -> Result<State, PairwiseError>;

    async fn route_message(&self, message: String)
        -> Result<Option<(Handle, State)>, PairwiseError>;

    async fn get_state(&self, handle: Handle) -> Result<State, PairwiseError>;

    async fn get_source_id(&self, handle: Handle) -> Result<String, PairwiseError>;

    async fn get_thread_id(&self, handle: Handle) -> Result<String, PairwiseError>;

    async fn get_offer(&self, handle: Handle) -> Result<String, PairwiseError>;

    async fn get_problem_report(
        &self,
        handle: Handle,
    ) -> Result<Option<ProblemReport>, PairwiseError>;

    async fn get_presentation_proposal(&self, handle: Handle) -> Result<String, PairwiseError>;

    /// Builds the request message for out-of-band delivery, the state is left untouched
    async fn get_request_message(
        &self,
        handle: Handle,
        my_pw_did: String,
        their_pw_did: String,
    ) -> Result<String, PairwiseError>;

    async fn get_credential(&self, handle: Handle) -> Result<IssuedCredential, PairwiseError>;

    async fn get_payment_info(&self, handle: Handle)
        -> Result<Option<PaymentInfo>, PairwiseError>;

    async fn get_exchange(&self, handle: Handle) -> Result<Self::EntityAccessor, PairwiseError>;

    async fn serialize(&self, handle: Handle) -> Result<String, PairwiseError>;

    async fn deserialize(&self, data: String) -> Result<Handle, PairwiseError>;

    async fn delete(&self, handle: Handle) -> Result<(), PairwiseError>;
}

/// `UsecaseBuilder` is a trait behavior that provides base application logic's handlers
pub trait UsecaseBuilder<TEntityAccessor>: CredentialAPI<EntityAccessor = TEntityAccessor>
where
    TEntityAccessor: CredentialEntityAccessor,
{
    type TransportImplementer: TransportBuilder;
    type WalletImplementer: WalletBuilder;
    type ConnectionImplementer: ConnectionChannel;

    fn transport(&self) -> Self::TransportImplementer;
    fn wallet(&self) -> Self::WalletImplementer;
    fn connection(&self) -> Self::ConnectionImplementer;
}
