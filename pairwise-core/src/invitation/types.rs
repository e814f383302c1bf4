use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;

use crate::messages::attachment::Attachment;
use crate::messages::legacy::InviteDetail;
use crate::messages::MessageKind;
use crate::types::{Destination, Protocol};

pub const CONNECTIONS_HANDSHAKE: &str = "https://didcomm.org/connections/1.0";
pub const INLINE_SERVICE_TYPE: &str = "did-communication";

/// AriesInvitation is the `connections/1.0/invitation` message
///
/// When `public_did` is set the service fields may be empty, the invitee then
/// resolves the DID through the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct AriesInvitation {
    #[serde(rename = "@type", default)]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default)]
    pub label: String,

    #[serde(rename = "recipientKeys", default)]
    pub recipient_keys: Vec<String>,

    #[serde(rename = "routingKeys", default)]
    pub routing_keys: Vec<String>,

    #[serde(rename = "serviceEndpoint", default)]
    pub service_endpoint: String,

    #[serde(rename = "profileUrl", default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_did: Option<String>,
}

impl AriesInvitation {
    pub fn new(label: String, destination: Destination, profile_url: Option<String>) -> Self {
        Self {
            msg_type: MessageKind::ConnectionInvitation.type_tag(),
            id: Uuid::new_v4().to_string(),
            label,
            recipient_keys: destination.recipient_keys,
            routing_keys: destination.routing_keys,
            service_endpoint: destination.endpoint,
            profile_url,
            public_did: None,
        }
    }

    pub fn with_public_did(mut self, did: Option<String>) -> Self {
        self.public_did = did;
        self
    }

    pub fn has_inline_service(&self) -> bool {
        !self.recipient_keys.is_empty() && !self.service_endpoint.is_empty()
    }

    pub fn destination(&self) -> Destination {
        Destination::new(
            self.service_endpoint.clone(),
            self.recipient_keys.clone(),
            self.routing_keys.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct InlineService {
    pub id: String,

    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(rename = "recipientKeys")]
    pub recipient_keys: Vec<String>,

    #[serde(rename = "routingKeys", default)]
    pub routing_keys: Vec<String>,

    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

impl InlineService {
    pub fn new(destination: Destination) -> Self {
        Self {
            id: "#inline".to_string(),
            service_type: INLINE_SERVICE_TYPE.to_string(),
            recipient_keys: destination.recipient_keys,
            routing_keys: destination.routing_keys,
            service_endpoint: destination.endpoint,
        }
    }

    pub fn destination(&self) -> Destination {
        Destination::new(
            self.service_endpoint.clone(),
            self.recipient_keys.clone(),
            self.routing_keys.clone(),
        )
    }
}

/// ServiceEntry is either a resolvable DID or an inline service block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde", untagged)]
pub enum ServiceEntry {
    Did(String),
    Inline(InlineService),
}

/// OutofbandInvitation is the `out-of-band/1.1/invitation` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct OutofbandInvitation {
    #[serde(rename = "@type", default)]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake_protocols: Option<Vec<String>>,

    #[serde(rename = "request~attach", default, skip_serializing_if = "Option::is_none")]
    pub request_attach: Option<Vec<Attachment>>,

    #[serde(default)]
    pub service: Vec<ServiceEntry>,

    #[serde(rename = "profileUrl", default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_did: Option<String>,
}

impl OutofbandInvitation {
    pub fn new(label: String) -> Self {
        Self {
            msg_type: MessageKind::OutofbandInvitation.type_tag(),
            id: Uuid::new_v4().to_string(),
            label: Some(label),
            goal_code: None,
            goal: None,
            handshake_protocols: None,
            request_attach: None,
            service: Vec::new(),
            profile_url: None,
            public_did: None,
        }
    }

    /// An empty handshake list is treated the same as an absent one
    pub fn has_handshake(&self) -> bool {
        self.handshake_protocols
            .as_ref()
            .map(|protocols| !protocols.is_empty())
            .unwrap_or(false)
    }

    pub fn supports_connections(&self) -> bool {
        self.handshake_protocols
            .as_ref()
            .map(|protocols| {
                protocols
                    .iter()
                    .any(|protocol| protocol.trim_end_matches('/').ends_with("connections/1.0"))
            })
            .unwrap_or(false)
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.request_attach.as_deref().unwrap_or(&[])
    }
}

/// Invitation is the decoded form of any invite shape this crate accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde", tag = "kind", content = "invitation")]
pub enum Invitation {
    Legacy(InviteDetail),
    Aries(AriesInvitation),
    OutOfBand(OutofbandInvitation),
}

impl Invitation {
    pub fn id(&self) -> String {
        match self {
            Invitation::Legacy(detail) => detail.conn_req_id.clone(),
            Invitation::Aries(invitation) => invitation.id.clone(),
            Invitation::OutOfBand(invitation) => invitation.id.clone(),
        }
    }

    pub fn label(&self) -> Option<String> {
        match self {
            Invitation::Legacy(detail) => detail.sender_detail.name.clone(),
            Invitation::Aries(invitation) => Some(invitation.label.clone()),
            Invitation::OutOfBand(invitation) => invitation.label.clone(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Invitation::Legacy(_) => Protocol::Proprietary,
            _ => Protocol::Aries,
        }
    }

    pub fn public_did(&self) -> Option<String> {
        match self {
            Invitation::Legacy(detail) => detail.sender_detail.public_did.clone(),
            Invitation::Aries(invitation) => invitation.public_did.clone(),
            Invitation::OutOfBand(invitation) => invitation.public_did.clone(),
        }
    }
}
