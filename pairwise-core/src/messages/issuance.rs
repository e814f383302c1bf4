use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::standard::uuid::Uuid;

use super::aries::PleaseAck;
use super::attachment::{first_content, Attachment};
use super::thread::Thread;
use super::types::{MessageFamily, MessageKind, MessageType};
use crate::types::PairwiseError;

pub const ATTACH_OFFER: &str = "libindy-cred-offer-0";
pub const ATTACH_REQUEST: &str = "libindy-cred-request-0";
pub const ATTACH_CREDENTIAL: &str = "libindy-cred-0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PreviewAttribute {
    pub name: String,

    #[serde(rename = "mime-type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct CredentialPreview {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(default)]
    pub attributes: Vec<PreviewAttribute>,
}

impl CredentialPreview {
    pub fn new(attributes: Vec<PreviewAttribute>) -> Self {
        Self {
            msg_type: MessageType::new(MessageFamily::IssueCredential, "credential-preview")
                .to_tag(),
            attributes,
        }
    }
}

/// CredentialOffer is the Aries `offer-credential` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct CredentialOffer {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub credential_preview: CredentialPreview,

    #[serde(rename = "offers~attach")]
    pub offers_attach: Vec<Attachment>,

    #[serde(rename = "~thread", default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
}

impl CredentialOffer {
    pub fn new(
        comment: Option<String>,
        preview: CredentialPreview,
        offer: Value,
        thread: Option<Thread>,
    ) -> Self {
        Self {
            msg_type: MessageKind::CredentialOffer.type_tag(),
            id: Uuid::new_v4().to_string(),
            comment,
            credential_preview: preview,
            offers_attach: vec![Attachment::json(ATTACH_OFFER, offer)],
            thread,
        }
    }

    /// The exchange thread id is the offer's `~thread.thid` when present, else its `@id`
    pub fn thread_id(&self) -> String {
        self.thread
            .as_ref()
            .and_then(|thread| thread.thid.clone())
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn offer_content(&self) -> Result<Value, PairwiseError> {
        first_content(&self.offers_attach)
    }

    pub fn cred_def_id(&self) -> Option<String> {
        self.offer_content()
            .ok()
            .and_then(|offer| offer.get("cred_def_id").cloned())
            .and_then(|value| value.as_str().map(|id| id.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct CredentialRequest {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "requests~attach")]
    pub requests_attach: Vec<Attachment>,

    #[serde(rename = "~thread")]
    pub thread: Thread,
}

impl CredentialRequest {
    pub fn new(request: Value, thread: Thread) -> Self {
        Self {
            msg_type: MessageKind::CredentialRequest.type_tag(),
            id: Uuid::new_v4().to_string(),
            comment: None,
            requests_attach: vec![Attachment::json(ATTACH_REQUEST, request)],
            thread,
        }
    }
}

/// CredentialIssued is the Aries `issue-credential` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct CredentialIssued {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "credentials~attach")]
    pub credentials_attach: Vec<Attachment>,

    #[serde(rename = "~thread")]
    pub thread: Thread,

    #[serde(rename = "~please_ack", default, skip_serializing_if = "Option::is_none")]
    pub please_ack: Option<PleaseAck>,
}

impl CredentialIssued {
    pub fn credential_content(&self) -> Result<Value, PairwiseError> {
        first_content(&self.credentials_attach)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PresentationAttribute {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PresentationPreview {
    #[serde(rename = "@type")]
    pub msg_type: String,

    pub attributes: Vec<PresentationAttribute>,

    #[serde(default)]
    pub predicates: Vec<Value>,
}

/// PresentationProposal is derived from an issued credential's attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PresentationProposal {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub presentation_proposal: PresentationPreview,
}

impl PresentationProposal {
    pub fn new(attributes: Vec<PresentationAttribute>) -> Self {
        Self {
            msg_type: MessageKind::PresentationProposal.type_tag(),
            id: Uuid::new_v4().to_string(),
            comment: None,
            presentation_proposal: PresentationPreview {
                msg_type: MessageType::new(MessageFamily::PresentProof, "presentation-preview")
                    .to_tag(),
                attributes,
                predicates: Vec::new(),
            },
        }
    }
}
