//! Legacy agency protocol messages
//!
//! Invite details have both a long and an abbreviated key form; the abbreviated
//! keys are accepted as aliases on input and produced by [`InviteDetail::to_abbreviated`].
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{json, Map, Value};
use rst_common::standard::uuid::Uuid;

use super::types::MessageKind;

pub const STATUS_CREATED: &str = "MS-101";
pub const STATUS_SENT: &str = "MS-102";
pub const STATUS_ACCEPTED: &str = "MS-104";
pub const STATUS_REJECTED: &str = "MS-105";
pub const MESSAGE_VERSION: &str = "1.0";
pub const CREDENTIAL_VERSION: &str = "0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct LegacyType {
    pub name: String,
    pub ver: String,
}

impl LegacyType {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            name: kind.type_tag(),
            ver: MESSAGE_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct KeyDlgProof {
    #[serde(rename = "agentDID", alias = "d")]
    pub agent_did: String,

    #[serde(rename = "agentDelegatedKey", alias = "k")]
    pub agent_delegated_key: String,

    #[serde(alias = "s")]
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct SenderDetail {
    #[serde(alias = "n", default)]
    pub name: Option<String>,

    #[serde(
        rename = "agentKeyDlgProof",
        alias = "dp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub agent_key_dlg_proof: Option<KeyDlgProof>,

    #[serde(rename = "DID", alias = "d")]
    pub did: String,

    #[serde(rename = "logoUrl", alias = "l", default)]
    pub logo_url: Option<String>,

    #[serde(rename = "verKey", alias = "v")]
    pub verkey: String,

    #[serde(rename = "publicDID", default, skip_serializing_if = "Option::is_none")]
    pub public_did: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct SenderAgencyDetail {
    #[serde(rename = "DID", alias = "d")]
    pub did: String,

    #[serde(rename = "verKey", alias = "v")]
    pub verkey: String,

    #[serde(alias = "e")]
    pub endpoint: String,
}

/// InviteDetail is the invitation shape of the legacy protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct InviteDetail {
    #[serde(rename = "statusCode", alias = "sc")]
    pub status_code: String,

    #[serde(rename = "connReqId", alias = "id")]
    pub conn_req_id: String,

    #[serde(rename = "senderDetail", alias = "s")]
    pub sender_detail: SenderDetail,

    #[serde(rename = "senderAgencyDetail", alias = "sa")]
    pub sender_agency_detail: SenderAgencyDetail,

    #[serde(rename = "targetName", alias = "t", default)]
    pub target_name: String,

    #[serde(rename = "statusMsg", alias = "sm", default)]
    pub status_msg: String,

    #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl InviteDetail {
    pub fn to_abbreviated(&self) -> Value {
        let sender = &self.sender_detail;
        let agency = &self.sender_agency_detail;

        let mut sender_value = json!({
            "n": sender.name,
            "d": sender.did,
            "l": sender.logo_url,
            "v": sender.verkey,
        });

        if let Some(proof) = &sender.agent_key_dlg_proof {
            sender_value["dp"] = json!({
                "d": proof.agent_did,
                "k": proof.agent_delegated_key,
                "s": proof.signature,
            });
        }

        if let Some(public_did) = &sender.public_did {
            sender_value["publicDID"] = json!(public_did);
        }

        let mut abbreviated = json!({
            "sc": self.status_code,
            "id": self.conn_req_id,
            "s": sender_value,
            "sa": {
                "d": agency.did,
                "v": agency.verkey,
                "e": agency.endpoint,
            },
            "t": self.target_name,
            "sm": self.status_msg,
        });

        if let Some(thread_id) = &self.thread_id {
            abbreviated["threadId"] = json!(thread_id);
        }

        abbreviated
    }
}

/// ConnectionRequestMessage asks the agency to deliver an invitation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConnectionRequestMessage {
    #[serde(rename = "@type")]
    pub msg_type: LegacyType,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "sendMsg")]
    pub send_msg: bool,

    #[serde(rename = "phoneNo", default, skip_serializing_if = "Option::is_none")]
    pub phone_no: Option<String>,

    #[serde(rename = "usePublicDID")]
    pub use_public_did: bool,

    #[serde(rename = "inviteDetail")]
    pub invite_detail: InviteDetail,
}

impl ConnectionRequestMessage {
    pub fn new(invite_detail: InviteDetail, phone_no: Option<String>, use_public_did: bool) -> Self {
        Self {
            msg_type: LegacyType::new(MessageKind::LegacyConnectionRequest),
            id: invite_detail.conn_req_id.clone(),
            send_msg: phone_no.is_some(),
            phone_no,
            use_public_did,
            invite_detail,
        }
    }
}

/// ConnectionAnswer carries the invitee's decision, `MS-104` accepted or `MS-105` rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConnectionAnswer {
    #[serde(rename = "@type")]
    pub msg_type: LegacyType,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "senderDetail")]
    pub sender_detail: SenderDetail,

    #[serde(rename = "senderAgencyDetail")]
    pub sender_agency_detail: SenderAgencyDetail,

    #[serde(rename = "answerStatusCode")]
    pub answer_status_code: String,

    #[serde(rename = "replyToMsgId")]
    pub reply_to_msg_id: String,

    #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl ConnectionAnswer {
    pub fn accepted(
        sender_detail: SenderDetail,
        sender_agency_detail: SenderAgencyDetail,
        reply_to_msg_id: String,
        thread_id: Option<String>,
    ) -> Self {
        Self {
            msg_type: LegacyType::new(MessageKind::LegacyConnectionAnswer),
            id: Uuid::new_v4().to_string(),
            sender_detail,
            sender_agency_detail,
            answer_status_code: STATUS_ACCEPTED.to_string(),
            reply_to_msg_id,
            thread_id,
        }
    }
}

/// RedirectDetail points the remote party at an already established relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct RedirectDetail {
    #[serde(rename = "DID")]
    pub did: String,

    #[serde(rename = "verKey")]
    pub verkey: String,

    #[serde(rename = "publicDID", default)]
    pub public_did: Option<String>,

    #[serde(rename = "theirDID", default)]
    pub their_did: Option<String>,

    #[serde(rename = "theirVerKey", default)]
    pub their_verkey: Option<String>,

    #[serde(rename = "theirPublicDID", default)]
    pub their_public_did: Option<String>,

    #[serde(default)]
    pub signature: String,
}

impl RedirectDetail {
    /// The bytes covered by the redirect signature
    pub fn signed_payload(&self) -> Vec<u8> {
        format!("{}{}", self.did, self.verkey).into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConnectionRedirect {
    #[serde(rename = "@type")]
    pub msg_type: LegacyType,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "redirectDetail")]
    pub redirect_detail: RedirectDetail,

    #[serde(rename = "senderDetail")]
    pub sender_detail: SenderDetail,

    #[serde(rename = "senderAgencyDetail")]
    pub sender_agency_detail: SenderAgencyDetail,

    #[serde(rename = "replyToMsgId")]
    pub reply_to_msg_id: String,

    #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl ConnectionRedirect {
    pub fn new(
        redirect_detail: RedirectDetail,
        sender_detail: SenderDetail,
        sender_agency_detail: SenderAgencyDetail,
        reply_to_msg_id: String,
        thread_id: Option<String>,
    ) -> Self {
        Self {
            msg_type: LegacyType::new(MessageKind::LegacyConnectionRedirect),
            id: Uuid::new_v4().to_string(),
            redirect_detail,
            sender_detail,
            sender_agency_detail,
            reply_to_msg_id,
            thread_id,
        }
    }
}

/// GenericMessage wraps free form content sent over a legacy connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct GenericMessage {
    #[serde(rename = "@type")]
    pub msg_type: LegacyType,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "refMsgId", default, skip_serializing_if = "Option::is_none")]
    pub ref_msg_id: Option<String>,

    pub content: Value,
}

impl GenericMessage {
    pub fn new(
        name: Option<String>,
        title: Option<String>,
        ref_msg_id: Option<String>,
        content: Value,
    ) -> Self {
        let msg_type = match name {
            Some(name) => LegacyType {
                name,
                ver: MESSAGE_VERSION.to_string(),
            },
            None => LegacyType::new(MessageKind::LegacyGeneric),
        };

        Self {
            msg_type,
            id: Uuid::new_v4().to_string(),
            title,
            ref_msg_id,
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PaymentInfo {
    pub payment_required: String,
    pub payment_addr: String,
    pub price: u64,
}

/// LegacyCredentialOffer is the `CLAIM_OFFER` payload of the legacy issuer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct LegacyCredentialOffer {
    pub msg_type: String,
    pub version: String,
    pub to_did: String,
    pub from_did: String,

    #[serde(default)]
    pub libindy_offer: String,

    pub cred_def_id: String,

    #[serde(default)]
    pub credential_attrs: Map<String, Value>,

    #[serde(default)]
    pub schema_seq_no: u32,

    pub claim_name: String,
    pub claim_id: String,

    #[serde(default)]
    pub msg_ref_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct LegacyCredentialRequest {
    pub msg_type: String,
    pub libindy_cred_req: String,
    pub libindy_cred_req_meta: String,
    pub cred_def_id: String,
    pub tid: String,
    pub to_did: String,
    pub from_did: String,
    pub version: String,
    pub mid: String,

    #[serde(default)]
    pub msg_ref_id: Option<String>,
}

impl LegacyCredentialRequest {
    pub fn new(
        offer: &LegacyCredentialOffer,
        request: &Value,
        metadata: &Value,
        my_pw_did: String,
        their_pw_did: String,
    ) -> Self {
        Self {
            msg_type: MessageKind::LegacyCredentialRequest.type_tag(),
            libindy_cred_req: request.to_string(),
            libindy_cred_req_meta: metadata.to_string(),
            cred_def_id: offer.cred_def_id.clone(),
            tid: offer.thread_id.clone().unwrap_or_else(|| offer.claim_id.clone()),
            to_did: their_pw_did,
            from_did: my_pw_did,
            version: CREDENTIAL_VERSION.to_string(),
            mid: Uuid::new_v4().to_string(),
            msg_ref_id: offer.msg_ref_id.clone(),
        }
    }
}

/// LegacyCredential is the `CRED` payload answering a credential request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct LegacyCredential {
    pub msg_type: String,
    pub libindy_cred: String,
    pub claim_offer_id: String,

    #[serde(default)]
    pub cred_revoc_id: Option<String>,

    #[serde(default)]
    pub revoc_reg_delta_json: Option<String>,

    pub version: String,
    pub from_did: String,

    #[serde(default)]
    pub thread_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rst_common::standard::serde_json;

    fn invite_detail() -> InviteDetail {
        InviteDetail {
            status_code: STATUS_SENT.to_string(),
            conn_req_id: "req-1".to_string(),
            sender_detail: SenderDetail {
                name: Some("alice".to_string()),
                agent_key_dlg_proof: None,
                did: "did-alice".to_string(),
                logo_url: None,
                verkey: "verkey-alice".to_string(),
                public_did: None,
            },
            sender_agency_detail: SenderAgencyDetail {
                did: "did-agency".to_string(),
                verkey: "verkey-agency".to_string(),
                endpoint: "http://localhost:8080".to_string(),
            },
            target_name: "bob".to_string(),
            status_msg: "message sent".to_string(),
            thread_id: Some("req-1".to_string()),
        }
    }

    #[test]
    fn test_abbreviated_form_is_accepted() {
        let detail = invite_detail();
        let abbreviated = detail.to_abbreviated();
        assert_eq!(abbreviated["sc"], json!(STATUS_SENT));
        assert_eq!(abbreviated["s"]["d"], json!("did-alice"));
        assert_eq!(abbreviated["sa"]["e"], json!("http://localhost:8080"));

        let parsed: Result<InviteDetail, _> = serde_json::from_value(abbreviated);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap(), detail)
    }

    #[test]
    fn test_legacy_request_uses_offer_thread() {
        let offer = LegacyCredentialOffer {
            msg_type: "CLAIM_OFFER".to_string(),
            version: CREDENTIAL_VERSION.to_string(),
            to_did: "did-bob".to_string(),
            from_did: "did-issuer".to_string(),
            libindy_offer: "{}".to_string(),
            cred_def_id: "cred-def-1".to_string(),
            credential_attrs: Map::new(),
            schema_seq_no: 1,
            claim_name: "degree".to_string(),
            claim_id: "claim-1".to_string(),
            msg_ref_id: Some("uid-1".to_string()),
            thread_id: None,
        };

        let request = LegacyCredentialRequest::new(
            &offer,
            &json!({"req": 1}),
            &json!({"meta": 1}),
            "did-bob".to_string(),
            "did-issuer".to_string(),
        );

        assert_eq!(request.tid, "claim-1".to_string());
        assert_eq!(request.msg_ref_id, Some("uid-1".to_string()));
        assert_eq!(request.to_did, "did-issuer".to_string());
        assert_eq!(request.msg_type, "CRED_REQ".to_string())
    }
}
