use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;

use rst_common::standard::chrono::Utc;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;
use rst_common::standard::uuid::Uuid;

use super::diddoc::DidDoc;
use super::thread::Thread;
use super::types::MessageKind;
use crate::types::PairwiseError;

pub const SIGNATURE_TYPE: &str = "https://didcomm.org/signature/1.0/ed25519Sha512_single";
pub const ACK_STATUS_OK: &str = "OK";

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn decode_b64(value: &str) -> Result<Vec<u8>, PairwiseError> {
    URL_SAFE
        .decode(value)
        .map_err(|err| PairwiseError::InvalidJson(err.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConnectionData {
    #[serde(rename = "DID")]
    pub did: String,

    #[serde(rename = "DIDDoc")]
    pub did_doc: DidDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConnectionRequest {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    pub label: String,
    pub connection: ConnectionData,

    #[serde(rename = "~thread", default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
}

impl ConnectionRequest {
    pub fn new(label: String, connection: ConnectionData, thread: Option<Thread>) -> Self {
        Self {
            msg_type: MessageKind::ConnectionRequest.type_tag(),
            id: new_id(),
            label,
            connection,
            thread,
        }
    }
}

/// SignatureDecorator is the `connection~sig` field of a connection response
///
/// `sig_data` is an 8 byte big endian timestamp followed by the JSON connection data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct SignatureDecorator {
    #[serde(rename = "@type")]
    pub sig_type: String,

    pub signature: String,
    pub sig_data: String,
    pub signer: String,
}

impl SignatureDecorator {
    pub fn payload(connection: &ConnectionData) -> Result<Vec<u8>, PairwiseError> {
        let timestamp = Utc::now().timestamp() as u64;
        let mut payload = timestamp.to_be_bytes().to_vec();
        let data = serde_json::to_vec(connection)
            .map_err(|err| PairwiseError::SerializeError(err.to_string()))?;

        payload.extend(data);
        Ok(payload)
    }

    pub fn new(signer: String, payload: &[u8], signature: &[u8]) -> Self {
        Self {
            sig_type: SIGNATURE_TYPE.to_string(),
            signature: URL_SAFE.encode(signature),
            sig_data: URL_SAFE.encode(payload),
            signer,
        }
    }

    pub fn payload_bytes(&self) -> Result<Vec<u8>, PairwiseError> {
        decode_b64(&self.sig_data)
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>, PairwiseError> {
        decode_b64(&self.signature)
    }

    pub fn connection(&self) -> Result<ConnectionData, PairwiseError> {
        let payload = self.payload_bytes()?;
        if payload.len() <= 8 {
            return Err(PairwiseError::InvalidJson(
                "signed payload is too short".to_string(),
            ));
        }

        serde_json::from_slice(&payload[8..])
            .map_err(|err| PairwiseError::InvalidJson(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConnectionResponse {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "connection~sig")]
    pub connection_sig: SignatureDecorator,

    #[serde(rename = "~thread")]
    pub thread: Thread,
}

impl ConnectionResponse {
    pub fn new(connection_sig: SignatureDecorator, thread: Thread) -> Self {
        Self {
            msg_type: MessageKind::ConnectionResponse.type_tag(),
            id: new_id(),
            connection_sig,
            thread,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Ack {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    pub status: String,

    #[serde(rename = "~thread")]
    pub thread: Thread,
}

impl Ack {
    pub fn new(kind: MessageKind, thread: Thread) -> Self {
        Self {
            msg_type: kind.type_tag(),
            id: new_id(),
            status: ACK_STATUS_OK.to_string(),
            thread,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PleaseAck {
    #[serde(default)]
    pub on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Ping {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default)]
    pub response_requested: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "~thread", default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
}

impl Ping {
    pub fn new(comment: Option<String>) -> Self {
        Self {
            msg_type: MessageKind::Ping.type_tag(),
            id: new_id(),
            response_requested: true,
            comment,
            thread: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PingResponse {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "~thread")]
    pub thread: Thread,
}

impl PingResponse {
    pub fn new(thread: Thread) -> Self {
        Self {
            msg_type: MessageKind::PingResponse.type_tag(),
            id: new_id(),
            comment: None,
            thread,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Query {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Query {
    pub fn new(query: Option<String>, comment: Option<String>) -> Self {
        Self {
            msg_type: MessageKind::Query.type_tag(),
            id: new_id(),
            query: query.unwrap_or_else(|| "*".to_string()),
            comment,
        }
    }

    /// Matches a protocol id against the query, `*` acting as a trailing wildcard
    pub fn matches(&self, protocol_id: &str) -> bool {
        match self.query.strip_suffix('*') {
            Some(prefix) => protocol_id.starts_with(prefix),
            None => protocol_id == self.query,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ProtocolDescriptor {
    pub pid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Disclose {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(default)]
    pub protocols: Vec<ProtocolDescriptor>,

    #[serde(rename = "~thread")]
    pub thread: Thread,
}

impl Disclose {
    pub fn new(protocols: Vec<String>, thread: Thread) -> Self {
        Self {
            msg_type: MessageKind::Disclose.type_tag(),
            id: new_id(),
            protocols: protocols
                .into_iter()
                .map(|pid| ProtocolDescriptor { pid, roles: None })
                .collect(),
            thread,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct HandshakeReuse {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "~thread")]
    pub thread: Thread,
}

impl HandshakeReuse {
    pub fn new(invitation_id: String) -> Self {
        let id = new_id();
        Self {
            msg_type: MessageKind::HandshakeReuse.type_tag(),
            thread: Thread::new()
                .with_thid(id.clone())
                .with_pthid(Some(invitation_id)),
            id,
        }
    }

    pub fn accepted(thread: Thread) -> Self {
        Self {
            msg_type: MessageKind::HandshakeReuseAccepted.type_tag(),
            id: new_id(),
            thread,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct BasicMessage {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    pub content: String,
    pub sent_time: String,
}

impl BasicMessage {
    pub fn new(content: String) -> Self {
        Self {
            msg_type: MessageKind::BasicMessage.type_tag(),
            id: new_id(),
            content,
            sent_time: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct QuestionResponse {
    pub text: String,

    #[serde(default)]
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Question {
    #[serde(rename = "@type", default)]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    pub question_text: String,

    #[serde(default)]
    pub question_detail: Option<String>,

    #[serde(default)]
    pub signature_required: bool,

    #[serde(default)]
    pub valid_responses: Vec<QuestionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ResponseSignature {
    pub signature: String,
    pub sig_data: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Answer {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "response.@sig")]
    pub response_sig: ResponseSignature,

    #[serde(rename = "~thread")]
    pub thread: Thread,
}

impl Answer {
    pub fn new(question_id: String, nonce: &str, signature: &[u8]) -> Self {
        Self {
            msg_type: MessageKind::Answer.type_tag(),
            id: new_id(),
            response_sig: ResponseSignature {
                signature: URL_SAFE.encode(signature),
                sig_data: URL_SAFE.encode(nonce.as_bytes()),
                timestamp: Utc::now().to_rfc3339(),
            },
            thread: Thread::new().with_thid(question_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct InviteAction {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    pub goal_code: String,

    #[serde(rename = "~please_ack", default, skip_serializing_if = "Option::is_none")]
    pub please_ack: Option<PleaseAck>,
}

impl InviteAction {
    pub fn new(goal_code: String, ack_on: Option<Vec<String>>) -> Self {
        Self {
            msg_type: MessageKind::InviteAction.type_tag(),
            id: new_id(),
            goal_code,
            please_ack: ack_on.map(|on| PleaseAck { on }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_decorator_roundtrip_connection() {
        let connection = ConnectionData {
            did: "did-alice".to_string(),
            did_doc: DidDoc::new("did-alice", "verkey-alice", "http://localhost", vec![]),
        };

        let payload = SignatureDecorator::payload(&connection);
        assert!(payload.is_ok());

        let payload = payload.unwrap();
        let decorator = SignatureDecorator::new("verkey-alice".to_string(), &payload, b"sig");
        assert_eq!(decorator.signature_bytes().unwrap(), b"sig".to_vec());
        assert_eq!(decorator.payload_bytes().unwrap(), payload);
        assert_eq!(decorator.connection().unwrap(), connection)
    }

    #[test]
    fn test_signature_decorator_short_payload() {
        let decorator = SignatureDecorator::new("verkey".to_string(), b"short", b"sig");
        let connection = decorator.connection();
        assert!(matches!(connection, Err(PairwiseError::InvalidJson(_))))
    }

    #[test]
    fn test_query_matches() {
        let query = Query::new(Some("https://didcomm.org/trust_ping/*".to_string()), None);
        assert!(query.matches("https://didcomm.org/trust_ping/1.0"));
        assert!(!query.matches("https://didcomm.org/connections/1.0"));

        let all = Query::new(None, None);
        assert!(all.matches("https://didcomm.org/connections/1.0"))
    }

    #[test]
    fn test_handshake_reuse_thread() {
        let reuse = HandshakeReuse::new("invitation-1".to_string());
        assert_eq!(reuse.thread.thid, Some(reuse.id.clone()));
        assert_eq!(reuse.thread.pthid, Some("invitation-1".to_string()))
    }
}
