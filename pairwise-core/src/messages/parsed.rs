use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde_json::{self, Value};

use super::thread::Thread;
use super::types::MessageKind;
use crate::types::{InboundMessage, PairwiseError};

/// ParsedMessage is the normalized view the router works with
///
/// `uid` is the agency identifier when the message was downloaded, `id` is the
/// message's own `@id` when it has one.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub uid: Option<String>,
    pub id: Option<String>,
    pub kind: MessageKind,
    pub thread: Option<Thread>,
    pub payload: Value,
}

impl ParsedMessage {
    pub fn from_inbound(message: InboundMessage) -> Self {
        Self::from_value(Some(message.uid), message.msg_type, message.payload)
    }

    /// Accepts either a raw message or an envelope of `{uid, msg_type, payload}`
    pub fn from_str(raw: &str) -> Result<Self, PairwiseError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;

        if !value.is_object() {
            return Err(PairwiseError::InvalidJson(
                "message must be a json object".to_string(),
            ));
        }

        let is_envelope = value.get("uid").map(|uid| uid.is_string()).unwrap_or(false)
            && value.get("payload").is_some();

        if is_envelope {
            let inbound: InboundMessage = serde_json::from_value(value)
                .map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;
            return Ok(Self::from_inbound(inbound));
        }

        Ok(Self::from_value(None, None, value))
    }

    pub fn from_value(uid: Option<String>, hint: Option<String>, payload: Value) -> Self {
        let kind = Self::detect_kind(&payload, hint.as_deref());
        let id = payload
            .get("@id")
            .and_then(|id| id.as_str())
            .map(|id| id.to_string());

        let thread = payload
            .get("~thread")
            .and_then(|thread| serde_json::from_value::<Thread>(thread.clone()).ok())
            .or_else(|| Self::legacy_thread(&payload));

        Self {
            uid,
            id,
            kind,
            thread,
            payload,
        }
    }

    fn detect_kind(payload: &Value, hint: Option<&str>) -> MessageKind {
        let tag = match payload.get("@type") {
            Some(Value::String(tag)) => Some(tag.clone()),
            Some(Value::Object(legacy)) => legacy
                .get("name")
                .and_then(|name| name.as_str())
                .map(|name| name.to_string()),
            _ => None,
        };

        let tag = tag.or_else(|| {
            payload
                .get("msg_type")
                .and_then(|name| name.as_str())
                .map(|name| name.to_string())
        });

        match (tag, hint) {
            (Some(tag), _) => MessageKind::from_tag(&tag),
            (None, Some(hint)) => MessageKind::from_tag(hint),
            (None, None) => MessageKind::Unknown(String::new()),
        }
    }

    fn legacy_thread(payload: &Value) -> Option<Thread> {
        ["threadId", "thread_id"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(|value| value.as_str()))
            .map(|thid| Thread::new().with_thid(thid.to_string()))
    }

    /// The message identifier used for idempotency, its `@id` or else its agency uid
    pub fn message_id(&self) -> Option<String> {
        self.id.clone().or_else(|| self.uid.clone())
    }

    /// The thread this message belongs to, a message without a thread opens its own
    pub fn thread_id(&self) -> Option<String> {
        self.thread
            .as_ref()
            .and_then(|thread| thread.thid.clone())
            .or_else(|| self.id.clone())
    }

    pub fn parent_thread_id(&self) -> Option<String> {
        self.thread.as_ref().and_then(|thread| thread.pthid.clone())
    }

    pub fn sender_order(&self) -> Option<u32> {
        self.thread.as_ref().and_then(|thread| thread.sender_order)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PairwiseError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|err| PairwiseError::InvalidJson(err.to_string()))
    }
}
