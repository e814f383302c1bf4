use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;

use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Value};

use crate::types::PairwiseError;

pub const MIME_JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct AttachmentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

/// Attachment is the `~attach` payload wrapper used by offers, requests and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Attachment {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(
        rename = "mime-type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mime_type: Option<String>,

    pub data: AttachmentData,
}

impl Attachment {
    pub fn json(id: &str, value: Value) -> Self {
        Self {
            id: Some(id.to_string()),
            mime_type: Some(MIME_JSON.to_string()),
            data: AttachmentData {
                json: Some(value),
                base64: None,
            },
        }
    }

    pub fn encoded(id: &str, value: &Value) -> Self {
        Self {
            id: Some(id.to_string()),
            mime_type: Some(MIME_JSON.to_string()),
            data: AttachmentData {
                json: None,
                base64: Some(STANDARD.encode(value.to_string())),
            },
        }
    }

    /// Returns the attached JSON document, decoding base64 content when needed
    pub fn content(&self) -> Result<Value, PairwiseError> {
        if let Some(json) = &self.data.json {
            return Ok(json.clone());
        }

        let encoded = self
            .data
            .base64
            .as_ref()
            .ok_or(PairwiseError::InvalidJson("attachment has no data".to_string()))?;

        let raw = STANDARD
            .decode(encoded)
            .or_else(|_| URL_SAFE.decode(encoded))
            .map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;

        serde_json::from_slice(&raw).map_err(|err| PairwiseError::InvalidJson(err.to_string()))
    }
}

/// Picks the first attachment and returns its decoded content
pub fn first_content(attachments: &[Attachment]) -> Result<Value, PairwiseError> {
    attachments
        .first()
        .ok_or(PairwiseError::InvalidJson("missing attachment".to_string()))?
        .content()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rst_common::standard::serde_json::json;

    #[test]
    fn test_content_from_base64() {
        let value = json!({"cred_def_id": "cred-def-1"});
        let attachment = Attachment::encoded("libindy-cred-offer-0", &value);

        let content = attachment.content();
        assert!(content.is_ok());
        assert_eq!(content.unwrap(), value)
    }

    #[test]
    fn test_content_without_data() {
        let attachment = Attachment {
            id: None,
            mime_type: None,
            data: AttachmentData::default(),
        };

        let content = attachment.content();
        assert!(matches!(content, Err(PairwiseError::InvalidJson(_))))
    }

    #[test]
    fn test_first_content_empty() {
        let result = first_content(&[]);
        assert!(matches!(result, Err(PairwiseError::InvalidJson(_))))
    }
}
