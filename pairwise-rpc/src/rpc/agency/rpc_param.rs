use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Value};

use prople_jsonrpc_client::types::{ExecutorError, RpcValue};

use prople_pairwise_core::types::Destination;

use crate::common::types::CommonError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
#[serde(tag = "param", content = "payload")]
pub enum Agency {
    SendMessage {
        sender_verkey: String,
        message: Value,
        destination: Destination,
    },
    GetMessages {
        pairwise_did: String,
        thread_id: Option<String>,
    },
    UpdateMessageStatus {
        pairwise_did: String,
        uids: Vec<String>,
    },
}

/// Binary values travel as standard base64 strings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
#[serde(tag = "param", content = "payload")]
pub enum Wallet {
    CreateKey,
    Sign {
        verkey: String,
        data: String,
    },
    Verify {
        verkey: String,
        data: String,
        signature: String,
    },
    CreateCredentialRequest {
        prover_did: String,
        offer: Value,
    },
    StoreCredential {
        request_metadata: Value,
        credential: Value,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
#[serde(tag = "param", content = "payload")]
pub enum Ledger {
    ResolveEndpoint { did: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
#[serde(tag = "type", content = "payload")]
pub enum Param {
    Agency(Agency),
    Wallet(Wallet),
    Ledger(Ledger),
}

impl RpcValue for Param {
    fn build_serde_value(&self) -> Result<Value, ExecutorError> {
        serde_json::to_value(self).map_err(|err| ExecutorError::BuildValueError(err.to_string()))
    }
}

impl TryFrom<Value> for Param {
    type Error = CommonError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value).map_err(|err| CommonError::JSONError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rst_common::standard::serde_json::json;

    #[test]
    fn test_build_ledger_serde_json_str() {
        let param = Param::Ledger(Ledger::ResolveEndpoint {
            did: String::from("did-issuer"),
        });
        let try_json = serde_json::to_string(&param);
        assert!(!try_json.is_err());

        let expected = r#"{"type":"Ledger","payload":{"param":"ResolveEndpoint","payload":{"did":"did-issuer"}}}"#;
        assert_eq!(expected, try_json.unwrap())
    }

    #[test]
    fn test_build_unit_param() {
        let value = Param::Wallet(Wallet::CreateKey).build_serde_value();
        assert!(value.is_ok());
        assert_eq!(
            value.unwrap(),
            json!({"type": "Wallet", "payload": {"param": "CreateKey"}})
        )
    }

    #[test]
    fn test_agency_from_value() {
        let value = json!({
            "type": "Agency",
            "payload": {
                "param": "GetMessages",
                "payload": {"pairwise_did": "did-alice", "thread_id": null}
            }
        });

        let param = Param::try_from(value);
        assert!(matches!(
            param,
            Ok(Param::Agency(Agency::GetMessages { thread_id: None, .. }))
        ));

        let invalid = Param::try_from(json!({"type": "Unknown"}));
        assert!(matches!(invalid, Err(CommonError::JSONError(_))))
    }
}
