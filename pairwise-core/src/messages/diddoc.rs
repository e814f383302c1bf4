use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::types::{Destination, PairwiseError};

pub const CONTEXT: &str = "https://w3id.org/did/v1";
pub const KEY_TYPE: &str = "Ed25519VerificationKey2018";
pub const SERVICE_TYPE: &str = "IndyAgent";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PublicKey {
    pub id: String,

    #[serde(rename = "type")]
    pub key_type: String,

    pub controller: String,

    #[serde(rename = "publicKeyBase58")]
    pub public_key_base58: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Authentication {
    #[serde(rename = "type")]
    pub auth_type: String,

    #[serde(rename = "publicKey")]
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Service {
    pub id: String,

    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(default)]
    pub priority: u32,

    #[serde(rename = "recipientKeys")]
    pub recipient_keys: Vec<String>,

    #[serde(rename = "routingKeys", default)]
    pub routing_keys: Vec<String>,

    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

/// DidDoc is the minimal DID document exchanged inside connection requests and responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct DidDoc {
    #[serde(rename = "@context")]
    pub context: String,

    pub id: String,

    #[serde(rename = "publicKey", default)]
    pub public_key: Vec<PublicKey>,

    #[serde(default)]
    pub authentication: Vec<Authentication>,

    #[serde(default)]
    pub service: Vec<Service>,
}

impl DidDoc {
    pub fn new(did: &str, verkey: &str, endpoint: &str, routing_keys: Vec<String>) -> Self {
        let key_id = format!("{}#1", did);
        Self {
            context: CONTEXT.to_string(),
            id: did.to_string(),
            public_key: vec![PublicKey {
                id: key_id.clone(),
                key_type: KEY_TYPE.to_string(),
                controller: did.to_string(),
                public_key_base58: verkey.to_string(),
            }],
            authentication: vec![Authentication {
                auth_type: KEY_TYPE.to_string(),
                public_key: key_id,
            }],
            service: vec![Service {
                id: format!("{};indy", did),
                service_type: SERVICE_TYPE.to_string(),
                priority: 0,
                recipient_keys: vec![verkey.to_string()],
                routing_keys,
                service_endpoint: endpoint.to_string(),
            }],
        }
    }

    /// Builds the delivery target from the first service entry
    pub fn to_destination(&self) -> Result<Destination, PairwiseError> {
        let service = self
            .service
            .first()
            .ok_or(PairwiseError::InvalidJson("did doc has no service".to_string()))?;

        if service.recipient_keys.is_empty() || service.service_endpoint.is_empty() {
            return Err(PairwiseError::InvalidJson(
                "did doc service is incomplete".to_string(),
            ));
        }

        Ok(Destination::new(
            service.service_endpoint.clone(),
            service.recipient_keys.clone(),
            service.routing_keys.clone(),
        )
        .with_did(Some(self.id.clone())))
    }
}
