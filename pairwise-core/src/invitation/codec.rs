use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde_json::{self, Value};
use rst_common::with_logging::log::debug;

use super::types::{AriesInvitation, Invitation, OutofbandInvitation};
use crate::messages::legacy::InviteDetail;
use crate::messages::{MessageKind, MessageType};
use crate::types::PairwiseError;

fn parse_value(raw: &str) -> Result<Value, PairwiseError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;

    if !value.is_object() {
        return Err(PairwiseError::InvalidJson(
            "invitation must be a json object".to_string(),
        ));
    }

    Ok(value)
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, PairwiseError> {
    serde_json::from_value(value).map_err(|err| PairwiseError::InvalidJson(err.to_string()))
}

fn to_string(value: &Value) -> Result<String, PairwiseError> {
    serde_json::to_string(value).map_err(|err| PairwiseError::SerializeError(err.to_string()))
}

/// Detects the invite shape and decodes it
///
/// Aries shapes are recognized by their `@type` tag, legacy details by their
/// long or abbreviated sender keys.
pub fn decode(raw: &str) -> Result<Invitation, PairwiseError> {
    let value = parse_value(raw)?;

    let kind = value
        .get("@type")
        .and_then(|tag| tag.as_str())
        .and_then(MessageType::parse)
        .map(|message_type| MessageKind::from_type(&message_type));

    match kind {
        Some(MessageKind::ConnectionInvitation) => {
            validate_aries(from_value(value)?).map(Invitation::Aries)
        }
        Some(MessageKind::OutofbandInvitation) => {
            validate_outofband(from_value(value)?).map(Invitation::OutOfBand)
        }
        Some(other) => Err(PairwiseError::InvalidJson(format!(
            "not an invitation: {:?}",
            other
        ))),
        None if value.get("senderDetail").is_some() || value.get("s").is_some() => {
            from_value::<InviteDetail>(value).map(Invitation::Legacy)
        }
        None if value.get("recipientKeys").is_some() => {
            validate_aries(from_value(value)?).map(Invitation::Aries)
        }
        None => {
            debug!("[invitation:decode] unrecognized invite shape");
            Err(PairwiseError::InvalidJson(
                "unrecognized invitation shape".to_string(),
            ))
        }
    }
}

pub fn decode_outofband(raw: &str) -> Result<OutofbandInvitation, PairwiseError> {
    let value = parse_value(raw)?;
    validate_outofband(from_value(value)?)
}

fn validate_aries(invitation: AriesInvitation) -> Result<AriesInvitation, PairwiseError> {
    if invitation.id.is_empty() {
        return Err(PairwiseError::InvalidJson(
            "invitation id is empty".to_string(),
        ));
    }

    if !invitation.has_inline_service() && invitation.public_did.is_none() {
        return Err(PairwiseError::InvalidJson(
            "invitation needs recipient keys and a service endpoint or a public did".to_string(),
        ));
    }

    Ok(invitation)
}

fn validate_outofband(
    invitation: OutofbandInvitation,
) -> Result<OutofbandInvitation, PairwiseError> {
    if invitation.service.is_empty() {
        return Err(PairwiseError::InvalidJson(
            "out-of-band invitation has no service".to_string(),
        ));
    }

    if !invitation.has_handshake() && invitation.attachments().is_empty() {
        return Err(PairwiseError::InvalidJson(
            "out-of-band invitation needs handshake protocols or request attachments"
                .to_string(),
        ));
    }

    if invitation.has_handshake() && !invitation.supports_connections() {
        return Err(PairwiseError::ActionNotSupported(
            "none of the handshake protocols is supported".to_string(),
        ));
    }

    Ok(invitation)
}

/// Encodes an invitation into its wire form
///
/// Legacy details can be emitted with their abbreviated keys, Aries shapes have a
/// single form and ignore the flag.
pub fn encode(invitation: &Invitation, abbreviated: bool) -> Result<String, PairwiseError> {
    let value = match invitation {
        Invitation::Legacy(detail) if abbreviated => detail.to_abbreviated(),
        Invitation::Legacy(detail) => serde_json::to_value(detail)
            .map_err(|err| PairwiseError::SerializeError(err.to_string()))?,
        Invitation::Aries(aries) => serde_json::to_value(aries)
            .map_err(|err| PairwiseError::SerializeError(err.to_string()))?,
        Invitation::OutOfBand(oob) => serde_json::to_value(oob)
            .map_err(|err| PairwiseError::SerializeError(err.to_string()))?,
    };

    to_string(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::standard::serde_json::json;

    use crate::invitation::types::{InlineService, ServiceEntry, CONNECTIONS_HANDSHAKE};
    use crate::messages::legacy::{SenderAgencyDetail, SenderDetail, STATUS_SENT};
    use crate::types::{Destination, Protocol};

    fn aries_invitation() -> AriesInvitation {
        AriesInvitation::new(
            "alice".to_string(),
            Destination::new(
                "http://localhost:8080".to_string(),
                vec!["verkey-alice".to_string()],
                vec!["verkey-agency".to_string()],
            ),
            None,
        )
    }

    fn legacy_detail() -> InviteDetail {
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
            thread_id: None,
        }
    }

    fn outofband(handshake: Option<Vec<String>>) -> OutofbandInvitation {
        let mut invitation = OutofbandInvitation::new("alice".to_string());
        invitation.handshake_protocols = handshake;
        invitation.service = vec![ServiceEntry::Inline(InlineService::new(Destination::new(
            "http://localhost:8080".to_string(),
            vec!["verkey-alice".to_string()],
            vec![],
        )))];
        invitation
    }

    #[test]
    fn test_decode_aries() {
        let invitation = aries_invitation();
        let raw = encode(&Invitation::Aries(invitation.clone()), false).unwrap();

        let decoded = decode(&raw);
        assert!(decoded.is_ok());

        let decoded = decoded.unwrap();
        assert_eq!(decoded.protocol(), Protocol::Aries);
        assert_eq!(decoded, Invitation::Aries(invitation))
    }

    #[test]
    fn test_decode_aries_public_did_only() {
        let raw = json!({
            "@type": "https://didcomm.org/connections/1.0/invitation",
            "@id": "inv-1",
            "label": "alice",
            "public_did": "did:sov:alice"
        })
        .to_string();

        let decoded = decode(&raw);
        assert!(decoded.is_ok());
        assert_eq!(
            decoded.unwrap().public_did(),
            Some("did:sov:alice".to_string())
        )
    }

    #[test]
    fn test_decode_aries_missing_service() {
        let raw = json!({
            "@type": "https://didcomm.org/connections/1.0/invitation",
            "@id": "inv-1",
            "label": "alice"
        })
        .to_string();

        let decoded = decode(&raw);
        assert!(matches!(decoded, Err(PairwiseError::InvalidJson(_))))
    }

    #[test]
    fn test_decode_legacy_both_forms() {
        let detail = legacy_detail();
        let long = encode(&Invitation::Legacy(detail.clone()), false).unwrap();
        let short = encode(&Invitation::Legacy(detail.clone()), true).unwrap();
        assert_ne!(long, short);

        let from_long = decode(&long).unwrap();
        let from_short = decode(&short).unwrap();
        assert_eq!(from_long, Invitation::Legacy(detail));
        assert_eq!(from_long, from_short);
        assert_eq!(from_short.protocol(), Protocol::Proprietary)
    }

    #[test]
    fn test_decode_outofband() {
        let invitation = outofband(Some(vec![CONNECTIONS_HANDSHAKE.to_string()]));
        let raw = encode(&Invitation::OutOfBand(invitation.clone()), false).unwrap();

        let decoded = decode_outofband(&raw);
        assert!(decoded.is_ok());
        assert_eq!(decoded.unwrap(), invitation)
    }

    #[test]
    fn test_decode_outofband_without_handshake_and_attachment() {
        let invitation = outofband(Some(vec![]));
        let raw = encode(&Invitation::OutOfBand(invitation), false).unwrap();

        let decoded = decode_outofband(&raw);
        assert!(matches!(decoded, Err(PairwiseError::InvalidJson(_))))
    }

    #[test]
    fn test_decode_outofband_unsupported_handshake() {
        let invitation = outofband(Some(vec![
            "https://didcomm.org/didexchange/1.0".to_string()
        ]));
        let raw = encode(&Invitation::OutOfBand(invitation), false).unwrap();

        let decoded = decode_outofband(&raw);
        assert!(matches!(
            decoded,
            Err(PairwiseError::ActionNotSupported(_))
        ))
    }

    #[test]
    fn test_decode_outofband_did_service() {
        let raw = json!({
            "@type": "https://didcomm.org/out-of-band/1.1/invitation",
            "@id": "oob-1",
            "handshake_protocols": [CONNECTIONS_HANDSHAKE],
            "service": ["did:sov:alice"]
        })
        .to_string();

        let decoded = decode(&raw);
        assert!(decoded.is_ok());

        match decoded.unwrap() {
            Invitation::OutOfBand(invitation) => {
                assert_eq!(
                    invitation.service,
                    vec![ServiceEntry::Did("did:sov:alice".to_string())]
                )
            }
            other => panic!("unexpected invitation: {:?}", other),
        }
    }

    #[test]
    fn test_decode_invalid() {
        let table = vec!["", "{}", "[]", "not-json", r#"{"@type": "https://didcomm.org/trust_ping/1.0/ping"}"#];
        for raw in table {
            let decoded = decode(raw);
            assert!(
                matches!(decoded, Err(PairwiseError::InvalidJson(_))),
                "input: {}",
                raw
            )
        }
    }
}
