use cli_table::Table;

use prople_pairwise_core::invitation::Invitation;

#[derive(Table, Clone)]
pub(crate) struct InvitationRow {
    #[table(title = "Kind")]
    pub(crate) kind: String,

    #[table(title = "ID")]
    pub(crate) id: String,

    #[table(title = "Label")]
    pub(crate) label: String,

    #[table(title = "Protocol")]
    pub(crate) protocol: String,

    #[table(title = "Public DID")]
    pub(crate) public_did: String,
}

impl From<&Invitation> for InvitationRow {
    fn from(invitation: &Invitation) -> Self {
        let kind = match invitation {
            Invitation::Legacy(_) => "legacy",
            Invitation::Aries(_) => "aries",
            Invitation::OutOfBand(_) => "out-of-band",
        };

        Self {
            kind: kind.to_string(),
            id: invitation.id(),
            label: invitation.label().unwrap_or_default(),
            protocol: invitation.protocol().to_string(),
            public_did: invitation.public_did().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rst_common::standard::serde_json::json;

    use prople_pairwise_core::invitation::decode;

    #[test]
    fn test_row_from_aries_invitation() {
        let raw = json!({
            "@type": "https://didcomm.org/connections/1.0/invitation",
            "@id": "inv-1",
            "label": "alice",
            "public_did": "did:sov:alice"
        })
        .to_string();

        let invitation = decode(&raw).unwrap();
        let row = InvitationRow::from(&invitation);

        assert_eq!(row.kind, "aries".to_string());
        assert_eq!(row.id, "inv-1".to_string());
        assert_eq!(row.label, "alice".to_string());
        assert_eq!(row.protocol, "aries".to_string());
        assert_eq!(row.public_did, "did:sov:alice".to_string())
    }
}
