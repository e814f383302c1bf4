use cli_table::Table;

use prople_pairwise_core::credential::{CredentialEntityAccessor, OfferPayload, PendingOffer};

#[derive(Table, Clone)]
pub(crate) struct OfferRow {
    #[table(title = "UID")]
    pub(crate) uid: String,

    #[table(title = "Protocol")]
    pub(crate) protocol: String,

    #[table(title = "Credential Definition")]
    pub(crate) cred_def_id: String,

    #[table(title = "Attributes")]
    pub(crate) attributes: String,
}

impl From<&PendingOffer> for OfferRow {
    fn from(pending: &PendingOffer) -> Self {
        let parsed = OfferPayload::parse(&pending.offer).ok();
        let attributes = parsed
            .as_ref()
            .map(|offer| {
                offer
                    .attributes()
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect::<Vec<String>>()
                    .join(", ")
            })
            .unwrap_or_default();

        Self {
            uid: pending.uid.clone(),
            protocol: pending.protocol.to_string(),
            cred_def_id: parsed
                .and_then(|offer| offer.cred_def_id())
                .unwrap_or_default(),
            attributes,
        }
    }
}

#[derive(Table, Clone)]
pub(crate) struct CredentialRow {
    #[table(title = "Name")]
    pub(crate) name: String,

    #[table(title = "State")]
    pub(crate) state: String,

    #[table(title = "Protocol")]
    pub(crate) protocol: String,

    #[table(title = "Thread")]
    pub(crate) thread_id: String,

    #[table(title = "Credential ID")]
    pub(crate) credential_id: String,
}

impl CredentialRow {
    pub(crate) fn new(name: String, exchange: &impl CredentialEntityAccessor) -> Self {
        Self {
            name,
            state: exchange.get_state().to_string(),
            protocol: exchange
                .get_protocol()
                .map(|protocol| protocol.to_string())
                .unwrap_or(String::from("-")),
            thread_id: exchange.get_thread_id(),
            credential_id: exchange.get_credential_id().unwrap_or_default(),
        }
    }
}
