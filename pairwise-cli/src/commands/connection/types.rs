use cli_table::Table;

use prople_pairwise_core::connection::PairwiseInfo;

#[derive(Table, Clone)]
pub(crate) struct ConnectionRow {
    #[table(title = "Name")]
    pub(crate) name: String,

    #[table(title = "Protocol")]
    pub(crate) protocol: String,

    #[table(title = "Role")]
    pub(crate) role: String,

    #[table(title = "State")]
    pub(crate) state: String,

    #[table(title = "Their DID")]
    pub(crate) their_did: String,

    #[table(title = "Thread")]
    pub(crate) thread_id: String,
}

impl ConnectionRow {
    pub(crate) fn new(name: String, info: PairwiseInfo) -> Self {
        Self {
            name,
            protocol: info.protocol.to_string(),
            role: info.role.to_string(),
            state: info.state.to_string(),
            their_did: info.their_did.unwrap_or_default(),
            thread_id: info.thread_id.unwrap_or_default(),
        }
    }
}
