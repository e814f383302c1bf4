use rst_common::standard::serde::{self, Deserialize};

use prople_pairwise_core::connection::ConnectOptions;

fn default_true() -> bool {
    true
}

/// Connection holds the process wide defaults merged into every `connect` call
#[derive(Deserialize, Debug, Clone)]
#[serde(crate = "self::serde")]
pub struct Connection {
    #[serde(default = "default_true")]
    pub(super) update_agent_info: bool,

    #[serde(default)]
    pub(super) use_public_did: bool,

    #[serde(default = "default_true")]
    pub(super) wait_remote_agent_responses: bool,
}

impl Connection {
    pub fn to_connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            update_agent_info: self.update_agent_info,
            use_public_did: self.use_public_did,
            wait_remote_agent_responses: self.wait_remote_agent_responses,
            ..ConnectOptions::default()
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            update_agent_info: true,
            use_public_did: false,
            wait_remote_agent_responses: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let connection: Connection = toml::from_str("use_public_did = true").unwrap();
        let options = connection.to_connect_options();

        assert!(options.use_public_did);
        assert!(options.update_agent_info);
        assert!(options.wait_remote_agent_responses);
        assert_eq!(options.phone, None)
    }
}
