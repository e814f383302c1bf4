use rst_common::standard::serde::{self, Deserialize};

use prople_pairwise_core::types::{Protocol, DEFAULT_LABEL};

use crate::common::types::{CommonError, ToValidate};

#[derive(Deserialize, Debug, Clone)]
#[serde(crate = "self::serde")]
pub struct Agent {
    pub(super) label: String,
    pub(super) protocol: Protocol,

    #[serde(default)]
    pub(super) public_did: Option<String>,

    #[serde(default)]
    pub(super) logo_url: Option<String>,
}

impl Agent {
    pub fn get_label(&self) -> String {
        self.label.to_owned()
    }

    pub fn get_protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn get_public_did(&self) -> Option<String> {
        self.public_did.to_owned()
    }

    pub fn get_logo_url(&self) -> Option<String> {
        self.logo_url.to_owned()
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            protocol: Protocol::Aries,
            public_did: None,
            logo_url: None,
        }
    }
}

impl ToValidate for Agent {
    fn validate(&self) -> Result<(), CommonError> {
        if self.label.trim().is_empty() {
            return Err(CommonError::ValidationError(
                "config: agent:label is missing".to_string(),
            ));
        }

        let empty_did = self
            .public_did
            .as_ref()
            .map(|did| did.trim().is_empty())
            .unwrap_or(false);

        if empty_did {
            return Err(CommonError::ValidationError(
                "config: agent:public_did is empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::helpers;

    #[test]
    fn test_parse_agent_protocol() {
        let agent: Agent = toml::from_str(
            r#"
            label = "alice"
            protocol = "proprietary"
            "#,
        )
        .unwrap();

        assert_eq!(agent.get_protocol(), Protocol::Proprietary);
        assert_eq!(agent.get_public_did(), None);

        let invalid: Result<Agent, toml::de::Error> = toml::from_str(
            r#"
            label = "alice"
            protocol = "unknown"
            "#,
        );
        assert!(invalid.is_err())
    }

    #[test]
    fn test_agent_validation_failed() {
        let mut agent = Agent::default();
        agent.label = " ".to_string();
        assert!(helpers::validate(agent.clone()).is_err());

        agent.label = "alice".to_string();
        agent.public_did = Some("".to_string());
        let validation = helpers::validate(agent);
        assert!(validation
            .unwrap_err()
            .to_string()
            .contains("agent:public_did"));
    }
}
