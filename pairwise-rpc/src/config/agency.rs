use std::str::FromStr;

use multiaddr::Multiaddr;

use rst_common::standard::serde::{self, Deserialize};

use crate::common::types::{CommonError, ToValidate};

/// Agency is the cloud agency this agent relays its messages through
///
/// `address` is where the JSON-RPC calls go, `endpoint` is the public service
/// endpoint advertised to other parties in invitations.
#[derive(Deserialize, Debug, Clone)]
#[serde(crate = "self::serde")]
pub struct Agency {
    pub(super) address: String,
    pub(super) did: String,
    pub(super) verkey: String,
    pub(super) endpoint: String,
}

impl Agency {
    pub fn get_address(&self) -> Result<Multiaddr, CommonError> {
        Multiaddr::from_str(&self.address)
            .map_err(|err| CommonError::ConfigError(format!("agency:address: {}", err)))
    }

    pub fn get_did(&self) -> String {
        self.did.to_owned()
    }

    pub fn get_verkey(&self) -> String {
        self.verkey.to_owned()
    }

    pub fn get_endpoint(&self) -> String {
        self.endpoint.to_owned()
    }
}

impl Default for Agency {
    fn default() -> Self {
        Self {
            address: "".to_string(),
            did: "".to_string(),
            verkey: "".to_string(),
            endpoint: "".to_string(),
        }
    }
}

impl ToValidate for Agency {
    fn validate(&self) -> Result<(), CommonError> {
        if self.address.is_empty() {
            return Err(CommonError::ValidationError(
                "config: agency:address is missing".to_string(),
            ));
        }

        if self.get_address().is_err() {
            return Err(CommonError::ValidationError(
                "config: agency:address is not a valid multiaddr".to_string(),
            ));
        }

        if self.did.is_empty() || self.verkey.is_empty() {
            return Err(CommonError::ValidationError(
                "config: agency:did and agency:verkey are required".to_string(),
            ));
        }

        if self.endpoint.is_empty() {
            return Err(CommonError::ValidationError(
                "config: agency:endpoint is missing".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::env;
    use std::path::PathBuf;

    use rstdev_config::format::use_toml;
    use rstdev_config::parser::from_file;
    use rstdev_config::{types::ConfigError, Builder};

    use crate::common::helpers;

    #[test]
    fn test_parse_agency_config() -> Result<(), ConfigError> {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("src/config/fixtures");

        let toml_file = format!("{}/config_agency.toml", path.display());
        let config_toml = {
            let config_builder: Result<Agency, ConfigError> =
                Builder::new(from_file(toml_file)).fetch()?.parse(use_toml);

            config_builder
        };

        assert!(!config_toml.is_err());

        let agency = config_toml.unwrap();
        assert_eq!(agency.get_did(), "did-agency".to_string());
        assert_eq!(agency.get_endpoint(), "http://agency.local/agent".to_string());
        assert!(agency.get_address().is_ok());
        assert!(helpers::validate(agency).is_ok());
        Ok(())
    }

    #[test]
    fn test_agency_validation_failed() {
        let mut agency = Agency::default();
        let validation = helpers::validate(agency.clone());
        assert!(validation.is_err());
        assert!(validation
            .unwrap_err()
            .to_string()
            .contains("agency:address is missing"));

        agency.address = "not-a-multiaddr".to_string();
        let validation = helpers::validate(agency.clone());
        assert!(validation
            .unwrap_err()
            .to_string()
            .contains("not a valid multiaddr"));

        agency.address = "/ip4/127.0.0.1/tcp/7700".to_string();
        let validation = helpers::validate(agency);
        assert!(validation
            .unwrap_err()
            .to_string()
            .contains("agency:did and agency:verkey"));
    }
}
