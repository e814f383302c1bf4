use rstdev_config::format::use_toml;
use rstdev_config::parser::from_file;
use rstdev_config::{types::ConfigError, Builder};

use super::Config;

pub struct Parser {
    conf_file: String,
}

impl Parser {
    pub fn new(conf_file: String) -> Self {
        Self { conf_file }
    }

    pub fn parse(&self) -> Result<Config, ConfigError> {
        let config_toml = {
            let config_builder: Result<Config, ConfigError> =
                Builder::new(from_file(self.conf_file.to_owned()))
                    .fetch()?
                    .parse(use_toml);

            config_builder
        };

        config_toml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::path::PathBuf;

    use prople_pairwise_core::types::Protocol;

    use crate::common::helpers;

    #[test]
    fn test_parse_config() {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("src/config/fixtures");

        let toml_file = format!("{}/config.toml", path.display());
        let parser = Parser::new(toml_file);
        let config_builder = parser.parse();

        assert!(!config_builder.is_err());
        let config = config_builder.unwrap();

        let agent = config.agent();
        assert_eq!(agent.get_label(), "alice".to_string());
        assert_eq!(agent.get_protocol(), Protocol::Aries);
        assert_eq!(agent.get_logo_url(), Some("https://alice.local/logo.png".to_string()));

        let agency = config.agency();
        assert_eq!(agency.get_verkey(), "verkey-agency".to_string());

        assert!(!config.connection().to_connect_options().use_public_did);

        let db = config.db();
        assert_eq!(db.path(), "/tmp/pairwise-rpc-test/storage".to_string());
        assert_eq!(db.cf_name(), "pairwise-cf".to_string());
        assert_eq!(db.wal_dir(), "/tmp/pairwise-rpc-test/wal".to_string());
        assert!(db.create_if_missing());

        assert!(helpers::validate(config).is_ok())
    }
}
