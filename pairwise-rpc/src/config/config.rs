use rst_common::standard::serde::{self, Deserialize};

use crate::common::types::{CommonError, ToValidate};

use super::{Agency, Agent, Connection, Database};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(crate = "self::serde")]
pub struct Config {
    pub(super) agent: Agent,
    pub(super) agency: Agency,

    #[serde(default)]
    pub(super) connection: Connection,

    pub(super) database: Database,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn agency(&self) -> &Agency {
        &self.agency
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn db(&self) -> &Database {
        &self.database
    }
}

impl ToValidate for Config {
    fn validate(&self) -> Result<(), CommonError> {
        self.agent.validate()?;
        self.agency.validate()?;
        self.database.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::helpers;
    use crate::common::types::CommonError;

    #[test]
    fn test_validation_failed() {
        let cfg = Config::default();
        let validation = helpers::validate(cfg);
        assert!(validation.is_err());
        assert!(matches!(
            validation.unwrap_err(),
            CommonError::ValidationError(_)
        ))
    }
}
