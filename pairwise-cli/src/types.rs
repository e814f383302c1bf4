use rst_common::with_errors::thiserror::{self, Error};

use prople_pairwise_core::types::PairwiseError;
use prople_pairwise_rpc::common::types::CommonError;

pub const PAIRWISE_DEFAULT_DIR: &str = ".pairwise";
pub const PAIRWISE_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("homedir error: {0}")]
    HomeDirError(String),

    #[error("database error: {0}")]
    DBError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("rpc error: {0}")]
    RpcError(String),

    #[error("json error: {0}")]
    JSONError(String),

    #[error("table error: {0}")]
    TableError(String),

    #[error("pairwise error: {0}")]
    PairwiseError(#[from] PairwiseError),
}

impl From<CommonError> for CliError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::DBError(msg) => CliError::DBError(msg),
            CommonError::JSONError(msg) => CliError::JSONError(msg),
            CommonError::RpcError(msg) | CommonError::MethodError(msg) => CliError::RpcError(msg),
            CommonError::ValidationError(msg) | CommonError::ConfigError(msg) => {
                CliError::ConfigError(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_test::table_test;

    #[test]
    fn test_from_common_error() {
        let table = vec![
            (CommonError::DBError("db".to_string()), "database error: db"),
            (CommonError::JSONError("json".to_string()), "json error: json"),
            (CommonError::MethodError("method".to_string()), "rpc error: method"),
            (
                CommonError::ValidationError("label".to_string()),
                "config error: label",
            ),
        ];

        for (validator, input, expected) in table_test!(table) {
            let err = CliError::from(input.clone());

            validator
                .given(&format!("{:?}", input))
                .when("converted")
                .then(expected)
                .assert_eq(expected.to_string(), err.to_string());
        }
    }

    #[test]
    fn test_from_pairwise_error() {
        let err: CliError = PairwiseError::NotReady("offline".to_string()).into();
        assert!(matches!(err, CliError::PairwiseError(_)))
    }
}
