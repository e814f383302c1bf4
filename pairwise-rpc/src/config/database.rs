use std::path::Path;

use rst_common::standard::serde::{self, Deserialize};

use crate::common::types::{CommonError, ToValidate};

const DEFAULT_CF_NAME: &str = "pairwise";
const WAL_SUBDIR: &str = "wal";

fn default_cf_name() -> String {
    DEFAULT_CF_NAME.to_string()
}

fn default_create_if_missing() -> bool {
    true
}

/// Database is the `[database]` section, the RocksDB store of connection and
/// credential snapshots
///
/// Only `path` is required. The write-ahead log lives under `<path>/wal` unless
/// `wal_dir` points somewhere else.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(crate = "self::serde")]
pub struct Database {
    pub(super) path: String,

    #[serde(default = "default_cf_name")]
    pub(super) cf_name: String,

    #[serde(default)]
    pub(super) wal_dir: Option<String>,

    #[serde(default = "default_create_if_missing")]
    pub(super) create_if_missing: bool,
}

impl Database {
    pub fn path(&self) -> String {
        self.path.to_owned()
    }

    pub fn cf_name(&self) -> String {
        self.cf_name.to_owned()
    }

    pub fn wal_dir(&self) -> String {
        match &self.wal_dir {
            Some(dir) => dir.to_owned(),
            None => Path::new(&self.path)
                .join(WAL_SUBDIR)
                .to_string_lossy()
                .into_owned(),
        }
    }

    /// Creates the store and its column family on first use
    pub fn create_if_missing(&self) -> bool {
        self.create_if_missing
    }
}

impl ToValidate for Database {
    fn validate(&self) -> Result<(), CommonError> {
        if self.path.trim().is_empty() {
            return Err(CommonError::ValidationError(
                "database:path is missing".to_string(),
            ));
        }

        if self.cf_name.trim().is_empty() {
            return Err(CommonError::ValidationError(
                "database:cf_name must not be empty".to_string(),
            ));
        }

        if let Some(dir) = &self.wal_dir {
            if dir.trim().is_empty() {
                return Err(CommonError::ValidationError(
                    "database:wal_dir must not be empty when set".to_string(),
                ));
            }

            if Path::new(dir) == Path::new(&self.path) {
                return Err(CommonError::ValidationError(
                    "database:wal_dir must differ from database:path".to_string(),
                ));
            }
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

    #[derive(Deserialize)]
    #[serde(crate = "self::serde")]
    struct Section {
        database: Database,
    }

    #[test]
    fn test_parse_database_fixture() -> Result<(), ConfigError> {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("src/config/fixtures");

        let toml_file = format!("{}/config_db.toml", path.display());
        let section: Section = Builder::new(from_file(toml_file)).fetch()?.parse(use_toml)?;

        let db = section.database;
        assert_eq!(db.path(), "./pairwise-storage".to_string());
        assert_eq!(db.cf_name(), "pairwise-cf".to_string());
        assert_eq!(db.wal_dir(), "./pairwise-db-wal".to_string());
        assert!(!db.create_if_missing());
        assert!(helpers::validate(db).is_ok());
        Ok(())
    }

    #[test]
    fn test_defaults_from_path_only() {
        let section: Section = toml::from_str(
            r#"
            [database]
            path = "/var/lib/pairwise"
            "#,
        )
        .unwrap();

        let db = section.database;
        assert_eq!(db.cf_name(), DEFAULT_CF_NAME.to_string());
        assert_eq!(db.wal_dir(), "/var/lib/pairwise/wal".to_string());
        assert!(db.create_if_missing());
        assert!(helpers::validate(db).is_ok())
    }

    #[test]
    fn test_validation_failed() {
        let table = vec![
            (
                Database::default(),
                "database:path is missing",
            ),
            (
                Database {
                    path: "/var/lib/pairwise".to_string(),
                    cf_name: " ".to_string(),
                    wal_dir: None,
                    create_if_missing: true,
                },
                "database:cf_name",
            ),
            (
                Database {
                    path: "/var/lib/pairwise".to_string(),
                    cf_name: default_cf_name(),
                    wal_dir: Some("".to_string()),
                    create_if_missing: true,
                },
                "database:wal_dir must not be empty",
            ),
            (
                Database {
                    path: "/var/lib/pairwise".to_string(),
                    cf_name: default_cf_name(),
                    wal_dir: Some("/var/lib/pairwise".to_string()),
                    create_if_missing: true,
                },
                "must differ",
            ),
        ];

        for (db, expected) in table {
            let validation = helpers::validate(db);
            assert!(validation.is_err());
            assert!(validation.unwrap_err().to_string().contains(expected))
        }
    }
}
