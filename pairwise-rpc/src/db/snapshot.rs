//! Snapshot storage for serialized connections and credentials
//!
//! Each object is stored under `<kind>:<name>`. The names of one kind are kept in a JSON
//! array under `<kind>:index` so they can be listed without a prefix scan.
use rst_common::standard::serde_json;
use rst_common::with_logging::log::debug;

use rstdev_storage::engine::rocksdb::executor::Executor;
use rstdev_storage::engine::rocksdb::types::{Instruction, OutputOpts};

use crate::common::types::CommonError;

const INDEX_KEY: &str = "index";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Connection,
    Credential,
}

impl SnapshotKind {
    fn prefix(&self) -> &str {
        match self {
            SnapshotKind::Connection => "connection",
            SnapshotKind::Credential => "credential",
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix(), name)
    }

    fn index_key(&self) -> String {
        self.key(INDEX_KEY)
    }
}

#[derive(Clone)]
pub struct SnapshotRepository {
    db: Executor,
}

impl SnapshotRepository {
    pub fn new(db: Executor) -> Self {
        Self { db }
    }

    pub async fn save(
        &self,
        kind: SnapshotKind,
        name: &str,
        snapshot: String,
    ) -> Result<(), CommonError> {
        if name.trim().is_empty() || name == INDEX_KEY {
            return Err(CommonError::ValidationError(format!(
                "invalid snapshot name: {:?}",
                name
            )));
        }

        debug!("[snapshot:save] key: {}", kind.key(name));
        self.put(kind.key(name), snapshot.into_bytes()).await?;

        let mut names = self.list(kind).await?;
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
            self.save_index(kind, names).await?;
        }

        Ok(())
    }

    pub async fn get(&self, kind: SnapshotKind, name: &str) -> Result<String, CommonError> {
        let value = self.fetch(kind.key(name)).await?.ok_or(CommonError::DBError(format!(
            "{} not found: {}",
            kind.prefix(),
            name
        )))?;

        String::from_utf8(value).map_err(|err| CommonError::DBError(err.to_string()))
    }

    pub async fn remove(&self, kind: SnapshotKind, name: &str) -> Result<(), CommonError> {
        debug!("[snapshot:remove] key: {}", kind.key(name));

        let _ = self
            .db
            .exec(Instruction::RemoveCf {
                key: kind.key(name),
            })
            .await
            .map_err(|err| CommonError::DBError(err.to_string()))?;

        let names: Vec<String> = self
            .list(kind)
            .await?
            .into_iter()
            .filter(|existing| existing != name)
            .collect();

        self.save_index(kind, names).await
    }

    pub async fn list(&self, kind: SnapshotKind) -> Result<Vec<String>, CommonError> {
        match self.fetch(kind.index_key()).await? {
            Some(value) => serde_json::from_slice::<Vec<String>>(&value)
                .map_err(|err| CommonError::JSONError(err.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn save_index(&self, kind: SnapshotKind, names: Vec<String>) -> Result<(), CommonError> {
        let value =
            serde_json::to_vec(&names).map_err(|err| CommonError::JSONError(err.to_string()))?;

        self.put(kind.index_key(), value).await
    }

    async fn put(&self, key: String, value: Vec<u8>) -> Result<(), CommonError> {
        let _ = self
            .db
            .exec(Instruction::SaveCf { key, value })
            .await
            .map_err(|err| CommonError::DBError(err.to_string()))?;

        Ok(())
    }

    async fn fetch(&self, key: String) -> Result<Option<Vec<u8>>, CommonError> {
        let out = self
            .db
            .exec(Instruction::GetCf { key })
            .await
            .map_err(|err| CommonError::DBError(err.to_string()))?;

        match out {
            OutputOpts::SingleByte { value } => Ok(value),
            _ => Err(CommonError::DBError(String::from(
                "invalid output return type",
            ))),
        }
    }
}
