use rst_common::standard::serde_json::Value;
use rst_common::with_logging::log::debug;

use prople_jsonrpc_client::executor::reqwest::Reqwest;

use prople_pairwise_core::connection::{ConnectionAPI, Usecase as ConnectionUsecase};
use prople_pairwise_core::credential::{CredentialAPI, Usecase as CredentialUsecase};
use prople_pairwise_core::registry::Handle;
use prople_pairwise_core::types::Settings;

use prople_pairwise_rpc::rpc::agency::AgencyClient;
use prople_pairwise_rpc::{build_settings, Config, DbBuilder, SnapshotKind, SnapshotRepository};

use crate::types::CliError;
use crate::utils::rpc::build_client;

pub type Agency = AgencyClient<Reqwest<Value>>;
pub type Connections = ConnectionUsecase<Agency, Agency, Agency>;
pub type Credentials = CredentialUsecase<Agency, Agency, Connections>;

/// ContextHandler carries everything a command needs between the parsed flags and the core
///
/// Objects only live for one invocation. Commands load the snapshots they touch into fresh
/// registries and write them back when done.
pub struct ContextHandler {
    snapshots: SnapshotRepository,
    settings: Settings,
    agency: Agency,
}

impl ContextHandler {
    pub fn new(config: Config) -> Result<Self, CliError> {
        let settings = build_settings(&config)?;
        let addr = config.agency().get_address()?;
        debug!("[ctx:new] agency: {addr} | protocol: {}", settings.protocol());

        let executor = DbBuilder::new(config.db().clone()).build()?;

        Ok(Self {
            snapshots: SnapshotRepository::new(executor),
            settings,
            agency: AgencyClient::new(build_client::<Value>(), addr),
        })
    }

    pub fn snapshots(&self) -> SnapshotRepository {
        self.snapshots.clone()
    }

    pub fn connections(&self) -> Connections {
        ConnectionUsecase::new(
            self.settings.clone(),
            self.agency.clone(),
            self.agency.clone(),
            self.agency.clone(),
        )
    }

    pub fn credentials(&self, connections: Connections) -> Credentials {
        CredentialUsecase::new(self.agency.clone(), self.agency.clone(), connections)
    }

    pub async fn load_connection(
        &self,
        connections: &Connections,
        name: &str,
    ) -> Result<Handle, CliError> {
        let snapshot = self.snapshots.get(SnapshotKind::Connection, name).await?;
        let handle = connections.deserialize(snapshot).await?;
        debug!("[ctx:load_connection] {name} -> {}", u32::from(handle));

        Ok(handle)
    }

    pub async fn save_connection(
        &self,
        connections: &Connections,
        handle: Handle,
        name: &str,
    ) -> Result<(), CliError> {
        let snapshot = connections.serialize(handle).await?;
        self.snapshots
            .save(SnapshotKind::Connection, name, snapshot)
            .await?;

        Ok(())
    }

    pub async fn load_credential(
        &self,
        credentials: &Credentials,
        name: &str,
    ) -> Result<Handle, CliError> {
        let snapshot = self.snapshots.get(SnapshotKind::Credential, name).await?;
        let handle = credentials.deserialize(snapshot).await?;
        debug!("[ctx:load_credential] {name} -> {}", u32::from(handle));

        Ok(handle)
    }

    pub async fn save_credential(
        &self,
        credentials: &Credentials,
        handle: Handle,
        name: &str,
    ) -> Result<(), CliError> {
        let snapshot = credentials.serialize(handle).await?;
        self.snapshots
            .save(SnapshotKind::Credential, name, snapshot)
            .await?;

        Ok(())
    }
}
