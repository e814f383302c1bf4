//! # Prople Pairwise RPC
//!
//! Everything the pairwise core needs from the outside world:
//!
//! - [`rpc::agency::AgencyClient`], the JSON-RPC backed transport, wallet and ledger
//! - [`config`], the TOML configuration and its conversion into core settings
//! - [`db`], the RocksDB store holding serialized connections and credentials
pub mod common;
pub mod config;
pub mod db;
pub mod rpc;

pub use config::{build_settings, Config, Parser as ConfigManager};
pub use db::{DbBuilder, SnapshotKind, SnapshotRepository};
