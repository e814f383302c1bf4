//! JSON-RPC client for the cloud agency
//!
//! [`AgencyClient`] is the single implementation of the transport, wallet and ledger
//! collaborators used outside of tests. Keys and credentials never leave the agency, this
//! side only ships requests and decodes results.
mod rpc_client;
pub use rpc_client::AgencyClient;

pub mod rpc_method;
pub mod rpc_param;
