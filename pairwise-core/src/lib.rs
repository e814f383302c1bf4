//! # Prople Pairwise Core
//!
//! Protocol state machines for pairwise connections and holder-side credential
//! exchanges. Two wire protocols are supported, the legacy `Proprietary` agency
//! protocol and the DIDComm based `Aries` protocol, and each connection carries
//! its role (`Inviter` or `Invitee`) for its whole lifetime.
//!
//! The crate never talks to the network, the wallet or the ledger directly.
//! Those concerns are consumed through the collaborator traits defined in
//! [`types`]: [`types::TransportBuilder`], [`types::WalletBuilder`] and
//! [`types::LedgerBuilder`].
//!
//! Live objects are owned by a [`registry::Registry`] and addressed by opaque
//! [`registry::Handle`] values. Every transition runs under a per-object lock
//! and is committed only once all of its collaborator calls succeed.
pub mod types;
pub mod registry;
pub mod messages;
pub mod invitation;
pub mod problem_report;
pub mod router;
pub mod connection;
pub mod credential;
