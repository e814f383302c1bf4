//! # Connection Module
//!
//! The `connection` module drives one pairwise relationship from its invitation to an
//! accepted channel, for both the legacy agency protocol and the Aries protocol.
//!
//! ## Module Structure
//!
//! - [`types`] - States, options, read models and the [`types::ConnectionAPI`] contract
//! - [`connection`] - The [`Connection`] entity and its persistence envelope
//! - `machine` - Transition table and the handlers behind each transition
//! - [`usecase`] - [`Usecase`], the registry backed implementation of the API
//!
//! ## Aries Workflow
//!
//! ```text
//! Inviter                                  Invitee
//! create            -> Initialized
//! connect           -> OfferSent   ---- invitation ---->  create_with_invite -> OfferSent
//!                                  <---- request -------  connect            -> RequestReceived
//! (request)         -> RequestReceived
//!                                  ----- response ----->  (response)         -> Accepted
//!                                  <------- ack --------
//! (ack)             -> Accepted
//! ```
//!
//! ## Legacy Workflow
//!
//! ```text
//! Inviter                                  Invitee
//! create            -> Initialized
//! connect           -> OfferSent   ---- invite detail ->  create_with_invite -> RequestReceived
//!                                  <---- connReqAnswer --  connect            -> Accepted
//! (MS-104 answer)   -> Accepted
//! ```
//!
//! ## Out-of-band
//!
//! An out-of-band invitation with handshake protocols runs the Aries workflow above. Without
//! them both sides jump straight to `Accepted` and the connection is one-time: it carries a
//! single outbound message.
//!
//! ## Consistency
//!
//! Every operation works on a draft copy of the connection under its lock. The draft replaces
//! the stored connection only when every collaborator call succeeded, so a failed operation
//! leaves the state exactly as it was.
pub mod connection;
pub mod types;
pub mod usecase;

mod machine;

pub use connection::Connection;
pub use machine::Action;
pub use types::{
    CompletedConnection, ConnectOptions, ConnectOptionsParams, ConnectionAPI, ConnectionChannel,
    ConnectionEntityAccessor, ConnectionType, InviteActionData, OutofbandOptions, PairwiseInfo,
    RemoteInfo, SendMessageOptions, State, UsecaseBuilder,
};
pub use usecase::Usecase;
