//! # Credential Module
//!
//! The `credential` module runs the holder side of a credential issuance over an
//! accepted connection. Both the Aries `issue-credential` protocol and the legacy
//! `CLAIM_OFFER` / `CRED_REQ` / `CRED` exchange are supported.
//!
//! ## Module Structure
//!
//! - [`types`] - States, offer payloads and the [`types::CredentialAPI`] contract
//! - [`credential`] - The [`Credential`] entity and its persistence envelope
//! - `machine` - Transition table, request building and credential storage
//! - [`usecase`] - [`Usecase`], the registry backed implementation of the API
//!
//! ## Workflow
//!
//! ```text
//! Holder                                         Issuer
//! create_with_offer  -> RequestReceived  <---- offer ------
//! send_request       -> OfferSent        ----- request --->
//! (credential)       -> Accepted         <---- credential -
//!                                        ----- ack ------->   (only when asked for)
//! ```
//!
//! A legacy offer has no protocol of its own. It follows the connection the request is
//! sent over, and is converted into an Aries offer when that connection speaks Aries.
pub mod credential;
pub mod types;
pub mod usecase;

mod machine;

pub use credential::Credential;
pub use machine::Action;
pub use types::{
    CredentialAPI, CredentialEntityAccessor, IssuedCredential, OfferAcceptance, OfferPayload,
    PendingOffer, State, UsecaseBuilder, PAYMENT_REQUIRED,
};
pub use usecase::Usecase;
