//! Invitation shapes and their codec
//!
//! Three shapes are accepted: the legacy invite detail, the Aries connection
//! invitation and the Aries out-of-band invitation.
pub mod codec;
pub mod types;

pub use codec::{decode, decode_outofband, encode};
pub use types::{AriesInvitation, Invitation, OutofbandInvitation, ServiceEntry};
