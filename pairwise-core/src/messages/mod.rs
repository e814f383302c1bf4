//! Wire level messages exchanged by the pairwise state machines
//!
//! Aries messages are identified by their `@type` tag, legacy agency messages by
//! their message name. Both are normalized into a [`ParsedMessage`] before they
//! reach the router.
pub mod aries;
pub mod attachment;
pub mod diddoc;
pub mod issuance;
pub mod legacy;
pub mod thread;
pub mod types;

mod parsed;

pub use parsed::ParsedMessage;
pub use thread::Thread;
pub use types::{MessageFamily, MessageKind, MessageType};

use rst_common::standard::serde::Serialize;
use rst_common::standard::serde_json::{self, Value};

use crate::types::PairwiseError;

/// Serializes any outbound message into its JSON value
pub fn to_message_value<T: Serialize>(message: &T) -> Result<Value, PairwiseError> {
    serde_json::to_value(message).map_err(|err| PairwiseError::SerializeError(err.to_string()))
}
