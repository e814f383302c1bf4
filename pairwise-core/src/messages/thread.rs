use std::collections::BTreeMap;

use rst_common::standard::serde::{self, Deserialize, Serialize};

/// Thread is the `~thread` decorator attached to every threaded Aries message
///
/// `sender_order` is only checked when the sender actually sets it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Thread {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_order: Option<u32>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub received_orders: BTreeMap<String, u32>,
}

impl Thread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thid(mut self, thid: String) -> Self {
        self.thid = Some(thid);
        self
    }

    pub fn with_pthid(mut self, pthid: Option<String>) -> Self {
        self.pthid = pthid;
        self
    }

    pub fn with_sender_order(mut self, order: u32) -> Self {
        self.sender_order = Some(order);
        self
    }

    pub fn record_received(mut self, sender: String, order: u32) -> Self {
        self.received_orders.insert(sender, order);
        self
    }

    pub fn is_reply_to(&self, id: &str) -> bool {
        self.thid.as_deref() == Some(id)
    }
}
