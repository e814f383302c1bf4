//! Message routing shared by the connection and credential state machines
//!
//! Each machine declares its transitions as a table of [`Rule`] values. For an
//! inbound message that the object owns, [`decide`] checks idempotency and
//! ordering first, then looks the message up in the table.
use std::collections::VecDeque;

use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::messages::{MessageKind, ParsedMessage};
use crate::types::{PairwiseError, Protocol, Role};

const RECENT_CAPACITY: usize = 64;

/// Rule is a single `(protocol, role, state, message kind) -> action` transition
///
/// A rule without a role applies to both roles.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule<S, A> {
    pub protocol: Protocol,
    pub role: Option<Role>,
    pub state: S,
    pub kind: MessageKind,
    pub action: A,
}

impl<S, A> Rule<S, A> {
    pub fn new(protocol: Protocol, role: Option<Role>, state: S, kind: MessageKind, action: A) -> Self {
        Self {
            protocol,
            role,
            state,
            kind,
            action,
        }
    }

    fn applies(&self, protocol: Protocol, role: Option<Role>, kind: &MessageKind) -> bool {
        let role_matches = match (self.role, role) {
            (None, _) => true,
            (Some(expected), Some(actual)) => expected == actual,
            (Some(_), None) => false,
        };

        self.protocol == protocol && role_matches && &self.kind == kind
    }
}

pub fn lookup<'a, S: PartialEq, A>(
    rules: &'a [Rule<S, A>],
    protocol: Protocol,
    role: Option<Role>,
    state: &S,
    kind: &MessageKind,
) -> Option<&'a A> {
    rules
        .iter()
        .find(|rule| &rule.state == state && rule.applies(protocol, role, kind))
        .map(|rule| &rule.action)
}

/// A message is premature when it only has a transition in a later state
pub fn is_premature<S: PartialEq, A>(
    rules: &[Rule<S, A>],
    protocol: Protocol,
    role: Option<Role>,
    later: &[S],
    kind: &MessageKind,
) -> bool {
    rules
        .iter()
        .any(|rule| later.contains(&rule.state) && rule.applies(protocol, role, kind))
}

/// MessageLog remembers what an object already consumed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct MessageLog {
    #[serde(default)]
    last_applied: Option<String>,

    #[serde(default)]
    recent: VecDeque<String>,

    #[serde(default)]
    remote_order: Option<u32>,

    #[serde(default)]
    sent: VecDeque<String>,
}

impl MessageLog {
    pub fn is_known(&self, id: &str) -> bool {
        self.last_applied.as_deref() == Some(id) || self.recent.iter().any(|known| known == id)
    }

    pub fn mark_applied(&mut self, id: Option<String>, sender_order: Option<u32>) {
        if let Some(order) = sender_order {
            self.remote_order = Some(self.remote_order.map_or(order, |last| last.max(order)));
        }

        if let Some(id) = id {
            self.last_applied = Some(id.clone());
            self.remember(id);
        }
    }

    /// Records a message that was consumed without a transition
    pub fn mark_seen(&mut self, id: Option<String>) {
        if let Some(id) = id {
            self.remember(id);
        }
    }

    /// Records one of our outbound message ids so replies threaded to it are recognized
    pub fn mark_sent(&mut self, id: String) {
        if self.sent.len() >= RECENT_CAPACITY {
            self.sent.pop_front();
        }

        self.sent.push_back(id);
    }

    pub fn was_sent(&self, id: &str) -> bool {
        self.sent.iter().any(|sent| sent == id)
    }

    pub fn last_applied(&self) -> Option<String> {
        self.last_applied.clone()
    }

    pub fn last_remote_order(&self) -> Option<u32> {
        self.remote_order
    }

    /// A remote order at or below the last applied one was already consumed
    pub fn is_stale(&self, received: u32) -> bool {
        self.remote_order.is_some_and(|last| received <= last)
    }

    fn remember(&mut self, id: String) {
        if self.recent.contains(&id) {
            return;
        }

        if self.recent.len() >= RECENT_CAPACITY {
            self.recent.pop_front();
        }

        self.recent.push_back(id);
    }
}

/// RouteContext is the object state the router needs to take a decision
pub struct RouteContext<'a, S> {
    pub protocol: Protocol,
    pub role: Option<Role>,
    pub state: &'a S,
    pub later: &'a [S],
    pub thread_id: Option<&'a str>,
    pub log: &'a MessageLog,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision<A> {
    Apply(A),
    Duplicate,
    Ignore,
    Premature(MessageKind),
    Stale { last: u32, received: u32 },
}

impl<A> Decision<A> {
    /// Converts rejections into the error returned to a caller that pushed the message
    pub fn into_result(self) -> Result<Option<A>, PairwiseError> {
        match self {
            Decision::Apply(action) => Ok(Some(action)),
            Decision::Duplicate | Decision::Ignore => Ok(None),
            Decision::Premature(kind) => Err(PairwiseError::InvalidState(format!(
                "message is not valid yet: {:?}",
                kind
            ))),
            Decision::Stale { last, received } => Err(PairwiseError::InvalidState(format!(
                "out of order message, last applied: {}, received: {}",
                last, received
            ))),
        }
    }
}

pub fn decide<S: PartialEq, A: Clone>(
    rules: &[Rule<S, A>],
    ctx: &RouteContext<'_, S>,
    message: &ParsedMessage,
) -> Decision<A> {
    if let Some(id) = message.message_id() {
        if ctx.log.is_known(&id) {
            return Decision::Duplicate;
        }
    }

    let on_thread = ctx.thread_id.is_some() && message.thread_id().as_deref() == ctx.thread_id;
    if let (true, Some(received), Some(last)) =
        (on_thread, message.sender_order(), ctx.log.last_remote_order())
    {
        if ctx.log.is_stale(received) {
            return Decision::Stale { last, received };
        }
    }

    if let Some(action) = lookup(rules, ctx.protocol, ctx.role, ctx.state, &message.kind) {
        return Decision::Apply(action.clone());
    }

    if is_premature(rules, ctx.protocol, ctx.role, ctx.later, &message.kind) {
        return Decision::Premature(message.kind.clone());
    }

    Decision::Ignore
}

#[cfg(test)]
mod tests {
    use super::*;
    use rst_common::standard::serde_json::json;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum TestState {
        Waiting,
        Done,
    }

    fn rules() -> Vec<Rule<TestState, &'static str>> {
        vec![
            Rule::new(
                Protocol::Aries,
                Some(Role::Inviter),
                TestState::Waiting,
                MessageKind::ConnectionRequest,
                "accept",
            ),
            Rule::new(
                Protocol::Aries,
                None,
                TestState::Done,
                MessageKind::Ping,
                "pong",
            ),
        ]
    }

    fn message(kind: &str, id: &str, order: Option<u32>) -> ParsedMessage {
        let mut payload = json!({"@type": kind, "@id": id, "~thread": {"thid": "thread-1"}});
        if let Some(order) = order {
            payload["~thread"]["sender_order"] = json!(order);
        }

        ParsedMessage::from_value(None, None, payload)
    }

    fn ctx<'a>(state: &'a TestState, log: &'a MessageLog) -> RouteContext<'a, TestState> {
        RouteContext {
            protocol: Protocol::Aries,
            role: Some(Role::Inviter),
            state,
            later: match state {
                TestState::Waiting => &[TestState::Done],
                TestState::Done => &[],
            },
            thread_id: Some("thread-1"),
            log,
        }
    }

    #[test]
    fn test_decide_apply() {
        let log = MessageLog::default();
        let msg = message("https://didcomm.org/connections/1.0/request", "req-1", None);
        let decision = decide(&rules(), &ctx(&TestState::Waiting, &log), &msg);
        assert_eq!(decision, Decision::Apply("accept"))
    }

    #[test]
    fn test_decide_duplicate() {
        let mut log = MessageLog::default();
        log.mark_applied(Some("req-1".to_string()), None);

        let msg = message("https://didcomm.org/connections/1.0/request", "req-1", None);
        let decision = decide(&rules(), &ctx(&TestState::Waiting, &log), &msg);
        assert_eq!(decision, Decision::Duplicate)
    }

    #[test]
    fn test_decide_premature() {
        let log = MessageLog::default();
        let msg = message("https://didcomm.org/trust_ping/1.0/ping", "ping-1", None);
        let decision = decide(&rules(), &ctx(&TestState::Waiting, &log), &msg);
        assert_eq!(decision, Decision::Premature(MessageKind::Ping));
        assert!(matches!(
            decision.into_result(),
            Err(PairwiseError::InvalidState(_))
        ))
    }

    #[test]
    fn test_decide_stale() {
        let mut log = MessageLog::default();
        log.mark_applied(Some("ping-1".to_string()), Some(3));
        assert_eq!(log.last_remote_order(), Some(3));

        let msg = message("https://didcomm.org/trust_ping/1.0/ping", "ping-2", Some(2));
        let decision = decide(&rules(), &ctx(&TestState::Done, &log), &msg);
        assert_eq!(
            decision,
            Decision::Stale {
                last: 3,
                received: 2
            }
        )
    }

    #[test]
    fn test_decide_order_at_upper_bound() {
        let mut log = MessageLog::default();
        log.mark_applied(Some("ping-1".to_string()), Some(u32::MAX));

        let msg = message("https://didcomm.org/trust_ping/1.0/ping", "ping-2", Some(u32::MAX));
        let decision = decide(&rules(), &ctx(&TestState::Done, &log), &msg);
        assert_eq!(
            decision,
            Decision::Stale {
                last: u32::MAX,
                received: u32::MAX
            }
        );

        let msg = message("https://didcomm.org/trust_ping/1.0/ping", "ping-3", Some(0));
        let decision = decide(&rules(), &ctx(&TestState::Done, &log), &msg);
        assert!(matches!(decision, Decision::Stale { received: 0, .. }));

        let msg = message("https://didcomm.org/trust_ping/1.0/ping", "ping-4", None);
        let decision = decide(&rules(), &ctx(&TestState::Done, &log), &msg);
        assert_eq!(decision, Decision::Apply("pong"))
    }

    #[test]
    fn test_decide_ignore_unknown() {
        let log = MessageLog::default();
        let msg = message("https://didcomm.org/unknown/1.0/thing", "x-1", None);
        let decision = decide(&rules(), &ctx(&TestState::Done, &log), &msg);
        assert_eq!(decision, Decision::Ignore);
        assert_eq!(decision.into_result(), Ok(None))
    }

    #[test]
    fn test_log_is_bounded() {
        let mut log = MessageLog::default();
        for i in 0..(RECENT_CAPACITY + 10) {
            log.mark_seen(Some(format!("msg-{}", i)));
        }

        assert!(!log.is_known("msg-0"));
        assert!(log.is_known(&format!("msg-{}", RECENT_CAPACITY + 9)))
    }
}
