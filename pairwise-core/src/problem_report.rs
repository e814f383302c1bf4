//! Problem report recognition and handling
//!
//! Aries peers report failures with one of several problem report shapes. They
//! are normalized into a single [`ProblemReport`] that is stored on the object
//! before it is reset. The legacy protocol has no problem reports.
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;
use rst_common::with_logging::log::warn;

use crate::messages::{MessageKind, ParsedMessage, Thread};
use crate::types::{PairwiseError, Protocol};

pub const CODE_UNKNOWN: &str = "unknown";
pub const CODE_ISSUANCE_ABANDONED: &str = "issuance-abandoned";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Description {
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

/// ProblemReportMessage covers both the `connections` and the `notification`
/// problem report shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ProblemReportMessage {
    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "problem-code", default, skip_serializing_if = "Option::is_none")]
    pub problem_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "~thread", default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
}

impl ProblemReportMessage {
    pub fn new(kind: MessageKind, code: &str, comment: Option<String>, thread: Thread) -> Self {
        Self {
            msg_type: kind.type_tag(),
            id: Uuid::new_v4().to_string(),
            problem_code: None,
            explain: None,
            description: Some(Description {
                code: code.to_string(),
                en: None,
            }),
            comment,
            thread: Some(thread),
        }
    }
}

/// ProblemReport is the normalized view of a received problem report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ProblemReport {
    code: String,
    comment: Option<String>,
    thread_id: Option<String>,
}

impl ProblemReport {
    pub fn new(code: String, comment: Option<String>, thread_id: Option<String>) -> Self {
        Self {
            code,
            comment,
            thread_id,
        }
    }

    pub fn get_code(&self) -> &String {
        &self.code
    }

    pub fn get_comment(&self) -> Option<String> {
        self.comment.clone()
    }

    pub fn get_thread_id(&self) -> Option<String> {
        self.thread_id.clone()
    }
}

impl From<ProblemReportMessage> for ProblemReport {
    fn from(message: ProblemReportMessage) -> Self {
        let code = message
            .problem_code
            .or_else(|| message.description.as_ref().map(|desc| desc.code.clone()))
            .unwrap_or_else(|| CODE_UNKNOWN.to_string());

        let comment = message
            .explain
            .or(message.comment)
            .or_else(|| message.description.and_then(|desc| desc.en));

        let thread_id = message.thread.and_then(|thread| thread.thid);
        ProblemReport::new(code, comment, thread_id)
    }
}

/// ProblemReportHolder is implemented by every object that can be reset by a peer
pub trait ProblemReportHolder {
    fn store_problem_report(&mut self, report: ProblemReport);
}

/// Directive tells the calling state machine what to do after a report was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Reset,
}

pub fn recognize(message: &ParsedMessage) -> Result<Option<ProblemReport>, PairwiseError> {
    if !message.kind.is_problem_report() {
        return Ok(None);
    }

    let report: ProblemReportMessage = message.decode()?;
    Ok(Some(ProblemReport::from(report)))
}

/// Stores a recognized problem report on the holder and asks for a reset
///
/// Messages that are not problem reports, and any message under the legacy
/// protocol, are left untouched.
pub fn handle<T: ProblemReportHolder>(
    protocol: Protocol,
    holder: &mut T,
    message: &ParsedMessage,
) -> Result<Option<Directive>, PairwiseError> {
    if protocol == Protocol::Proprietary {
        return Ok(None);
    }

    match recognize(message)? {
        Some(report) => {
            warn!(
                "[problem_report:handle] received problem report, code: {}",
                report.get_code()
            );

            holder.store_problem_report(report);
            Ok(Some(Directive::Reset))
        }
        None => Ok(None),
    }
}
