use std::fmt::Display;

pub const DIDCOMM_PREFIX: &str = "https://didcomm.org";
pub const SOV_PREFIX: &str = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec";

/// MessageFamily groups message names under a versioned protocol family
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageFamily {
    Connections,
    OutOfBand,
    Notification,
    ReportProblem,
    TrustPing,
    DiscoverFeatures,
    IssueCredential,
    PresentProof,
    BasicMessage,
    CommittedAnswer,
    QuestionAnswer,
    InviteAction,
    Signature,
    Unknown(String),
}

impl MessageFamily {
    pub fn name(&self) -> &str {
        match self {
            MessageFamily::Connections => "connections",
            MessageFamily::OutOfBand => "out-of-band",
            MessageFamily::Notification => "notification",
            MessageFamily::ReportProblem => "report-problem",
            MessageFamily::TrustPing => "trust_ping",
            MessageFamily::DiscoverFeatures => "discover-features",
            MessageFamily::IssueCredential => "issue-credential",
            MessageFamily::PresentProof => "present-proof",
            MessageFamily::BasicMessage => "basicmessage",
            MessageFamily::CommittedAnswer => "committedanswer",
            MessageFamily::QuestionAnswer => "questionanswer",
            MessageFamily::InviteAction => "invite-action",
            MessageFamily::Signature => "signature",
            MessageFamily::Unknown(name) => name.as_str(),
        }
    }

    pub fn version(&self) -> &str {
        match self {
            MessageFamily::OutOfBand => "1.1",
            MessageFamily::InviteAction => "0.9",
            _ => "1.0",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "connections" => MessageFamily::Connections,
            "out-of-band" => MessageFamily::OutOfBand,
            "notification" => MessageFamily::Notification,
            "report-problem" => MessageFamily::ReportProblem,
            "trust_ping" => MessageFamily::TrustPing,
            "discover-features" => MessageFamily::DiscoverFeatures,
            "issue-credential" => MessageFamily::IssueCredential,
            "present-proof" => MessageFamily::PresentProof,
            "basicmessage" => MessageFamily::BasicMessage,
            "committedanswer" => MessageFamily::CommittedAnswer,
            "questionanswer" => MessageFamily::QuestionAnswer,
            "invite-action" => MessageFamily::InviteAction,
            "signature" => MessageFamily::Signature,
            other => MessageFamily::Unknown(other.to_string()),
        }
    }

    /// Protocol identifier as advertised through feature discovery
    pub fn protocol_id(&self) -> String {
        format!("{}/{}/{}", DIDCOMM_PREFIX, self.name(), self.version())
    }

    /// Families this agent is able to speak, used to answer discovery queries
    pub fn supported() -> Vec<MessageFamily> {
        vec![
            MessageFamily::Connections,
            MessageFamily::OutOfBand,
            MessageFamily::Notification,
            MessageFamily::ReportProblem,
            MessageFamily::TrustPing,
            MessageFamily::DiscoverFeatures,
            MessageFamily::IssueCredential,
            MessageFamily::BasicMessage,
            MessageFamily::CommittedAnswer,
            MessageFamily::QuestionAnswer,
            MessageFamily::InviteAction,
        ]
    }
}

/// MessageType is the parsed form of an Aries `@type` tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    pub family: MessageFamily,
    pub version: String,
    pub name: String,
}

impl MessageType {
    pub fn new(family: MessageFamily, name: &str) -> Self {
        Self {
            version: family.version().to_string(),
            family,
            name: name.to_string(),
        }
    }

    /// Parses both the `https://didcomm.org` and the `did:sov:...;spec` prefixes
    pub fn parse(tag: &str) -> Option<Self> {
        let rest = tag
            .strip_prefix(DIDCOMM_PREFIX)
            .or_else(|| tag.strip_prefix(SOV_PREFIX))?;

        let parts: Vec<&str> = rest.trim_start_matches('/').split('/').collect();
        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            return None;
        }

        Some(Self {
            family: MessageFamily::from_name(parts[0]),
            version: parts[1].to_string(),
            name: parts[2].to_string(),
        })
    }

    pub fn to_tag(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            DIDCOMM_PREFIX,
            self.family.name(),
            self.version,
            self.name
        )
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_tag())
    }
}

/// MessageKind is the closed set of messages the state machines react to
///
/// Anything else is kept as [`MessageKind::Unknown`] so it can be ignored
/// without failing the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ConnectionInvitation,
    ConnectionRequest,
    ConnectionResponse,
    ConnectionProblemReport,
    OutofbandInvitation,
    HandshakeReuse,
    HandshakeReuseAccepted,
    Ack,
    ProblemReport,
    Ping,
    PingResponse,
    Query,
    Disclose,
    CredentialOffer,
    CredentialRequest,
    Credential,
    CredentialAck,
    CredentialProblemReport,
    PresentationProposal,
    BasicMessage,
    Question,
    Answer,
    InviteAction,
    LegacyConnectionRequest,
    LegacyConnectionAnswer,
    LegacyConnectionRedirect,
    LegacyCredentialOffer,
    LegacyCredentialRequest,
    LegacyCredential,
    LegacyGeneric,
    Unknown(String),
}

impl MessageKind {
    pub fn from_type(message_type: &MessageType) -> Self {
        let name = message_type.name.as_str();
        match (&message_type.family, name) {
            (MessageFamily::Connections, "invitation") => MessageKind::ConnectionInvitation,
            (MessageFamily::Connections, "request") => MessageKind::ConnectionRequest,
            (MessageFamily::Connections, "response") => MessageKind::ConnectionResponse,
            (MessageFamily::Connections, "problem_report") => MessageKind::ConnectionProblemReport,
            (MessageFamily::OutOfBand, "invitation") => MessageKind::OutofbandInvitation,
            (MessageFamily::OutOfBand, "handshake-reuse") => MessageKind::HandshakeReuse,
            (MessageFamily::OutOfBand, "handshake-reuse-accepted") => {
                MessageKind::HandshakeReuseAccepted
            }
            (MessageFamily::Notification, "ack") => MessageKind::Ack,
            (MessageFamily::Notification, "problem-report") => MessageKind::ProblemReport,
            (MessageFamily::ReportProblem, "problem-report") => MessageKind::ProblemReport,
            (MessageFamily::TrustPing, "ping") => MessageKind::Ping,
            (MessageFamily::TrustPing, "ping_response") => MessageKind::PingResponse,
            (MessageFamily::DiscoverFeatures, "query") => MessageKind::Query,
            (MessageFamily::DiscoverFeatures, "disclose") => MessageKind::Disclose,
            (MessageFamily::IssueCredential, "offer-credential") => MessageKind::CredentialOffer,
            (MessageFamily::IssueCredential, "request-credential") => {
                MessageKind::CredentialRequest
            }
            (MessageFamily::IssueCredential, "issue-credential") => MessageKind::Credential,
            (MessageFamily::IssueCredential, "ack") => MessageKind::CredentialAck,
            (MessageFamily::IssueCredential, "problem-report") => {
                MessageKind::CredentialProblemReport
            }
            (MessageFamily::PresentProof, "propose-presentation") => {
                MessageKind::PresentationProposal
            }
            (MessageFamily::BasicMessage, "message") => MessageKind::BasicMessage,
            (MessageFamily::CommittedAnswer, "question") => MessageKind::Question,
            (MessageFamily::QuestionAnswer, "question") => MessageKind::Question,
            (MessageFamily::CommittedAnswer, "answer") => MessageKind::Answer,
            (MessageFamily::QuestionAnswer, "answer") => MessageKind::Answer,
            (MessageFamily::InviteAction, "invite") => MessageKind::InviteAction,
            _ => MessageKind::Unknown(message_type.to_tag()),
        }
    }

    /// Legacy agency messages carry a bare name, sometimes in its upper case alias
    pub fn from_legacy_name(name: &str) -> Option<Self> {
        match name {
            "connReq" | "CONN_REQ" => Some(MessageKind::LegacyConnectionRequest),
            "connReqAnswer" | "CONN_REQ_ANSWER" | "ACCEPT_CONN_REQ" => {
                Some(MessageKind::LegacyConnectionAnswer)
            }
            "connReqRedirect" | "CONN_REQ_REDIRECT" | "REDIRECT_CONN_REQ" => {
                Some(MessageKind::LegacyConnectionRedirect)
            }
            "credOffer" | "CLAIM_OFFER" | "CRED_OFFER" => Some(MessageKind::LegacyCredentialOffer),
            "credReq" | "CLAIM_REQ" | "CRED_REQ" => Some(MessageKind::LegacyCredentialRequest),
            "cred" | "CLAIM" | "CRED" => Some(MessageKind::LegacyCredential),
            "generic" => Some(MessageKind::LegacyGeneric),
            _ => None,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        if let Some(message_type) = MessageType::parse(tag) {
            return MessageKind::from_type(&message_type);
        }

        MessageKind::from_legacy_name(tag).unwrap_or_else(|| MessageKind::Unknown(tag.to_string()))
    }

    /// The outbound `@type` tag for Aries kinds, or the message name for legacy ones
    pub fn type_tag(&self) -> String {
        let aries = |family: MessageFamily, name: &str| MessageType::new(family, name).to_tag();
        match self {
            MessageKind::ConnectionInvitation => aries(MessageFamily::Connections, "invitation"),
            MessageKind::ConnectionRequest => aries(MessageFamily::Connections, "request"),
            MessageKind::ConnectionResponse => aries(MessageFamily::Connections, "response"),
            MessageKind::ConnectionProblemReport => {
                aries(MessageFamily::Connections, "problem_report")
            }
            MessageKind::OutofbandInvitation => aries(MessageFamily::OutOfBand, "invitation"),
            MessageKind::HandshakeReuse => aries(MessageFamily::OutOfBand, "handshake-reuse"),
            MessageKind::HandshakeReuseAccepted => {
                aries(MessageFamily::OutOfBand, "handshake-reuse-accepted")
            }
            MessageKind::Ack => aries(MessageFamily::Notification, "ack"),
            MessageKind::ProblemReport => aries(MessageFamily::ReportProblem, "problem-report"),
            MessageKind::Ping => aries(MessageFamily::TrustPing, "ping"),
            MessageKind::PingResponse => aries(MessageFamily::TrustPing, "ping_response"),
            MessageKind::Query => aries(MessageFamily::DiscoverFeatures, "query"),
            MessageKind::Disclose => aries(MessageFamily::DiscoverFeatures, "disclose"),
            MessageKind::CredentialOffer => {
                aries(MessageFamily::IssueCredential, "offer-credential")
            }
            MessageKind::CredentialRequest => {
                aries(MessageFamily::IssueCredential, "request-credential")
            }
            MessageKind::Credential => aries(MessageFamily::IssueCredential, "issue-credential"),
            MessageKind::CredentialAck => aries(MessageFamily::IssueCredential, "ack"),
            MessageKind::CredentialProblemReport => {
                aries(MessageFamily::IssueCredential, "problem-report")
            }
            MessageKind::PresentationProposal => {
                aries(MessageFamily::PresentProof, "propose-presentation")
            }
            MessageKind::BasicMessage => aries(MessageFamily::BasicMessage, "message"),
            MessageKind::Question => aries(MessageFamily::CommittedAnswer, "question"),
            MessageKind::Answer => aries(MessageFamily::CommittedAnswer, "answer"),
            MessageKind::InviteAction => aries(MessageFamily::InviteAction, "invite"),
            MessageKind::LegacyConnectionRequest => "connReq".to_string(),
            MessageKind::LegacyConnectionAnswer => "connReqAnswer".to_string(),
            MessageKind::LegacyConnectionRedirect => "connReqRedirect".to_string(),
            MessageKind::LegacyCredentialOffer => "CLAIM_OFFER".to_string(),
            MessageKind::LegacyCredentialRequest => "CRED_REQ".to_string(),
            MessageKind::LegacyCredential => "CRED".to_string(),
            MessageKind::LegacyGeneric => "generic".to_string(),
            MessageKind::Unknown(tag) => tag.clone(),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(
            self,
            MessageKind::LegacyConnectionRequest
                | MessageKind::LegacyConnectionAnswer
                | MessageKind::LegacyConnectionRedirect
                | MessageKind::LegacyCredentialOffer
                | MessageKind::LegacyCredentialRequest
                | MessageKind::LegacyCredential
                | MessageKind::LegacyGeneric
        )
    }

    pub fn is_problem_report(&self) -> bool {
        matches!(
            self,
            MessageKind::ConnectionProblemReport
                | MessageKind::ProblemReport
                | MessageKind::CredentialProblemReport
        )
    }
}
