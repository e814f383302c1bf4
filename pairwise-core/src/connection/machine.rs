use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;

use rst_common::standard::serde_json::{self, Value};
use rst_common::standard::uuid::Uuid;
use rst_common::with_logging::log::{debug, info, warn};

use super::connection::Connection;
use super::types::{ConnectOptions, InviteActionData, RemoteInfo, SendMessageOptions, State};
use crate::invitation::types::{AriesInvitation, InlineService, CONNECTIONS_HANDSHAKE};
use crate::invitation::{codec, Invitation, OutofbandInvitation, ServiceEntry};
use crate::messages::aries::{
    Ack, Answer, BasicMessage, ConnectionData, ConnectionRequest, ConnectionResponse, Disclose,
    HandshakeReuse, InviteAction, Ping, PingResponse, Query, Question, QuestionResponse,
    SignatureDecorator,
};
use crate::messages::attachment::Attachment;
use crate::messages::diddoc::DidDoc;
use crate::messages::legacy::{
    ConnectionAnswer, ConnectionRedirect, ConnectionRequestMessage, GenericMessage, InviteDetail,
    RedirectDetail, SenderAgencyDetail, SenderDetail, STATUS_ACCEPTED, STATUS_REJECTED,
    STATUS_SENT,
};
use crate::messages::{to_message_value, MessageFamily, MessageKind, ParsedMessage, Thread};
use crate::problem_report::{self, Directive};
use crate::router::{self, Decision, RouteContext, Rule};
use crate::types::{
    require_bytes, require_endpoint, require_key, Destination, LedgerBuilder, PairwiseError,
    PairwiseKey, Protocol, Role, Settings, TransportBuilder, WalletBuilder,
};

/// Agent bundles the collaborators a transition may call
pub(crate) struct Agent<'a, TTransport, TWallet, TLedger> {
    pub settings: &'a Settings,
    pub transport: TTransport,
    pub wallet: TWallet,
    pub ledger: TLedger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AcceptRequest,
    AcceptResponse,
    Complete,
    CompleteWithPing,
    Reset,
    ReplyPing,
    ReplyQuery,
    ReplyReuse,
    RecordDisclose,
    Record,
    LegacyAnswer,
    LegacyRedirect,
}

fn build_rules() -> Vec<Rule<State, Action>> {
    use MessageKind as Kind;

    let mut rules = vec![
        Rule::new(
            Protocol::Proprietary,
            Some(Role::Inviter),
            State::OfferSent,
            Kind::LegacyConnectionAnswer,
            Action::LegacyAnswer,
        ),
        Rule::new(
            Protocol::Proprietary,
            Some(Role::Inviter),
            State::OfferSent,
            Kind::LegacyConnectionRedirect,
            Action::LegacyRedirect,
        ),
        Rule::new(
            Protocol::Aries,
            Some(Role::Inviter),
            State::OfferSent,
            Kind::ConnectionRequest,
            Action::AcceptRequest,
        ),
        Rule::new(
            Protocol::Aries,
            Some(Role::Inviter),
            State::RequestReceived,
            Kind::Ack,
            Action::Complete,
        ),
        Rule::new(
            Protocol::Aries,
            Some(Role::Inviter),
            State::RequestReceived,
            Kind::Ping,
            Action::CompleteWithPing,
        ),
        Rule::new(
            Protocol::Aries,
            Some(Role::Inviter),
            State::RequestReceived,
            Kind::PingResponse,
            Action::Complete,
        ),
        Rule::new(
            Protocol::Aries,
            Some(Role::Invitee),
            State::RequestReceived,
            Kind::ConnectionResponse,
            Action::AcceptResponse,
        ),
    ];

    let accepted = [
        (Kind::Ping, Action::ReplyPing),
        (Kind::PingResponse, Action::Record),
        (Kind::Ack, Action::Record),
        (Kind::Query, Action::ReplyQuery),
        (Kind::Disclose, Action::RecordDisclose),
        (Kind::HandshakeReuse, Action::ReplyReuse),
        (Kind::HandshakeReuseAccepted, Action::Record),
    ];

    for (kind, action) in accepted {
        rules.push(Rule::new(Protocol::Aries, None, State::Accepted, kind, action));
    }

    let reportable = [
        State::Initialized,
        State::OfferSent,
        State::RequestReceived,
        State::Accepted,
        State::Redirected,
    ];

    for state in reportable {
        for kind in [Kind::ConnectionProblemReport, Kind::ProblemReport] {
            rules.push(Rule::new(Protocol::Aries, None, state, kind, Action::Reset));
        }
    }

    rules
}

pub(crate) fn rules() -> &'static [Rule<State, Action>] {
    static RULES: OnceLock<Vec<Rule<State, Action>>> = OnceLock::new();
    RULES.get_or_init(build_rules)
}

async fn resolve_did<TLedger: LedgerBuilder>(
    ledger: &TLedger,
    did: String,
) -> Result<Destination, PairwiseError> {
    let endpoint = ledger.resolve_service_endpoint(did.clone()).await?;
    Ok(require_endpoint(endpoint, &did)?.into_destination(Some(did)))
}

fn sender_detail(settings: &Settings, key: &PairwiseKey, public_did: Option<String>) -> SenderDetail {
    SenderDetail {
        name: Some(settings.label().to_string()),
        agent_key_dlg_proof: None,
        did: key.did.clone(),
        logo_url: settings.logo_url(),
        verkey: key.verkey.clone(),
        public_did,
    }
}

fn agency_detail(settings: &Settings) -> SenderAgencyDetail {
    let agency = settings.agency();
    SenderAgencyDetail {
        did: agency.did.clone(),
        verkey: agency.verkey.clone(),
        endpoint: agency.endpoint.clone(),
    }
}

fn agency_destination(settings: &Settings) -> Destination {
    let agency = settings.agency();
    Destination::new(agency.endpoint.clone(), vec![agency.verkey.clone()], vec![])
        .with_did(Some(agency.did.clone()))
}

fn our_did_doc(settings: &Settings, key: &PairwiseKey) -> DidDoc {
    let agency = settings.agency();
    DidDoc::new(&key.did, &key.verkey, &agency.endpoint, agency.routing_keys())
}

impl Connection {
    pub(crate) fn route(&self, message: &ParsedMessage) -> Decision<Action> {
        let ctx = RouteContext {
            protocol: self.protocol,
            role: Some(self.role),
            state: &self.state,
            later: self.state.later(),
            thread_id: self.thread_id.as_deref(),
            log: &self.log,
        };

        router::decide(rules(), &ctx, message)
    }

    pub(super) async fn ensure_pairwise_key<TWallet: WalletBuilder>(
        &mut self,
        wallet: &TWallet,
    ) -> Result<PairwiseKey, PairwiseError> {
        if let Some(key) = &self.pairwise {
            return Ok(key.clone());
        }

        let key = require_key(wallet.create_pairwise_key().await?)?;
        self.pairwise = Some(key.clone());
        Ok(key)
    }

    pub(super) async fn resolve_invitation_service<TLedger: LedgerBuilder>(
        &self,
        ledger: &TLedger,
    ) -> Result<Destination, PairwiseError> {
        match &self.invitation {
            Some(Invitation::Aries(invitation)) if invitation.has_inline_service() => {
                Ok(invitation.destination())
            }
            Some(Invitation::Aries(invitation)) => {
                let did = invitation.public_did.clone().ok_or(PairwiseError::InvalidJson(
                    "invitation has neither a service nor a public did".to_string(),
                ))?;
                resolve_did(ledger, did).await
            }
            Some(Invitation::OutOfBand(invitation)) => match invitation.service.first() {
                Some(ServiceEntry::Inline(service)) => Ok(service.destination()),
                Some(ServiceEntry::Did(did)) => resolve_did(ledger, did.clone()).await,
                None => Err(PairwiseError::InvalidJson(
                    "out-of-band invitation has no service".to_string(),
                )),
            },
            _ => Err(PairwiseError::InvalidState(
                "connection has no aries invitation".to_string(),
            )),
        }
    }

    /// Sends over the established channel without one-time accounting, used for automatic replies
    async fn send_raw<TTransport: TransportBuilder>(
        &self,
        transport: &TTransport,
        message: Value,
    ) -> Result<(), PairwiseError> {
        let (key, destination) = self.channel()?;
        transport.send(key.verkey, message, destination).await
    }

    /// Sends a caller initiated message, a one-time connection accepts a single one
    async fn send_to_remote<TTransport: TransportBuilder>(
        &mut self,
        transport: &TTransport,
        message: Value,
    ) -> Result<(), PairwiseError> {
        let (key, destination) = self.channel()?;
        if self.one_time && self.one_time_used {
            return Err(PairwiseError::InvalidState(
                "one-time connection was already used".to_string(),
            ));
        }

        transport.send(key.verkey, message, destination).await?;
        if self.one_time {
            self.one_time_used = true;
        }

        Ok(())
    }

    fn require_aries_accepted(&self, action: &str) -> Result<(), PairwiseError> {
        if self.protocol != Protocol::Aries {
            return Err(PairwiseError::ActionNotSupported(format!(
                "{} requires the aries protocol",
                action
            )));
        }

        if self.state != State::Accepted {
            return Err(PairwiseError::NotReady(format!(
                "{} requires an accepted connection",
                action
            )));
        }

        Ok(())
    }

    pub(crate) async fn connect<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        options: ConnectOptions,
    ) -> Result<Option<String>, PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        options.validate()?;
        if options.use_public_did && agent.settings.public_did().is_none() {
            return Err(PairwiseError::InvalidOption(
                "use_public_did requires a configured public did".to_string(),
            ));
        }

        let invitation = match (self.protocol, self.role, self.state) {
            (_, _, State::None) => {
                return Err(PairwiseError::NotReady(
                    "connection was reset and cannot connect".to_string(),
                ))
            }
            (Protocol::Aries, Role::Inviter, State::Initialized) => {
                Some(self.aries_invite(agent, &options).await?)
            }
            (Protocol::Proprietary, Role::Inviter, State::Initialized) => {
                Some(self.legacy_invite(agent, &options).await?)
            }
            (Protocol::Aries, Role::Invitee, State::OfferSent) => {
                self.aries_request(agent).await?;
                None
            }
            (Protocol::Proprietary, Role::Invitee, State::RequestReceived) => {
                self.legacy_accept(agent, &options).await?;
                None
            }
            (_, _, state) => {
                return Err(PairwiseError::InvalidState(format!(
                    "cannot connect from state: {}",
                    state
                )))
            }
        };

        info!(
            "[connection:connect] source_id: {}, state: {}",
            self.source_id, self.state
        );

        self.options = options;
        Ok(invitation)
    }

    async fn aries_invite<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        options: &ConnectOptions,
    ) -> Result<String, PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let key = self.ensure_pairwise_key(&agent.wallet).await?;

        if let Some(invitation @ Invitation::OutOfBand(_)) = &self.invitation {
            let encoded = codec::encode(invitation, false)?;
            self.update_state(State::OfferSent);
            return Ok(encoded);
        }

        let agency = agent.settings.agency();
        let public_did = options
            .use_public_did
            .then(|| agent.settings.public_did())
            .flatten();

        let destination = Destination::new(
            agency.endpoint.clone(),
            vec![key.verkey.clone()],
            agency.routing_keys(),
        );

        let invitation = Invitation::Aries(
            AriesInvitation::new(
                agent.settings.label().to_string(),
                destination,
                agent.settings.logo_url(),
            )
            .with_public_did(public_did.clone()),
        );

        let encoded = codec::encode(&invitation, false)?;
        self.invitation = Some(invitation);
        self.public_did = public_did;
        self.update_state(State::OfferSent);
        Ok(encoded)
    }

    async fn legacy_invite<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        options: &ConnectOptions,
    ) -> Result<String, PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let key = self.ensure_pairwise_key(&agent.wallet).await?;
        let public_did = options
            .use_public_did
            .then(|| agent.settings.public_did())
            .flatten();

        let conn_req_id = Uuid::new_v4().to_string();
        let detail = InviteDetail {
            status_code: STATUS_SENT.to_string(),
            conn_req_id: conn_req_id.clone(),
            sender_detail: sender_detail(agent.settings, &key, public_did.clone()),
            sender_agency_detail: agency_detail(agent.settings),
            target_name: self.source_id.clone(),
            status_msg: "message sent".to_string(),
            thread_id: Some(conn_req_id.clone()),
        };

        let request = ConnectionRequestMessage::new(
            detail.clone(),
            options.phone.clone(),
            options.use_public_did,
        );

        agent
            .transport
            .send(
                key.verkey.clone(),
                to_message_value(&request)?,
                agency_destination(agent.settings),
            )
            .await?;

        let invitation = Invitation::Legacy(detail);
        let encoded = codec::encode(&invitation, false)?;
        self.invitation = Some(invitation);
        self.thread_id = Some(conn_req_id);
        self.public_did = public_did;
        self.update_state(State::OfferSent);
        Ok(encoded)
    }

    async fn legacy_accept<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        options: &ConnectOptions,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let detail = match &self.invitation {
            Some(Invitation::Legacy(detail)) => detail.clone(),
            _ => {
                return Err(PairwiseError::InvalidState(
                    "connection has no invite detail".to_string(),
                ))
            }
        };

        let key = self.ensure_pairwise_key(&agent.wallet).await?;
        let public_did = options
            .use_public_did
            .then(|| agent.settings.public_did())
            .flatten();

        let answer = ConnectionAnswer::accepted(
            sender_detail(agent.settings, &key, public_did),
            agency_detail(agent.settings),
            detail.conn_req_id.clone(),
            self.thread_id.clone(),
        );

        self.send_raw(&agent.transport, to_message_value(&answer)?)
            .await?;

        self.update_state(State::Accepted);
        Ok(())
    }

    async fn aries_request<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let destination = self.resolve_invitation_service(&agent.ledger).await?;
        let key = self.ensure_pairwise_key(&agent.wallet).await?;

        let parent = match &self.invitation {
            Some(Invitation::OutOfBand(invitation)) => Some(invitation.id.clone()),
            _ => None,
        };

        let connection = ConnectionData {
            did: key.did.clone(),
            did_doc: our_did_doc(agent.settings, &key),
        };

        let mut request =
            ConnectionRequest::new(agent.settings.label().to_string(), connection, None);
        if parent.is_some() {
            request.thread = Some(Thread::new().with_thid(request.id.clone()).with_pthid(parent));
        }

        agent
            .transport
            .send(
                key.verkey.clone(),
                to_message_value(&request)?,
                destination.clone(),
            )
            .await?;

        self.thread_id = Some(request.id.clone());
        self.invitation_service = Some(destination);
        self.update_state(State::RequestReceived);
        Ok(())
    }

    /// Applies a routed action, the caller already checked ownership and ordering
    pub(crate) async fn apply<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        action: Action,
        message: &ParsedMessage,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        debug!(
            "[connection:apply] source_id: {}, action: {:?}, kind: {:?}",
            self.source_id, action, message.kind
        );

        match action {
            Action::AcceptRequest => self.accept_request(agent, message).await?,
            Action::AcceptResponse => self.accept_response(agent, message).await?,
            Action::Complete => self.update_state(State::Accepted),
            Action::CompleteWithPing => {
                self.reply_ping(agent, message).await?;
                self.update_state(State::Accepted)
            }
            Action::Reset => {
                if let Some(Directive::Reset) = problem_report::handle(self.protocol, self, message)?
                {
                    self.update_state(State::None)
                }
            }
            Action::ReplyPing => self.reply_ping(agent, message).await?,
            Action::ReplyQuery => self.reply_query(agent, message).await?,
            Action::ReplyReuse => {
                let reuse: HandshakeReuse = message.decode()?;
                let thread = Thread::new()
                    .with_thid(reuse.id.clone())
                    .with_pthid(reuse.thread.pthid.clone());

                let accepted = HandshakeReuse::accepted(thread);
                self.send_raw(&agent.transport, to_message_value(&accepted)?)
                    .await?
            }
            Action::RecordDisclose => {
                let disclose: Disclose = message.decode()?;
                self.remote_protocols = disclose
                    .protocols
                    .into_iter()
                    .map(|protocol| protocol.pid)
                    .collect();
            }
            Action::Record => {}
            Action::LegacyAnswer => self.legacy_answer(message)?,
            Action::LegacyRedirect => {
                let redirect: ConnectionRedirect = message.decode()?;
                self.redirect = Some(redirect.redirect_detail);
                self.update_state(State::Redirected)
            }
        }

        let on_thread = self.thread_id.is_some() && message.thread_id() == self.thread_id;
        let order = if on_thread {
            message.sender_order()
        } else {
            None
        };

        self.log.mark_applied(message.message_id(), order);
        Ok(())
    }

    async fn accept_request<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        message: &ParsedMessage,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let request: ConnectionRequest = message.decode()?;
        let key = self.pairwise_key()?.clone();

        let destination = request.connection.did_doc.to_destination()?;
        let mut remote = RemoteInfo::from_destination(destination, Some(request.label.clone()));
        remote.did = Some(request.connection.did.clone());
        self.set_remote(remote)?;

        let thread_id = message.thread_id().unwrap_or_else(|| request.id.clone());
        let connection = ConnectionData {
            did: key.did.clone(),
            did_doc: our_did_doc(agent.settings, &key),
        };

        let payload = SignatureDecorator::payload(&connection)?;
        let signature = require_bytes(
            agent.wallet.sign(key.verkey.clone(), payload.clone()).await?,
            "signature",
        )?;

        let thread = Thread::new()
            .with_thid(thread_id.clone())
            .with_sender_order(self.next_sender_order()?);

        let response = ConnectionResponse::new(
            SignatureDecorator::new(key.verkey.clone(), &payload, &signature),
            thread,
        );

        self.send_raw(&agent.transport, to_message_value(&response)?)
            .await?;

        self.thread_id = Some(thread_id);
        self.update_state(State::RequestReceived);
        Ok(())
    }

    async fn accept_response<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        message: &ParsedMessage,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let response: ConnectionResponse = message.decode()?;
        let signer = self
            .invitation_service
            .as_ref()
            .and_then(|service| service.primary_key())
            .ok_or(PairwiseError::InvalidState(
                "invitation key is unknown".to_string(),
            ))?;

        if response.connection_sig.signer != signer {
            return Err(PairwiseError::InvalidState(
                "response is not signed by the invitation key".to_string(),
            ));
        }

        let valid = agent
            .wallet
            .verify(
                signer,
                response.connection_sig.payload_bytes()?,
                response.connection_sig.signature_bytes()?,
            )
            .await?;

        if !valid {
            return Err(PairwiseError::InvalidState(
                "response signature is invalid".to_string(),
            ));
        }

        let connection = response.connection_sig.connection()?;
        let destination = connection.did_doc.to_destination()?;
        let label = self.invitation.as_ref().and_then(|invitation| invitation.label());
        let mut remote = RemoteInfo::from_destination(destination, label);
        remote.did = Some(connection.did.clone());
        remote.public_did = self
            .invitation
            .as_ref()
            .and_then(|invitation| invitation.public_did());
        self.set_remote(remote)?;

        let thread_id = self
            .thread_id
            .clone()
            .or_else(|| message.thread_id())
            .unwrap_or_default();

        let ack = Ack::new(
            MessageKind::Ack,
            Thread::new()
                .with_thid(thread_id)
                .with_sender_order(self.next_sender_order()?),
        );

        self.send_raw(&agent.transport, to_message_value(&ack)?)
            .await?;

        self.update_state(State::Accepted);
        Ok(())
    }

    async fn reply_ping<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        message: &ParsedMessage,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let ping: Ping = message.decode()?;
        if !ping.response_requested {
            return Ok(());
        }

        let thid = message.thread_id().unwrap_or_else(|| ping.id.clone());
        let response = PingResponse::new(Thread::new().with_thid(thid));
        self.send_raw(&agent.transport, to_message_value(&response)?)
            .await
    }

    async fn reply_query<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        message: &ParsedMessage,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let query: Query = message.decode()?;
        let protocols: Vec<String> = MessageFamily::supported()
            .iter()
            .map(|family| family.protocol_id())
            .filter(|pid| query.matches(pid))
            .collect();

        let disclose = Disclose::new(protocols, Thread::new().with_thid(query.id.clone()));
        self.send_raw(&agent.transport, to_message_value(&disclose)?)
            .await
    }

    fn legacy_answer(&mut self, message: &ParsedMessage) -> Result<(), PairwiseError> {
        let answer: ConnectionAnswer = message.decode()?;
        match answer.answer_status_code.as_str() {
            STATUS_ACCEPTED => {
                let sender = answer.sender_detail;
                let agency = answer.sender_agency_detail;
                self.set_remote(RemoteInfo {
                    did: Some(sender.did),
                    verkey: sender.verkey,
                    endpoint: agency.endpoint,
                    routing_keys: vec![agency.verkey],
                    public_did: sender.public_did,
                    label: sender.name,
                })?;

                self.update_state(State::Accepted);
                Ok(())
            }
            STATUS_REJECTED => {
                warn!(
                    "[connection:legacy_answer] invitation rejected, source_id: {}",
                    self.source_id
                );

                self.update_state(State::None);
                Ok(())
            }
            other => Err(PairwiseError::InvalidState(format!(
                "unexpected answer status code: {}",
                other
            ))),
        }
    }

    /// Polls the transport and applies the first message this connection can act on
    pub(crate) async fn poll<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let pairwise_did = match (&self.pairwise, self.state) {
            (_, State::None) | (None, _) => return Ok(()),
            (Some(key), _) => key.did.clone(),
        };

        let messages = agent
            .transport
            .poll_inbound(pairwise_did.clone(), None)
            .await?;

        let mut reviewed = Vec::new();
        for inbound in messages {
            let message = ParsedMessage::from_inbound(inbound);
            if !self.owns(&message) {
                continue;
            }

            match self.route(&message) {
                Decision::Apply(action) => {
                    let mut draft = self.clone();
                    match draft.apply(agent, action, &message).await {
                        Ok(()) => {
                            *self = draft;
                            reviewed.extend(message.uid.clone());
                            break;
                        }
                        Err(err) => {
                            warn!(
                                "[connection:poll] drop message that failed to apply: {:?}, err: {}",
                                message.kind, err
                            );
                            self.log.mark_seen(message.message_id());
                            reviewed.extend(message.uid.clone());
                        }
                    }
                }
                Decision::Duplicate => reviewed.extend(message.uid.clone()),
                Decision::Premature(kind) => {
                    debug!("[connection:poll] skip premature message: {:?}", kind)
                }
                Decision::Stale { last, received } => warn!(
                    "[connection:poll] skip stale message, last applied: {}, received: {}",
                    last, received
                ),
                Decision::Ignore => {}
            }
        }

        if !reviewed.is_empty() {
            if let Err(err) = agent
                .transport
                .update_message_status(pairwise_did, reviewed)
                .await
            {
                warn!("[connection:poll] unable to mark messages reviewed: {}", err)
            }
        }

        Ok(())
    }

    /// Applies a pushed message, returns whether a transition was taken
    pub(crate) async fn receive<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        message: &ParsedMessage,
    ) -> Result<bool, PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        if !self.owns(message) {
            debug!(
                "[connection:receive] message not owned, source_id: {}",
                self.source_id
            );
            return Ok(false);
        }

        match self.route(message).into_result()? {
            Some(action) => {
                self.apply(agent, action, message).await?;
                Ok(true)
            }
            None => {
                self.log.mark_seen(message.message_id());
                Ok(false)
            }
        }
    }

    pub(crate) async fn send_message<TTransport: TransportBuilder>(
        &mut self,
        transport: &TTransport,
        message: String,
        options: SendMessageOptions,
    ) -> Result<String, PairwiseError> {
        if matches!(self.state, State::None | State::Redirected) {
            return Err(PairwiseError::InvalidState(format!(
                "cannot send messages from state: {}",
                self.state
            )));
        }

        let parsed: Option<Value> = serde_json::from_str(&message).ok();
        let (value, id) = match self.protocol {
            Protocol::Aries => match parsed {
                Some(Value::Object(mut map)) if map.contains_key("@type") => {
                    let id = match map.get("@id").and_then(|id| id.as_str()) {
                        Some(id) => id.to_string(),
                        None => {
                            let id = Uuid::new_v4().to_string();
                            map.insert("@id".to_string(), Value::String(id.clone()));
                            id
                        }
                    };

                    (Value::Object(map), id)
                }
                _ => {
                    let basic = BasicMessage::new(message);
                    (to_message_value(&basic)?, basic.id)
                }
            },
            Protocol::Proprietary => {
                let content = parsed.unwrap_or(Value::String(message));
                let generic = GenericMessage::new(
                    options.msg_type,
                    options.msg_title,
                    options.ref_msg_id,
                    content,
                );
                (to_message_value(&generic)?, generic.id)
            }
        };

        self.send_to_remote(transport, value).await?;
        Ok(id)
    }

    pub(crate) async fn send_ping<TTransport: TransportBuilder>(
        &mut self,
        transport: &TTransport,
        comment: Option<String>,
    ) -> Result<(), PairwiseError> {
        self.require_aries_accepted("ping")?;

        let ping = Ping::new(comment);
        self.send_to_remote(transport, to_message_value(&ping)?)
            .await?;

        self.log.mark_sent(ping.id);
        Ok(())
    }

    pub(crate) async fn send_discovery_features<TTransport: TransportBuilder>(
        &mut self,
        transport: &TTransport,
        query: Option<String>,
        comment: Option<String>,
    ) -> Result<(), PairwiseError> {
        self.require_aries_accepted("feature discovery")?;

        let query = Query::new(query, comment);
        self.send_to_remote(transport, to_message_value(&query)?)
            .await?;

        self.log.mark_sent(query.id);
        Ok(())
    }

    pub(crate) async fn send_reuse<TTransport: TransportBuilder>(
        &mut self,
        transport: &TTransport,
        invite: &str,
    ) -> Result<(), PairwiseError> {
        self.require_aries_accepted("handshake reuse")?;

        let invitation: OutofbandInvitation = codec::decode_outofband(invite)?;
        let reuse = HandshakeReuse::new(invitation.id);
        self.send_to_remote(transport, to_message_value(&reuse)?)
            .await?;

        self.log.mark_sent(reuse.id);
        Ok(())
    }

    pub(crate) async fn send_answer<TTransport, TWallet>(
        &mut self,
        transport: &TTransport,
        wallet: &TWallet,
        question: &str,
        answer: &str,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
    {
        self.require_aries_accepted("answer")?;

        let question: Question = serde_json::from_str(question)
            .map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;
        let answer: QuestionResponse = serde_json::from_str(answer)
            .map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;

        if !question.valid_responses.contains(&answer) {
            return Err(PairwiseError::InvalidOption(
                "answer is not one of the valid responses".to_string(),
            ));
        }

        let key = self.pairwise_key()?.clone();
        let signature = require_bytes(
            wallet
                .sign(key.verkey, answer.nonce.as_bytes().to_vec())
                .await?,
            "signature",
        )?;

        let message = Answer::new(question.id, &answer.nonce, &signature);
        self.send_to_remote(transport, to_message_value(&message)?)
            .await
    }

    pub(crate) async fn send_invite_action<TTransport: TransportBuilder>(
        &mut self,
        transport: &TTransport,
        data: InviteActionData,
    ) -> Result<String, PairwiseError> {
        self.require_aries_accepted("invite action")?;

        let action = InviteAction::new(data.goal_code, data.ack_on);
        let value = to_message_value(&action)?;
        self.send_to_remote(transport, value.clone()).await?;

        serde_json::to_string(&value).map_err(|err| PairwiseError::SerializeError(err.to_string()))
    }

    /// Points the remote party of this connection at the `existing` relationship
    pub(crate) async fn redirect<TTransport, TWallet, TLedger>(
        &mut self,
        agent: &Agent<'_, TTransport, TWallet, TLedger>,
        existing: &Connection,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TLedger: LedgerBuilder,
    {
        let existing_key = existing.pairwise.clone();
        let existing_remote = existing.remote.clone();

        let mut detail = RedirectDetail {
            did: existing_key
                .as_ref()
                .map(|key| key.did.clone())
                .unwrap_or_default(),
            verkey: existing_key
                .as_ref()
                .map(|key| key.verkey.clone())
                .unwrap_or_default(),
            public_did: existing.public_did.clone(),
            their_did: existing_remote.as_ref().and_then(|remote| remote.did.clone()),
            their_verkey: existing_remote.as_ref().map(|remote| remote.verkey.clone()),
            their_public_did: existing_remote.and_then(|remote| remote.public_did),
            signature: String::new(),
        };

        if let Some(key) = existing_key {
            let signature = require_bytes(
                agent
                    .wallet
                    .sign(key.verkey, detail.signed_payload())
                    .await?,
                "signature",
            )?;
            detail.signature = URL_SAFE.encode(signature);
        }

        if self.protocol == Protocol::Proprietary && self.remote.is_some() {
            let key = self.ensure_pairwise_key(&agent.wallet).await?;
            let reply_to = self
                .invitation
                .as_ref()
                .map(|invitation| invitation.id())
                .unwrap_or_default();

            let message = ConnectionRedirect::new(
                detail.clone(),
                sender_detail(agent.settings, &key, self.public_did.clone()),
                agency_detail(agent.settings),
                reply_to,
                self.thread_id.clone(),
            );

            self.send_raw(&agent.transport, to_message_value(&message)?)
                .await?;
        }

        info!(
            "[connection:redirect] source_id: {}, redirected to: {}",
            self.source_id, existing.source_id
        );

        self.redirect = Some(detail);
        self.update_state(State::Redirected);
        Ok(())
    }

    /// Builds the out-of-band invitation for a new inviter connection
    pub(crate) fn build_outofband(
        settings: &Settings,
        key: &PairwiseKey,
        goal_code: Option<String>,
        goal: Option<String>,
        handshake: bool,
        attachment: Option<Value>,
    ) -> OutofbandInvitation {
        let agency = settings.agency();
        let mut invitation = OutofbandInvitation::new(settings.label().to_string());
        invitation.goal_code = goal_code;
        invitation.goal = goal;
        invitation.profile_url = settings.logo_url();
        invitation.handshake_protocols = handshake.then(|| vec![CONNECTIONS_HANDSHAKE.to_string()]);
        invitation.request_attach =
            attachment.map(|value| vec![Attachment::json("request-0", value)]);
        invitation.service = vec![ServiceEntry::Inline(InlineService::new(Destination::new(
            agency.endpoint.clone(),
            vec![key.verkey.clone()],
            agency.routing_keys(),
        )))];
        invitation
    }
}
