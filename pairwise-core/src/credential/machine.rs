use std::sync::OnceLock;

use rst_common::standard::serde_json::{self, Value};
use rst_common::with_logging::log::{debug, info, warn};

use super::credential::Credential;
use super::types::{OfferPayload, State, PAYMENT_REQUIRED};
use crate::connection::types::{CompletedConnection, ConnectionChannel, SendMessageOptions};
use crate::messages::aries::Ack;
use crate::messages::issuance::{
    CredentialIssued, CredentialRequest, PresentationAttribute, PresentationProposal,
};
use crate::messages::legacy::{LegacyCredential, LegacyCredentialRequest};
use crate::messages::{to_message_value, MessageKind, ParsedMessage, Thread};
use crate::problem_report::{self, Directive, ProblemReportMessage, CODE_ISSUANCE_ABANDONED};
use crate::registry::Handle;
use crate::router::{self, Decision, RouteContext, Rule};
use crate::types::{
    CredentialRequestData, PairwiseError, Protocol, TransportBuilder, WalletBuilder,
};

const REQUEST_TITLE: &str = "Sending credential request";

/// Agent bundles the collaborators a credential transition may call
pub(crate) struct Agent<TTransport, TWallet, TConnection> {
    pub transport: TTransport,
    pub wallet: TWallet,
    pub channel: TConnection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Store,
    Reset,
}

fn build_rules() -> Vec<Rule<State, Action>> {
    use MessageKind as Kind;

    vec![
        Rule::new(
            Protocol::Aries,
            None,
            State::OfferSent,
            Kind::Credential,
            Action::Store,
        ),
        Rule::new(
            Protocol::Aries,
            None,
            State::OfferSent,
            Kind::CredentialProblemReport,
            Action::Reset,
        ),
        Rule::new(
            Protocol::Aries,
            None,
            State::OfferSent,
            Kind::ProblemReport,
            Action::Reset,
        ),
        Rule::new(
            Protocol::Proprietary,
            None,
            State::OfferSent,
            Kind::LegacyCredential,
            Action::Store,
        ),
    ]
}

pub(crate) fn rules() -> &'static [Rule<State, Action>] {
    static RULES: OnceLock<Vec<Rule<State, Action>>> = OnceLock::new();
    RULES.get_or_init(build_rules)
}

fn require_request(data: CredentialRequestData) -> Result<CredentialRequestData, PairwiseError> {
    let empty = match &data.request {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(raw) => raw.is_empty(),
        _ => false,
    };

    if empty {
        return Err(PairwiseError::EmptyResponse(
            "wallet returned an empty credential request".to_string(),
        ));
    }

    Ok(data)
}

fn to_raw(message: &Value) -> Result<String, PairwiseError> {
    serde_json::to_string(message).map_err(|err| PairwiseError::SerializeError(err.to_string()))
}

impl Credential {
    pub(crate) fn route(&self, message: &ParsedMessage) -> Decision<Action> {
        let protocol = match self.protocol {
            Some(protocol) => protocol,
            None => return Decision::Ignore,
        };

        let ctx = RouteContext {
            protocol,
            role: None,
            state: &self.state,
            later: self.state.later(),
            thread_id: Some(self.thread_id.as_str()),
            log: &self.log,
        };

        router::decide(rules(), &ctx, message)
    }

    /// The protocol the exchange runs over a given connection
    ///
    /// An Aries offer can only be answered over an Aries connection, a legacy offer
    /// follows whatever the connection speaks.
    pub(super) fn resolve_protocol(&self, connection: Protocol) -> Result<Protocol, PairwiseError> {
        match (&self.offer, connection) {
            (OfferPayload::Aries(_), Protocol::Proprietary) => Err(
                PairwiseError::ActionNotSupported(
                    "an aries offer cannot be answered over a legacy connection".to_string(),
                ),
            ),
            _ => match self.protocol {
                Some(protocol) if protocol != connection => {
                    Err(PairwiseError::ActionNotSupported(format!(
                        "credential already runs over the {} protocol",
                        protocol
                    )))
                }
                _ => Ok(connection),
            },
        }
    }

    fn check_payment(&self, payment: Option<String>) -> Result<Option<String>, PairwiseError> {
        let required = self
            .offer
            .payment_info()
            .map(|info| info.payment_required == PAYMENT_REQUIRED && info.price > 0)
            .unwrap_or(false);

        match payment {
            None if required => Err(PairwiseError::InvalidOption(
                "credential offer requires a payment".to_string(),
            )),
            Some(txn) if txn.is_empty() => Err(PairwiseError::InvalidOption(
                "payment reference is empty".to_string(),
            )),
            payment => Ok(payment),
        }
    }

    async fn create_request<TWallet: WalletBuilder>(
        &self,
        wallet: &TWallet,
        prover_did: String,
    ) -> Result<CredentialRequestData, PairwiseError> {
        let offer = self.offer.offer_content()?;
        let data = wallet.create_credential_request(prover_did, offer).await?;
        require_request(data)
    }

    /// Builds the wire request and the options the connection sends it with
    fn request_message(
        &self,
        protocol: Protocol,
        data: &CredentialRequestData,
        my_pw_did: String,
        their_pw_did: String,
    ) -> Result<(Value, SendMessageOptions), PairwiseError> {
        match protocol {
            Protocol::Aries => {
                let thread = Thread::new().with_thid(self.thread_id.clone());
                let request = CredentialRequest::new(data.request.clone(), thread);
                Ok((to_message_value(&request)?, SendMessageOptions::default()))
            }
            Protocol::Proprietary => {
                let offer = match &self.offer {
                    OfferPayload::Legacy { offer, .. } => offer,
                    OfferPayload::Aries(_) => {
                        return Err(PairwiseError::ActionNotSupported(
                            "an aries offer has no legacy request".to_string(),
                        ))
                    }
                };

                let request = LegacyCredentialRequest::new(
                    offer,
                    &data.request,
                    &data.metadata,
                    my_pw_did,
                    their_pw_did,
                );

                let options = SendMessageOptions {
                    msg_type: Some(MessageKind::LegacyCredentialRequest.type_tag()),
                    msg_title: Some(REQUEST_TITLE.to_string()),
                    ref_msg_id: offer.msg_ref_id.clone(),
                };

                Ok((to_message_value(&request)?, options))
            }
        }
    }

    pub(crate) async fn send_request<TTransport, TWallet, TConnection>(
        &mut self,
        agent: &Agent<TTransport, TWallet, TConnection>,
        connection: Handle,
        payment: Option<String>,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TConnection: ConnectionChannel,
    {
        if self.state != State::RequestReceived {
            return Err(PairwiseError::InvalidState(format!(
                "cannot send a credential request from state: {}",
                self.state
            )));
        }

        let completed = agent.channel.get_completed_connection(connection).await?;
        let protocol = self.resolve_protocol(completed.protocol)?;
        let payment_txn = self.check_payment(payment)?;
        let offer = match (&self.offer, protocol) {
            (OfferPayload::Legacy { .. }, Protocol::Aries) => {
                OfferPayload::Aries(self.offer.to_aries()?)
            }
            (offer, _) => offer.clone(),
        };

        let data = self
            .create_request(&agent.wallet, completed.pairwise_did.clone())
            .await?;

        let their_did = completed.destination.did.clone().unwrap_or_default();
        let (message, options) =
            self.request_message(protocol, &data, completed.pairwise_did.clone(), their_did)?;

        let id = agent
            .channel
            .send_message(connection, to_raw(&message)?, options)
            .await?;

        info!(
            "[credential:send_request] source_id: {}, protocol: {}, message: {}",
            self.source_id, protocol, id
        );

        self.protocol = Some(protocol);
        self.offer = offer;
        self.connection = Some(completed);
        self.request = Some(data.request);
        self.request_metadata = Some(data.metadata);
        self.payment_txn = payment_txn;
        self.log.mark_sent(id);
        self.update_state(State::OfferSent);
        Ok(())
    }

    /// Builds a request for delivery outside of a connection, nothing is recorded
    pub(crate) async fn build_request_message<TWallet: WalletBuilder>(
        &self,
        wallet: &TWallet,
        my_pw_did: String,
        their_pw_did: String,
    ) -> Result<String, PairwiseError> {
        if !matches!(self.state, State::RequestReceived | State::OfferSent) {
            return Err(PairwiseError::InvalidState(format!(
                "cannot build a credential request from state: {}",
                self.state
            )));
        }

        let protocol = self.protocol.unwrap_or(Protocol::Proprietary);
        let data = self.create_request(wallet, my_pw_did.clone()).await?;
        let (message, _) = self.request_message(protocol, &data, my_pw_did, their_pw_did)?;
        to_raw(&message)
    }

    pub(crate) async fn reject<TTransport, TWallet, TConnection>(
        &mut self,
        agent: &Agent<TTransport, TWallet, TConnection>,
        connection: Handle,
        comment: Option<String>,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TConnection: ConnectionChannel,
    {
        if !matches!(self.state, State::RequestReceived | State::OfferSent) {
            return Err(PairwiseError::InvalidState(format!(
                "cannot reject a credential from state: {}",
                self.state
            )));
        }

        let completed = agent.channel.get_completed_connection(connection).await?;
        if self.resolve_protocol(completed.protocol)? != Protocol::Aries {
            return Err(PairwiseError::ActionNotSupported(
                "rejecting an offer requires the aries protocol".to_string(),
            ));
        }

        let thread = Thread::new().with_thid(self.thread_id.clone());
        let report = ProblemReportMessage::new(
            MessageKind::CredentialProblemReport,
            CODE_ISSUANCE_ABANDONED,
            comment,
            thread,
        );

        agent
            .channel
            .send_message(
                connection,
                to_raw(&to_message_value(&report)?)?,
                SendMessageOptions::default(),
            )
            .await?;

        info!("[credential:reject] source_id: {}", self.source_id);
        self.protocol = Some(Protocol::Aries);
        self.update_state(State::None);
        Ok(())
    }

    pub(crate) fn presentation_proposal(&self) -> Result<String, PairwiseError> {
        self.require_accepted("get_presentation_proposal")?;

        let cred_def_id = self.offer.cred_def_id();
        let attributes = self
            .offer
            .attributes()
            .into_iter()
            .map(|(name, value)| PresentationAttribute {
                name,
                cred_def_id: cred_def_id.clone(),
                value: Some(value),
            })
            .collect();

        let proposal = PresentationProposal::new(attributes);
        to_raw(&to_message_value(&proposal)?)
    }

    async fn store<TTransport, TWallet, TConnection>(
        &mut self,
        agent: &Agent<TTransport, TWallet, TConnection>,
        message: &ParsedMessage,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TConnection: ConnectionChannel,
    {
        let metadata = self
            .request_metadata
            .clone()
            .ok_or(PairwiseError::NotReady(
                "credential request metadata is missing".to_string(),
            ))?;

        let (content, please_ack) = match message.kind {
            MessageKind::LegacyCredential => {
                let issued: LegacyCredential = message.decode()?;
                let claim_id = match &self.offer {
                    OfferPayload::Legacy { offer, .. } => offer.claim_id.clone(),
                    OfferPayload::Aries(_) => self.thread_id.clone(),
                };

                if issued.claim_offer_id != claim_id {
                    return Err(PairwiseError::InvalidState(format!(
                        "credential answers another offer: {}",
                        issued.claim_offer_id
                    )));
                }

                let content: Value = serde_json::from_str(&issued.libindy_cred)
                    .map_err(|err| PairwiseError::InvalidJson(err.to_string()))?;
                (content, false)
            }
            _ => {
                let issued: CredentialIssued = message.decode()?;
                (issued.credential_content()?, issued.please_ack.is_some())
            }
        };

        let credential_id = agent
            .wallet
            .store_credential(metadata, content.clone())
            .await?;

        if credential_id.is_empty() {
            return Err(PairwiseError::EmptyResponse(
                "wallet returned an empty credential id".to_string(),
            ));
        }

        // the ack is best effort once the wallet holds the credential
        if please_ack {
            if let Err(err) = self.send_ack(&agent.transport).await {
                warn!(
                    "[credential:store] unable to ack credential, source_id: {}, err: {}",
                    self.source_id, err
                );
            }
        }

        info!(
            "[credential:store] source_id: {}, credential_id: {}",
            self.source_id, credential_id
        );

        self.credential = Some(content);
        self.credential_id = Some(credential_id);
        self.update_state(State::Accepted);
        Ok(())
    }

    async fn send_ack<TTransport: TransportBuilder>(
        &self,
        transport: &TTransport,
    ) -> Result<(), PairwiseError> {
        let CompletedConnection {
            pairwise_verkey,
            destination,
            ..
        } = self.require_connection()?.clone();

        let ack = Ack::new(
            MessageKind::CredentialAck,
            Thread::new().with_thid(self.thread_id.clone()),
        );

        transport
            .send(pairwise_verkey, to_message_value(&ack)?, destination)
            .await
    }

    /// Applies a routed action, the caller already checked ownership and ordering
    pub(crate) async fn apply<TTransport, TWallet, TConnection>(
        &mut self,
        agent: &Agent<TTransport, TWallet, TConnection>,
        action: Action,
        message: &ParsedMessage,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TConnection: ConnectionChannel,
    {
        debug!(
            "[credential:apply] source_id: {}, action: {:?}, kind: {:?}",
            self.source_id, action, message.kind
        );

        match action {
            Action::Store => self.store(agent, message).await?,
            Action::Reset => {
                let protocol = self.protocol.unwrap_or(Protocol::Proprietary);
                if let Some(Directive::Reset) = problem_report::handle(protocol, self, message)? {
                    self.update_state(State::None)
                }
            }
        }

        let on_thread = message.thread_id().as_deref() == Some(self.thread_id.as_str());
        let order = if on_thread {
            message.sender_order()
        } else {
            None
        };

        self.log.mark_applied(message.message_id(), order);
        Ok(())
    }

    /// Downloads the exchange's messages and applies the first one with a transition
    pub(crate) async fn poll<TTransport, TWallet, TConnection>(
        &mut self,
        agent: &Agent<TTransport, TWallet, TConnection>,
    ) -> Result<(), PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TConnection: ConnectionChannel,
    {
        if self.state != State::OfferSent {
            return Ok(());
        }

        let pairwise_did = self.require_connection()?.pairwise_did.clone();
        let messages = agent
            .transport
            .poll_inbound(pairwise_did.clone(), Some(self.thread_id.clone()))
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
                                "[credential:poll] drop message that failed to apply: {:?}, err: {}",
                                message.kind, err
                            );
                            self.log.mark_seen(message.message_id());
                            reviewed.extend(message.uid.clone());
                        }
                    }
                }
                Decision::Duplicate => reviewed.extend(message.uid.clone()),
                Decision::Premature(kind) => {
                    debug!("[credential:poll] skip premature message: {:?}", kind)
                }
                Decision::Stale { last, received } => warn!(
                    "[credential:poll] skip stale message, last applied: {}, received: {}",
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
                warn!("[credential:poll] unable to mark messages reviewed: {}", err)
            }
        }

        Ok(())
    }

    /// Applies a pushed message, returns whether a transition was taken
    pub(crate) async fn receive<TTransport, TWallet, TConnection>(
        &mut self,
        agent: &Agent<TTransport, TWallet, TConnection>,
        message: &ParsedMessage,
    ) -> Result<bool, PairwiseError>
    where
        TTransport: TransportBuilder,
        TWallet: WalletBuilder,
        TConnection: ConnectionChannel,
    {
        if !self.owns(message) {
            debug!(
                "[credential:receive] message not owned, source_id: {}",
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
}
