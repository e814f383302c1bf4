use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::{self, Value};
use rst_common::with_logging::log::{debug, info, warn};

use super::connection::Connection;
use super::machine::Agent;
use super::types::{
    CompletedConnection, ConnectOptionsParams, ConnectionAPI, ConnectionChannel,
    InviteActionData, OutofbandOptions, PairwiseInfo, RemoteInfo, SendMessageOptions, State,
    UsecaseBuilder,
};
use crate::invitation::{codec, Invitation};
use crate::messages::ParsedMessage;
use crate::problem_report::ProblemReport;
use crate::registry::{Handle, Registry};
use crate::types::{
    require_bytes, require_key, LedgerBuilder, PairwiseError, Protocol, RetainedError, Role,
    Settings, TransportBuilder, WalletBuilder,
};

/// `Usecase` is the registry backed implementation of [`ConnectionAPI`]
///
/// Live connections are owned by the inner [`Registry`]. Cloning a usecase shares
/// the registry, so every clone sees the same handles.
#[derive(Clone)]
pub struct Usecase<TTransport, TWallet, TLedger>
where
    TTransport: TransportBuilder,
    TWallet: WalletBuilder,
    TLedger: LedgerBuilder,
{
    settings: Settings,
    connections: Registry<Connection>,
    transport: TTransport,
    wallet: TWallet,
    ledger: TLedger,
}

impl<TTransport, TWallet, TLedger> Usecase<TTransport, TWallet, TLedger>
where
    TTransport: TransportBuilder,
    TWallet: WalletBuilder,
    TLedger: LedgerBuilder,
{
    pub fn new(settings: Settings, transport: TTransport, wallet: TWallet, ledger: TLedger) -> Self {
        Self {
            settings,
            connections: Registry::new(),
            transport,
            wallet,
            ledger,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn agent(&self) -> Agent<'_, TTransport, TWallet, TLedger> {
        Agent {
            settings: &self.settings,
            transport: self.transport(),
            wallet: self.wallet(),
            ledger: self.ledger(),
        }
    }

    fn require_aries(&self, action: &str) -> Result<(), PairwiseError> {
        if self.settings.protocol() != Protocol::Aries {
            return Err(PairwiseError::ActionNotSupported(format!(
                "{} requires the aries protocol",
                action
            )));
        }

        Ok(())
    }
}

impl<TTransport, TWallet, TLedger> UsecaseBuilder<Connection>
    for Usecase<TTransport, TWallet, TLedger>
where
    TTransport: TransportBuilder,
    TWallet: WalletBuilder,
    TLedger: LedgerBuilder,
{
    type TransportImplementer = TTransport;
    type WalletImplementer = TWallet;
    type LedgerImplementer = TLedger;

    fn transport(&self) -> Self::TransportImplementer {
        self.transport.clone()
    }

    fn wallet(&self) -> Self::WalletImplementer {
        self.wallet.clone()
    }

    fn ledger(&self) -> Self::LedgerImplementer {
        self.ledger.clone()
    }
}

#[async_trait]
impl<TTransport, TWallet, TLedger> ConnectionChannel for Usecase<TTransport, TWallet, TLedger>
where
    TTransport: TransportBuilder,
    TWallet: WalletBuilder,
    TLedger: LedgerBuilder,
{
    async fn get_pairwise_info(&self, handle: Handle) -> Result<PairwiseInfo, PairwiseError> {
        self.connections
            .read(handle, |connection| Ok(connection.to_pairwise_info()))
            .await
    }

    async fn get_completed_connection(
        &self,
        handle: Handle,
    ) -> Result<CompletedConnection, PairwiseError> {
        self.connections
            .read(handle, |connection| connection.to_completed(handle))
            .await
    }

    async fn send_message(
        &self,
        handle: Handle,
        message: String,
        options: SendMessageOptions,
    ) -> Result<String, PairwiseError> {
        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let mut draft = guard.clone();
        let id = draft
            .send_message(&self.transport(), message, options)
            .await?;

        *guard = draft;
        debug!("[connection:send_message] sent message: {}", id);
        Ok(id)
    }
}

#[async_trait]
impl<TTransport, TWallet, TLedger> ConnectionAPI for Usecase<TTransport, TWallet, TLedger>
where
    TTransport: TransportBuilder,
    TWallet: WalletBuilder,
    TLedger: LedgerBuilder,
{
    type EntityAccessor = Connection;

    async fn create(&self, source_id: String) -> Result<Handle, PairwiseError> {
        let connection = Connection::new(
            source_id,
            self.settings.protocol(),
            Role::Inviter,
            State::Initialized,
        );

        let handle = self.connections.insert(connection).await?;
        info!("[connection:create] handle: {}", u32::from(handle));
        Ok(handle)
    }

    async fn create_with_invite(
        &self,
        source_id: String,
        invite: String,
    ) -> Result<Handle, PairwiseError> {
        let invitation = codec::decode(&invite)?;

        let connection = match &invitation {
            Invitation::Legacy(detail) => {
                let mut connection = Connection::new(
                    source_id,
                    Protocol::Proprietary,
                    Role::Invitee,
                    State::RequestReceived,
                );

                let sender = &detail.sender_detail;
                let agency = &detail.sender_agency_detail;
                connection.set_remote(RemoteInfo {
                    did: Some(sender.did.clone()),
                    verkey: sender.verkey.clone(),
                    endpoint: agency.endpoint.clone(),
                    routing_keys: vec![agency.verkey.clone()],
                    public_did: sender.public_did.clone(),
                    label: sender.name.clone(),
                })?;

                connection.thread_id = Some(
                    detail
                        .thread_id
                        .clone()
                        .unwrap_or_else(|| detail.conn_req_id.clone()),
                );
                connection
            }
            Invitation::Aries(_) => Connection::new(
                source_id,
                Protocol::Aries,
                Role::Invitee,
                State::OfferSent,
            ),
            Invitation::OutOfBand(_) => {
                return Err(PairwiseError::ActionNotSupported(
                    "out-of-band invitations are accepted with create_with_outofband_invite"
                        .to_string(),
                ))
            }
        };

        let handle = self
            .connections
            .insert(connection.with_invitation(invitation))
            .await?;

        info!("[connection:create_with_invite] handle: {}", u32::from(handle));
        Ok(handle)
    }

    async fn accept_invite(
        &self,
        source_id: String,
        invite: String,
        options: Option<ConnectOptionsParams>,
    ) -> Result<Handle, RetainedError> {
        let handle = self.create_with_invite(source_id, invite).await?;
        if let Err(err) = self.connect(handle, options).await {
            warn!(
                "[connection:accept_invite] connect failed, connection kept with handle: {}, error: {}",
                u32::from(handle),
                err
            );
            return Err(RetainedError::retained(handle, err));
        }

        info!("[connection:accept_invite] handle: {}", u32::from(handle));
        Ok(handle)
    }

    async fn create_outofband(
        &self,
        source_id: String,
        options: OutofbandOptions,
    ) -> Result<Handle, PairwiseError> {
        self.require_aries("out-of-band invitation")?;

        if !options.handshake && options.request_attach.is_none() {
            return Err(PairwiseError::InvalidOption(
                "out-of-band invitation needs a handshake or a request attachment".to_string(),
            ));
        }

        let attachment = options
            .request_attach
            .map(|raw| {
                serde_json::from_str::<Value>(&raw)
                    .map_err(|err| PairwiseError::InvalidJson(err.to_string()))
            })
            .transpose()?;

        let key = require_key(self.wallet().create_pairwise_key().await?)?;
        let invitation = Connection::build_outofband(
            &self.settings,
            &key,
            options.goal_code,
            options.goal,
            options.handshake,
            attachment,
        );

        let state = if options.handshake {
            State::Initialized
        } else {
            State::Accepted
        };

        let mut connection = Connection::new(source_id, Protocol::Aries, Role::Inviter, state)
            .with_invitation(Invitation::OutOfBand(invitation));
        connection.pairwise = Some(key);
        connection.one_time = !options.handshake;

        let handle = self.connections.insert(connection).await?;
        info!(
            "[connection:create_outofband] handle: {}, state: {}",
            u32::from(handle),
            state
        );
        Ok(handle)
    }

    async fn create_with_outofband_invite(
        &self,
        source_id: String,
        invite: String,
    ) -> Result<Handle, PairwiseError> {
        self.require_aries("out-of-band invitation")?;

        let invitation = codec::decode_outofband(&invite)?;
        if invitation.has_handshake() {
            let connection =
                Connection::new(source_id, Protocol::Aries, Role::Invitee, State::OfferSent)
                    .with_invitation(Invitation::OutOfBand(invitation));

            let handle = self.connections.insert(connection).await?;
            info!(
                "[connection:create_with_outofband_invite] handle: {}, handshake",
                u32::from(handle)
            );
            return Ok(handle);
        }

        let label = invitation.label.clone();
        let mut connection =
            Connection::new(source_id, Protocol::Aries, Role::Invitee, State::Accepted)
                .with_invitation(Invitation::OutOfBand(invitation));

        let destination = connection
            .resolve_invitation_service(&self.ledger())
            .await?;
        connection.ensure_pairwise_key(&self.wallet()).await?;
        connection.set_remote(RemoteInfo::from_destination(destination.clone(), label))?;
        connection.invitation_service = Some(destination);
        connection.one_time = true;

        let handle = self.connections.insert(connection).await?;
        info!(
            "[connection:create_with_outofband_invite] handle: {}, one-time",
            u32::from(handle)
        );
        Ok(handle)
    }

    async fn connect(
        &self,
        handle: Handle,
        options: Option<ConnectOptionsParams>,
    ) -> Result<Option<String>, PairwiseError> {
        let options = options
            .unwrap_or_default()
            .merge(self.settings.connect_defaults());

        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let agent = self.agent();
        let mut draft = guard.clone();
        let invitation = draft.connect(&agent, options).await?;

        *guard = draft;
        Ok(invitation)
    }

    async fn update_state(&self, handle: Handle) -> Result<State, PairwiseError> {
        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let agent = self.agent();
        let mut draft = guard.clone();
        draft.poll(&agent).await?;

        let state = draft.state;
        *guard = draft;
        Ok(state)
    }

    async fn update_state_with_message(
        &self,
        handle: Handle,
        message: String,
    ) -> Result<State, PairwiseError> {
        let message = ParsedMessage::from_str(&message)?;

        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let agent = self.agent();
        let mut draft = guard.clone();
        draft.receive(&agent, &message).await?;

        let state = draft.state;
        *guard = draft;
        Ok(state)
    }

    async fn route_message(
        &self,
        message: String,
    ) -> Result<Option<(Handle, State)>, PairwiseError> {
        let message = ParsedMessage::from_str(&message)?;
        let agent = self.agent();

        for handle in self.connections.handles().await {
            let object = match self.connections.get(handle).await {
                Ok(object) => object,
                Err(_) => continue,
            };

            let mut guard = object.lock().await;
            if !guard.owns(&message) {
                continue;
            }

            let mut draft = guard.clone();
            draft.receive(&agent, &message).await?;

            let state = draft.state;
            *guard = draft;

            debug!(
                "[connection:route_message] routed to handle: {}",
                u32::from(handle)
            );
            return Ok(Some((handle, state)));
        }

        Ok(None)
    }

    async fn send_ping(
        &self,
        handle: Handle,
        comment: Option<String>,
    ) -> Result<(), PairwiseError> {
        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let mut draft = guard.clone();
        draft.send_ping(&self.transport(), comment).await?;

        *guard = draft;
        Ok(())
    }

    async fn send_discovery_features(
        &self,
        handle: Handle,
        query: Option<String>,
        comment: Option<String>,
    ) -> Result<(), PairwiseError> {
        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let mut draft = guard.clone();
        draft
            .send_discovery_features(&self.transport(), query, comment)
            .await?;

        *guard = draft;
        Ok(())
    }

    async fn send_reuse(&self, handle: Handle, invite: String) -> Result<(), PairwiseError> {
        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let mut draft = guard.clone();
        draft.send_reuse(&self.transport(), &invite).await?;

        *guard = draft;
        Ok(())
    }

    async fn send_answer(
        &self,
        handle: Handle,
        question: String,
        answer: String,
    ) -> Result<(), PairwiseError> {
        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let mut draft = guard.clone();
        draft
            .send_answer(&self.transport(), &self.wallet(), &question, &answer)
            .await?;

        *guard = draft;
        Ok(())
    }

    async fn send_invite_action(
        &self,
        handle: Handle,
        data: InviteActionData,
    ) -> Result<String, PairwiseError> {
        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let mut draft = guard.clone();
        let sent = draft.send_invite_action(&self.transport(), data).await?;

        *guard = draft;
        Ok(sent)
    }

    async fn sign_data(&self, handle: Handle, data: Vec<u8>) -> Result<Vec<u8>, PairwiseError> {
        let key = self
            .connections
            .read(handle, |connection| Ok(connection.pairwise_key()?.clone()))
            .await?;

        let signature = self.wallet().sign(key.verkey, data).await?;
        require_bytes(signature, "signature")
    }

    async fn verify_signature(
        &self,
        handle: Handle,
        data: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<bool, PairwiseError> {
        let their_verkey = self
            .connections
            .read(handle, |connection| {
                connection
                    .remote
                    .as_ref()
                    .map(|remote| remote.verkey.clone())
                    .ok_or(PairwiseError::NotReady(
                        "remote party is not known yet".to_string(),
                    ))
            })
            .await?;

        self.wallet().verify(their_verkey, data, signature).await
    }

    async fn redirect(&self, handle: Handle, existing: Handle) -> Result<(), PairwiseError> {
        if handle == existing {
            return Err(PairwiseError::InvalidState(
                "connection cannot be redirected to itself".to_string(),
            ));
        }

        let existing = self.connections.snapshot(existing).await?;

        let object = self.connections.get(handle).await?;
        let mut guard = object.lock().await;

        let agent = self.agent();
        let mut draft = guard.clone();
        draft.redirect(&agent, &existing).await?;

        *guard = draft;
        Ok(())
    }

    async fn get_redirect_details(&self, handle: Handle) -> Result<String, PairwiseError> {
        self.connections
            .read(handle, |connection| {
                let redirect = connection.get_redirect().ok_or(PairwiseError::NotReady(
                    "connection was not redirected".to_string(),
                ))?;

                serde_json::to_string(&redirect)
                    .map_err(|err| PairwiseError::SerializeError(err.to_string()))
            })
            .await
    }

    async fn delete(&self, handle: Handle) -> Result<(), PairwiseError> {
        let object = self.connections.remove(handle).await?;
        let mut guard = object.lock().await;
        guard.update_state(State::None);

        info!("[connection:delete] handle: {}", u32::from(handle));
        Ok(())
    }

    async fn get_state(&self, handle: Handle) -> Result<State, PairwiseError> {
        self.connections
            .read(handle, |connection| Ok(connection.state))
            .await
    }

    async fn get_source_id(&self, handle: Handle) -> Result<String, PairwiseError> {
        self.connections
            .read(handle, |connection| Ok(connection.source_id.clone()))
            .await
    }

    async fn get_thread_id(&self, handle: Handle) -> Result<Option<String>, PairwiseError> {
        self.connections
            .read(handle, |connection| Ok(connection.thread_id.clone()))
            .await
    }

    async fn get_invite_details(
        &self,
        handle: Handle,
        abbreviated: bool,
    ) -> Result<String, PairwiseError> {
        self.connections
            .read(handle, |connection| match &connection.invitation {
                Some(invitation) => codec::encode(invitation, abbreviated),
                None => Err(PairwiseError::NotReady(
                    "connection has no invitation yet".to_string(),
                )),
            })
            .await
    }

    async fn get_problem_report(
        &self,
        handle: Handle,
    ) -> Result<Option<ProblemReport>, PairwiseError> {
        self.connections
            .read(handle, |connection| Ok(connection.problem_report.clone()))
            .await
    }

    async fn get_remote_protocols(&self, handle: Handle) -> Result<Vec<String>, PairwiseError> {
        self.connections
            .read(handle, |connection| Ok(connection.get_remote_protocols()))
            .await
    }

    async fn get_connection(&self, handle: Handle) -> Result<Self::EntityAccessor, PairwiseError> {
        self.connections.snapshot(handle).await
    }

    async fn list_connections(&self) -> Result<Vec<(Handle, PairwiseInfo)>, PairwiseError> {
        let mut connections = Vec::new();
        for handle in self.connections.handles().await {
            match self.get_pairwise_info(handle).await {
                Ok(info) => connections.push((handle, info)),
                Err(PairwiseError::InvalidHandle(_)) => continue,
                Err(err) => return Err(err),
            }
        }

        Ok(connections)
    }

    async fn serialize(&self, handle: Handle) -> Result<String, PairwiseError> {
        self.connections
            .read(handle, |connection| connection.to_snapshot())
            .await
    }

    async fn deserialize(&self, data: String) -> Result<Handle, PairwiseError> {
        let connection = Connection::from_snapshot(&data)?;
        let handle = self.connections.insert(connection).await?;

        debug!("[connection:deserialize] handle: {}", u32::from(handle));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    use rst_common::standard::serde_json::json;
    use rst_common::with_tokio::tokio;

    use crate::connection::ConnectionEntityAccessor;
    use crate::messages::MessageKind;
    use crate::types::{
        AgencyInfo, Destination, InboundMessage, PairwiseKey, ServiceEndpoint,
        CredentialRequestData,
    };

    mock!(
        FakeTransport{}

        impl Clone for FakeTransport {
            fn clone(&self) -> Self;
        }

        #[async_trait]
        impl TransportBuilder for FakeTransport {
            async fn send(
                &self,
                sender_verkey: String,
                message: Value,
                destination: Destination,
            ) -> Result<(), PairwiseError>;

            async fn poll_inbound(
                &self,
                pairwise_did: String,
                thread_id: Option<String>,
            ) -> Result<Vec<InboundMessage>, PairwiseError>;

            async fn update_message_status(
                &self,
                pairwise_did: String,
                uids: Vec<String>,
            ) -> Result<(), PairwiseError>;
        }
    );

    mock!(
        FakeWallet{}

        impl Clone for FakeWallet {
            fn clone(&self) -> Self;
        }

        #[async_trait]
        impl WalletBuilder for FakeWallet {
            async fn create_pairwise_key(&self) -> Result<PairwiseKey, PairwiseError>;
            async fn sign(&self, verkey: String, data: Vec<u8>) -> Result<Vec<u8>, PairwiseError>;
            async fn verify(
                &self,
                verkey: String,
                data: Vec<u8>,
                signature: Vec<u8>,
            ) -> Result<bool, PairwiseError>;
            async fn create_credential_request(
                &self,
                prover_did: String,
                offer: Value,
            ) -> Result<CredentialRequestData, PairwiseError>;
            async fn store_credential(
                &self,
                request_metadata: Value,
                credential: Value,
            ) -> Result<String, PairwiseError>;
        }
    );

    mock!(
        FakeLedger{}

        impl Clone for FakeLedger {
            fn clone(&self) -> Self;
        }

        #[async_trait]
        impl LedgerBuilder for FakeLedger {
            async fn resolve_service_endpoint(&self, did: String)
                -> Result<ServiceEndpoint, PairwiseError>;
        }
    );

    type Outbox = Arc<StdMutex<Vec<(Value, Destination)>>>;
    type Inbox = Arc<StdMutex<Vec<InboundMessage>>>;

    struct Peer {
        usecase: Usecase<MockFakeTransport, MockFakeWallet, MockFakeLedger>,
        outbox: Outbox,
        inbox: Inbox,
    }

    impl Peer {
        fn sent(&self) -> Vec<Value> {
            self.outbox
                .lock()
                .unwrap()
                .iter()
                .map(|(message, _)| message.clone())
                .collect()
        }

        fn last_sent(&self) -> (Value, Destination) {
            self.outbox.lock().unwrap().last().cloned().unwrap()
        }

        fn deliver(&self, uid: &str, message: Value) {
            self.inbox
                .lock()
                .unwrap()
                .push(InboundMessage::new(uid.to_string(), None, message));
        }
    }

    fn fake_signature(verkey: &str, data: &[u8]) -> Vec<u8> {
        let mut signature = verkey.as_bytes().to_vec();
        signature.extend((data.len() as u64).to_be_bytes());
        signature
    }

    fn fake_transport(outbox: Outbox, inbox: Inbox, fail: bool) -> MockFakeTransport {
        let mut transport = MockFakeTransport::new();
        transport.expect_clone().returning(move || {
            let outbox = outbox.clone();
            let inbox = inbox.clone();

            let mut expected = MockFakeTransport::new();
            expected
                .expect_send()
                .returning(move |_, message, destination| {
                    if fail {
                        return Err(PairwiseError::TransportError("agency is down".to_string()));
                    }

                    outbox.lock().unwrap().push((message, destination));
                    Ok(())
                });

            expected
                .expect_poll_inbound()
                .returning(move |_, _| Ok(inbox.lock().unwrap().clone()));

            expected
                .expect_update_message_status()
                .returning(|_, _| Ok(()));

            expected
        });

        transport
    }

    fn fake_wallet(owner: &'static str) -> MockFakeWallet {
        let counter = Arc::new(AtomicU32::new(0));

        let mut wallet = MockFakeWallet::new();
        wallet.expect_clone().returning(move || {
            let counter = counter.clone();

            let mut expected = MockFakeWallet::new();
            expected.expect_create_pairwise_key().returning(move || {
                let next = counter.fetch_add(1, Ordering::SeqCst);
                Ok(PairwiseKey::new(
                    format!("did-{}-{}", owner, next),
                    format!("verkey-{}-{}", owner, next),
                ))
            });

            expected
                .expect_sign()
                .returning(|verkey, data| Ok(fake_signature(&verkey, &data)));

            expected
                .expect_verify()
                .returning(|verkey, data, signature| Ok(fake_signature(&verkey, &data) == signature));

            expected
        });

        wallet
    }

    fn fake_ledger() -> MockFakeLedger {
        let mut ledger = MockFakeLedger::new();
        ledger.expect_clone().returning(|| {
            let mut expected = MockFakeLedger::new();
            expected.expect_resolve_service_endpoint().returning(|did| {
                Ok(ServiceEndpoint {
                    endpoint: "http://ledger.local/agent".to_string(),
                    recipient_keys: vec![format!("verkey-of-{}", did)],
                    routing_keys: vec![],
                })
            });

            expected
        });

        ledger
    }

    fn generate_peer(owner: &'static str, protocol: Protocol, fail: bool) -> Peer {
        let outbox: Outbox = Arc::new(StdMutex::new(Vec::new()));
        let inbox: Inbox = Arc::new(StdMutex::new(Vec::new()));

        let settings = Settings::new(protocol, owner.to_string())
            .with_public_did(Some(format!("did-public-{}", owner)))
            .with_agency(AgencyInfo::new(
                format!("did-agency-{}", owner),
                format!("verkey-agency-{}", owner),
                format!("http://agency.local/{}", owner),
            ));

        let usecase = Usecase::new(
            settings,
            fake_transport(outbox.clone(), inbox.clone(), fail),
            fake_wallet(owner),
            fake_ledger(),
        );

        Peer {
            usecase,
            outbox,
            inbox,
        }
    }

    async fn aries_accepted_pair() -> (Peer, Handle, Peer, Handle) {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let bob = generate_peer("bob", Protocol::Aries, false);

        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        let invite = alice.usecase.connect(inviter, None).await.unwrap().unwrap();

        let invitee = bob
            .usecase
            .create_with_invite("alice".to_string(), invite)
            .await
            .unwrap();
        bob.usecase.connect(invitee, None).await.unwrap();

        let (request, _) = bob.last_sent();
        alice
            .usecase
            .update_state_with_message(inviter, request.to_string())
            .await
            .unwrap();

        let (response, _) = alice.last_sent();
        bob.usecase
            .update_state_with_message(invitee, response.to_string())
            .await
            .unwrap();

        let (ack, _) = bob.last_sent();
        alice.deliver("uid-ack", ack);
        alice.usecase.update_state(inviter).await.unwrap();

        (alice, inviter, bob, invitee)
    }

    #[tokio::test]
    async fn test_create_initial_states() {
        let alice = generate_peer("alice", Protocol::Aries, false);

        let handle = alice.usecase.create("bob".to_string()).await;
        assert!(handle.is_ok());

        let handle = handle.unwrap();
        assert_eq!(alice.usecase.get_state(handle).await.unwrap(), State::Initialized);
        assert_eq!(
            alice.usecase.get_source_id(handle).await.unwrap(),
            "bob".to_string()
        );
        assert!(alice.sent().is_empty())
    }

    #[tokio::test]
    async fn test_aries_handshake() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let bob = generate_peer("bob", Protocol::Aries, false);

        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        let invite = alice.usecase.connect(inviter, None).await;
        assert!(invite.is_ok());
        assert_eq!(alice.usecase.get_state(inviter).await.unwrap(), State::OfferSent);

        let invite = invite.unwrap();
        assert!(invite.is_some());

        let invitee = bob
            .usecase
            .create_with_invite("alice".to_string(), invite.unwrap())
            .await
            .unwrap();
        assert_eq!(bob.usecase.get_state(invitee).await.unwrap(), State::OfferSent);

        let connected = bob.usecase.connect(invitee, None).await;
        assert_eq!(connected, Ok(None));
        assert_eq!(
            bob.usecase.get_state(invitee).await.unwrap(),
            State::RequestReceived
        );

        let (request, destination) = bob.last_sent();
        assert_eq!(
            MessageKind::from_tag(request["@type"].as_str().unwrap()),
            MessageKind::ConnectionRequest
        );
        assert_eq!(destination.endpoint, "http://agency.local/alice".to_string());

        let state = alice
            .usecase
            .update_state_with_message(inviter, request.to_string())
            .await;
        assert_eq!(state, Ok(State::RequestReceived));

        let (response, _) = alice.last_sent();
        assert_eq!(response["~thread"]["thid"], request["@id"]);

        let state = bob
            .usecase
            .update_state_with_message(invitee, response.to_string())
            .await;
        assert_eq!(state, Ok(State::Accepted));

        let (ack, _) = bob.last_sent();
        alice.deliver("uid-ack", ack);

        let state = alice.usecase.update_state(inviter).await;
        assert_eq!(state, Ok(State::Accepted));

        let alice_info = alice.usecase.get_pairwise_info(inviter).await.unwrap();
        let bob_info = bob.usecase.get_pairwise_info(invitee).await.unwrap();
        assert_eq!(alice_info.their_did, bob_info.pairwise_did);
        assert_eq!(bob_info.their_did, alice_info.pairwise_did);
        assert_eq!(alice_info.thread_id, bob_info.thread_id)
    }

    #[tokio::test]
    async fn test_accepted_ping_self_loop() {
        let (alice, inviter, bob, invitee) = aries_accepted_pair().await;
        let sent_before = alice.sent().len();

        let ping = bob.usecase.send_ping(invitee, Some("hello".to_string())).await;
        assert!(ping.is_ok());

        let (ping, _) = bob.last_sent();
        let state = alice
            .usecase
            .update_state_with_message(inviter, ping.to_string())
            .await;
        assert_eq!(state, Ok(State::Accepted));

        let sent = alice.sent();
        assert_eq!(sent.len(), sent_before + 1);

        let pong = sent.last().unwrap();
        assert_eq!(
            MessageKind::from_tag(pong["@type"].as_str().unwrap()),
            MessageKind::PingResponse
        );
        assert_eq!(pong["~thread"]["thid"], ping["@id"]);

        let replay = alice
            .usecase
            .update_state_with_message(inviter, ping.to_string())
            .await;
        assert_eq!(replay, Ok(State::Accepted));
        assert_eq!(alice.sent().len(), sent_before + 1)
    }

    #[tokio::test]
    async fn test_discovery_records_remote_protocols() {
        let (alice, inviter, bob, invitee) = aries_accepted_pair().await;

        bob.usecase
            .send_discovery_features(invitee, None, None)
            .await
            .unwrap();

        let (query, _) = bob.last_sent();
        alice
            .usecase
            .update_state_with_message(inviter, query.to_string())
            .await
            .unwrap();

        let (disclose, _) = alice.last_sent();
        let state = bob
            .usecase
            .update_state_with_message(invitee, disclose.to_string())
            .await;
        assert_eq!(state, Ok(State::Accepted));

        let protocols = bob.usecase.get_remote_protocols(invitee).await.unwrap();
        assert!(protocols.contains(&"https://didcomm.org/connections/1.0".to_string()))
    }

    #[tokio::test]
    async fn test_premature_message_rejected() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        alice.usecase.connect(inviter, None).await.unwrap();

        let ack = json!({
            "@type": "https://didcomm.org/notification/1.0/ack",
            "@id": "ack-1",
            "status": "OK"
        });

        let state = alice
            .usecase
            .update_state_with_message(inviter, ack.to_string())
            .await;
        assert!(matches!(state, Err(PairwiseError::InvalidState(_))));
        assert_eq!(alice.usecase.get_state(inviter).await.unwrap(), State::OfferSent)
    }

    #[tokio::test]
    async fn test_foreign_thread_is_not_routed() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let first = alice.usecase.create("bob".to_string()).await.unwrap();
        let second = alice.usecase.create("carol".to_string()).await.unwrap();
        alice.usecase.connect(first, None).await.unwrap();
        alice.usecase.connect(second, None).await.unwrap();

        let report = json!({
            "@type": "https://didcomm.org/report-problem/1.0/problem-report",
            "@id": "report-1",
            "description": {"code": "request_not_accepted"},
            "~thread": {"thid": "thread-owned-by-nobody"}
        });

        let routed = alice.usecase.route_message(report.to_string()).await;
        assert_eq!(routed, Ok(None));

        let ack = json!({
            "@type": "https://didcomm.org/notification/1.0/ack",
            "@id": "ack-1",
            "status": "OK",
            "~thread": {"thid": "thread-owned-by-nobody"}
        });

        let routed = alice.usecase.route_message(ack.to_string()).await;
        assert_eq!(routed, Ok(None));

        for handle in [first, second] {
            assert_eq!(alice.usecase.get_state(handle).await.unwrap(), State::OfferSent);
            assert!(alice.usecase.get_problem_report(handle).await.unwrap().is_none())
        }
    }

    #[tokio::test]
    async fn test_poll_skips_message_that_fails_to_apply() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let bob = generate_peer("bob", Protocol::Aries, false);

        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        let invite = alice.usecase.connect(inviter, None).await.unwrap().unwrap();

        let invitee = bob
            .usecase
            .create_with_invite("alice".to_string(), invite)
            .await
            .unwrap();
        bob.usecase.connect(invitee, None).await.unwrap();

        let malformed = json!({
            "@type": "https://didcomm.org/connections/1.0/request",
            "@id": "request-malformed",
            "label": "mallory",
            "connection": "not a connection"
        });
        alice.deliver("uid-malformed", malformed);

        let (request, _) = bob.last_sent();
        alice.deliver("uid-request", request);

        let state = alice.usecase.update_state(inviter).await;
        assert_eq!(state, Ok(State::RequestReceived));

        let info = alice.usecase.get_pairwise_info(inviter).await.unwrap();
        assert_eq!(info.their_did, bob.usecase.get_pairwise_info(invitee).await.unwrap().pairwise_did);

        let again = alice.usecase.update_state(inviter).await;
        assert_eq!(again, Ok(State::RequestReceived))
    }

    #[tokio::test]
    async fn test_accept_invite() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let bob = generate_peer("bob", Protocol::Aries, false);

        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        let invite = alice.usecase.connect(inviter, None).await.unwrap().unwrap();

        let invitee = bob
            .usecase
            .accept_invite("alice".to_string(), invite, None)
            .await;
        assert!(invitee.is_ok());

        let invitee = invitee.unwrap();
        assert_eq!(
            bob.usecase.get_state(invitee).await.unwrap(),
            State::RequestReceived
        );

        let (request, _) = bob.last_sent();
        assert_eq!(
            MessageKind::from_tag(request["@type"].as_str().unwrap()),
            MessageKind::ConnectionRequest
        );

        let invalid = bob
            .usecase
            .accept_invite("alice".to_string(), "{not json".to_string(), None)
            .await;
        assert!(invalid.is_err());

        let err = invalid.unwrap_err();
        assert!(matches!(err.source, PairwiseError::InvalidJson(_)));
        assert!(err.handle.is_none())
    }

    #[tokio::test]
    async fn test_accept_invite_keeps_connection_on_failed_connect() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let bob = generate_peer("bob", Protocol::Aries, true);

        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        let invite = alice.usecase.connect(inviter, None).await.unwrap().unwrap();

        let accepted = bob
            .usecase
            .accept_invite("alice".to_string(), invite, None)
            .await;
        assert!(accepted.is_err());

        let err = accepted.unwrap_err();
        assert!(matches!(err.source, PairwiseError::TransportError(_)));
        assert!(err.handle.is_some());

        let handle = err.handle.unwrap();
        assert_eq!(bob.usecase.get_state(handle).await.unwrap(), State::OfferSent);
        assert!(bob.usecase.serialize(handle).await.is_ok());

        let deleted = bob.usecase.delete(handle).await;
        assert!(deleted.is_ok());
        assert!(matches!(
            bob.usecase.get_state(handle).await,
            Err(PairwiseError::InvalidHandle(_))
        ))
    }

    #[tokio::test]
    async fn test_problem_report_resets() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        alice.usecase.connect(inviter, None).await.unwrap();

        let report = json!({
            "@type": "https://didcomm.org/connections/1.0/problem_report",
            "@id": "report-1",
            "problem-code": "request_not_accepted",
            "explain": "no thanks"
        });

        let state = alice
            .usecase
            .update_state_with_message(inviter, report.to_string())
            .await;
        assert_eq!(state, Ok(State::None));

        let stored = alice.usecase.get_problem_report(inviter).await.unwrap();
        assert!(stored.is_some());

        let stored = stored.unwrap();
        assert_eq!(stored.get_code(), "request_not_accepted");
        assert_eq!(stored.get_comment(), Some("no thanks".to_string()))
    }

    #[tokio::test]
    async fn test_failed_connect_does_not_commit() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let bob = generate_peer("bob", Protocol::Aries, true);

        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        let invite = alice.usecase.connect(inviter, None).await.unwrap().unwrap();

        let invitee = bob
            .usecase
            .create_with_invite("alice".to_string(), invite)
            .await
            .unwrap();

        let connected = bob.usecase.connect(invitee, None).await;
        assert!(matches!(connected, Err(PairwiseError::TransportError(_))));

        let info = bob.usecase.get_pairwise_info(invitee).await.unwrap();
        assert_eq!(info.state, State::OfferSent);
        assert!(info.pairwise_did.is_none());
        assert!(info.thread_id.is_none())
    }

    #[tokio::test]
    async fn test_proprietary_rejects_aries_actions() {
        let alice = generate_peer("alice", Protocol::Proprietary, false);
        let handle = alice.usecase.create("bob".to_string()).await.unwrap();

        let ping = alice.usecase.send_ping(handle, None).await;
        assert!(matches!(ping, Err(PairwiseError::ActionNotSupported(_))));

        let discovery = alice
            .usecase
            .send_discovery_features(handle, None, None)
            .await;
        assert!(matches!(discovery, Err(PairwiseError::ActionNotSupported(_))));

        let reuse = alice.usecase.send_reuse(handle, "{}".to_string()).await;
        assert!(matches!(reuse, Err(PairwiseError::ActionNotSupported(_))));

        let answer = alice
            .usecase
            .send_answer(handle, "{}".to_string(), "{}".to_string())
            .await;
        assert!(matches!(answer, Err(PairwiseError::ActionNotSupported(_))));

        let oob = alice
            .usecase
            .create_outofband(
                "bob".to_string(),
                OutofbandOptions {
                    goal_code: None,
                    goal: None,
                    handshake: true,
                    request_attach: None,
                },
            )
            .await;
        assert!(matches!(oob, Err(PairwiseError::ActionNotSupported(_))))
    }

    #[tokio::test]
    async fn test_legacy_handshake() {
        let alice = generate_peer("alice", Protocol::Proprietary, false);
        let bob = generate_peer("bob", Protocol::Proprietary, false);

        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        let invite = alice.usecase.connect(inviter, None).await.unwrap().unwrap();
        assert_eq!(alice.usecase.get_state(inviter).await.unwrap(), State::OfferSent);

        let (request, destination) = alice.last_sent();
        assert_eq!(request["@type"]["name"], json!("connReq"));
        assert_eq!(destination.endpoint, "http://agency.local/alice".to_string());

        let invitee = bob
            .usecase
            .create_with_invite("alice".to_string(), invite)
            .await
            .unwrap();
        assert_eq!(
            bob.usecase.get_state(invitee).await.unwrap(),
            State::RequestReceived
        );

        let accepted = bob.usecase.connect(invitee, None).await;
        assert_eq!(accepted, Ok(None));
        assert_eq!(bob.usecase.get_state(invitee).await.unwrap(), State::Accepted);

        let (answer, destination) = bob.last_sent();
        assert_eq!(answer["answerStatusCode"], json!("MS-104"));
        assert_eq!(destination.endpoint, "http://agency.local/alice".to_string());

        alice.deliver("uid-answer", answer);
        let state = alice.usecase.update_state(inviter).await;
        assert_eq!(state, Ok(State::Accepted));

        let info = alice.usecase.get_pairwise_info(inviter).await.unwrap();
        let bob_info = bob.usecase.get_pairwise_info(invitee).await.unwrap();
        assert_eq!(info.their_did, bob_info.pairwise_did)
    }

    #[tokio::test]
    async fn test_legacy_rejection() {
        let alice = generate_peer("alice", Protocol::Proprietary, false);
        let inviter = alice.usecase.create("bob".to_string()).await.unwrap();
        alice.usecase.connect(inviter, None).await.unwrap();

        let conn_req_id = alice.usecase.get_thread_id(inviter).await.unwrap().unwrap();
        let mut answer = json!({
            "@type": {"name": "connReqAnswer", "ver": "1.0"},
            "@id": "answer-1",
            "senderDetail": {"DID": "did-bob", "verKey": "verkey-bob"},
            "senderAgencyDetail": {"DID": "did-agency", "verKey": "verkey-agency", "endpoint": "http://agency.local/bob"},
            "answerStatusCode": "MS-105",
            "replyToMsgId": conn_req_id
        });
        answer["threadId"] = json!(conn_req_id);

        let state = alice
            .usecase
            .update_state_with_message(inviter, answer.to_string())
            .await;
        assert_eq!(state, Ok(State::None))
    }

    #[tokio::test]
    async fn test_outofband_without_handshake_is_one_time() {
        let bob = generate_peer("bob", Protocol::Aries, false);
        let invite = json!({
            "@type": "https://didcomm.org/out-of-band/1.1/invitation",
            "@id": "oob-1",
            "label": "faber",
            "request~attach": [{
                "@id": "request-0",
                "mime-type": "application/json",
                "data": {"json": {"hello": "world"}}
            }],
            "service": [{
                "id": "#inline",
                "type": "did-communication",
                "recipientKeys": ["verkey-faber"],
                "serviceEndpoint": "http://faber.local"
            }]
        });

        let handle = bob
            .usecase
            .create_with_outofband_invite("faber".to_string(), invite.to_string())
            .await;
        assert!(handle.is_ok());

        let handle = handle.unwrap();
        let info = bob.usecase.get_pairwise_info(handle).await.unwrap();
        assert_eq!(info.state, State::Accepted);
        assert!(info.one_time);
        assert_eq!(info.their_verkey, Some("verkey-faber".to_string()));

        let first = bob
            .usecase
            .send_message(handle, "hi".to_string(), SendMessageOptions::default())
            .await;
        assert!(first.is_ok());

        let (_, destination) = bob.last_sent();
        assert_eq!(destination.endpoint, "http://faber.local".to_string());

        let second = bob
            .usecase
            .send_message(handle, "again".to_string(), SendMessageOptions::default())
            .await;
        assert!(matches!(second, Err(PairwiseError::InvalidState(_))));
        assert_eq!(bob.sent().len(), 1)
    }

    #[tokio::test]
    async fn test_outofband_handshake_flow() {
        let faber = generate_peer("faber", Protocol::Aries, false);
        let bob = generate_peer("bob", Protocol::Aries, false);

        let inviter = faber
            .usecase
            .create_outofband(
                "bob".to_string(),
                OutofbandOptions {
                    goal_code: Some("issue-vc".to_string()),
                    goal: None,
                    handshake: true,
                    request_attach: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(faber.usecase.get_state(inviter).await.unwrap(), State::Initialized);

        let invite = faber.usecase.connect(inviter, None).await.unwrap().unwrap();
        let invitee = bob
            .usecase
            .create_with_outofband_invite("faber".to_string(), invite.clone())
            .await
            .unwrap();
        assert_eq!(bob.usecase.get_state(invitee).await.unwrap(), State::OfferSent);

        bob.usecase.connect(invitee, None).await.unwrap();
        let (request, _) = bob.last_sent();
        let invite: Value = serde_json::from_str(&invite).unwrap();
        assert_eq!(request["~thread"]["pthid"], invite["@id"]);

        let routed = faber.usecase.route_message(request.to_string()).await;
        assert_eq!(routed, Ok(Some((inviter, State::RequestReceived))))
    }

    #[tokio::test]
    async fn test_send_message_before_connect() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let handle = alice.usecase.create("bob".to_string()).await.unwrap();

        let sent = alice
            .usecase
            .send_message(handle, "hello".to_string(), SendMessageOptions::default())
            .await;
        assert!(matches!(sent, Err(PairwiseError::NotReady(_))))
    }

    #[tokio::test]
    async fn test_delete_invalidates_handle() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let handle = alice.usecase.create("bob".to_string()).await.unwrap();

        assert!(alice.usecase.delete(handle).await.is_ok());

        let state = alice.usecase.get_state(handle).await;
        assert!(matches!(state, Err(PairwiseError::InvalidHandle(_))));

        let connect = alice.usecase.connect(handle, None).await;
        assert!(matches!(connect, Err(PairwiseError::InvalidHandle(_))));

        let delete = alice.usecase.delete(handle).await;
        assert!(matches!(delete, Err(PairwiseError::InvalidHandle(_))))
    }

    #[tokio::test]
    async fn test_serialize_roundtrip() {
        let (alice, inviter, _, _) = aries_accepted_pair().await;

        let serialized = alice.usecase.serialize(inviter).await.unwrap();
        let restored = alice.usecase.deserialize(serialized).await;
        assert!(restored.is_ok());

        let restored = restored.unwrap();
        assert_ne!(restored, inviter);

        let original = alice.usecase.get_connection(inviter).await.unwrap();
        let copy = alice.usecase.get_connection(restored).await.unwrap();
        assert_eq!(original, copy);

        let invalid = alice.usecase.deserialize("{}".to_string()).await;
        assert!(matches!(invalid, Err(PairwiseError::InvalidJson(_))))
    }

    #[tokio::test]
    async fn test_redirect() {
        let (alice, inviter, _, _) = aries_accepted_pair().await;
        let second = alice.usecase.create("bob-again".to_string()).await.unwrap();

        let itself = alice.usecase.redirect(second, second).await;
        assert!(matches!(itself, Err(PairwiseError::InvalidState(_))));

        let redirected = alice.usecase.redirect(second, inviter).await;
        assert!(redirected.is_ok());
        assert_eq!(alice.usecase.get_state(second).await.unwrap(), State::Redirected);

        let existing = alice.usecase.get_connection(inviter).await.unwrap();
        let details = alice.usecase.get_redirect_details(second).await.unwrap();
        let details: Value = serde_json::from_str(&details).unwrap();
        assert_eq!(details["DID"], json!(existing.get_pairwise_did().unwrap()));
        assert!(!details["signature"].as_str().unwrap().is_empty())
    }

    #[tokio::test]
    async fn test_sign_and_verify() {
        let (alice, inviter, bob, invitee) = aries_accepted_pair().await;

        let signature = bob.usecase.sign_data(invitee, b"payload".to_vec()).await;
        assert!(signature.is_ok());

        let verified = alice
            .usecase
            .verify_signature(inviter, b"payload".to_vec(), signature.unwrap())
            .await;
        assert_eq!(verified, Ok(true))
    }

    #[tokio::test]
    async fn test_invite_details_and_list() {
        let alice = generate_peer("alice", Protocol::Proprietary, false);
        let handle = alice.usecase.create("bob".to_string()).await.unwrap();

        let missing = alice.usecase.get_invite_details(handle, false).await;
        assert!(matches!(missing, Err(PairwiseError::NotReady(_))));

        alice.usecase.connect(handle, None).await.unwrap();
        let abbreviated = alice.usecase.get_invite_details(handle, true).await.unwrap();
        let abbreviated: Value = serde_json::from_str(&abbreviated).unwrap();
        assert_eq!(abbreviated["sc"], json!("MS-102"));

        let listed = alice.usecase.list_connections().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, handle);
        assert_eq!(listed[0].1.state, State::OfferSent)
    }

    #[tokio::test]
    async fn test_connect_options() {
        let alice = generate_peer("alice", Protocol::Aries, false);
        let handle = alice.usecase.create("bob".to_string()).await.unwrap();

        let options = ConnectOptionsParams::from_json(r#"{"connection_type": "SMS"}"#).unwrap();
        let invalid = alice.usecase.connect(handle, Some(options)).await;
        assert!(matches!(invalid, Err(PairwiseError::InvalidOption(_))));
        assert_eq!(alice.usecase.get_state(handle).await.unwrap(), State::Initialized);

        let options = ConnectOptionsParams::from_json(r#"{"use_public_did": true}"#).unwrap();
        let invite = alice.usecase.connect(handle, Some(options)).await.unwrap().unwrap();
        let invite: Value = serde_json::from_str(&invite).unwrap();
        assert_eq!(invite["public_did"], json!("did-public-alice"));

        let info = alice.usecase.get_pairwise_info(handle).await.unwrap();
        assert!(info.options.use_public_did);
        assert!(info.options.update_agent_info)
    }
}
