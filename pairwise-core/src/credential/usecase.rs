use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::{debug, info, warn};

use super::credential::Credential;
use super::machine::Agent;
use super::types::{
    CredentialAPI, IssuedCredential, OfferAcceptance, OfferPayload, PendingOffer, State,
    UsecaseBuilder,
};
use crate::connection::types::ConnectionChannel;
use crate::messages::legacy::PaymentInfo;
use crate::messages::{MessageKind, ParsedMessage};
use crate::problem_report::ProblemReport;
use crate::registry::{Handle, Registry};
use crate::types::{PairwiseError, Protocol, RetainedError, TransportBuilder, WalletBuilder};

/// `Usecase` is the registry backed implementation of [`CredentialAPI`]
///
/// Connections are reached through a [`ConnectionChannel`], the credential registry never
/// holds a connection lock while its own object is locked by another caller.
#[derive(Clone)]
pub struct Usecase<TTransport, TWallet, TConnection>
where
    TTransport: TransportBuilder,
    TWallet: WalletBuilder,
    TConnection: ConnectionChannel,
{
    credentials: Registry<Credential>,
    transport: TTransport,
    wallet: TWallet,
    connection: TConnection,
}

impl<TTransport, TWallet, TConnection> Usecase<TTransport, TWallet, TConnection>
where
    TTransport: TransportBuilder,
    TWallet: WalletBuilder,
    TConnection: ConnectionChannel,
{
    pub fn new(transport: TTransport, wallet: TWallet, connection: TConnection) -> Self {
        Self {
            credentials: Registry::new(),
            transport,
            wallet,
            connection,
        }
    }

    fn agent(&self) -> Agent<TTransport, TWallet, TConnection> {
        Agent {
            transport: self.transport(),
            wallet: self.wallet(),
            channel: self.connection(),
        }
    }

    fn pending_offer(inbound: ParsedMessage) -> Option<PendingOffer> {
        let uid = inbound.uid.clone()?;
        match inbound.kind {
            MessageKind::CredentialOffer => Some(PendingOffer {
                uid,
                protocol: Protocol::Aries,
                offer: inbound.payload.to_string(),
            }),
            MessageKind::LegacyCredentialOffer => {
                let offer = match OfferPayload::from_value(inbound.payload) {
                    Ok(OfferPayload::Legacy { mut offer, payment }) => {
                        if offer.msg_ref_id.is_none() {
                            offer.msg_ref_id = Some(uid.clone());
                        }

                        OfferPayload::Legacy { offer, payment }
                    }
                    Ok(offer) => offer,
                    Err(err) => {
                        warn!("[credential:get_offers] skip malformed offer {}: {}", uid, err);
                        return None;
                    }
                };

                match offer.to_wire() {
                    Ok(raw) => Some(PendingOffer {
                        uid,
                        protocol: Protocol::Proprietary,
                        offer: raw,
                    }),
                    Err(err) => {
                        warn!("[credential:get_offers] skip offer {}: {}", uid, err);
                        None
                    }
                }
            }
            _ => None,
        }
    }
}

impl<TTransport, TWallet, TConnection> UsecaseBuilder<Credential>
    for Usecase<TTransport, TWallet, TConnection>
where
    TTransport: TransportBuilder,
    TWallet: WalletBuilder,
    TConnection: ConnectionChannel,
{
    type TransportImplementer = TTransport;
    type WalletImplementer = TWallet;
    type ConnectionImplementer = TConnection;

    fn transport(&self) -> Self::TransportImplementer {
        self.transport.clone()
    }

    fn wallet(&self) -> Self::WalletImplementer {
        self.wallet.clone()
    }

    fn connection(&self) -> Self::ConnectionImplementer {
        self.connection.clone()
    }
}

#[async_trait]
impl<TTransport, TWallet, TConnection> CredentialAPI for Usecase<TTransport, TWallet, TConnection>
where
    TTransport: TransportBuilder,
    TWallet: WalletBuilder,
    TConnection: ConnectionChannel,
{
    type EntityAccessor = Credential;

    async fn create_with_offer(
        &self,
        source_id: String,
        offer: String,
    ) -> Result<Handle, PairwiseError> {
        let offer = OfferPayload::parse(&offer)?;
        let credential = Credential::new(source_id, offer);
        let handle = self.credentials.insert(credential).await?;

        debug!("[credential:create_with_offer] handle: {}", u32::from(handle));
        Ok(handle)
    }

    async fn create_with_msg_id(
        &self,
        source_id: String,
        connection: Handle,
        msg_id: String,
    ) -> Result<(Handle, String), PairwiseError> {
        let offers = self.get_offers(connection).await?;
        let pending = offers
            .into_iter()
            .find(|pending| {
                pending.uid == msg_id
                    || matches!(
                        OfferPayload::parse(&pending.offer),
                        Ok(OfferPayload::Aries(ref offer)) if offer.id == msg_id
                    )
            })
            .ok_or(PairwiseError::NotReady(format!(
                "no credential offer with message id: {}",
                msg_id
            )))?;

        let handle = self.create_with_offer(source_id, pending.offer.clone()).await?;
        Ok((handle, pending.offer))
    }

    async fn accept_offer(
        &self,
        source_id: String,
        offer: String,
        connection: Handle,
    ) -> Result<OfferAcceptance, RetainedError> {
        let handle = self.create_with_offer(source_id, offer).await?;
        if let Err(err) = self.send_request(handle, connection, None).await {
            warn!(
                "[credential:accept_offer] request failed, credential kept with handle: {}, error: {}",
                u32::from(handle),
                err
            );
            return Err(RetainedError::retained(handle, err));
        }

        let serialized = self
            .serialize(handle)
            .await
            .map_err(|err| RetainedError::retained(handle, err))?;
        Ok(OfferAcceptance { handle, serialized })
    }

    async fn get_offers(&self, connection: Handle) -> Result<Vec<PendingOffer>, PairwiseError> {
        let completed = self.connection().get_completed_connection(connection).await?;
        let messages = self
            .transport()
            .poll_inbound(completed.pairwise_did, None)
            .await?;

        let offers: Vec<PendingOffer> = messages
            .into_iter()
            .map(ParsedMessage::from_inbound)
            .filter_map(Self::pending_offer)
            .collect();

        debug!(
            "[credential:get_offers] connection: {}, offers: {}",
            u32::from(connection),
            offers.len()
        );
        Ok(offers)
    }

    async fn send_request(
        &self,
        handle: Handle,
        connection: Handle,
        payment: Option<String>,
    ) -> Result<(), PairwiseError> {
        let object = self.credentials.get(handle).await?;
        let mut guard = object.lock().await;

        let agent = self.agent();
        let mut draft = guard.clone();
        draft.send_request(&agent, connection, payment).await?;

        *guard = draft;
        Ok(())
    }

    async fn reject(
        &self,
        handle: Handle,
        connection: Handle,
        comment: Option<String>,
    ) -> Result<(), PairwiseError> {
        let object = self.credentials.get(handle).await?;
        let mut guard = object.lock().await;

        let agent = self.agent();
        let mut draft = guard.clone();
        draft.reject(&agent, connection, comment).await?;

        *guard = draft;
        Ok(())
    }

    async fn update_state(&self, handle: Handle) -> Result<State, PairwiseError> {
        let object = self.credentials.get(handle).await?;
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

        let object = self.credentials.get(handle).await?;
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

        for handle in self.credentials.handles().await {
            let object = match self.credentials.get(handle).await {
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
                "[credential:route_message] routed to handle: {}",
                u32::from(handle)
            );
            return Ok(Some((handle, state)));
        }

        Ok(None)
    }

    async fn get_state(&self, handle: Handle) -> Result<State, PairwiseError> {
        self.credentials
            .read(handle, |credential| Ok(credential.state))
            .await
    }

    async fn get_source_id(&self, handle: Handle) -> Result<String, PairwiseError> {
        self.credentials
            .read(handle, |credential| Ok(credential.source_id.clone()))
            .await
    }

    async fn get_thread_id(&self, handle: Handle) -> Result<String, PairwiseError> {
        self.credentials
            .read(handle, |credential| Ok(credential.thread_id.clone()))
            .await
    }

    async fn get_offer(&self, handle: Handle) -> Result<String, PairwiseError> {
        self.credentials
            .read(handle, |credential| credential.offer.to_wire())
            .await
    }

    async fn get_problem_report(
        &self,
        handle: Handle,
    ) -> Result<Option<ProblemReport>, PairwiseError> {
        self.credentials
            .read(handle, |credential| Ok(credential.problem_report.clone()))
            .await
    }

    async fn get_presentation_proposal(&self, handle: Handle) -> Result<String, PairwiseError> {
        self.credentials
            .read(handle, |credential| credential.presentation_proposal())
            .await
    }

    async fn get_request_message(
        &self,
        handle: Handle,
        my_pw_did: String,
        their_pw_did: String,
    ) -> Result<String, PairwiseError> {
        let credential = self.credentials.snapshot(handle).await?;
        credential
            .build_request_message(&self.wallet(), my_pw_did, their_pw_did)
            .await
    }

    async fn get_credential(&self, handle: Handle) -> Result<IssuedCredential, PairwiseError> {
        self.credentials
            .read(handle, |credential| {
                credential.require_accepted("get_credential")?;
                match (&credential.credential_id, &credential.credential) {
                    (Some(credential_id), Some(content)) => Ok(IssuedCredential {
                        credential_id: credential_id.clone(),
                        credential: content.clone(),
                    }),
                    _ => Err(PairwiseError::NotReady(
                        "credential was not stored".to_string(),
                    )),
                }
            })
            .await
    }

    async fn get_payment_info(
        &self,
        handle: Handle,
    ) -> Result<Option<PaymentInfo>, PairwiseError> {
        self.credentials
            .read(handle, |credential| Ok(credential.offer.payment_info()))
            .await
    }

    async fn get_exchange(&self, handle: Handle) -> Result<Self::EntityAccessor, PairwiseError> {
        self.credentials.snapshot(handle).await
    }

    async fn serialize(&self, handle: Handle) -> Result<String, PairwiseError> {
        self.credentials
            .read(handle, |credential| credential.to_snapshot())
            .await
    }

    async fn deserialize(&self, data: String) -> Result<Handle, PairwiseError> {
        let credential = Credential::from_snapshot(&data)?;
        let handle = self.credentials.insert(credential).await?;

        debug!("[credential:deserialize] handle: {}", u32::from(handle));
        Ok(handle)
    }

    async fn delete(&self, handle: Handle) -> Result<(), PairwiseError> {
        let object = self.credentials.remove(handle).await?;
        let mut guard = object.lock().await;
        guard.update_state(State::None);

        info!("[credential:delete] handle: {}", u32::from(handle));
        Ok(())
    }
}
