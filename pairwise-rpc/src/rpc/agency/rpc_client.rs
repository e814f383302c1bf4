use multiaddr::Multiaddr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde_json::{self, Value};
use rst_common::with_logging::log::debug;

use prople_jsonrpc_client::types::Executor;

use prople_pairwise_core::types::{
    CredentialRequestData, Destination, InboundMessage, LedgerBuilder, PairwiseError,
    PairwiseKey, ServiceEndpoint, TransportBuilder, WalletBuilder,
};

use crate::rpc::{build_rpc_method, call, CallError};

use super::rpc_method::Method;
use super::rpc_param::{Agency, Ledger, Param, Wallet};

#[derive(Clone)]
pub struct AgencyClient<TExecutor>
where
    TExecutor: Executor<Value> + Clone,
{
    client: TExecutor,
    addr: Multiaddr,
}

impl<TExecutor> AgencyClient<TExecutor>
where
    TExecutor: Executor<Value> + Send + Sync + Clone,
{
    pub fn new(client: TExecutor, addr: Multiaddr) -> Self {
        Self { client, addr }
    }

    async fn request<TOut>(
        &self,
        method: Method,
        param: Param,
        fault: fn(String) -> PairwiseError,
    ) -> Result<TOut, PairwiseError>
    where
        TOut: DeserializeOwned,
    {
        debug!("[agency:request] method: {:?}", method);

        let rpc_response = call(
            self.client.clone(),
            self.addr.clone(),
            build_rpc_method(method.clone()),
            Some(param),
        )
        .await
        .map_err(|err| match err {
            CallError::EndpointError(e) => fault(e.to_string()),
            CallError::ExecutorError(e) => fault(e.to_string()),
            CallError::ResponseError(e) => fault(e),
        })?;

        let result = rpc_response.result.ok_or(PairwiseError::EmptyResponse(format!(
            "missing result: {:?}",
            method
        )))?;

        serde_json::from_value(result).map_err(|err| PairwiseError::InvalidJson(err.to_string()))
    }
}

#[async_trait]
impl<TExecutor> TransportBuilder for AgencyClient<TExecutor>
where
    TExecutor: Executor<Value> + Send + Sync + Clone,
{
    async fn send(
        &self,
        sender_verkey: String,
        message: Value,
        destination: Destination,
    ) -> Result<(), PairwiseError> {
        let param = Param::Agency(Agency::SendMessage {
            sender_verkey,
            message,
            destination,
        });

        let _: Value = self
            .request(Method::SendMessage, param, PairwiseError::TransportError)
            .await?;

        Ok(())
    }

    async fn poll_inbound(
        &self,
        pairwise_did: String,
        thread_id: Option<String>,
    ) -> Result<Vec<InboundMessage>, PairwiseError> {
        let param = Param::Agency(Agency::GetMessages {
            pairwise_did,
            thread_id,
        });

        self.request(Method::GetMessages, param, PairwiseError::TransportError)
            .await
    }

    async fn update_message_status(
        &self,
        pairwise_did: String,
        uids: Vec<String>,
    ) -> Result<(), PairwiseError> {
        let param = Param::Agency(Agency::UpdateMessageStatus { pairwise_did, uids });

        let _: Value = self
            .request(
                Method::UpdateMessageStatus,
                param,
                PairwiseError::TransportError,
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl<TExecutor> WalletBuilder for AgencyClient<TExecutor>
where
    TExecutor: Executor<Value> + Send + Sync + Clone,
{
    async fn create_pairwise_key(&self) -> Result<PairwiseKey, PairwiseError> {
        self.request(
            Method::CreateKey,
            Param::Wallet(Wallet::CreateKey),
            PairwiseError::WalletError,
        )
        .await
    }

    async fn sign(&self, verkey: String, data: Vec<u8>) -> Result<Vec<u8>, PairwiseError> {
        let param = Param::Wallet(Wallet::Sign {
            verkey,
            data: STANDARD.encode(data),
        });

        let signature: String = self
            .request(Method::Sign, param, PairwiseError::WalletError)
            .await?;

        STANDARD
            .decode(signature)
            .map_err(|err| PairwiseError::WalletError(format!("invalid signature: {}", err)))
    }

    async fn verify(
        &self,
        verkey: String,
        data: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<bool, PairwiseError> {
        let param = Param::Wallet(Wallet::Verify {
            verkey,
            data: STANDARD.encode(data),
            signature: STANDARD.encode(signature),
        });

        self.request(Method::Verify, param, PairwiseError::WalletError)
            .await
    }

    async fn create_credential_request(
        &self,
        prover_did: String,
        offer: Value,
    ) -> Result<CredentialRequestData, PairwiseError> {
        let param = Param::Wallet(Wallet::CreateCredentialRequest { prover_did, offer });

        self.request(
            Method::CreateCredentialRequest,
            param,
            PairwiseError::WalletError,
        )
        .await
    }

    async fn store_credential(
        &self,
        request_metadata: Value,
        credential: Value,
    ) -> Result<String, PairwiseError> {
        let param = Param::Wallet(Wallet::StoreCredential {
            request_metadata,
            credential,
        });

        self.request(Method::StoreCredential, param, PairwiseError::WalletError)
            .await
    }
}

#[async_trait]
impl<TExecutor> LedgerBuilder for AgencyClient<TExecutor>
where
    TExecutor: Executor<Value> + Send + Sync + Clone,
{
    async fn resolve_service_endpoint(
        &self,
        did: String,
    ) -> Result<ServiceEndpoint, PairwiseError> {
        let param = Param::Ledger(Ledger::ResolveEndpoint { did });

        self.request(Method::ResolveEndpoint, param, PairwiseError::LedgerError)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use multiaddr::multiaddr;

    use rst_common::standard::serde_json::json;
    use rst_common::with_tokio::tokio;

    use prople_jsonrpc_core::objects::RpcRequest;
    use prople_jsonrpc_core::types::{
        RpcError, RpcErrorBuilder, RpcId, INVALID_PARAMS_CODE, INVALID_PARAMS_MESSAGE,
    };

    use prople_jsonrpc_client::executor::reqwest::Reqwest as ReqwestExecutor;
    use prople_jsonrpc_client::types::{JSONResponse, RpcValue};

    fn parse_url(url: String) -> (String, u16) {
        let splitted = url.as_str().split(":").collect::<Vec<&str>>();
        let port_str = splitted[2].parse::<u16>();
        (format!("{}{}", splitted[0], splitted[1]), port_str.unwrap())
    }

    fn generate_client(server: &ServerGuard) -> AgencyClient<ReqwestExecutor<Value>> {
        let (_, port) = parse_url(server.url());
        let addr = multiaddr!(Ip4([127, 0, 0, 1]), Tcp(port));
        AgencyClient::new(ReqwestExecutor::new(), addr)
    }

    async fn mock_call(
        server: &mut ServerGuard,
        method: Method,
        param: Param,
        jsonresp: JSONResponse<Value>,
    ) -> Mock {
        let request_payload = RpcRequest {
            jsonrpc: String::from("2.0"),
            method: build_rpc_method(method).to_string(),
            params: Some(param.build_serde_value().unwrap()),
            id: None,
        };

        let request_payload_value = serde_json::to_value(request_payload).unwrap();
        let jsonresp_str_builder = serde_json::to_string(&jsonresp).unwrap();

        server
            .mock("POST", "/rpc")
            .match_body(Matcher::Json(request_payload_value))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(jsonresp_str_builder)
            .create_async()
            .await
    }

    fn success(result: Value) -> JSONResponse<Value> {
        JSONResponse {
            id: Some(RpcId::IntegerVal(1)),
            result: Some(result),
            error: None,
            jsonrpc: String::from("2.0"),
        }
    }

    #[tokio::test]
    async fn test_send_message_success() {
        let mut server = Server::new_async().await;
        let destination = Destination::new(
            "http://bob.local".to_string(),
            vec!["verkey-bob".to_string()],
            vec![],
        );

        let message = json!({"@type": "https://didcomm.org/trust_ping/1.0/ping"});
        let param = Param::Agency(Agency::SendMessage {
            sender_verkey: "verkey-alice".to_string(),
            message: message.clone(),
            destination: destination.clone(),
        });

        let mock = mock_call(&mut server, Method::SendMessage, param, success(json!("ok"))).await;

        let client = generate_client(&server);
        let resp = client
            .send("verkey-alice".to_string(), message, destination)
            .await;

        assert!(resp.is_ok());
        mock.assert();
    }

    #[tokio::test]
    async fn test_poll_inbound_success() {
        let mut server = Server::new_async().await;
        let param = Param::Agency(Agency::GetMessages {
            pairwise_did: "did-alice".to_string(),
            thread_id: Some("thread-1".to_string()),
        });

        let messages = json!([
            {"uid": "uid-1", "msg_type": "aries", "payload": {"@id": "1"}},
            {"uid": "uid-2", "payload": {"@id": "2"}}
        ]);

        let mock = mock_call(&mut server, Method::GetMessages, param, success(messages)).await;

        let client = generate_client(&server);
        let resp = client
            .poll_inbound("did-alice".to_string(), Some("thread-1".to_string()))
            .await;

        assert!(resp.is_ok());
        mock.assert();

        let inbound = resp.unwrap();
        assert_eq!(inbound.len(), 2);
        assert_eq!(inbound[0].uid, "uid-1".to_string());
        assert_eq!(inbound[1].msg_type, None)
    }

    #[tokio::test]
    async fn test_create_key_and_sign() {
        let mut server = Server::new_async().await;

        let mock_key = mock_call(
            &mut server,
            Method::CreateKey,
            Param::Wallet(Wallet::CreateKey),
            success(json!({"did": "did-alice", "verkey": "verkey-alice"})),
        )
        .await;

        let sign_param = Param::Wallet(Wallet::Sign {
            verkey: "verkey-alice".to_string(),
            data: STANDARD.encode(b"payload"),
        });
        let mock_sign = mock_call(
            &mut server,
            Method::Sign,
            sign_param,
            success(json!(STANDARD.encode(b"signature"))),
        )
        .await;

        let client = generate_client(&server);

        let key = client.create_pairwise_key().await;
        assert_eq!(
            key,
            Ok(PairwiseKey::new(
                "did-alice".to_string(),
                "verkey-alice".to_string()
            ))
        );

        let signature = client
            .sign("verkey-alice".to_string(), b"payload".to_vec())
            .await;
        assert_eq!(signature, Ok(b"signature".to_vec()));

        mock_key.assert();
        mock_sign.assert();
    }

    #[tokio::test]
    async fn test_resolve_service_endpoint() {
        let mut server = Server::new_async().await;
        let param = Param::Ledger(Ledger::ResolveEndpoint {
            did: "did-issuer".to_string(),
        });

        let mock = mock_call(
            &mut server,
            Method::ResolveEndpoint,
            param,
            success(json!({
                "endpoint": "http://issuer.local",
                "recipient_keys": ["verkey-issuer"]
            })),
        )
        .await;

        let client = generate_client(&server);
        let resp = client.resolve_service_endpoint("did-issuer".to_string()).await;
        assert!(resp.is_ok());
        mock.assert();

        let service = resp.unwrap();
        assert_eq!(service.endpoint, "http://issuer.local".to_string());
        assert!(service.routing_keys.is_empty())
    }

    #[tokio::test]
    async fn test_error_endpoint() {
        let addr = multiaddr!(Ip4([127, 0, 0, 1]));
        let client = AgencyClient::new(ReqwestExecutor::<Value>::new(), addr);

        let resp = client.resolve_service_endpoint("did-issuer".to_string()).await;
        assert!(matches!(resp, Err(PairwiseError::LedgerError(_))));

        let resp = client.create_pairwise_key().await;
        assert!(matches!(resp, Err(PairwiseError::WalletError(_))));

        let resp = client
            .update_message_status("did-alice".to_string(), vec![])
            .await;
        assert!(matches!(resp, Err(PairwiseError::TransportError(_))))
    }

    #[tokio::test]
    async fn test_error_response() {
        let mut server = Server::new_async().await;
        let param = Param::Wallet(Wallet::StoreCredential {
            request_metadata: json!({}),
            credential: json!({}),
        });

        let jsonresp: JSONResponse<Value> = JSONResponse {
            id: Some(RpcId::IntegerVal(1)),
            result: None,
            error: Some(RpcErrorBuilder::build(RpcError::InvalidParams)),
            jsonrpc: String::from("2.0"),
        };

        let mock = mock_call(&mut server, Method::StoreCredential, param, jsonresp).await;

        let client = generate_client(&server);
        let resp = client.store_credential(json!({}), json!({})).await;

        assert!(resp.is_err());
        mock.assert();

        match resp.unwrap_err() {
            PairwiseError::WalletError(msg) => {
                assert!(msg.contains(INVALID_PARAMS_MESSAGE));
                assert!(msg.contains(&INVALID_PARAMS_CODE.to_string()));
            }
            _ => panic!("unknown error enum"),
        }
    }

    #[tokio::test]
    async fn test_missing_result() {
        let mut server = Server::new_async().await;
        let param = Param::Wallet(Wallet::Verify {
            verkey: "verkey-alice".to_string(),
            data: STANDARD.encode(b"payload"),
            signature: STANDARD.encode(b"signature"),
        });

        let jsonresp: JSONResponse<Value> = JSONResponse {
            id: Some(RpcId::IntegerVal(1)),
            result: None,
            error: None,
            jsonrpc: String::from("2.0"),
        };

        let mock = mock_call(&mut server, Method::Verify, param, jsonresp).await;

        let client = generate_client(&server);
        let resp = client
            .verify(
                "verkey-alice".to_string(),
                b"payload".to_vec(),
                b"signature".to_vec(),
            )
            .await;

        assert!(matches!(resp, Err(PairwiseError::EmptyResponse(_))));
        mock.assert();
    }
}
