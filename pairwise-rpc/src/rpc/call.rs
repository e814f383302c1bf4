use std::fmt::Debug;

use multiaddr::Multiaddr;

use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde_json;
use rst_common::with_logging::log::debug;

use prople_jsonrpc_client::types::{Executor, ExecutorError, JSONResponse, RpcValue};
use prople_jsonrpc_core::types::RpcMethod;

use super::endpoint::{build_endpoint, EndpointError};

/// Every agency serves its JSON-RPC handler under this path
pub const RPC_PATH: &str = "/rpc";

#[derive(Debug)]
pub enum CallError {
    EndpointError(EndpointError),
    ExecutorError(ExecutorError),
    ResponseError(String),
}

/// call sends a single JSON-RPC request to the agency behind `addr`
///
/// An error object in the response is turned into [`CallError::ResponseError`] carrying
/// the serialized error, so the code and the message both survive.
pub async fn call<TExecutor, TResp, TParam>(
    client: TExecutor,
    addr: Multiaddr,
    method: RpcMethod,
    params: Option<TParam>,
) -> Result<JSONResponse<TResp>, CallError>
where
    TExecutor: Executor<TResp>,
    TResp: DeserializeOwned + Clone + Send + Sync + Debug,
    TParam: RpcValue + Send + Sync,
{
    let endpoint = build_endpoint(addr).map_err(CallError::EndpointError)?;
    let url = format!("{}{}", endpoint, RPC_PATH);
    debug!("[rpc:call] url: {} | method: {}", url, method);

    let response = client
        .call(url, params, method.to_string(), None)
        .await
        .map_err(CallError::ExecutorError)?;

    if let Some(err) = response.error.as_ref() {
        let err_str =
            serde_json::to_string(err).map_err(|e| CallError::ResponseError(e.to_string()))?;

        return Err(CallError::ResponseError(err_str));
    }

    Ok(response)
}
