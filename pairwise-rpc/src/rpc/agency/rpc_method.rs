use prople_jsonrpc_core::types::RpcMethod;

use crate::common::types::CommonError;
use crate::rpc::RpcMethodBuilder;

const METHOD_SEND_MESSAGE: &str = "agency.send_message";
const METHOD_GET_MESSAGES: &str = "agency.get_messages";
const METHOD_UPDATE_MESSAGE_STATUS: &str = "agency.update_message_status";
const METHOD_CREATE_KEY: &str = "wallet.create_key";
const METHOD_SIGN: &str = "wallet.sign";
const METHOD_VERIFY: &str = "wallet.verify";
const METHOD_CREATE_CREDENTIAL_REQUEST: &str = "wallet.create_credential_request";
const METHOD_STORE_CREDENTIAL: &str = "wallet.store_credential";
const METHOD_RESOLVE_ENDPOINT: &str = "ledger.resolve_endpoint";

#[derive(Clone, Debug, PartialEq)]
pub enum Method {
    SendMessage,
    GetMessages,
    UpdateMessageStatus,
    CreateKey,
    Sign,
    Verify,
    CreateCredentialRequest,
    StoreCredential,
    ResolveEndpoint,
}

impl RpcMethodBuilder for Method {
    fn build_path(&self) -> &str {
        match self {
            Method::SendMessage => METHOD_SEND_MESSAGE,
            Method::GetMessages => METHOD_GET_MESSAGES,
            Method::UpdateMessageStatus => METHOD_UPDATE_MESSAGE_STATUS,
            Method::CreateKey => METHOD_CREATE_KEY,
            Method::Sign => METHOD_SIGN,
            Method::Verify => METHOD_VERIFY,
            Method::CreateCredentialRequest => METHOD_CREATE_CREDENTIAL_REQUEST,
            Method::StoreCredential => METHOD_STORE_CREDENTIAL,
            Method::ResolveEndpoint => METHOD_RESOLVE_ENDPOINT,
        }
    }
}

impl TryFrom<RpcMethod> for Method {
    type Error = CommonError;

    fn try_from(value: RpcMethod) -> Result<Self, Self::Error> {
        let given = value.to_string();
        match given.as_str() {
            _ if given.contains(METHOD_SEND_MESSAGE) => Ok(Self::SendMessage),
            _ if given.contains(METHOD_GET_MESSAGES) => Ok(Self::GetMessages),
            _ if given.contains(METHOD_UPDATE_MESSAGE_STATUS) => Ok(Self::UpdateMessageStatus),
            _ if given.contains(METHOD_CREATE_KEY) => Ok(Self::CreateKey),
            _ if given.contains(METHOD_SIGN) => Ok(Self::Sign),
            _ if given.contains(METHOD_VERIFY) => Ok(Self::Verify),
            _ if given.contains(METHOD_CREATE_CREDENTIAL_REQUEST) => {
                Ok(Self::CreateCredentialRequest)
            }
            _ if given.contains(METHOD_STORE_CREDENTIAL) => Ok(Self::StoreCredential),
            _ if given.contains(METHOD_RESOLVE_ENDPOINT) => Ok(Self::ResolveEndpoint),
            _ => Err(CommonError::MethodError(format!("unknown method: {}", given))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_test::table_test;

    use crate::rpc::build_rpc_method;

    #[test]
    fn test_from_rpc_method() {
        let table = vec![
            (build_rpc_method(Method::SendMessage), Method::SendMessage),
            (build_rpc_method(Method::GetMessages), Method::GetMessages),
            (
                build_rpc_method(Method::UpdateMessageStatus),
                Method::UpdateMessageStatus,
            ),
            (build_rpc_method(Method::CreateKey), Method::CreateKey),
            (build_rpc_method(Method::Sign), Method::Sign),
            (build_rpc_method(Method::Verify), Method::Verify),
            (
                build_rpc_method(Method::CreateCredentialRequest),
                Method::CreateCredentialRequest,
            ),
            (
                build_rpc_method(Method::StoreCredential),
                Method::StoreCredential,
            ),
            (
                build_rpc_method(Method::ResolveEndpoint),
                Method::ResolveEndpoint,
            ),
        ];

        for (validator, input, expected) in table_test!(table) {
            let from_method = Method::try_from(input.clone());
            assert!(!from_method.is_err());

            validator
                .given(&format!("{:?}", input))
                .when("cast back")
                .then("back to original form")
                .assert_eq(expected, from_method.unwrap());
        }
    }

    #[test]
    fn test_method_prefix() {
        let method = build_rpc_method(Method::GetMessages);
        assert_eq!(
            method.to_string(),
            "prople.pairwise.agency.get_messages".to_string()
        )
    }

    #[test]
    fn test_from_rpc_method_error() {
        let rpc_method = RpcMethod::from("unknown.method");
        let from_method = Method::try_from(rpc_method);
        assert!(matches!(from_method, Err(CommonError::MethodError(_))))
    }
}
