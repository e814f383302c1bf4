pub mod agency;

mod call;
pub use call::{call, CallError, RPC_PATH};

mod endpoint;
pub use endpoint::{build_endpoint, EndpointError};

mod method;
pub use method::{build_rpc_method, RpcMethodBuilder, RPC_METHOD_PREFIX};
