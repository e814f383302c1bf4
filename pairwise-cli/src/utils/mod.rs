pub mod homedir;
pub mod rpc;
