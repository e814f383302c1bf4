pub mod handler;

pub mod connection;
pub mod credential;
pub mod invite;
