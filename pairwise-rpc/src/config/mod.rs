mod agency;
pub use agency::Agency;

mod agent;
pub use agent::Agent;

mod connection;
pub use connection::Connection;

mod database;
pub use database::Database;

mod config;
pub use config::Config;

mod parser;
pub use parser::Parser;

mod settings;
pub use settings::build_settings;
