use clap::{Args, Subcommand};

mod handler;
mod types;

pub use handler::handle_commands as credential_handler;

#[derive(Args, Clone)]
pub struct CredentialArgs {
    #[command(subcommand)]
    pub commands: CredentialCommands,
}

#[derive(Subcommand, Clone)]
#[command(subcommand_help_heading = "Credential")]
pub enum CredentialCommands {
    /// List the credential offers waiting on a connection
    Offers(OffersArgs),

    /// Accept an offer and send the credential request
    Accept(AcceptArgs),

    /// Send the request of a stored credential whose earlier request failed
    Request(RequestArgs),

    /// Poll the agency for the issued credential
    Update(NameArgs),

    /// Show the credential exchange
    Status(NameArgs),

    /// Abandon the exchange and tell the issuer
    Reject(RejectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NameArgs {
    #[arg(long, required = true)]
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct OffersArgs {
    /// connection is the stored connection name
    #[arg(long, required = true)]
    pub connection: String,
}

#[derive(Args, Debug, Clone)]
pub struct AcceptArgs {
    #[arg(long, required = true)]
    pub name: String,

    #[arg(long, required = true)]
    pub connection: String,

    /// offer is the offer JSON as listed by `credential offers`
    #[arg(long, required = true)]
    pub offer: String,

    /// payment is the transaction reference for offers asking for a payment
    #[arg(long)]
    pub payment: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    #[arg(long, required = true)]
    pub name: String,

    #[arg(long, required = true)]
    pub connection: String,

    #[arg(long)]
    pub payment: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RejectArgs {
    #[arg(long, required = true)]
    pub name: String,

    #[arg(long, required = true)]
    pub connection: String,

    #[arg(long)]
    pub comment: Option<String>,
}
