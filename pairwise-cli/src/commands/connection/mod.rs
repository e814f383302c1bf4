use clap::{Args, Subcommand};

mod handler;
mod types;

pub use handler::handle_commands as connection_handler;

#[derive(Args, Clone)]
pub struct ConnectionArgs {
    #[command(subcommand)]
    pub commands: ConnectionCommands,
}

#[derive(Subcommand, Clone)]
#[command(subcommand_help_heading = "Connection")]
pub enum ConnectionCommands {
    /// Create an inviter connection
    Create(CreateArgs),

    /// Create an invitee connection from a received invitation
    Accept(AcceptArgs),

    /// Start the handshake, an inviter gets the invitation to share
    Connect(ConnectArgs),

    /// Poll the agency or apply a given message
    Update(UpdateArgs),

    /// Show the connection state and its details
    Status(NameArgs),

    /// Send a message over an accepted connection
    Send(SendArgs),

    /// Send a trust ping
    Ping(NameArgs),

    /// Ask the other party which protocols it supports
    Discover(NameArgs),

    /// Point the other party at an already existing connection
    Redirect(RedirectArgs),

    /// Delete the connection and its stored snapshot
    Delete(NameArgs),

    /// List every stored connection
    List,
}

#[derive(Args, Debug, Clone)]
pub struct NameArgs {
    #[arg(long, required = true)]
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(long, required = true)]
    pub name: String,

    /// outofband creates an Aries out-of-band invitation instead of a connection invitation
    #[arg(long, default_value_t = false)]
    pub outofband: bool,

    #[arg(long)]
    pub goal_code: Option<String>,

    #[arg(long)]
    pub goal: Option<String>,

    /// no_handshake leaves the handshake protocols out of the out-of-band invitation
    #[arg(long, default_value_t = false)]
    pub no_handshake: bool,

    /// attach is a JSON message carried as the out-of-band request attachment
    #[arg(long)]
    pub attach: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AcceptArgs {
    #[arg(long, required = true)]
    pub name: String,

    #[arg(long, required = true)]
    pub invite: String,

    #[arg(long, default_value_t = false)]
    pub outofband: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    #[arg(long, required = true)]
    pub name: String,

    /// options is a JSON object, missing fields fall back to the configured defaults
    #[arg(long)]
    pub options: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[arg(long, required = true)]
    pub name: String,

    /// message is applied directly instead of polling the agency
    #[arg(long)]
    pub message: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    #[arg(long, required = true)]
    pub name: String,

    #[arg(long, required = true)]
    pub message: String,
}

#[derive(Args, Debug, Clone)]
pub struct RedirectArgs {
    #[arg(long, required = true)]
    pub name: String,

    /// existing is the name of the connection the other party should use
    #[arg(long, required = true)]
    pub existing: String,
}
