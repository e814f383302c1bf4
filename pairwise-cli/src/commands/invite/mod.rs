use clap::{Args, Subcommand};

mod handler;
mod types;

pub use handler::handle_commands as invite_handler;

#[derive(Args, Clone)]
pub struct InviteArgs {
    #[command(subcommand)]
    pub commands: InviteCommands,
}

#[derive(Subcommand, Clone)]
#[command(subcommand_help_heading = "Invite")]
pub enum InviteCommands {
    /// Decode an invitation of any supported shape and print its normalized form
    Parse(ParseArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// invite is the raw invitation JSON
    #[arg(long, required = true)]
    pub invite: String,

    /// abbreviated emits legacy invitations with their short keys
    #[arg(long, default_value_t = false)]
    pub abbreviated: bool,
}
