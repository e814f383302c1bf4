use cli_table::{print_stdout, WithTitle};

use rst_common::with_logging::log::debug;

use prople_pairwise_core::invitation::{decode, encode};

use crate::types::CliError;

use super::types::InvitationRow;
use super::InviteCommands;

/// Invitations are decoded locally, nothing is loaded from the snapshot store
pub fn handle_commands(commands: InviteCommands) -> Result<(), CliError> {
    debug!("invite command handler triggered...");

    match commands {
        InviteCommands::Parse(args) => {
            debug!("[invite:parse] abbreviated: {}", args.abbreviated);

            let invitation = decode(&args.invite)?;
            let rows = vec![InvitationRow::from(&invitation)];

            print_stdout(rows.with_title()).map_err(|err| CliError::TableError(err.to_string()))?;
            println!("{}", encode(&invitation, args.abbreviated)?);
        }
    }

    Ok(())
}
