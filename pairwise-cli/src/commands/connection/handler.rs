use cli_table::{print_stdout, WithTitle};

use rst_common::with_logging::log::{debug, info};

use rstdev_domain::entity::ToJSON;

use prople_pairwise_core::connection::{
    ConnectOptionsParams, ConnectionAPI, ConnectionChannel, OutofbandOptions, SendMessageOptions,
};

use prople_pairwise_rpc::SnapshotKind;

use crate::commands::handler::ContextHandler;
use crate::types::CliError;

use super::types::ConnectionRow;
use super::ConnectionCommands;

fn print_rows(rows: Vec<ConnectionRow>) -> Result<(), CliError> {
    print_stdout(rows.with_title()).map_err(|err| CliError::TableError(err.to_string()))
}

pub async fn handle_commands(
    ctx: &ContextHandler,
    commands: ConnectionCommands,
) -> Result<(), CliError> {
    debug!("connection command handler triggered...");

    let connections = ctx.connections();

    match commands {
        ConnectionCommands::Create(args) => {
            debug!("[connection:create] name: {} | oob: {}", args.name, args.outofband);

            let handle = match args.outofband {
                true => {
                    let options = OutofbandOptions {
                        goal_code: args.goal_code,
                        goal: args.goal,
                        handshake: !args.no_handshake,
                        request_attach: args.attach,
                    };

                    connections
                        .create_outofband(args.name.clone(), options)
                        .await?
                }
                false => connections.create(args.name.clone()).await?,
            };

            ctx.save_connection(&connections, handle, &args.name).await?;
            info!("[connection:create] connection created: {}", args.name);
        }
        ConnectionCommands::Accept(args) => {
            debug!("[connection:accept] name: {} | oob: {}", args.name, args.outofband);

            let handle = match args.outofband {
                true => {
                    connections
                        .create_with_outofband_invite(args.name.clone(), args.invite)
                        .await?
                }
                false => {
                    connections
                        .create_with_invite(args.name.clone(), args.invite)
                        .await?
                }
            };

            ctx.save_connection(&connections, handle, &args.name).await?;

            let state = connections.get_state(handle).await?;
            info!("[connection:accept] {} accepted the invitation: {}", args.name, state);
        }
        ConnectionCommands::Connect(args) => {
            let handle = ctx.load_connection(&connections, &args.name).await?;
            let options = match args.options {
                Some(raw) => Some(ConnectOptionsParams::from_json(&raw)?),
                None => None,
            };

            let invitation = connections.connect(handle, options).await?;
            ctx.save_connection(&connections, handle, &args.name).await?;

            match invitation {
                Some(invite) => println!("{}", invite),
                None => info!("[connection:connect] {} request sent", args.name),
            }
        }
        ConnectionCommands::Update(args) => {
            let handle = ctx.load_connection(&connections, &args.name).await?;
            let state = match args.message {
                Some(message) => {
                    connections
                        .update_state_with_message(handle, message)
                        .await?
                }
                None => connections.update_state(handle).await?,
            };

            ctx.save_connection(&connections, handle, &args.name).await?;
            info!("[connection:update] {}: {}", args.name, state);
        }
        ConnectionCommands::Status(args) => {
            let handle = ctx.load_connection(&connections, &args.name).await?;
            let info = connections.get_pairwise_info(handle).await?;
            print_rows(vec![ConnectionRow::new(args.name.clone(), info)])?;

            let connection = connections.get_connection(handle).await?;
            let json = connection
                .to_json()
                .map_err(|err| CliError::JSONError(err.to_string()))?;
            println!("{}", json);

            if let Some(report) = connections.get_problem_report(handle).await? {
                info!("[connection:status] problem report: {:?}", report);
            }
        }
        ConnectionCommands::Send(args) => {
            let handle = ctx.load_connection(&connections, &args.name).await?;
            let msg_id = connections
                .send_message(handle, args.message, SendMessageOptions::default())
                .await?;

            ctx.save_connection(&connections, handle, &args.name).await?;
            info!("[connection:send] message sent: {}", msg_id);
        }
        ConnectionCommands::Ping(args) => {
            let handle = ctx.load_connection(&connections, &args.name).await?;
            connections.send_ping(handle, None).await?;

            ctx.save_connection(&connections, handle, &args.name).await?;
            info!("[connection:ping] ping sent to {}", args.name);
        }
        ConnectionCommands::Discover(args) => {
            let handle = ctx.load_connection(&connections, &args.name).await?;
            connections
                .send_discovery_features(handle, None, None)
                .await?;

            let protocols = connections.get_remote_protocols(handle).await?;
            ctx.save_connection(&connections, handle, &args.name).await?;

            info!("[connection:discover] query sent to {}", args.name);
            if !protocols.is_empty() {
                info!("[connection:discover] known protocols: {}", protocols.join(", "));
            }
        }
        ConnectionCommands::Redirect(args) => {
            let handle = ctx.load_connection(&connections, &args.name).await?;
            let existing = ctx.load_connection(&connections, &args.existing).await?;

            connections.redirect(handle, existing).await?;
            ctx.save_connection(&connections, handle, &args.name).await?;

            let details = connections.get_redirect_details(handle).await?;
            println!("{}", details);
        }
        ConnectionCommands::Delete(args) => {
            let handle = ctx.load_connection(&connections, &args.name).await?;
            connections.delete(handle).await?;

            ctx.snapshots()
                .remove(SnapshotKind::Connection, &args.name)
                .await?;

            info!("[connection:delete] connection removed: {}", args.name);
        }
        ConnectionCommands::List => {
            let mut rows: Vec<ConnectionRow> = Vec::new();
            let names = ctx.snapshots().list(SnapshotKind::Connection).await?;

            for name in names {
                let handle = ctx.load_connection(&connections, &name).await?;
                let info = connections.get_pairwise_info(handle).await?;
                rows.push(ConnectionRow::new(name, info));
            }

            print_rows(rows)?;
        }
    }

    Ok(())
}
