use cli_table::{print_stdout, WithTitle};

use rst_common::with_logging::log::{debug, info, warn};

use rstdev_domain::entity::ToJSON;

use prople_pairwise_core::credential::CredentialAPI;

use crate::commands::handler::ContextHandler;
use crate::types::CliError;

use super::types::{CredentialRow, OfferRow};
use super::CredentialCommands;

pub async fn handle_commands(
    ctx: &ContextHandler,
    commands: CredentialCommands,
) -> Result<(), CliError> {
    debug!("credential command handler triggered...");

    let connections = ctx.connections();
    let credentials = ctx.credentials(connections.clone());

    match commands {
        CredentialCommands::Offers(args) => {
            let connection = ctx.load_connection(&connections, &args.connection).await?;
            let offers = credentials.get_offers(connection).await?;
            debug!("[credential:offers] found {} offers", offers.len());

            let rows = offers.iter().map(OfferRow::from).collect::<Vec<OfferRow>>();
            print_stdout(rows.with_title()).map_err(|err| CliError::TableError(err.to_string()))?;

            for offer in offers {
                println!("{}", offer.offer);
            }
        }
        CredentialCommands::Accept(args) => {
            let connection = ctx.load_connection(&connections, &args.connection).await?;

            let handle = match args.payment {
                Some(txn) => {
                    let handle = credentials
                        .create_with_offer(args.name.clone(), args.offer)
                        .await?;

                    if let Err(err) = credentials
                        .send_request(handle, connection, Some(txn))
                        .await
                    {
                        warn!("[credential:accept] request failed, offer kept: {}", err);
                        ctx.save_credential(&credentials, handle, &args.name).await?;
                        return Err(err.into());
                    }

                    handle
                }
                None => {
                    match credentials
                        .accept_offer(args.name.clone(), args.offer, connection)
                        .await
                    {
                        Ok(acceptance) => acceptance.handle,
                        Err(err) => {
                            if let Some(handle) = err.handle {
                                warn!("[credential:accept] request failed, offer kept: {}", err);
                                ctx.save_credential(&credentials, handle, &args.name).await?;
                            }

                            return Err(err.source.into());
                        }
                    }
                }
            };

            ctx.save_credential(&credentials, handle, &args.name).await?;
            ctx.save_connection(&connections, connection, &args.connection)
                .await?;

            let state = credentials.get_state(handle).await?;
            info!("[credential:accept] {}: {}", args.name, state);
        }
        CredentialCommands::Request(args) => {
            let handle = ctx.load_credential(&credentials, &args.name).await?;
            let connection = ctx.load_connection(&connections, &args.connection).await?;

            credentials
                .send_request(handle, connection, args.payment)
                .await?;

            ctx.save_credential(&credentials, handle, &args.name).await?;
            ctx.save_connection(&connections, connection, &args.connection)
                .await?;

            let state = credentials.get_state(handle).await?;
            info!("[credential:request] {}: {}", args.name, state);
        }
        CredentialCommands::Update(args) => {
            let handle = ctx.load_credential(&credentials, &args.name).await?;
            let state = credentials.update_state(handle).await?;

            ctx.save_credential(&credentials, handle, &args.name).await?;
            info!("[credential:update] {}: {}", args.name, state);
        }
        CredentialCommands::Status(args) => {
            let handle = ctx.load_credential(&credentials, &args.name).await?;
            let exchange = credentials.get_exchange(handle).await?;

            let rows = vec![CredentialRow::new(args.name.clone(), &exchange)];
            print_stdout(rows.with_title()).map_err(|err| CliError::TableError(err.to_string()))?;

            let json = exchange
                .to_json()
                .map_err(|err| CliError::JSONError(err.to_string()))?;
            println!("{}", json);

            if let Some(report) = credentials.get_problem_report(handle).await? {
                info!("[credential:status] problem report: {:?}", report);
            }
        }
        CredentialCommands::Reject(args) => {
            let handle = ctx.load_credential(&credentials, &args.name).await?;
            let connection = ctx.load_connection(&connections, &args.connection).await?;

            credentials.reject(handle, connection, args.comment).await?;
            ctx.save_credential(&credentials, handle, &args.name).await?;

            info!("[credential:reject] exchange abandoned: {}", args.name);
        }
    }

    Ok(())
}
