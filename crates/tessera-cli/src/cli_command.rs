use anyhow::Context;
use tessera_client::{GetTokenOptions, Sdk};
use tessera_core::Session;
use tracing::{debug, warn};

use crate::cli_args::{Command, SignOutArgs, TokenArgs};

pub(crate) async fn handle_command(command: Command, sdk: &Sdk) -> anyhow::Result<()> {
    let name = command.name();
    debug!(event = "command_started", command = name);
    let result = run_command(command, sdk).await;
    if let Err(err) = &result {
        warn!(event = "command_failed", command = name, error = %err);
    }
    result
}

async fn run_command(command: Command, sdk: &Sdk) -> anyhow::Result<()> {
    match command {
        Command::Token(args) => handle_token(args, sdk).await?,
        Command::Client => {
            let client = sdk
                .get_client()
                .await
                .into_result()
                .context("failed to fetch client")?;
            println!("{}", serde_json::to_string_pretty(&client)?);
        }
        Command::SignOut(args) => handle_sign_out(args, sdk).await?,
        Command::Stages => {
            for stage in sdk.pipeline_stages() {
                println!("{stage}");
            }
        }
    }
    Ok(())
}

async fn handle_token(args: TokenArgs, sdk: &Sdk) -> anyhow::Result<()> {
    let options = GetTokenOptions {
        template: args.template,
        skip_cache: args.skip_cache,
        expiration_buffer: None,
    };
    let token = sdk
        .get_token(&Session::new(args.session.as_str()), &options)
        .await
        .ok_or_else(|| anyhow::anyhow!("no token available for session {}", args.session))?;
    println!("{}", token.jwt);
    Ok(())
}

async fn handle_sign_out(args: SignOutArgs, sdk: &Sdk) -> anyhow::Result<()> {
    if args.local {
        sdk.sign_out_local();
    } else {
        sdk.sign_out()
            .await
            .into_result()
            .context("failed to sign out")?;
    }
    println!("signed out");
    Ok(())
}
