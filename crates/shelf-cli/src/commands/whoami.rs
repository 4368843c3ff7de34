//! Whoami command implementation.

use anyhow::{Context as _, Result, bail};
use clap::Args;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {}

pub async fn run(ctx: &Context, _args: WhoamiArgs) -> Result<()> {
    if ctx.auth.token().is_none() {
        bail!("No active session. Run 'shelf login' first.");
    }

    let authenticated = ctx
        .auth
        .check_token()
        .await
        .context("Failed to check token")?;

    output::field("Server", ctx.config.server.as_str());
    output::field("Session", &ctx.config.session_path().display().to_string());

    if authenticated {
        output::success("Token accepted");
        Ok(())
    } else {
        bail!("Token rejected by the server. Run 'shelf login' again.");
    }
}
