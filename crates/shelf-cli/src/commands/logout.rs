//! Logout command implementation.

use anyhow::{Context as _, Result};
use clap::Args;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(ctx: &Context, _args: LogoutArgs) -> Result<()> {
    if ctx.auth.token().is_none() {
        output::warn("Not logged in");
        return Ok(());
    }

    ctx.auth.logout().await.context("Failed to logout")?;

    output::success("Logged out");
    Ok(())
}
