mod bot;
mod classify;
mod collaborator;
mod config;
mod extract;
mod ledger;
mod modes;
mod pipeline;
mod relay;
mod worker;

use anyhow::Result;
use dotenvy::dotenv;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    modes::run_from_env().await
}
