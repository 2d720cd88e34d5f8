use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client as HttpClient;
use tracing::{info, warn};

use crate::bot::{self, OperatorBot};
use crate::collaborator::feed_file;
use crate::config::Config;
use crate::ledger::{Ledger, SqliteLedger};
use crate::relay::{LinkButton, Notifier, TelegramRelay};
use crate::worker::{Poller, StartOutcome, StopOutcome, WorkerControl, WorkerStatus};

use super::shared::load_classifier;

pub(super) async fn run() -> Result<()> {
    let cfg = Config::from_env()?;
    info!("{cfg}");

    let classifier = Arc::new(load_classifier(cfg.classifier_tables_path.as_deref())?);
    let ledger = Arc::new(
        SqliteLedger::open(&cfg.ledger_path)
            .with_context(|| format!("failed to open ledger {}", cfg.ledger_path))?,
    );

    let relay = TelegramRelay::new(HttpClient::new(), &cfg.bot.api_base, &cfg.bot.token);
    let button = cfg.bot.owner_link.clone().map(|url| LinkButton {
        text: "👤 Owner".into(),
        url,
    });
    let notifier = Notifier::new(
        Arc::new(relay.clone()),
        ledger.clone(),
        cfg.bot.notify_chat_id,
        cfg.bot.admin_id,
    )
    .with_button(button);

    let poller = Poller::new(
        classifier,
        ledger.clone(),
        Arc::new(notifier),
        cfg.mask,
        cfg.poll.clone(),
    );
    let feed_path = PathBuf::from(&cfg.feed_path);
    let control = Arc::new(WorkerControl::new(
        Arc::new(poller),
        Box::new(move || feed_file::spawn(&feed_path)),
    ));

    let operator = Arc::new(OperatorBot::new(
        relay,
        cfg.bot.admin_id,
        control.clone(),
        ledger.clone(),
    ));
    let bot_task = tokio::spawn(bot::run_bot_polling(operator));

    if ledger.status()? == WorkerStatus::Online {
        info!("Worker was online before restart – resuming");
        match control.start().await {
            Ok(StartOutcome::Started) => info!("Worker resumed"),
            Ok(StartOutcome::AlreadyRunning) => {}
            Err(e) => warn!("Could not resume worker: {e}"),
        }
    } else {
        info!("Worker offline. Send /on to start it.");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Ctrl-C received – shutting down");
    bot_task.abort();

    if let StopOutcome::Stopped(summary) = control.stop().await {
        info!("Worker stopped on exit ({summary})");
        // Resume on the next process start.
        if let Err(e) = ledger.set_status(WorkerStatus::Online) {
            warn!("Could not keep worker status online: {e}");
        }
    }

    Ok(())
}
