use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::classify::Classifier;
use crate::ledger::Ledger;
use crate::pipeline::{OtpEvent, build_event};
use crate::relay::Notifier;
use crate::relay::format::{self, MaskCfg};

use super::{
    PollConfig, Position, RunSummary, WorkerContext, WorkerError, WorkerState, WorkerStatus,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Counters for a single tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub rows: usize,
    /// Distinct events built from the batch.
    pub events: usize,
    pub relayed: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub resynced: bool,
}

enum Outcome {
    Relayed,
    Duplicate,
}

/// The tick body: rows → events → dedup → relay → ledger.
pub struct Poller {
    classifier: Arc<Classifier>,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<Notifier>,
    mask: MaskCfg,
    cfg: PollConfig,
}

impl Poller {
    pub fn new(
        classifier: Arc<Classifier>,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<Notifier>,
        mask: MaskCfg,
        cfg: PollConfig,
    ) -> Self {
        Self {
            classifier,
            ledger,
            notifier,
            mask,
            cfg,
        }
    }

    /// One poll cycle.  Per-row failures are contained here; only a failed
    /// fetch is returned as an error.
    pub async fn tick(&self, ctx: &mut WorkerContext) -> Result<TickReport, WorkerError> {
        let mut report = TickReport::default();

        if ctx.shared.take_resync_request() {
            info!("Resync requested by operator");
            resync(ctx).await;
            report.resynced = true;
        } else if ctx.empty_polls >= self.cfg.empty_poll_threshold {
            resync(ctx).await;
            report.resynced = true;
        }

        let rows = ctx.collaborator.fetch_rows().await?;
        report.rows = rows.len();

        let now = Utc::now();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for row in &rows {
            let Some(event) = build_event(row, &self.classifier, now) else {
                continue;
            };
            if !seen.insert((event.number.clone(), event.otp.clone())) {
                continue;
            }
            report.events += 1;

            match self.process_event(&event).await {
                Ok(Outcome::Relayed) => report.relayed += 1,
                Ok(Outcome::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Row for {} skipped: {e}", event.number);
                    if !matches!(e, WorkerError::RelayFailure { .. }) {
                        self.save_error(&format!("Row processing failed: {e}"));
                    }
                }
            }
        }

        if report.events == 0 {
            ctx.empty_polls += 1;
            debug!("Empty poll #{}", ctx.empty_polls);
            if ctx.empty_polls >= self.cfg.empty_poll_threshold {
                info!("{} consecutive empty polls – resyncing", ctx.empty_polls);
                resync(ctx).await;
                report.resynced = true;
            }
        } else {
            ctx.empty_polls = 0;
        }

        ctx.relayed += report.relayed as u64;
        ctx.shared.add_relayed(report.relayed as u64);
        Ok(report)
    }

    async fn process_event(&self, event: &OtpEvent) -> Result<Outcome, WorkerError> {
        let (number, otp) = (event.number.as_str(), event.otp.as_str());
        if self.ledger.exists(number, otp)?
            || self
                .ledger
                .recently_sent(number, otp, self.cfg.suppression_window)?
        {
            debug!("{number}/{otp} already handled");
            return Ok(Outcome::Duplicate);
        }

        self.ledger.record(event)?;

        let text = format::render(event, self.mask);
        if !self.notifier.deliver(&text).await {
            if self.cfg.retry_failed_relays {
                self.ledger.release(number, otp)?;
            }
            return Err(WorkerError::RelayFailure {
                number: number.to_string(),
                otp: otp.to_string(),
            });
        }

        self.ledger.mark_sent(number, otp)?;
        info!(
            "Relayed {} code for {} ({})",
            event.service,
            format::mask_number(number, self.mask.prefix, self.mask.suffix),
            event.country
        );
        Ok(Outcome::Relayed)
    }

    fn save_error(&self, message: &str) {
        if let Err(e) = self.ledger.save_error(message) {
            warn!("Could not persist error: {e}");
        }
    }

    pub(super) fn set_status(&self, status: WorkerStatus) {
        if let Err(e) = self.ledger.set_status(status) {
            warn!("Could not persist worker status {status}: {e}");
        }
    }
}

/// Re-navigate the collaborator and reset the empty-poll counter.
async fn resync(ctx: &mut WorkerContext) {
    ctx.shared.set_position(Position::Resyncing);
    let ok = ctx.collaborator.force_resync().await;
    ctx.empty_polls = 0;
    if ok {
        ctx.shared.set_position(Position::LiveView);
    } else {
        warn!("Resync failed");
        ctx.shared.set_position(Position::Lost);
    }
}

/// Full worker lifecycle for one run.  Returns when cancelled or when the
/// collaborator cannot be established.
pub async fn run(poller: Arc<Poller>, mut ctx: WorkerContext) -> RunSummary {
    ctx.shared.set_state(WorkerState::Starting);

    match poller
        .ledger
        .cleanup_older_than(poller.cfg.ledger_retention)
    {
        Ok(n) if n > 0 => info!("Purged {n} expired ledger rows"),
        Ok(_) => {}
        Err(e) => warn!("Ledger cleanup failed: {e}"),
    }

    let ready = tokio::select! {
        _ = ctx.cancel.cancelled() => None,
        ok = ctx.collaborator.ensure_ready() => Some(ok),
    };
    match ready {
        None => {
            info!("Worker cancelled during startup");
            return shutdown(&poller, &mut ctx).await;
        }
        Some(false) => {
            let err = WorkerError::FatalInit("monitoring view unreachable".into());
            error!("{err}");
            poller.save_error(&err.to_string());
            poller
                .notifier
                .notify_operator("❌ Not on the live view. Worker stopped, use /relogin and /on.")
                .await;
            ctx.collaborator.shutdown().await;
            poller.set_status(WorkerStatus::Offline);
            ctx.shared.set_position(Position::Lost);
            ctx.shared.set_state(WorkerState::Stopped);
            return RunSummary {
                relayed: 0,
                fatal: true,
            };
        }
        Some(true) => {}
    }

    ctx.shared.set_position(Position::LiveView);
    poller.set_status(WorkerStatus::Online);
    ctx.shared.set_state(WorkerState::Running);
    info!("Worker running (tick={:?})", poller.cfg.tick_interval);
    poller
        .notifier
        .notify_operator("✅ Live SMS worker started.")
        .await;

    let cancel = ctx.cancel.clone();
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let ticked = tokio::select! {
            _ = cancel.cancelled() => None,
            r = poller.tick(&mut ctx) => Some(r),
        };
        let Some(ticked) = ticked else {
            info!("Worker cancelled mid-tick");
            break;
        };

        let pause = match ticked {
            Ok(report) => {
                if report.events > 0 {
                    debug!(
                        "Tick: rows={} events={} relayed={} duplicates={} failed={}",
                        report.rows, report.events, report.relayed, report.duplicates, report.failed
                    );
                }
                poller.cfg.tick_interval
            }
            Err(e) => {
                error!("Tick failed: {e}");
                poller.save_error(&format!("Worker tick failed: {e}"));
                ctx.empty_polls += 1;
                if !ctx.collaborator.force_resync().await {
                    ctx.shared.set_position(Position::Lost);
                }
                poller.cfg.error_backoff
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    shutdown(&poller, &mut ctx).await
}

async fn shutdown(poller: &Poller, ctx: &mut WorkerContext) -> RunSummary {
    ctx.shared.set_state(WorkerState::Stopping);
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, ctx.collaborator.shutdown())
        .await
        .is_err()
    {
        warn!("Collaborator shutdown timed out");
    }
    poller.set_status(WorkerStatus::Offline);
    ctx.shared.set_position(Position::Unknown);

    let summary = RunSummary {
        relayed: ctx.relayed,
        fatal: false,
    };
    info!("Worker stopped: {summary}");
    poller
        .notifier
        .notify_operator(&format!(
            "🛑 Live SMS worker stopped. Relayed {} OTP(s) this run.",
            summary.relayed
        ))
        .await;
    ctx.shared.set_state(WorkerState::Stopped);
    summary
}
