use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::info;

use crate::collaborator::feed_file::read_rows;
use crate::config::ReplayCfg;
use crate::ledger::{Ledger, SqliteLedger};
use crate::pipeline::build_event;
use crate::relay::format;

use super::shared::load_classifier;

/// Offline run of the pipeline over a JSONL row dump.  Rendered
/// notifications are printed instead of relayed.
pub(super) async fn run() -> Result<()> {
    let replay = ReplayCfg::from_env()?;
    let rows = read_rows(Path::new(&replay.input_path))
        .with_context(|| format!("failed to read replay file {}", replay.input_path))?;
    if rows.is_empty() {
        return Err(anyhow!("Replay input is empty: {}", replay.input_path));
    }

    let classifier = load_classifier(replay.classifier_tables_path.as_deref())?;
    let ledger = SqliteLedger::open_in_memory()?;
    info!(
        "Replay started: {} rows from {}",
        rows.len(),
        replay.input_path
    );

    let mut forwarded = 0usize;
    let mut suppressed = 0usize;
    let mut skipped = 0usize;

    for (idx, row) in rows.iter().enumerate() {
        let Some(event) = build_event(row, &classifier, Utc::now()) else {
            skipped += 1;
            continue;
        };
        if ledger.exists(&event.number, &event.otp)? {
            suppressed += 1;
            continue;
        }
        ledger.record(&event)?;
        ledger.mark_sent(&event.number, &event.otp)?;
        forwarded += 1;

        println!(
            "\n[REPLAY OTP {}]\n{}\n",
            idx + 1,
            format::render(&event, replay.mask)
        );
    }

    info!(
        "Replay complete: total={}, forwarded={}, suppressed={}, skipped={}",
        rows.len(),
        forwarded,
        suppressed,
        skipped
    );

    Ok(())
}
