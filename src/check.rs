use std::sync::Arc;

use anyhow::Context as _;

use crate::cli::CheckArgs;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::monitor::{Monitor, SourceOutcome};
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::schedule::ScheduleGate;
use crate::source::HttpFetcher;
use crate::state::StateStore;

pub async fn run(args: CheckArgs) -> anyhow::Result<()> {
    let config = Config::from_env(&args).context("load config")?;
    tracing::debug!(?config, "resolved config");

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(telegram)?),
        None => Arc::new(LogNotifier),
    };
    let fetcher = HttpFetcher::new(config.fetch_timeout)?;

    let monitor = Monitor::new(
        config.sources.clone(),
        ScheduleGate::new(config.reduced_day),
        StateStore::new(&config.state_path),
        Arc::new(fetcher),
        notifier,
        Arc::new(SystemClock),
    );

    tracing::info!(
        sources = ?config.sources.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        "check: start"
    );
    let report = monitor.run().await?;

    for (id, outcome) in &report.sources {
        match outcome {
            SourceOutcome::Skipped => tracing::info!(source = %id, "check: skipped"),
            SourceOutcome::Failed { reason } => {
                tracing::warn!(source = %id, %reason, "check: failed")
            }
            SourceOutcome::Checked(summary) => tracing::info!(
                source = %id,
                fetched = summary.fetched,
                known = summary.already_known,
                new = summary.new_records,
                notified = summary.notified,
                delivery_failures = summary.delivery_failures,
                marker_changed = summary.marker_changed,
                "check: done"
            ),
        }
    }

    Ok(())
}
