use std::sync::Arc;

use anyhow::Context as _;
use chrono::NaiveDate;

use crate::clock::Clock;
use crate::dedup::reconcile_with_legacy;
use crate::message::{render_marker_changed, render_record};
use crate::notify::Notifier;
use crate::schedule::{GateDecision, ScheduleGate};
use crate::source::{Fetcher, SourceId, SourceSpec};
use crate::state::{SourceState, StateStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub fetched: usize,
    pub already_known: usize,
    pub new_records: usize,
    pub notified: usize,
    pub delivery_failures: usize,
    pub marker_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Skipped,
    Failed { reason: String },
    Checked(CheckSummary),
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sources: Vec<(SourceId, SourceOutcome)>,
}

impl RunReport {
    pub fn outcome(&self, id: SourceId) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|(source, _)| *source == id)
            .map(|(_, outcome)| outcome)
    }
}

/// Runs one pass over the configured sources.
///
/// State is loaded once, each source is checked in isolation, and the merged
/// document is saved once at the end. A failing source keeps its previous
/// state; only loading or saving the document fails the run.
pub struct Monitor {
    sources: Vec<SourceSpec>,
    gate: ScheduleGate,
    store: StateStore,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl Monitor {
    pub fn new(
        sources: Vec<SourceSpec>,
        gate: ScheduleGate,
        store: StateStore,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sources,
            gate,
            store,
            fetcher,
            notifier,
            clock,
        }
    }

    pub async fn run(&self) -> anyhow::Result<RunReport> {
        let mut state = self.store.load().await.context("load state")?;
        let today = self.clock.now().date_naive();
        let mut report = RunReport::default();

        for source in &self.sources {
            let previous = state.source(source.id);
            let (outcome, updated) = self.check_source(source, previous, today).await;
            if let Some(updated) = updated {
                state.set_source(source.id, updated);
            }
            report.sources.push((source.id, outcome));
        }

        self.store.save(&state).await.context("save state")?;
        tracing::info!(path = %self.store.path().display(), "state saved");
        Ok(report)
    }

    /// Returns `None` as the updated state when the source must stay untouched.
    async fn check_source(
        &self,
        source: &SourceSpec,
        previous: SourceState,
        today: NaiveDate,
    ) -> (SourceOutcome, Option<SourceState>) {
        let mut next = previous;

        if source.gated && self.gate.evaluate(&mut next.flag, today) == GateDecision::Skip {
            tracing::info!(
                source = %source.id,
                reduced_day = %self.gate.reduced_day(),
                week = next.flag.week_number,
                "page change already seen this week; skipping check"
            );
            return (SourceOutcome::Skipped, None);
        }

        let fetched = match self.fetcher.fetch(source).await {
            Ok(fetched) => fetched,
            Err(err) => {
                let reason = format!("{err:#}");
                tracing::warn!(source = %source.id, error = %reason, "source check failed; state left unchanged");
                return (SourceOutcome::Failed { reason }, None);
            }
        };

        let mut summary = CheckSummary {
            fetched: fetched.records.len(),
            ..CheckSummary::default()
        };
        tracing::info!(
            source = %source.id,
            records = summary.fetched,
            known = next.known.len(),
            "page fetched"
        );

        let reconciled = reconcile_with_legacy(
            &next.known,
            &next.legacy_known,
            fetched.records,
            source.identity_fields,
        );
        summary.new_records = reconciled.new_records.len();
        summary.already_known = reconciled.known_count(summary.fetched);
        next.known = reconciled.ledger;

        for record in &reconciled.new_records {
            tracing::info!(source = %source.id, fields = ?record, "new record");
            self.deliver(source, &render_record(source, record), &mut summary)
                .await;
        }

        if source.has_marker
            && let Some(marker) = fetched.marker
        {
            let changed = if source.gated {
                self.gate
                    .observe_marker(&mut next.flag, &next.page_marker, &marker, today)
            } else {
                !next.page_marker.is_empty() && next.page_marker != marker
            };

            if changed {
                tracing::info!(
                    source = %source.id,
                    previous = %next.page_marker,
                    current = %marker,
                    "page marker changed"
                );
                summary.marker_changed = true;
                if reconciled.new_records.is_empty() {
                    let text = render_marker_changed(source, &next.page_marker, &marker);
                    self.deliver(source, &text, &mut summary).await;
                }
            }
            next.page_marker = marker;
        }

        if summary.new_records == 0 {
            tracing::info!(source = %source.id, "no new records");
        }

        (SourceOutcome::Checked(summary), Some(next))
    }

    /// Best effort: a failed send is logged and never retried.
    async fn deliver(&self, source: &SourceSpec, text: &str, summary: &mut CheckSummary) {
        match self.notifier.send(text).await {
            Ok(()) => summary.notified += 1,
            Err(err) => {
                summary.delivery_failures += 1;
                tracing::error!(source = %source.id, error = %format!("{err:#}"), "notification delivery failed");
            }
        }
    }
}
