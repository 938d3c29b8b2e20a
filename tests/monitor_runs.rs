use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone as _, Utc, Weekday};
use url::Url;

use medwatch::clock::FixedClock;
use medwatch::monitor::{Monitor, RunReport, SourceOutcome};
use medwatch::notify::Notifier;
use medwatch::record::Record;
use medwatch::schedule::{ScheduleFlag, ScheduleGate};
use medwatch::source::{Fetched, Fetcher, SourceId, SourceSpec};
use medwatch::state::{PersistedState, SourceState, StateStore};

#[derive(Default)]
struct ScriptedFetcher {
    pages: Mutex<HashMap<SourceId, Result<Fetched, String>>>,
    calls: Mutex<Vec<SourceId>>,
}

impl ScriptedFetcher {
    fn serve(&self, id: SourceId, page: Result<Fetched, String>) {
        self.pages.lock().unwrap().insert(id, page);
    }

    fn calls(&self) -> Vec<SourceId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, source: &SourceSpec) -> anyhow::Result<Fetched> {
        self.calls.lock().unwrap().push(source.id);
        match self.pages.lock().unwrap().get(&source.id).cloned() {
            Some(Ok(fetched)) => Ok(fetched),
            Some(Err(reason)) => Err(anyhow::anyhow!(reason)),
            None => Err(anyhow::anyhow!("no page scripted for {}", source.id)),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("telegram API error (502 Bad Gateway)");
        }
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: StateStore,
    fetcher: Arc<ScriptedFetcher>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    fn with_notifier(notifier: RecordingNotifier) -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        Self {
            _dir: dir,
            store,
            fetcher: Arc::new(ScriptedFetcher::default()),
            notifier: Arc::new(notifier),
        }
    }

    fn monitor(&self, sources: &[SourceId], day: (i32, u32, u32)) -> Monitor {
        let (y, m, d) = day;
        let now = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        let configured = sources
            .iter()
            .map(|id| {
                SourceSpec::new(*id, Url::parse(SourceSpec::default_url(*id)).unwrap())
            })
            .collect();
        Monitor::new(
            configured,
            ScheduleGate::new(Weekday::Fri),
            self.store.clone(),
            self.fetcher.clone(),
            self.notifier.clone(),
            Arc::new(FixedClock(now)),
        )
    }

    async fn run(&self, sources: &[SourceId], day: (i32, u32, u32)) -> RunReport {
        self.monitor(sources, day).run().await.unwrap()
    }

    async fn state(&self) -> PersistedState {
        self.store.load().await.unwrap()
    }
}

// ISO week 11 of 2026.
const TUESDAY: (i32, u32, u32) = (2026, 3, 10);
const FRIDAY: (i32, u32, u32) = (2026, 3, 13);

fn hospital(name: &str, qty: &str, date: &str) -> Record {
    Record::from([
        ("region", "Київська"),
        ("hospital", name),
        ("quantity", qty),
        ("date", date),
    ])
}

fn eliky_page() -> Fetched {
    Fetched {
        marker: None,
        records: vec![hospital("X", "5", "01.01"), hospital("Y", "3", "01.01")],
    }
}

fn unci_page(marker: &str, records: Vec<Record>) -> Fetched {
    Fetched {
        marker: Some(marker.to_owned()),
        records,
    }
}

#[tokio::test]
async fn new_records_are_notified_once() {
    let h = Harness::new();
    h.fetcher.serve(SourceId::Eliky, Ok(eliky_page()));

    let report = h.run(&[SourceId::Eliky], TUESDAY).await;

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].contains("X"));
    assert!(sent[1].contains("Y"));
    assert_eq!(h.state().await.source(SourceId::Eliky).known.len(), 2);
    match report.outcome(SourceId::Eliky) {
        Some(SourceOutcome::Checked(summary)) => {
            assert_eq!(summary.new_records, 2);
            assert_eq!(summary.notified, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    h.run(&[SourceId::Eliky], TUESDAY).await;

    assert_eq!(h.notifier.sent().len(), 2);
    assert_eq!(h.state().await.source(SourceId::Eliky).known.len(), 2);
}

#[tokio::test]
async fn marker_change_without_matches_sends_page_updated_message() {
    let h = Harness::new();
    let mut state = PersistedState::default();
    state.set_source(
        SourceId::Unci,
        SourceState {
            page_marker: "Оновлено 01.03".to_owned(),
            ..SourceState::default()
        },
    );
    h.store.save(&state).await.unwrap();
    h.fetcher
        .serve(SourceId::Unci, Ok(unci_page("Оновлено 05.03", Vec::new())));

    h.run(&[SourceId::Unci], TUESDAY).await;

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Оновлено 05.03"));
    assert!(sent[0].contains("не знайдено"));
    let unci = h.state().await.source(SourceId::Unci);
    assert_eq!(unci.page_marker, "Оновлено 05.03");
    assert_eq!(
        unci.flag,
        ScheduleFlag {
            week_number: 11,
            found: true
        }
    );
}

#[tokio::test]
async fn first_marker_observation_is_silent() {
    let h = Harness::new();
    h.fetcher
        .serve(SourceId::Unci, Ok(unci_page("v1", Vec::new())));

    h.run(&[SourceId::Unci], TUESDAY).await;

    assert!(h.notifier.sent().is_empty());
    let unci = h.state().await.source(SourceId::Unci);
    assert_eq!(unci.page_marker, "v1");
    assert!(!unci.flag.found);
    assert_eq!(unci.flag.week_number, 11);
}

#[tokio::test]
async fn marker_change_with_matches_only_notifies_records() {
    let h = Harness::new();
    let mut state = PersistedState::default();
    state.set_source(
        SourceId::Unci,
        SourceState {
            page_marker: "v1".to_owned(),
            ..SourceState::default()
        },
    );
    h.store.save(&state).await.unwrap();
    let record = Record::from([
        ("name", "Зитига"),
        ("substance", "Абіратерону ацетат"),
        ("storage", "Київ"),
        ("expiry", "12.2026"),
        ("batch", "A1"),
    ]);
    h.fetcher
        .serve(SourceId::Unci, Ok(unci_page("v2", vec![record])));

    h.run(&[SourceId::Unci], TUESDAY).await;

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Зитига"));
    let unci = h.state().await.source(SourceId::Unci);
    assert_eq!(unci.known.len(), 1);
    assert!(unci.flag.found);
}

#[tokio::test]
async fn reduced_day_skips_gated_source_after_change() {
    let h = Harness::new();
    let unci_before = SourceState {
        page_marker: "v2".to_owned(),
        flag: ScheduleFlag {
            week_number: 11,
            found: true,
        },
        ..SourceState::default()
    };
    let mut state = PersistedState::default();
    state.set_source(SourceId::Unci, unci_before.clone());
    h.store.save(&state).await.unwrap();
    h.fetcher.serve(SourceId::Eliky, Ok(eliky_page()));
    h.fetcher
        .serve(SourceId::Unci, Ok(unci_page("v3", Vec::new())));

    let report = h.run(&[SourceId::Eliky, SourceId::Unci], FRIDAY).await;

    assert_eq!(h.fetcher.calls(), vec![SourceId::Eliky]);
    assert_eq!(report.outcome(SourceId::Unci), Some(&SourceOutcome::Skipped));
    let after = h.state().await;
    assert_eq!(after.source(SourceId::Unci), unci_before);
    assert_eq!(after.source(SourceId::Eliky).known.len(), 2);
}

#[tokio::test]
async fn stale_flag_rolls_over_and_source_is_checked() {
    let h = Harness::new();
    let mut state = PersistedState::default();
    state.set_source(
        SourceId::Unci,
        SourceState {
            page_marker: "v2".to_owned(),
            flag: ScheduleFlag {
                week_number: 10,
                found: true,
            },
            ..SourceState::default()
        },
    );
    h.store.save(&state).await.unwrap();
    h.fetcher
        .serve(SourceId::Unci, Ok(unci_page("v2", Vec::new())));

    h.run(&[SourceId::Unci], FRIDAY).await;

    assert_eq!(h.fetcher.calls(), vec![SourceId::Unci]);
    let unci = h.state().await.source(SourceId::Unci);
    assert_eq!(
        unci.flag,
        ScheduleFlag {
            week_number: 11,
            found: false
        }
    );
}

#[tokio::test]
async fn failing_source_keeps_state_while_other_updates() {
    let h = Harness::new();
    let eliky_before = SourceState {
        known: ["seen".to_owned()].into_iter().collect(),
        ..SourceState::default()
    };
    let mut state = PersistedState::default();
    state.set_source(SourceId::Eliky, eliky_before.clone());
    h.store.save(&state).await.unwrap();
    h.fetcher.serve(
        SourceId::Eliky,
        Err("GET https://eliky.in.ua/medicament/10986: operation timed out".to_owned()),
    );
    h.fetcher
        .serve(SourceId::Unci, Ok(unci_page("v1", Vec::new())));

    let report = h.run(&[SourceId::Eliky, SourceId::Unci], TUESDAY).await;

    assert!(matches!(
        report.outcome(SourceId::Eliky),
        Some(SourceOutcome::Failed { reason }) if reason.contains("timed out")
    ));
    let after = h.state().await;
    assert_eq!(after.source(SourceId::Eliky), eliky_before);
    assert_eq!(after.source(SourceId::Unci).page_marker, "v1");
}

#[tokio::test]
async fn failed_delivery_still_marks_record_known() {
    let h = Harness::with_notifier(RecordingNotifier::failing());
    h.fetcher.serve(SourceId::Eliky, Ok(eliky_page()));

    let report = h.run(&[SourceId::Eliky], TUESDAY).await;

    match report.outcome(SourceId::Eliky) {
        Some(SourceOutcome::Checked(summary)) => {
            assert_eq!(summary.delivery_failures, 2);
            assert_eq!(summary.notified, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(h.state().await.source(SourceId::Eliky).known.len(), 2);

    let report = h.run(&[SourceId::Eliky], TUESDAY).await;
    match report.outcome(SourceId::Eliky) {
        Some(SourceOutcome::Checked(summary)) => assert_eq!(summary.new_records, 0),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn corrupt_state_aborts_before_any_fetch() {
    let h = Harness::new();
    std::fs::write(h.store.path(), "{\"sources\": [").unwrap();
    h.fetcher.serve(SourceId::Eliky, Ok(eliky_page()));

    let err = h
        .monitor(&[SourceId::Eliky], TUESDAY)
        .run()
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("corrupt state file"));
    assert!(h.fetcher.calls().is_empty());
    assert!(h.notifier.sent().is_empty());
    assert_eq!(
        std::fs::read_to_string(h.store.path()).unwrap(),
        "{\"sources\": ["
    );
}

#[tokio::test]
async fn legacy_list_state_is_upgraded_without_duplicate_alerts() {
    let h = Harness::new();
    // MD5 of "X|5|01.01" and "Y|3|01.01", as the pre-versioned file stored them.
    std::fs::write(
        h.store.path(),
        r#"["01090fcbddcc7d5cf2fbdc8b31069155", "458ae95ef381749f24aff687f62034af"]"#,
    )
    .unwrap();
    h.fetcher.serve(SourceId::Eliky, Ok(eliky_page()));

    h.run(&[SourceId::Eliky], TUESDAY).await;

    assert!(h.notifier.sent().is_empty());
    let raw = std::fs::read_to_string(h.store.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["version"], 1);
    assert_eq!(value["sources"]["eliky"]["known"].as_array().unwrap().len(), 2);
    assert_eq!(
        value["sources"]["eliky"]["legacy_known"]
            .as_array()
            .unwrap()
            .len(),
        2
    );

    h.run(&[SourceId::Eliky], TUESDAY).await;
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn legacy_upgrade_still_reports_rows_added_since() {
    let h = Harness::new();
    std::fs::write(h.store.path(), r#"["01090fcbddcc7d5cf2fbdc8b31069155"]"#).unwrap();
    h.fetcher.serve(SourceId::Eliky, Ok(eliky_page()));

    let report = h.run(&[SourceId::Eliky], TUESDAY).await;

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("<b>Лікарня:</b> Y"));
    match report.outcome(SourceId::Eliky) {
        Some(SourceOutcome::Checked(summary)) => {
            assert_eq!(summary.already_known, 1);
            assert_eq!(summary.new_records, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
