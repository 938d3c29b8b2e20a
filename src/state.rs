use std::collections::{BTreeMap, BTreeSet};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::cli::StateShowArgs;
use crate::schedule::ScheduleFlag;
use crate::source::SourceId;

pub const CURRENT_VERSION: u32 = 1;

/// Fingerprints already reported for one source.
pub type Ledger = BTreeSet<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceState {
    pub known: Ledger,
    /// Tokens carried over from the bare-list file, in the old hash format.
    #[serde(skip_serializing_if = "Ledger::is_empty")]
    pub legacy_known: Ledger,
    pub page_marker: String,
    pub flag: ScheduleFlag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceState>,
}

fn current_version() -> u32 {
    CURRENT_VERSION
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            sources: BTreeMap::new(),
        }
    }
}

impl PersistedState {
    pub fn source(&self, id: SourceId) -> SourceState {
        self.sources.get(id.as_str()).cloned().unwrap_or_default()
    }

    pub fn set_source(&mut self, id: SourceId, state: SourceState) {
        self.sources.insert(id.as_str().to_owned(), state);
    }
}

/// Shapes the state file has had over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// A bare JSON array of `eliky` fingerprints.
    LegacyList,
    /// `{ "version": 1, "sources": { ... } }`, any field possibly missing.
    V1,
}

impl DocumentShape {
    pub fn detect(value: &serde_json::Value) -> anyhow::Result<Self> {
        match value {
            serde_json::Value::Array(_) => Ok(Self::LegacyList),
            serde_json::Value::Object(map) => match map.get("version") {
                None => Ok(Self::V1),
                Some(version) => match version.as_u64() {
                    Some(1) => Ok(Self::V1),
                    Some(other) => anyhow::bail!("unsupported state version: {other}"),
                    None => anyhow::bail!("state version must be an integer: {version}"),
                },
            },
            other => anyhow::bail!("unexpected state document kind: {}", json_kind(other)),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Maps any known document shape onto the current [`PersistedState`].
pub fn upgrade(value: serde_json::Value) -> anyhow::Result<PersistedState> {
    match DocumentShape::detect(&value)? {
        DocumentShape::LegacyList => {
            let legacy_known: Ledger =
                serde_json::from_value(value).context("parse legacy fingerprint list")?;
            tracing::info!(entries = legacy_known.len(), "upgraded legacy list state");
            let mut state = PersistedState::default();
            state.set_source(
                SourceId::Eliky,
                SourceState {
                    legacy_known,
                    ..SourceState::default()
                },
            );
            Ok(state)
        }
        DocumentShape::V1 => {
            let mut state: PersistedState =
                serde_json::from_value(value).context("parse state document")?;
            state.version = CURRENT_VERSION;
            Ok(state)
        }
    }
}

/// Loads and saves the single state document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the empty document when no file exists yet. An existing file
    /// that cannot be parsed is an error, never an empty state.
    pub async fn load(&self) -> anyhow::Result<PersistedState> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file; starting empty");
                return Ok(PersistedState::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read state: {}", self.path.display()));
            }
        };

        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("corrupt state file: {}", self.path.display()))?;
        upgrade(value).with_context(|| format!("corrupt state file: {}", self.path.display()))
    }

    /// Replaces the document via a sibling temp file and a rename.
    pub async fn save(&self, state: &PersistedState) -> anyhow::Result<()> {
        write_json_atomic(&self.path, state)
            .await
            .with_context(|| format!("save state: {}", self.path.display()))
    }
}

#[derive(Debug, Serialize)]
struct SourceSummary<'a> {
    source: &'a str,
    known: usize,
    legacy_known: usize,
    page_marker: &'a str,
    week_number: u32,
    found: bool,
}

/// Prints one JSON line per stored source.
pub async fn show(args: StateShowArgs) -> anyhow::Result<()> {
    let store = StateStore::new(&args.state);
    let state = store.load().await?;

    let mut stdout = std::io::stdout().lock();
    for (source, entry) in &state.sources {
        let summary = SourceSummary {
            source: source.as_str(),
            known: entry.known.len(),
            legacy_known: entry.legacy_known.len(),
            page_marker: &entry.page_marker,
            week_number: entry.flag.week_number,
            found: entry.flag.found,
        };
        serde_json::to_writer(&mut stdout, &summary).context("write state summary")?;
        stdout.write_all(b"\n").context("write state summary newline")?;
    }
    stdout.flush().context("flush stdout")?;
    Ok(())
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let mut data = serde_json::to_vec_pretty(value).context("serialize json")?;
    data.push(b'\n');
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err).with_context(|| format!("rename tmp to final: {}", path.display()));
    }
    Ok(())
}
