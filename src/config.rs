use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Weekday;
use url::Url;

use crate::cli::CheckArgs;
use crate::schedule::parse_weekday;
use crate::source::{SourceId, SourceSpec};

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Everything a `check` run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_path: PathBuf,
    pub sources: Vec<SourceSpec>,
    pub reduced_day: Weekday,
    pub fetch_timeout: Duration,
    /// `None` in dry-run mode.
    pub telegram: Option<TelegramConfig>,
}

impl Config {
    pub fn from_env(args: &CheckArgs) -> anyhow::Result<Self> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    pub fn resolve(
        args: &CheckArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let telegram = if args.dry_run {
            None
        } else {
            Some(telegram_from(&env)?)
        };

        let selector = match args.sources.clone() {
            Some(raw) => raw,
            None => env("MEDWATCH_SOURCES").unwrap_or_default(),
        };
        let ids = parse_source_selection(&selector)
            .with_context(|| format!("invalid source selection {selector:?}"))?;

        let mut sources = Vec::with_capacity(ids.len());
        for id in ids {
            let raw_url = match id {
                SourceId::Eliky => &args.eliky_url,
                SourceId::Unci => &args.unci_url,
            };
            let url = parse_page_url(raw_url).with_context(|| format!("--{id}-url"))?;
            sources.push(SourceSpec::new(id, url));
        }

        let reduced_day = parse_weekday(&args.reduced_day).context("--reduced-day")?;
        if args.timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be positive");
        }

        Ok(Self {
            state_path: PathBuf::from(&args.state),
            sources,
            reduced_day,
            fetch_timeout: Duration::from_secs(args.timeout_secs),
            telegram,
        })
    }
}

fn telegram_from(env: &impl Fn(&str) -> Option<String>) -> anyhow::Result<TelegramConfig> {
    let token = required(env, "TELEGRAM_TOKEN")
        .or_else(|_| required(env, "BOT_TOKEN"))
        .context("TELEGRAM_TOKEN is required (or pass --dry-run)")?;
    let chat_id = required(env, "CHAT_ID").context("CHAT_ID is required (or pass --dry-run)")?;
    let api_base = env("TELEGRAM_API_URL")
        .map(|raw| raw.trim().to_owned())
        .filter(|raw| !raw.is_empty())
        .unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_owned());

    Ok(TelegramConfig {
        token,
        chat_id,
        api_base,
    })
}

fn required(env: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<String> {
    let value = env(key).ok_or_else(|| anyhow::anyhow!("{key} is not set"))?;
    let value = value.trim().to_owned();
    if value.is_empty() {
        anyhow::bail!("{key} is empty");
    }
    Ok(value)
}

/// `""` and `all` select every source; otherwise a comma-separated id list.
pub fn parse_source_selection(raw: &str) -> anyhow::Result<Vec<SourceId>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return Ok(SourceId::ALL.to_vec());
    }

    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = SourceId::parse(part)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        anyhow::bail!("no sources selected");
    }
    Ok(ids)
}

fn parse_page_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("parse url: {raw}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("url must be http/https: {url}");
    }
    Ok(url)
}
