use std::fmt;

use async_trait::async_trait;
use url::Url;

use crate::record::Record;

pub mod eliky;
pub mod http;
pub mod unci;

pub use http::HttpFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceId {
    Eliky,
    Unci,
}

impl SourceId {
    pub const ALL: [SourceId; 2] = [SourceId::Eliky, SourceId::Unci];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eliky => "eliky",
            Self::Unci => "unci",
        }
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eliky" => Ok(Self::Eliky),
            "unci" => Ok(Self::Unci),
            other => anyhow::bail!("unknown source: {other}"),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one watched page.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub id: SourceId,
    pub url: Url,
    /// Fields that jointly identify a record; volatile columns are left out.
    pub identity_fields: &'static [&'static str],
    /// Whether the page exposes a "last updated" marker.
    pub has_marker: bool,
    /// Whether the weekly reduced-day gate applies.
    pub gated: bool,
}

impl SourceSpec {
    pub fn new(id: SourceId, url: Url) -> Self {
        match id {
            SourceId::Eliky => Self {
                id,
                url,
                identity_fields: eliky::IDENTITY_FIELDS,
                has_marker: false,
                gated: false,
            },
            SourceId::Unci => Self {
                id,
                url,
                identity_fields: unci::IDENTITY_FIELDS,
                has_marker: true,
                gated: true,
            },
        }
    }

    pub fn default_url(id: SourceId) -> &'static str {
        match id {
            SourceId::Eliky => eliky::DEFAULT_URL,
            SourceId::Unci => unci::DEFAULT_URL,
        }
    }

    pub fn parse_page(&self, html: &str) -> anyhow::Result<Fetched> {
        match self.id {
            SourceId::Eliky => eliky::parse(html),
            SourceId::Unci => unci::parse(html),
        }
    }
}

/// Result of one successful page check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
    pub marker: Option<String>,
    pub records: Vec<Record>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &SourceSpec) -> anyhow::Result<Fetched>;
}

pub(crate) fn selector(css: &'static str) -> anyhow::Result<scraper::Selector> {
    scraper::Selector::parse(css).map_err(|err| anyhow::anyhow!("parse selector {css:?}: {err:?}"))
}

pub(crate) fn cell_text(cell: scraper::ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
