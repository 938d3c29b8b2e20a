use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

use crate::source::{Fetched, Fetcher, SourceSpec};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Fetches source pages over HTTP and hands the body to the source parser.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build page http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceSpec) -> anyhow::Result<Fetched> {
        tracing::debug!(source = %source.id, url = %source.url, "fetch page");

        let response = self
            .client
            .get(source.url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "uk,en;q=0.8")
            .send()
            .await
            .with_context(|| format!("GET {}", source.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {} returned {status}", source.url);
        }

        let html = response
            .text()
            .await
            .with_context(|| format!("read body: {}", source.url))?;

        source
            .parse_page(&html)
            .with_context(|| format!("parse page: {}", source.url))
    }
}
