use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::config::TelegramConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> anyhow::Result<()>;
}

/// Delivers messages through the Telegram Bot API `sendMessage` method.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("build telegram http client")?;
        Ok(Self {
            client,
            endpoint: send_message_endpoint(&config.api_base, &config.token),
            chat_id: config.chat_id.clone(),
        })
    }
}

pub fn send_message_endpoint(api_base: &str, token: &str) -> String {
    let api_base = api_base.trim_end_matches('/');
    format!("{api_base}/bot{token}/sendMessage")
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        // The endpoint embeds the bot token; keep it out of error messages.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("POST sendMessage: {}", err.without_url()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .context("read telegram response body")?;
        if !status.is_success() {
            let message = parse_error_description(&raw).unwrap_or(raw);
            anyhow::bail!("telegram API error ({status}): {message}");
        }

        tracing::info!("telegram message sent");
        Ok(())
    }
}

fn parse_error_description(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let description = value.get("description")?.as_str()?.to_owned();
    Some(description)
}

/// Logs messages instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        tracing::info!(%text, "dry run: notification not sent");
        Ok(())
    }
}
