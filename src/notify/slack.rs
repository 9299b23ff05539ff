// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Slack notifications through an incoming webhook or a bot token.

use crate::constants::USER_AGENT;
use crate::error::{PreviewError, Result};
use crate::notify::Notifier;
use crate::preview::PreviewConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackConfig {
    Webhook { url: String },
    Bot { token: String, channel_id: String },
}

impl SlackConfig {
    /// A webhook URL wins over a bot token. A bot token needs a channel.
    pub fn from_parts(
        webhook_url: Option<String>,
        bot_token: Option<String>,
        channel_id: Option<String>,
    ) -> Option<Self> {
        let present = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = present(webhook_url) {
            return Some(SlackConfig::Webhook { url });
        }
        match (present(bot_token), present(channel_id)) {
            (Some(token), Some(channel_id)) => Some(SlackConfig::Bot { token, channel_id }),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

enum CallError {
    /// Slack answered with `ok: false`
    Api(String),
    Transport(String),
}

impl From<CallError> for PreviewError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Api(code) => PreviewError::NotifyError(format!("slack error: {}", code)),
            CallError::Transport(msg) => PreviewError::NotifyError(msg),
        }
    }
}

pub struct SlackNotifier {
    http: reqwest::Client,
    config: SlackConfig,
    api_base: String,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Result<Self> {
        Self::with_api_base(config, DEFAULT_API_BASE)
    }

    pub fn with_api_base(config: SlackConfig, api_base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PreviewError::NotifyError(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            http,
            config,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn send_webhook(&self, url: &str, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| PreviewError::NotifyError(format!("slack webhook request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PreviewError::NotifyError(format!(
                "slack webhook failed: status={} body={}",
                status.as_u16(),
                body.trim()
            )));
        }
        Ok(())
    }

    async fn send_bot(&self, token: &str, channel_id: &str, text: &str) -> Result<()> {
        let message = json!({ "channel": channel_id, "text": text });

        match self.call(token, "chat.postMessage", &message).await {
            Err(CallError::Api(code)) if code == "not_in_channel" => {
                info!("Slack bot not in channel {}, joining", channel_id);
                self.call(token, "conversations.join", &json!({ "channel": channel_id }))
                    .await
                    .map_err(|e| {
                        let reason = match e {
                            CallError::Api(code) => code,
                            CallError::Transport(msg) => msg,
                        };
                        PreviewError::NotifyError(format!(
                            "not_in_channel and failed to join: {}",
                            reason
                        ))
                    })?;
                Ok(self.call(token, "chat.postMessage", &message).await?)
            }
            other => Ok(other?),
        }
    }

    async fn call(
        &self,
        token: &str,
        method: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<(), CallError> {
        let resp = self
            .http
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("{} request failed: {}", method, e)))?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if status != reqwest::StatusCode::OK {
            return Err(CallError::Transport(format!(
                "{} failed: status={} body={}",
                method,
                status.as_u16(),
                raw.trim()
            )));
        }

        match serde_json::from_str::<ApiResponse>(&raw) {
            Ok(parsed) if !parsed.ok => Err(CallError::Api(
                parsed.error.unwrap_or_else(|| "unknown_error".to_string()),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, _config: &PreviewConfig, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PreviewError::NotifyError("message is empty".to_string()));
        }

        match &self.config {
            SlackConfig::Webhook { url } => self.send_webhook(url, text).await?,
            SlackConfig::Bot { token, channel_id } => self.send_bot(token, channel_id, text).await?,
        }
        debug!("Slack notification sent");
        Ok(())
    }
}
