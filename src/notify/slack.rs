//! Slack notifications through `chat.postMessage`.
//!
//! Slack answers most failures with `200 OK` and `{"ok": false, "error": ...}`,
//! so the body is checked as well as the status code.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Notifier;
use crate::config::SlackConfig;
use crate::error::NotifyError;
use crate::search::SearchResult;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

pub struct SlackNotifier {
    client: Client,
    token: String,
    channel_id: String,
    api_url: String,
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: String,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(client: Client, config: &SlackConfig) -> Self {
        Self {
            client,
            token: config.token.clone(),
            channel_id: config.channel_id.clone(),
            api_url: POST_MESSAGE_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    fn format(result: &SearchResult) -> String {
        format!(
            "*{}*\n*Platform*: {}\n*Keyword*: {}\n*Posted*: {}\n{}\n<{}|Link>",
            result.title,
            result.platform,
            result.keyword,
            result.published_display(),
            result.content,
            result.url,
        )
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn notify(&self, result: &SearchResult) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&PostMessage {
                channel: &self.channel_id,
                text: Self::format(result),
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                sink: "slack",
                status: status.as_u16(),
                message,
            });
        }

        let body: PostMessageResponse = resp.json().await?;
        if !body.ok {
            return Err(NotifyError::Rejected {
                sink: "slack",
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| "unknown error".into()),
            });
        }

        tracing::info!(title = %result.title, url = %result.url, "Posted to Slack");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
