//! Discord notifications through the REST API.
//!
//! Messages are posted to one channel as the configured bot
//! (`POST /channels/{id}/messages`). Discord rejects messages over 2000
//! characters, so the post body is shortened to fit.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::Notifier;
use crate::config::DiscordConfig;
use crate::error::NotifyError;
use crate::search::SearchResult;

const API_URL: &str = "https://discord.com/api/v10";
const MESSAGE_LIMIT: usize = 2000;

pub struct DiscordNotifier {
    client: Client,
    token: String,
    channel_id: String,
    api_url: String,
}

#[derive(Debug, Serialize)]
struct CreateMessage {
    content: String,
}

impl DiscordNotifier {
    pub fn new(client: Client, config: &DiscordConfig) -> Self {
        Self {
            client,
            token: config.token.clone(),
            channel_id: config.channel_id.clone(),
            api_url: API_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    fn format(result: &SearchResult) -> String {
        let render = |title: &str, content: &str| {
            format!(
                "**{}**\n*Platform*: {}\n*Keyword*: {}\n*Posted*: {}\n{}\n{}",
                title,
                result.platform,
                result.keyword,
                result.published_display(),
                content,
                result.url,
            )
        };

        let message = render(&result.title, &result.content);
        let overflow = message.chars().count().saturating_sub(MESSAGE_LIMIT);
        if overflow == 0 {
            return message;
        }

        // The body goes first, then the title. The link is kept whole.
        let content_len = result.content.chars().count();
        if overflow < content_len {
            return render(&result.title, &shorten(&result.content, overflow));
        }
        let message = render(&shorten(&result.title, overflow - content_len), "");
        if message.chars().count() <= MESSAGE_LIMIT {
            return message;
        }
        message.chars().take(MESSAGE_LIMIT).collect()
    }
}

/// Drop `excess` characters from the end of `text`, marking the cut with an
/// ellipsis that replaces one more character.
fn shorten(text: &str, excess: usize) -> String {
    if excess == 0 {
        return text.to_string();
    }
    let keep = text.chars().count().saturating_sub(excess + 1);
    let mut shortened: String = text.chars().take(keep).collect();
    shortened.push('…');
    shortened
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn notify(&self, result: &SearchResult) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(format!("{}/channels/{}/messages", self.api_url, self.channel_id))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .json(&CreateMessage {
                content: Self::format(result),
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::error!(title = %result.title, url = %result.url, status = status.as_u16(), "Failed to send message to Discord");
            return Err(NotifyError::Rejected {
                sink: "discord",
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(title = %result.title, url = %result.url, "Posted to Discord");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_client, StubServer};

    fn result(content: &str) -> SearchResult {
        SearchResult::new("Bluesky", "rust", "Post by Alice", "https://bsky.app/profile/a/post/1", 1_704_067_200)
            .with_content(content)
    }

    #[test]
    fn format_uses_discord_markdown() {
        assert_eq!(
            DiscordNotifier::format(&result("hello")),
            "**Post by Alice**\n*Platform*: Bluesky\n*Keyword*: rust\n*Posted*: 01/01/2024 12:00 AM\nhello\nhttps://bsky.app/profile/a/post/1"
        );
    }

    #[test]
    fn long_content_is_shortened_to_the_limit() {
        let long = "x".repeat(5000);
        let message = DiscordNotifier::format(&result(&long));

        assert_eq!(message.chars().count(), MESSAGE_LIMIT);
        assert!(message.ends_with("…\nhttps://bsky.app/profile/a/post/1"));
        assert!(message.starts_with("**Post by Alice**"));
    }

    #[test]
    fn long_title_is_shortened_when_body_is_not_enough() {
        let result = SearchResult::new(
            "RSS",
            "rust",
            "t".repeat(2100),
            "https://example.com/feed/item",
            1_704_067_200,
        )
        .with_content("body");
        let message = DiscordNotifier::format(&result);

        assert_eq!(message.chars().count(), MESSAGE_LIMIT);
        assert!(message.starts_with("**ttt"));
        assert!(message.contains("…**\n*Platform*: RSS"));
        assert!(!message.contains("body"));
        assert!(message.ends_with("\nhttps://example.com/feed/item"));
    }

    #[test]
    fn oversized_link_is_cut_to_the_limit() {
        let url = format!("https://example.com/{}", "a".repeat(3000));
        let result = SearchResult::new("RSS", "rust", "title", url, 1_704_067_200);

        assert_eq!(DiscordNotifier::format(&result).chars().count(), MESSAGE_LIMIT);
    }

    #[tokio::test]
    async fn posts_with_bot_authorization() {
        let server = StubServer::start(vec![(200, r#"{"id": "1"}"#)]).await;
        let config = DiscordConfig {
            token: "bot-token".into(),
            channel_id: "987".into(),
        };
        let notifier = DiscordNotifier::new(test_client(), &config).with_api_url(server.url.clone());

        notifier.notify(&result("hi")).await.unwrap();

        let requests = server.requests();
        assert_eq!(requests[0].path, "/channels/987/messages");
        assert_eq!(requests[0].header("authorization"), Some("Bot bot-token"));
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert!(body["content"].as_str().unwrap().contains("**Post by Alice**"));
    }

    #[tokio::test]
    async fn rejected_message_is_an_error() {
        let server = StubServer::start(vec![(403, r#"{"message": "Missing Access"}"#)]).await;
        let config = DiscordConfig {
            token: "bot-token".into(),
            channel_id: "987".into(),
        };
        let notifier = DiscordNotifier::new(test_client(), &config).with_api_url(server.url.clone());

        let err = notifier.notify(&result("hi")).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { sink: "discord", status: 403, .. }));
    }
}
