use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::Notifier;
use crate::error::NotifyError;
use crate::search::SearchResult;

/// Writes each result to stdout as a block of `Field: value` lines.
#[derive(Default)]
pub struct PrintNotifier;

impl PrintNotifier {
    pub fn new() -> Self {
        Self
    }

    fn format(result: &SearchResult) -> String {
        let mut block = format!(
            "Platform: {}\nKeyword: {}\nTitle: {}\nURL: {}\nTimestamp: {}\n",
            result.platform, result.keyword, result.title, result.url, result.timestamp
        );
        if !result.content.is_empty() {
            block.push_str(&format!("Content: {}\n", result.content));
        }
        block.push('\n');
        block
    }
}

#[async_trait]
impl Notifier for PrintNotifier {
    fn name(&self) -> &'static str {
        "print"
    }

    async fn notify(&self, result: &SearchResult) -> Result<(), NotifyError> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(Self::format(result).as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_lists_every_field() {
        let r = SearchResult::new("Reddit", "rust", "A post", "https://reddit.com/r/x", 1700000000);
        let text = PrintNotifier::format(&r);
        assert_eq!(
            text,
            "Platform: Reddit\nKeyword: rust\nTitle: A post\nURL: https://reddit.com/r/x\nTimestamp: 1700000000\n\n"
        );

        let text = PrintNotifier::format(&r.with_content("body text"));
        assert!(text.contains("Content: body text\n"));
    }

    #[tokio::test]
    async fn notify_succeeds() {
        let r = SearchResult::new("Reddit", "rust", "A post", "https://reddit.com/r/x", 1);
        PrintNotifier::new().notify(&r).await.unwrap();
        assert_eq!(PrintNotifier::new().name(), "print");
    }
}
