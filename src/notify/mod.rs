//! Notification sinks.
//!
//! A [`Notifier`] receives every newly stored [`SearchResult`] and owns its
//! own formatting and transport. Zero or more are active in a run; the
//! orchestrator calls each one independently, so one failing sink never
//! blocks the others.

mod discord;
mod print;
mod slack;

pub use discord::DiscordNotifier;
pub use print::PrintNotifier;
pub use slack::SlackNotifier;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::search::SearchResult;

/// Trait that every notification sink must implement.
///
/// The orchestrator calls [`notify()`](Notifier::notify) at most once per
/// newly stored result per run, but implementations must tolerate being
/// called again with the same result (a duplicate message is acceptable).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short sink name used in log lines, e.g. `"slack"`.
    fn name(&self) -> &'static str;

    async fn notify(&self, result: &SearchResult) -> Result<(), NotifyError>;
}
