//! Notification sink.
//!
//! One-way, fire-and-forget delivery to a user or to the operator. The real
//! transport (the chat layer) lives outside this crate; `LogNotifier` stands
//! in for it, and `RecordingNotifier` captures messages for tests. Delivery
//! failures are logged by callers and never propagated into ledger results.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message to a user identity.
    async fn notify(&self, user_id: i64, text: &str) -> Result<()>;

    /// Deliver a message to the operator identity.
    async fn notify_operator(&self, text: &str) -> Result<()>;
}

/// Tracing-backed sink used when no chat transport is attached.
pub struct LogNotifier {
    operator_id: i64,
}

impl LogNotifier {
    pub fn new(operator_id: i64) -> Self {
        Self { operator_id }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: i64, text: &str) -> Result<()> {
        info!(user_id, text, "notify");
        Ok(())
    }

    async fn notify_operator(&self, text: &str) -> Result<()> {
        info!(operator_id = self.operator_id, text, "notify operator");
        Ok(())
    }
}

/// Test sink that records every message it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Target, String)>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    User(i64),
    Operator,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(Target, String)> {
        self.messages.lock().clone()
    }

    pub fn sent_to(&self, user_id: i64) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(t, _)| *t == Target::User(user_id))
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn operator_messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(t, _)| *t == Target::Operator)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: i64, text: &str) -> Result<()> {
        self.messages
            .lock()
            .push((Target::User(user_id), text.to_string()));
        Ok(())
    }

    async fn notify_operator(&self, text: &str) -> Result<()> {
        self.messages
            .lock()
            .push((Target::Operator, text.to_string()));
        Ok(())
    }
}
