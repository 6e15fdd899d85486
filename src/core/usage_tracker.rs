//! Character usage tracking and per-run quota management

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::models::CharacterUsage;

/// Tracks characters sent to the translation API during one run
#[derive(Debug, Clone)]
pub struct UsageTracker {
    usage: Arc<RwLock<CharacterUsage>>,
}

impl UsageTracker {
    /// Create a tracker with an optional character limit
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            usage: Arc::new(RwLock::new(CharacterUsage::new(limit))),
        }
    }

    /// Check if enough characters are available
    pub async fn can_use(&self, chars: usize) -> bool {
        self.usage.read().await.can_use(chars)
    }

    /// Record characters sent to the API
    pub async fn record(&self, chars: usize) -> anyhow::Result<()> {
        let mut usage = self.usage.write().await;
        usage.record(chars)?;
        debug!(
            "Sent {} characters, {} used this run",
            chars, usage.used
        );
        Ok(())
    }

    /// Get current usage statistics
    pub async fn get_stats(&self) -> CharacterUsage {
        self.usage.read().await.clone()
    }

    /// Characters left before the per-run limit, `None` when unlimited
    pub async fn remaining(&self) -> Option<usize> {
        self.usage.read().await.remaining()
    }

    /// Check if quota is low (less than 10% remaining)
    pub async fn is_low(&self) -> bool {
        let usage = self.usage.read().await;
        match (usage.limit, usage.remaining()) {
            (Some(limit), Some(remaining)) => remaining < limit / 10,
            _ => false,
        }
    }
}
