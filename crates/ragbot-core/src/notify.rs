//! Operator notification seam.

use async_trait::async_trait;

/// Broadcast channel towards the operators.
///
/// Delivery is best-effort: implementations log their own failures and
/// never propagate them, so a dead notification channel cannot block a
/// conversation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);
}
