//! Confirm/cancel prompts answered with reactions

use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

pub const CONFIRM_EMOJI: &str = "✅";
pub const CANCEL_EMOJI: &str = "❌";

/// Answer to a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirmed,
    Cancelled,
    TimedOut,
}

/// Whether a reaction confirms (`Some(true)`) or cancels (`Some(false)`) a prompt
#[must_use]
pub fn decision_for(emoji: &str) -> Option<bool> {
    match emoji {
        CONFIRM_EMOJI => Some(true),
        CANCEL_EMOJI => Some(false),
        _ => None,
    }
}

struct Waiter {
    responder_id: u64,
    tx: oneshot::Sender<bool>,
}

/// A registered prompt waiting for its answer
pub struct PendingDecision {
    message_id: u64,
    rx: oneshot::Receiver<bool>,
}

/// Open prompts keyed by the id of the prompt message
#[derive(Default)]
pub struct DecisionPrompts {
    pending: DashMap<u64, Waiter>,
}

impl DecisionPrompts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prompt that only `responder_id` may answer
    pub fn open(&self, message_id: u64, responder_id: u64) -> PendingDecision {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(message_id, Waiter { responder_id, tx });
        PendingDecision { message_id, rx }
    }

    /// Answer an open prompt
    ///
    /// Returns `false` for unknown or closed prompts and for anyone other
    /// than the responder.
    pub fn resolve(&self, message_id: u64, user_id: u64, confirmed: bool) -> bool {
        let Some((_, waiter)) = self
            .pending
            .remove_if(&message_id, |_, waiter| waiter.responder_id == user_id)
        else {
            return false;
        };
        waiter.tx.send(confirmed).is_ok()
    }

    /// Wait for an answer to `pending`, closing the prompt afterwards
    pub async fn wait(&self, pending: PendingDecision, timeout: Duration) -> Decision {
        let PendingDecision { message_id, rx } = pending;
        let decision = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(true)) => Decision::Confirmed,
            Ok(Ok(false) | Err(_)) => Decision::Cancelled,
            Err(_) => Decision::TimedOut,
        };
        self.pending.remove(&message_id);
        debug!("Prompt {message_id} closed: {decision:?}");
        decision
    }

    /// Open a prompt and wait for its answer
    pub async fn await_decision(
        &self,
        message_id: u64,
        responder_id: u64,
        timeout: Duration,
    ) -> Decision {
        let pending = self.open(message_id, responder_id);
        self.wait(pending, timeout).await
    }

    #[must_use]
    pub fn is_open(&self, message_id: u64) -> bool {
        self.pending.contains_key(&message_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const MESSAGE: u64 = 10;
    const MODERATOR: u64 = 20;

    #[tokio::test]
    async fn test_confirm_and_cancel() {
        let prompts = DecisionPrompts::new();

        let pending = prompts.open(MESSAGE, MODERATOR);
        assert!(prompts.resolve(MESSAGE, MODERATOR, true));
        assert_eq!(prompts.wait(pending, Duration::from_secs(5)).await, Decision::Confirmed);

        let pending = prompts.open(MESSAGE, MODERATOR);
        assert!(prompts.resolve(MESSAGE, MODERATOR, false));
        assert_eq!(prompts.wait(pending, Duration::from_secs(5)).await, Decision::Cancelled);
        assert!(!prompts.is_open(MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_closes_prompt() {
        let prompts = Arc::new(DecisionPrompts::new());

        let waiter = {
            let prompts = Arc::clone(&prompts);
            tokio::spawn(async move {
                prompts
                    .await_decision(MESSAGE, MODERATOR, Duration::from_secs(30))
                    .await
            })
        };

        assert_eq!(waiter.await.unwrap(), Decision::TimedOut);
        assert!(!prompts.is_open(MESSAGE));
        assert!(!prompts.resolve(MESSAGE, MODERATOR, true));
    }

    #[tokio::test]
    async fn test_only_responder_can_answer() {
        let prompts = DecisionPrompts::new();
        let pending = prompts.open(MESSAGE, MODERATOR);

        assert!(!prompts.resolve(MESSAGE, 999, true));
        assert!(prompts.is_open(MESSAGE));

        assert!(prompts.resolve(MESSAGE, MODERATOR, false));
        assert_eq!(prompts.wait(pending, Duration::from_secs(5)).await, Decision::Cancelled);
    }

    #[test]
    fn test_unknown_prompt_is_ignored() {
        let prompts = DecisionPrompts::new();
        assert!(!prompts.resolve(404, MODERATOR, true));
    }

    #[test]
    fn test_reaction_mapping() {
        assert_eq!(decision_for(CONFIRM_EMOJI), Some(true));
        assert_eq!(decision_for(CANCEL_EMOJI), Some(false));
        assert_eq!(decision_for("🔥"), None);
    }
}
