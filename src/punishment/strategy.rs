//! Punishment strategies
//!
//! Each [`PunishmentKind`] has one strategy describing its external side
//! effect and, for timed kinds, how to undo it.

use crate::punishment::{
    ActiveEntry, ModerationPlatform, PunishmentError, PunishmentKind, PunishmentRecord,
    PunishmentResult, RegistryEntry, RegistryId,
};
use std::collections::HashMap;
use tracing::{info, warn};

/// Outcome of a successful reversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversalOutcome {
    /// The restriction was removed
    Lifted,
    /// The target is gone; nothing left to remove
    TargetUnavailable,
    /// Entry removed without touching the platform, a later punishment of
    /// the same kind still holds the restriction
    Superseded,
}

/// What gets persisted for an issued punishment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPayload {
    pub registry: RegistryEntry,
    /// Present for timed kinds only
    pub active: Option<ActiveEntry>,
}

/// Behaviour of one punishment kind
#[async_trait::async_trait]
pub trait PunishmentStrategy: Send + Sync {
    fn kind(&self) -> PunishmentKind;

    /// Perform the external side effect of the punishment
    async fn apply(
        &self,
        platform: &dyn ModerationPlatform,
        record: &PunishmentRecord,
    ) -> PunishmentResult<()>;

    /// Undo the side effect. Must be safe to call more than once.
    async fn reverse(
        &self,
        _platform: &dyn ModerationPlatform,
        _target_id: u64,
    ) -> PunishmentResult<ReversalOutcome> {
        Err(PunishmentError::NotReversible(self.kind()))
    }

    /// Documents to persist for `record` under `id`
    fn describe(&self, id: RegistryId, record: PunishmentRecord) -> RegistryPayload {
        let registry = RegistryEntry { id, record };
        let active = registry.active_entry();
        RegistryPayload { registry, active }
    }
}

/// Message sent to the punished member
fn notification(record: &PunishmentRecord) -> String {
    match record.duration() {
        Some(duration) => format!(
            "You have been {} for {duration}. Reason: {}",
            record.kind().action(),
            record.reason()
        ),
        None => format!(
            "You have been {}. Reason: {}",
            record.kind().action(),
            record.reason()
        ),
    }
}

/// Notify the member; a failed notification never fails the punishment
async fn notify_best_effort(platform: &dyn ModerationPlatform, record: &PunishmentRecord) {
    let target_id = record.target_id();
    if let Err(e) = platform.notify_member(target_id, &notification(record)).await {
        warn!("Could not notify user {target_id} of {}: {e}", record.kind());
    }
}

pub struct WarnStrategy;

#[async_trait::async_trait]
impl PunishmentStrategy for WarnStrategy {
    fn kind(&self) -> PunishmentKind {
        PunishmentKind::Warn
    }

    async fn apply(
        &self,
        platform: &dyn ModerationPlatform,
        record: &PunishmentRecord,
    ) -> PunishmentResult<()> {
        notify_best_effort(platform, record).await;
        info!("Warned user {}", record.target_id());
        Ok(())
    }
}

pub struct MuteStrategy;

#[async_trait::async_trait]
impl PunishmentStrategy for MuteStrategy {
    fn kind(&self) -> PunishmentKind {
        PunishmentKind::Mute
    }

    async fn apply(
        &self,
        platform: &dyn ModerationPlatform,
        record: &PunishmentRecord,
    ) -> PunishmentResult<()> {
        platform
            .grant_muted_role(record.target_id(), record.reason())
            .await?;
        notify_best_effort(platform, record).await;
        Ok(())
    }

    async fn reverse(
        &self,
        platform: &dyn ModerationPlatform,
        target_id: u64,
    ) -> PunishmentResult<ReversalOutcome> {
        match platform.revoke_muted_role(target_id).await {
            Ok(()) => Ok(ReversalOutcome::Lifted),
            Err(PunishmentError::TargetUnavailable(_) | PunishmentError::MemberUnavailable(_)) => {
                Ok(ReversalOutcome::TargetUnavailable)
            }
            Err(e) => Err(e),
        }
    }
}

pub struct KickStrategy;

#[async_trait::async_trait]
impl PunishmentStrategy for KickStrategy {
    fn kind(&self) -> PunishmentKind {
        PunishmentKind::Kick
    }

    async fn apply(
        &self,
        platform: &dyn ModerationPlatform,
        record: &PunishmentRecord,
    ) -> PunishmentResult<()> {
        // Direct messages fail once the member shares no guild with the bot,
        // so the notice goes out before the kick and may announce a failed one
        notify_best_effort(platform, record).await;
        platform.kick(record.target_id(), record.reason()).await
    }
}

pub struct BanStrategy;

#[async_trait::async_trait]
impl PunishmentStrategy for BanStrategy {
    fn kind(&self) -> PunishmentKind {
        PunishmentKind::Ban
    }

    async fn apply(
        &self,
        platform: &dyn ModerationPlatform,
        record: &PunishmentRecord,
    ) -> PunishmentResult<()> {
        platform.ban(record.target_id(), record.reason()).await?;
        notify_best_effort(platform, record).await;
        Ok(())
    }

    async fn reverse(
        &self,
        platform: &dyn ModerationPlatform,
        target_id: u64,
    ) -> PunishmentResult<ReversalOutcome> {
        match platform.unban(target_id).await {
            // A ban that is already gone counts as lifted
            Ok(()) | Err(PunishmentError::TargetUnavailable(_)) => Ok(ReversalOutcome::Lifted),
            Err(e) => Err(e),
        }
    }
}

pub struct PermaBanStrategy;

#[async_trait::async_trait]
impl PunishmentStrategy for PermaBanStrategy {
    fn kind(&self) -> PunishmentKind {
        PunishmentKind::PermaBan
    }

    async fn apply(
        &self,
        platform: &dyn ModerationPlatform,
        record: &PunishmentRecord,
    ) -> PunishmentResult<()> {
        platform.ban(record.target_id(), record.reason()).await?;
        notify_best_effort(platform, record).await;
        Ok(())
    }
}

/// Lookup from kind to strategy
pub struct StrategyRegistry {
    strategies: HashMap<PunishmentKind, Box<dyn PunishmentStrategy>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    /// Registry with the built-in strategy for every kind
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(WarnStrategy));
        registry.register(Box::new(MuteStrategy));
        registry.register(Box::new(KickStrategy));
        registry.register(Box::new(BanStrategy));
        registry.register(Box::new(PermaBanStrategy));
        registry
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register a strategy under its own kind, replacing any previous one
    pub fn register(&mut self, strategy: Box<dyn PunishmentStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    /// Strategy for `kind`
    ///
    /// # Errors
    /// Returns `Other` when nothing is registered for `kind`.
    pub fn resolve(&self, kind: PunishmentKind) -> PunishmentResult<&dyn PunishmentStrategy> {
        self.strategies
            .get(&kind)
            .map(|strategy| strategy.as_ref())
            .ok_or_else(|| PunishmentError::Other(format!("No strategy registered for {kind}")))
    }
}
