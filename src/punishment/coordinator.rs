//! Lifecycle coordinator
//!
//! The coordinator is the only writer of the registry and active stores. A
//! punishment moves through [`LifecycleState`]: the strategy applies the
//! side effect first, then the registry entry is written, then the active
//! entry for timed kinds. Reversal runs the strategy before the conditional
//! delete, so a failed reversal keeps the entry for the next sweep.

use crate::PUNISHMENT_TARGET;
use crate::punishment::{
    ActiveEntry, ActiveFilter, AdminMessage, Clock, DynActiveStore, DynAdminLog, DynPlatform,
    DynRegistryStore, PunishmentError, PunishmentKind, PunishmentRecord, PunishmentResult,
    RegistryEntry, RegistryFilter, RegistryId, RegistryPayload, ReversalOutcome, StrategyRegistry,
    SystemClock,
};
use derive_more::Display;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stage of a punishment, used in lifecycle logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LifecycleState {
    Requested,
    Applied,
    Recorded,
    Active,
    Reversing,
    Reversed,
    Terminal,
}

/// A moderator's request to punish a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunishmentRequest {
    pub target_id: u64,
    pub issuer_id: u64,
    pub kind: PunishmentKind,
    /// Raw text after the target, duration and/or reason
    pub arguments: Option<String>,
}

impl PunishmentRequest {
    #[must_use]
    pub fn new(
        target_id: u64,
        issuer_id: u64,
        kind: PunishmentKind,
        arguments: Option<String>,
    ) -> Self {
        Self {
            target_id,
            issuer_id,
            kind,
            arguments,
        }
    }
}

/// An active entry that was reversed and removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiftedPunishment {
    pub entry: ActiveEntry,
    pub outcome: ReversalOutcome,
}

/// Result of one expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Reversed and removed
    pub lifted: usize,
    /// Removed although the target was gone
    pub target_gone: usize,
    /// Reversal failed, kept for the next sweep
    pub failed: usize,
    /// Already removed by a concurrent lift
    pub skipped: usize,
    /// Removed while a later punishment of the same kind keeps the restriction
    pub superseded: usize,
}

impl SweepReport {
    #[must_use]
    pub const fn removed(&self) -> usize {
        self.lifted + self.target_gone + self.superseded
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.removed() + self.failed + self.skipped == 0
    }
}

/// Orchestrates issuing, lifting and expiring punishments
#[derive(Clone)]
pub struct LifecycleCoordinator {
    registry: DynRegistryStore,
    active: DynActiveStore,
    strategies: Arc<StrategyRegistry>,
    platform: DynPlatform,
    admin_log: DynAdminLog,
    clock: Arc<dyn Clock>,
}

impl LifecycleCoordinator {
    /// Coordinator with the built-in strategies and the system clock
    #[must_use]
    pub fn new(
        registry: DynRegistryStore,
        active: DynActiveStore,
        platform: DynPlatform,
        admin_log: DynAdminLog,
    ) -> Self {
        Self {
            registry,
            active,
            strategies: Arc::new(StrategyRegistry::new()),
            platform,
            admin_log,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = Arc::new(strategies);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply a punishment and record it
    ///
    /// # Errors
    /// Side-effect failures abort before anything is stored. A failed active
    /// insert after a successful registry insert returns the store error and
    /// leaves the registry entry in place.
    pub async fn issue(&self, request: PunishmentRequest) -> PunishmentResult<RegistryEntry> {
        let PunishmentRequest {
            target_id,
            issuer_id,
            kind,
            arguments,
        } = request;

        let record = PunishmentRecord::from_arguments(
            target_id,
            issuer_id,
            kind,
            arguments.as_deref(),
            self.clock.now(),
        )?;
        let strategy = self.strategies.resolve(kind)?;
        log_transition(target_id, None, LifecycleState::Requested);

        if let Err(e) = strategy.apply(self.platform.as_ref(), &record).await {
            warn!(target: PUNISHMENT_TARGET, target_id, %kind, state = %LifecycleState::Terminal, "Failed to apply punishment: {e}");
            return Err(e);
        }
        log_transition(target_id, None, LifecycleState::Applied);

        let RegistryPayload { registry, active } = strategy.describe(RegistryId::new(), record);
        let registry_id = registry.id;

        if let Err(e) = self.registry.insert(registry.clone()).await {
            error!(target: PUNISHMENT_TARGET, target_id, %kind, "Punishment applied but not recorded: {e}");
            return Err(e);
        }
        log_transition(target_id, Some(registry_id), LifecycleState::Recorded);

        match active {
            Some(active) => {
                if let Err(e) = self.active.insert(active).await {
                    error!(target: PUNISHMENT_TARGET, target_id, %registry_id, "Failed to track timed punishment: {e}");
                    self.post(AdminMessage::untracked(registry_id, target_id)).await;
                    return Err(e);
                }
                log_transition(target_id, Some(registry_id), LifecycleState::Active);
            }
            None => log_transition(target_id, Some(registry_id), LifecycleState::Terminal),
        }

        let name = self.platform.display_name(target_id).await;
        self.post(AdminMessage::punished(&registry, name.as_deref())).await;

        info!(
            target: PUNISHMENT_TARGET,
            "User {target_id} {} by {issuer_id} ({registry_id})",
            kind.action()
        );
        Ok(registry)
    }

    /// Lift the active punishments of `target_id`, optionally only of one kind
    ///
    /// # Errors
    /// Returns `NoActivePunishment` when nothing matches, or the reversal
    /// error when no matching entry could be lifted.
    pub async fn lift(
        &self,
        target_id: u64,
        kind: Option<PunishmentKind>,
    ) -> PunishmentResult<Vec<LiftedPunishment>> {
        let mut filter = ActiveFilter::all().target(target_id);
        filter.kind = kind;

        let mut entries = self.active.find(&filter).await?;
        if entries.is_empty() {
            return Err(PunishmentError::NoActivePunishment(target_id));
        }
        // Latest last, so it is the one that reverses the restriction
        entries.sort_by_key(ActiveEntry::lift_order);

        let mut lifted = Vec::with_capacity(entries.len());
        let mut first_error = None;
        for entry in entries {
            match self.reverse_entry(&entry).await {
                Ok(Some(outcome)) => lifted.push(LiftedPunishment { entry, outcome }),
                Ok(None) => {}
                Err(e) => {
                    error!(target: PUNISHMENT_TARGET, registry_id = %entry.registry_id, "Failed to lift punishment: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if lifted.is_empty() => Err(e),
            _ => Ok(lifted),
        }
    }

    /// Reverse one active entry and remove it
    ///
    /// Of several active entries with the same kind and target, only the one
    /// expiring last reverses the restriction; the others are removed as
    /// [`ReversalOutcome::Superseded`] without touching the platform.
    ///
    /// Returns `None` when another caller removed the entry first; only the
    /// caller that removes it posts to the admin log.
    ///
    /// # Errors
    /// A non-recoverable reversal or store error; the entry stays active.
    pub async fn reverse_entry(
        &self,
        entry: &ActiveEntry,
    ) -> PunishmentResult<Option<ReversalOutcome>> {
        let ActiveEntry {
            registry_id,
            target_id,
            kind,
            ..
        } = *entry;
        log_transition(target_id, Some(registry_id), LifecycleState::Reversing);

        let outcome = if self.is_superseded(entry).await? {
            ReversalOutcome::Superseded
        } else {
            self.strategies
                .resolve(kind)?
                .reverse(self.platform.as_ref(), target_id)
                .await?
        };

        if !self.active.remove(registry_id).await? {
            debug!(target: PUNISHMENT_TARGET, %registry_id, "Already lifted elsewhere");
            return Ok(None);
        }
        log_transition(target_id, Some(registry_id), LifecycleState::Reversed);

        match outcome {
            ReversalOutcome::Lifted => {
                let name = self.platform.display_name(target_id).await;
                self.post(AdminMessage::lifted(target_id, kind, name.as_deref()))
                    .await;
                info!(target: PUNISHMENT_TARGET, "Lifted {kind} of user {target_id} ({registry_id})");
            }
            ReversalOutcome::TargetUnavailable => {
                self.post(AdminMessage::target_gone(target_id)).await;
                warn!(target: PUNISHMENT_TARGET, "User {target_id} left before {kind} could be lifted ({registry_id})");
            }
            ReversalOutcome::Superseded => {
                info!(target: PUNISHMENT_TARGET, "Removed {kind} of user {target_id} ({registry_id}), a later {kind} is still active");
            }
        }
        Ok(Some(outcome))
    }

    /// Whether another active entry of the same kind and target ends after `entry`
    async fn is_superseded(&self, entry: &ActiveEntry) -> PunishmentResult<bool> {
        let filter = ActiveFilter::all().kind(entry.kind).target(entry.target_id);
        Ok(self
            .active
            .find(&filter)
            .await?
            .iter()
            .any(|other| other.lift_order() > entry.lift_order()))
    }

    /// Reverse every active entry that has expired
    ///
    /// # Errors
    /// Returns the store error when the expired entries cannot be fetched.
    pub async fn sweep(&self) -> PunishmentResult<SweepReport> {
        let now = self.clock.now();
        let mut due = self.active.find(&ActiveFilter::all().expired_at(now)).await?;
        due.sort_by_key(ActiveEntry::lift_order);

        let mut report = SweepReport::default();
        for entry in due {
            match self.reverse_entry(&entry).await {
                Ok(Some(ReversalOutcome::Lifted)) => report.lifted += 1,
                Ok(Some(ReversalOutcome::TargetUnavailable)) => report.target_gone += 1,
                Ok(Some(ReversalOutcome::Superseded)) => report.superseded += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    error!(target: PUNISHMENT_TARGET, registry_id = %entry.registry_id, "Reversal failed, retrying next sweep: {e}");
                    report.failed += 1;
                }
            }
        }

        if !report.is_empty() {
            info!(target: PUNISHMENT_TARGET, ?report, "Expiry sweep finished");
        }
        Ok(report)
    }

    /// Registry entry for a textual id; the id is validated before any store access
    ///
    /// # Errors
    /// `MalformedIdentifier` or `NotFound`.
    pub async fn lookup(&self, id: &str) -> PunishmentResult<RegistryEntry> {
        let id: RegistryId = id.parse()?;
        self.registry
            .get(id)
            .await?
            .ok_or(PunishmentError::NotFound(id))
    }

    /// # Errors
    /// Store failures.
    pub async fn registry_count(&self, filter: RegistryFilter) -> PunishmentResult<u64> {
        self.registry.count(&filter).await
    }

    /// Registry count for every kind
    ///
    /// # Errors
    /// Store failures.
    pub async fn registry_counts_by_kind(&self) -> PunishmentResult<Vec<(PunishmentKind, u64)>> {
        self.registry_counts(RegistryFilter::all()).await
    }

    /// Registry count for every kind issued to `target_id`
    ///
    /// # Errors
    /// Store failures.
    pub async fn registry_counts_for_target(
        &self,
        target_id: u64,
    ) -> PunishmentResult<Vec<(PunishmentKind, u64)>> {
        self.registry_counts(RegistryFilter::all().target(target_id))
            .await
    }

    async fn registry_counts(
        &self,
        base: RegistryFilter,
    ) -> PunishmentResult<Vec<(PunishmentKind, u64)>> {
        let mut counts = Vec::with_capacity(PunishmentKind::ALL.len());
        for kind in PunishmentKind::ALL {
            counts.push((kind, self.registry.count(&base.kind(kind)).await?));
        }
        Ok(counts)
    }

    /// # Errors
    /// Store failures.
    pub async fn active_count(&self, filter: ActiveFilter) -> PunishmentResult<u64> {
        self.active.count(&filter).await
    }

    /// Active count for every timed kind
    ///
    /// # Errors
    /// Store failures.
    pub async fn active_counts_by_kind(&self) -> PunishmentResult<Vec<(PunishmentKind, u64)>> {
        let mut counts = Vec::new();
        for kind in PunishmentKind::ALL.into_iter().filter(|kind| kind.is_timed()) {
            counts.push((kind, self.active.count(&ActiveFilter::all().kind(kind)).await?));
        }
        Ok(counts)
    }

    /// Whether `target_id` has a mute in effect
    ///
    /// # Errors
    /// Store failures.
    pub async fn has_active_mute(&self, target_id: u64) -> PunishmentResult<bool> {
        let filter = ActiveFilter::all()
            .kind(PunishmentKind::Mute)
            .target(target_id);
        Ok(self.active.count(&filter).await? > 0)
    }

    /// Re-grant the muted role to a rejoining member whose mute is still active
    ///
    /// Returns whether the role was restored.
    ///
    /// # Errors
    /// Store failures or a failure to grant the role.
    pub async fn restore_on_rejoin(&self, target_id: u64) -> PunishmentResult<bool> {
        if !self.has_active_mute(target_id).await? {
            return Ok(false);
        }

        self.platform
            .grant_muted_role(target_id, "Mute still active")
            .await?;
        info!(target: PUNISHMENT_TARGET, "Restored mute of rejoining user {target_id}");
        Ok(true)
    }

    /// Post to the admin log, tolerating delivery failures
    pub async fn post(&self, message: AdminMessage) {
        if let Err(e) = self.admin_log.send(message).await {
            warn!("Failed to post to the admin log: {e}");
        }
    }
}

fn log_transition(target_id: u64, registry_id: Option<RegistryId>, state: LifecycleState) {
    match registry_id {
        Some(registry_id) => {
            debug!(target: PUNISHMENT_TARGET, target_id, %registry_id, %state, "Punishment transition");
        }
        None => debug!(target: PUNISHMENT_TARGET, target_id, %state, "Punishment transition"),
    }
}
