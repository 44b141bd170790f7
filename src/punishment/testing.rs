//! In-crate fakes for lifecycle tests

use crate::punishment::{
    ActiveEntry, ActiveFilter, ActiveStore, AdminLog, AdminMessage, Clock, DeliveredMessage,
    DocumentCollection, LifecycleCoordinator, ModerationPlatform, PunishmentError,
    PunishmentResult, RegistryEntry, RegistryId, StrategyRegistry,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Guild state kept in memory
#[derive(Default)]
pub struct FakePlatform {
    pub members: Mutex<HashSet<u64>>,
    pub muted: Mutex<HashSet<u64>>,
    pub bans: Mutex<HashSet<u64>>,
    pub notified: Mutex<Vec<(u64, String)>>,
    pub muted_role_missing: AtomicBool,
    pub reversals_fail: AtomicBool,
    pub revoke_calls: AtomicUsize,
}

impl FakePlatform {
    pub fn with_members(members: &[u64]) -> Arc<Self> {
        let platform = Self::default();
        platform.members.lock().unwrap().extend(members);
        Arc::new(platform)
    }

    pub fn is_member(&self, user_id: u64) -> bool {
        self.members.lock().unwrap().contains(&user_id)
    }

    pub fn is_muted(&self, user_id: u64) -> bool {
        self.muted.lock().unwrap().contains(&user_id)
    }

    pub fn is_banned(&self, user_id: u64) -> bool {
        self.bans.lock().unwrap().contains(&user_id)
    }

    pub fn leave(&self, user_id: u64) {
        self.members.lock().unwrap().remove(&user_id);
    }

    pub fn join(&self, user_id: u64) {
        self.members.lock().unwrap().insert(user_id);
    }

    fn require_member(&self, user_id: u64) -> PunishmentResult<()> {
        if self.is_member(user_id) {
            Ok(())
        } else {
            Err(PunishmentError::MemberUnavailable(user_id))
        }
    }

    fn check_reversal(&self) -> PunishmentResult<()> {
        if self.reversals_fail.load(Ordering::SeqCst) {
            Err(PunishmentError::PermissionDenied("Missing permissions".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ModerationPlatform for FakePlatform {
    async fn notify_member(&self, user_id: u64, message: &str) -> PunishmentResult<()> {
        self.require_member(user_id)?;
        self.notified.lock().unwrap().push((user_id, message.to_string()));
        Ok(())
    }

    async fn grant_muted_role(&self, user_id: u64, _reason: &str) -> PunishmentResult<()> {
        if self.muted_role_missing.load(Ordering::SeqCst) {
            return Err(PunishmentError::RoleNotFound);
        }
        self.require_member(user_id)?;
        self.muted.lock().unwrap().insert(user_id);
        Ok(())
    }

    async fn revoke_muted_role(&self, user_id: u64) -> PunishmentResult<()> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reversal()?;
        if !self.is_member(user_id) {
            return Err(PunishmentError::TargetUnavailable(user_id));
        }
        if self.muted_role_missing.load(Ordering::SeqCst) {
            return Err(PunishmentError::RoleNotFound);
        }
        self.muted.lock().unwrap().remove(&user_id);
        Ok(())
    }

    async fn kick(&self, user_id: u64, _reason: &str) -> PunishmentResult<()> {
        self.require_member(user_id)?;
        self.leave(user_id);
        Ok(())
    }

    async fn ban(&self, user_id: u64, _reason: &str) -> PunishmentResult<()> {
        self.bans.lock().unwrap().insert(user_id);
        self.leave(user_id);
        Ok(())
    }

    async fn unban(&self, user_id: u64) -> PunishmentResult<()> {
        self.check_reversal()?;
        if self.bans.lock().unwrap().remove(&user_id) {
            Ok(())
        } else {
            Err(PunishmentError::TargetUnavailable(user_id))
        }
    }

    async fn display_name(&self, user_id: u64) -> Option<String> {
        self.is_member(user_id).then(|| format!("user{user_id}"))
    }
}

/// Admin log that keeps every message
#[derive(Default)]
pub struct RecordingAdminLog {
    pub messages: Mutex<Vec<AdminMessage>>,
}

impl RecordingAdminLog {
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter_map(|message| match message {
                AdminMessage::Text(text) => Some(text.clone()),
                AdminMessage::Summary { .. } => None,
            })
            .collect()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.texts().iter().filter(|text| text.contains(needle)).count()
    }
}

#[async_trait::async_trait]
impl AdminLog for RecordingAdminLog {
    async fn send(&self, message: AdminMessage) -> PunishmentResult<DeliveredMessage> {
        let mut messages = self.messages.lock().unwrap();
        messages.push(message);
        Ok(DeliveredMessage {
            message_id: messages.len() as u64,
        })
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Active store whose inserts always fail
#[derive(Default)]
pub struct UnwritableActiveStore;

#[async_trait::async_trait]
impl ActiveStore for UnwritableActiveStore {
    async fn insert(&self, _entry: ActiveEntry) -> PunishmentResult<()> {
        Err(PunishmentError::Store("Disk full".into()))
    }

    async fn find(&self, _filter: &ActiveFilter) -> PunishmentResult<Vec<ActiveEntry>> {
        Ok(Vec::new())
    }

    async fn count(&self, _filter: &ActiveFilter) -> PunishmentResult<u64> {
        Ok(0)
    }

    async fn remove(&self, _registry_id: RegistryId) -> PunishmentResult<bool> {
        Ok(false)
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

/// Coordinator wired to in-memory stores and the given fakes
pub struct Harness {
    pub coordinator: LifecycleCoordinator,
    pub platform: Arc<FakePlatform>,
    pub admin_log: Arc<RecordingAdminLog>,
    pub clock: Arc<ManualClock>,
    pub registry: Arc<DocumentCollection<RegistryEntry>>,
    pub active: Arc<DocumentCollection<ActiveEntry>>,
}

impl Harness {
    pub fn new(members: &[u64]) -> Self {
        let platform = FakePlatform::with_members(members);
        let admin_log = Arc::new(RecordingAdminLog::default());
        let clock = ManualClock::starting_at(start_time());
        let registry = Arc::new(DocumentCollection::<RegistryEntry>::in_memory("registry"));
        let active = Arc::new(DocumentCollection::<ActiveEntry>::in_memory("active"));

        let coordinator = LifecycleCoordinator::new(
            registry.clone(),
            active.clone(),
            platform.clone(),
            admin_log.clone(),
        )
        .with_strategies(StrategyRegistry::new())
        .with_clock(clock.clone());

        Self {
            coordinator,
            platform,
            admin_log,
            clock,
            registry,
            active,
        }
    }
}
