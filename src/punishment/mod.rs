//! Punishment lifecycle
//!
//! Issuing, recording and lifting warns, mutes, kicks, bans and permanent
//! bans, plus the background sweep that lifts expired timed punishments.

mod clock;
mod coordinator;
mod duration;
mod error;
mod kind;
mod notify;
mod platform;
mod record;
mod store;
mod strategy;
mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, SystemClock};
pub use coordinator::{
    LifecycleCoordinator, LifecycleState, LiftedPunishment, PunishmentRequest, SweepReport,
};
pub use duration::{
    DEFAULT_AMOUNT, DEFAULT_UNIT, DurationUnit, GENERIC_REASONS, PunishmentDuration,
    TimedArguments, parse_timed_arguments, random_reason, reason_or_random,
};
pub use error::{PunishmentError, PunishmentResult};
pub use kind::{PunishmentKind, UnknownKind};
pub use notify::{
    AdminLog, AdminMessage, ChannelAdminLog, DeliveredMessage, DynAdminLog, TracingAdminLog,
};
pub use platform::{DynPlatform, ModerationPlatform, SerenityPlatform};
pub use record::{ActiveEntry, PunishmentRecord, RegistryEntry, RegistryId, Sanction};
pub use store::{
    ACTIVE_FILE, ActiveFilter, ActiveStore, Document, DocumentCollection, DynActiveStore,
    DynRegistryStore, REGISTRY_FILE, RegistryFilter, RegistryStore,
};
pub use strategy::{
    BanStrategy, KickStrategy, MuteStrategy, PermaBanStrategy, PunishmentStrategy,
    RegistryPayload, ReversalOutcome, StrategyRegistry, WarnStrategy,
};
pub use sweep::{ExpirySweep, SweepHandle, SweepRequest, request_sweep};

#[cfg(test)]
pub use notify::MockAdminLog;
#[cfg(test)]
pub use platform::MockModerationPlatform;
#[cfg(test)]
pub use store::{MockActiveStore, MockRegistryStore};
