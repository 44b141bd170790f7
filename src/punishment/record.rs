//! Punishment records
//!
//! A [`PunishmentRecord`] describes one issued sanction. Timed kinds carry
//! their duration and expiry inside [`Sanction`], so a one-time kind can never
//! hold an `expires_at`. [`RegistryEntry`] is the permanent row written for
//! every punishment, [`ActiveEntry`] the working-set row kept until a timed
//! punishment is lifted.

use crate::punishment::duration::{TimedArguments, parse_timed_arguments, reason_or_random};
use crate::punishment::{PunishmentDuration, PunishmentError, PunishmentKind, PunishmentResult};
use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::fmt::Hyphenated;
use uuid::{Uuid, Version};

/// Unique id of a registry entry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct RegistryId(Uuid);

impl RegistryId {
    /// Create a fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistryId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RegistryId {
    type Err = PunishmentError;

    /// Only the hyphenated form of a random (v4) uuid is accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.len() != Hyphenated::LENGTH {
            return Err(PunishmentError::MalformedIdentifier(s.to_string()));
        }
        Uuid::try_parse(text)
            .ok()
            .filter(|uuid| uuid.get_version() == Some(Version::Random))
            .map(Self)
            .ok_or_else(|| PunishmentError::MalformedIdentifier(s.to_string()))
    }
}

/// What was issued, with timing data only for timed kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Sanction {
    Warn,
    Mute {
        duration: PunishmentDuration,
        expires_at: DateTime<Utc>,
    },
    Kick,
    Ban {
        duration: PunishmentDuration,
        expires_at: DateTime<Utc>,
    },
    #[serde(rename = "PERMABAN")]
    PermaBan,
}

impl Sanction {
    /// Build a timed sanction expiring `duration` after `created_at`
    ///
    /// # Errors
    /// Returns `InvalidDuration` for a zero or unrepresentable duration, and
    /// `Other` when `kind` is not timed.
    pub fn timed(
        kind: PunishmentKind,
        duration: PunishmentDuration,
        created_at: DateTime<Utc>,
    ) -> PunishmentResult<Self> {
        let expires_at = duration
            .to_delta()
            .and_then(|delta| created_at.checked_add_signed(delta))
            .ok_or_else(|| PunishmentError::InvalidDuration(duration.to_string()))?;

        match kind {
            PunishmentKind::Mute => Ok(Self::Mute { duration, expires_at }),
            PunishmentKind::Ban => Ok(Self::Ban { duration, expires_at }),
            other => Err(PunishmentError::Other(format!(
                "{other} is not a timed punishment"
            ))),
        }
    }

    /// Build a one-time sanction
    ///
    /// # Errors
    /// Returns `Other` when `kind` is timed.
    pub fn one_time(kind: PunishmentKind) -> PunishmentResult<Self> {
        match kind {
            PunishmentKind::Warn => Ok(Self::Warn),
            PunishmentKind::Kick => Ok(Self::Kick),
            PunishmentKind::PermaBan => Ok(Self::PermaBan),
            other => Err(PunishmentError::Other(format!(
                "{other} needs a duration"
            ))),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> PunishmentKind {
        match self {
            Self::Warn => PunishmentKind::Warn,
            Self::Mute { .. } => PunishmentKind::Mute,
            Self::Kick => PunishmentKind::Kick,
            Self::Ban { .. } => PunishmentKind::Ban,
            Self::PermaBan => PunishmentKind::PermaBan,
        }
    }

    #[must_use]
    pub const fn duration(&self) -> Option<PunishmentDuration> {
        match self {
            Self::Mute { duration, .. } | Self::Ban { duration, .. } => Some(*duration),
            _ => None,
        }
    }

    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Mute { expires_at, .. } | Self::Ban { expires_at, .. } => Some(*expires_at),
            _ => None,
        }
    }
}

/// Immutable description of one issued punishment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunishmentRecord {
    target_id: u64,
    issuer_id: u64,
    reason: String,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    sanction: Sanction,
}

impl PunishmentRecord {
    /// Create a record from a sanction; a blank reason becomes a generic one
    #[must_use]
    pub fn new(
        target_id: u64,
        issuer_id: u64,
        sanction: Sanction,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            target_id,
            issuer_id,
            reason: reason_or_random(reason),
            created_at,
            sanction,
        }
    }

    /// Create a record from a moderator's raw arguments.
    ///
    /// Timed kinds read an optional leading duration, one-time kinds take the
    /// whole input as the reason.
    ///
    /// # Errors
    /// Returns `InvalidDuration` when a timed kind is given a zero or
    /// unrepresentable duration.
    pub fn from_arguments(
        target_id: u64,
        issuer_id: u64,
        kind: PunishmentKind,
        arguments: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> PunishmentResult<Self> {
        let arguments = arguments.unwrap_or_default();

        if kind.is_timed() {
            let TimedArguments { duration, reason } = parse_timed_arguments(arguments);
            let sanction = Sanction::timed(kind, duration, created_at)?;
            Ok(Self::new(target_id, issuer_id, sanction, &reason, created_at))
        } else {
            let sanction = Sanction::one_time(kind)?;
            Ok(Self::new(target_id, issuer_id, sanction, arguments, created_at))
        }
    }

    #[must_use]
    pub const fn target_id(&self) -> u64 {
        self.target_id
    }

    #[must_use]
    pub const fn issuer_id(&self) -> u64 {
        self.issuer_id
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn sanction(&self) -> &Sanction {
        &self.sanction
    }

    #[must_use]
    pub const fn kind(&self) -> PunishmentKind {
        self.sanction.kind()
    }

    #[must_use]
    pub const fn duration(&self) -> Option<PunishmentDuration> {
        self.sanction.duration()
    }

    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.sanction.expires_at()
    }
}

/// Permanent registry row for an issued punishment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: RegistryId,
    #[serde(flatten)]
    pub record: PunishmentRecord,
}

impl RegistryEntry {
    /// Wrap a record with a freshly assigned id
    #[must_use]
    pub fn new(record: PunishmentRecord) -> Self {
        Self {
            id: RegistryId::new(),
            record,
        }
    }

    /// Working-set row for this entry, `None` for one-time kinds
    #[must_use]
    pub fn active_entry(&self) -> Option<ActiveEntry> {
        self.record.expires_at().map(|expires_at| ActiveEntry {
            registry_id: self.id,
            target_id: self.record.target_id(),
            kind: self.record.kind(),
            expires_at,
        })
    }
}

/// A timed punishment that is currently in effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEntry {
    pub registry_id: RegistryId,
    pub target_id: u64,
    pub kind: PunishmentKind,
    pub expires_at: DateTime<Utc>,
}

impl ActiveEntry {
    /// Whether the punishment should be lifted at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Order in which entries of one member are lifted, expiry first and the
    /// registry id breaking ties
    #[must_use]
    pub fn lift_order(&self) -> (DateTime<Utc>, RegistryId) {
        (self.expires_at, self.registry_id)
    }
}
