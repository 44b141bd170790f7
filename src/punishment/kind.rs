//! Punishment kinds
//!
//! This module defines the closed set of sanctions the bot can issue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of punishment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PunishmentKind {
    /// Notification only
    Warn,
    /// Muted role for a duration
    Mute,
    /// Removal from the guild
    Kick,
    /// Guild ban for a duration
    Ban,
    /// Guild ban with no scheduled lift
    #[serde(rename = "PERMABAN")]
    PermaBan,
}

impl PunishmentKind {
    /// Every kind, in display order
    pub const ALL: [Self; 5] = [Self::Warn, Self::Mute, Self::Kick, Self::Ban, Self::PermaBan];

    /// Whether this kind expires and must be reversed by the sweep
    #[must_use]
    pub const fn is_timed(self) -> bool {
        matches!(self, Self::Mute | Self::Ban)
    }

    /// Past-tense verb used in notifications
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::Warn => "warned",
            Self::Mute => "muted",
            Self::Kick => "kicked",
            Self::Ban => "banned",
            Self::PermaBan => "perma banned",
        }
    }

    /// Stored name of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warn => "WARN",
            Self::Mute => "MUTE",
            Self::Kick => "KICK",
            Self::Ban => "BAN",
            Self::PermaBan => "PERMABAN",
        }
    }
}

impl fmt::Display for PunishmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text does not name a punishment kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown punishment kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for PunishmentKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}
