//! Error types for the punishment lifecycle
//!
//! Errors fall into a few families: side-effect failures abort issuing a
//! punishment before anything is stored, `TargetUnavailable` is a recoverable
//! reversal outcome, lookup errors are shown to the moderator, and store
//! failures abandon the current command or sweep tick.

use crate::punishment::{PunishmentKind, RegistryId};
use thiserror::Error;

/// Errors that can occur while issuing, recording or lifting punishments
#[derive(Debug, Error)]
pub enum PunishmentError {
    /// No muted role configured, or the configured role no longer exists
    #[error("Muted role not found")]
    RoleNotFound,

    /// Target is not a member of the guild (apply time)
    #[error("Member {0} is not available")]
    MemberUnavailable(u64),

    /// Target is gone while lifting a punishment (recoverable)
    #[error("Target {0} is no longer present")]
    TargetUnavailable(u64),

    /// Missing permissions for the side effect
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Side effect failed for another reason
    #[error("Side effect failed: {0}")]
    SideEffect(String),

    /// Discord API error
    #[error("Discord API error: {0}")]
    DiscordApi(#[from] Box<poise::serenity_prelude::Error>),

    /// Registry id text could not be parsed
    #[error("Invalid punishment id: {0}")]
    MalformedIdentifier(String),

    /// No registry entry with that id
    #[error("Punishment not found: {0}")]
    NotFound(RegistryId),

    /// Nothing active to lift for this target
    #[error("No active punishment for user {0}")]
    NoActivePunishment(u64),

    /// Duration is zero or does not fit the calendar
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Reverse called for a one-time kind
    #[error("{0} punishments cannot be reversed")]
    NotReversible(PunishmentKind),

    /// Persistence layer failure
    #[error("Store error: {0}")]
    Store(String),

    /// Generic error
    #[error("Punishment error: {0}")]
    Other(String),
}

impl From<poise::serenity_prelude::Error> for PunishmentError {
    fn from(error: poise::serenity_prelude::Error) -> Self {
        Self::DiscordApi(Box::new(error))
    }
}

impl From<std::io::Error> for PunishmentError {
    fn from(error: std::io::Error) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<serde_yaml::Error> for PunishmentError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<String> for PunishmentError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

impl PunishmentError {
    /// Whether this error comes from the external side effect of applying a punishment
    #[must_use]
    pub const fn is_side_effect_failure(&self) -> bool {
        matches!(
            self,
            Self::RoleNotFound
                | Self::MemberUnavailable(_)
                | Self::PermissionDenied(_)
                | Self::SideEffect(_)
                | Self::DiscordApi(_)
        )
    }

    /// Text shown to the moderator who ran the command
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MalformedIdentifier(_) => "```dts\n# Invalid Punishment ID\n```".to_string(),
            Self::NotFound(_) => "```dts\n# This document doesn't exist\n```".to_string(),
            Self::NoActivePunishment(user_id) => {
                format!("User <@{user_id}> has no active punishment to lift")
            }
            Self::Store(_) => "The punishment store is unavailable, try again later".to_string(),
            error => format!("Failed to punish: {error}"),
        }
    }
}

/// Result type for punishment operations
pub type PunishmentResult<T> = Result<T, PunishmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PunishmentError::RoleNotFound;
        assert_eq!(error.to_string(), "Muted role not found");

        let error = PunishmentError::TargetUnavailable(42);
        assert_eq!(error.to_string(), "Target 42 is no longer present");

        let error = PunishmentError::NotReversible(PunishmentKind::Kick);
        assert_eq!(error.to_string(), "KICK punishments cannot be reversed");

        let error = PunishmentError::from("Something went wrong".to_string());
        assert_eq!(error.to_string(), "Punishment error: Something went wrong");
    }

    #[test]
    fn test_side_effect_classification() {
        assert!(PunishmentError::RoleNotFound.is_side_effect_failure());
        assert!(PunishmentError::MemberUnavailable(1).is_side_effect_failure());
        assert!(PunishmentError::PermissionDenied("ban".into()).is_side_effect_failure());
        assert!(!PunishmentError::TargetUnavailable(1).is_side_effect_failure());
        assert!(!PunishmentError::Store("down".into()).is_side_effect_failure());
        assert!(!PunishmentError::MalformedIdentifier("x".into()).is_side_effect_failure());
    }

    #[test]
    fn test_user_messages() {
        let message = PunishmentError::MalformedIdentifier("nope".into()).user_message();
        assert!(message.contains("Invalid Punishment ID"));

        let message = PunishmentError::NotFound(RegistryId::new()).user_message();
        assert!(message.contains("doesn't exist"));

        let message = PunishmentError::RoleNotFound.user_message();
        assert_eq!(message, "Failed to punish: Muted role not found");
    }

    #[test]
    fn test_store_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert!(matches!(PunishmentError::from(io), PunishmentError::Store(_)));
    }
}
