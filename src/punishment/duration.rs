//! Punishment durations and argument parsing
//!
//! Timed punishments carry an amount and a unit. Moderators type both in front
//! of the reason, e.g. `!mute @user 2 hours spamming`.

use chrono::Duration;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reasons used when a moderator does not give one
pub const GENERIC_REASONS: [&str; 3] = [
    "inappropriate behavior",
    "breaking the community guidelines",
    "breaking rules",
];

/// Amount used when the arguments carry no duration
pub const DEFAULT_AMOUNT: u32 = 5;

/// Unit used when the arguments carry no duration
pub const DEFAULT_UNIT: DurationUnit = DurationUnit::Minutes;

/// Pick one of the generic reasons at random
#[must_use]
pub fn random_reason() -> String {
    GENERIC_REASONS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(GENERIC_REASONS[0])
        .to_string()
}

/// Unit of a punishment duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    /// Recognise a unit token such as `min`, `hour` or `days`
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "minute" | "minutes" | "min" => Some(Self::Minutes),
            "hour" | "hours" => Some(Self::Hours),
            "day" | "days" => Some(Self::Days),
            _ => None,
        }
    }

    const fn singular(self) -> &'static str {
        match self {
            Self::Minutes => "minute",
            Self::Hours => "hour",
            Self::Days => "day",
        }
    }
}

/// How long a timed punishment lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PunishmentDuration {
    pub amount: u32,
    pub unit: DurationUnit,
}

impl Default for PunishmentDuration {
    fn default() -> Self {
        Self::new(DEFAULT_AMOUNT, DEFAULT_UNIT)
    }
}

impl PunishmentDuration {
    #[must_use]
    pub const fn new(amount: u32, unit: DurationUnit) -> Self {
        Self { amount, unit }
    }

    #[must_use]
    pub const fn minutes(amount: u32) -> Self {
        Self::new(amount, DurationUnit::Minutes)
    }

    #[must_use]
    pub const fn hours(amount: u32) -> Self {
        Self::new(amount, DurationUnit::Hours)
    }

    #[must_use]
    pub const fn days(amount: u32) -> Self {
        Self::new(amount, DurationUnit::Days)
    }

    /// Calendar delta for this duration, `None` for a zero amount
    #[must_use]
    pub fn to_delta(self) -> Option<Duration> {
        if self.amount == 0 {
            return None;
        }
        let amount = i64::from(self.amount);
        match self.unit {
            DurationUnit::Minutes => Duration::try_minutes(amount),
            DurationUnit::Hours => Duration::try_hours(amount),
            DurationUnit::Days => Duration::try_days(amount),
        }
    }
}

impl fmt::Display for PunishmentDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.amount == 1 { "" } else { "s" };
        write!(f, "{} {}{plural}", self.amount, self.unit.singular())
    }
}

/// Duration and reason extracted from a moderator's free-form arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedArguments {
    pub duration: PunishmentDuration,
    pub reason: String,
}

/// Split `"<amount> <unit> <reason...>"` into a duration and a reason.
///
/// Input that does not start with an amount and a known unit keeps the
/// default duration and becomes the reason in full.
#[must_use]
pub fn parse_timed_arguments(input: &str) -> TimedArguments {
    let tokens: Vec<&str> = input.split_whitespace().collect();

    let leading = match tokens.as_slice() {
        [amount, unit, ..] if amount.bytes().all(|b| b.is_ascii_digit()) => amount
            .parse::<u32>()
            .ok()
            .zip(DurationUnit::from_token(unit)),
        _ => None,
    };

    let (duration, rest) = match leading {
        Some((amount, unit)) => (PunishmentDuration::new(amount, unit), &tokens[2..]),
        None => (PunishmentDuration::default(), tokens.as_slice()),
    };

    TimedArguments {
        duration,
        reason: reason_or_random(&rest.join(" ")),
    }
}

/// Trimmed reason, or a random generic one when blank
#[must_use]
pub fn reason_or_random(reason: &str) -> String {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        random_reason()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_unit_and_reason() {
        let parsed = parse_timed_arguments("2 hours spamming in general");
        assert_eq!(parsed.duration, PunishmentDuration::hours(2));
        assert_eq!(parsed.reason, "spamming in general");

        let parsed = parse_timed_arguments("10 min flooding");
        assert_eq!(parsed.duration, PunishmentDuration::minutes(10));
        assert_eq!(parsed.reason, "flooding");

        let parsed = parse_timed_arguments("1 day");
        assert_eq!(parsed.duration, PunishmentDuration::days(1));
        assert!(GENERIC_REASONS.contains(&parsed.reason.as_str()));
    }

    #[test]
    fn test_parse_falls_back_to_default_duration() {
        let parsed = parse_timed_arguments("being rude to everyone");
        assert_eq!(parsed.duration, PunishmentDuration::minutes(5));
        assert_eq!(parsed.reason, "being rude to everyone");

        // A number without a unit is part of the reason
        let parsed = parse_timed_arguments("3 warnings ignored");
        assert_eq!(parsed.duration, PunishmentDuration::default());
        assert_eq!(parsed.reason, "3 warnings ignored");

        // A lone number is not a duration either
        let parsed = parse_timed_arguments("42");
        assert_eq!(parsed.duration, PunishmentDuration::default());
        assert_eq!(parsed.reason, "42");
    }

    #[test]
    fn test_parse_empty_input_uses_generic_reason() {
        for input in ["", "   ", "\t\n"] {
            let parsed = parse_timed_arguments(input);
            assert_eq!(parsed.duration, PunishmentDuration::default());
            assert!(GENERIC_REASONS.contains(&parsed.reason.as_str()));
        }
    }

    #[test]
    fn test_parse_rejects_oversized_amount() {
        let parsed = parse_timed_arguments("99999999999 days forever");
        assert_eq!(parsed.duration, PunishmentDuration::default());
        assert_eq!(parsed.reason, "99999999999 days forever");
    }

    #[test]
    fn test_unit_tokens() {
        assert_eq!(DurationUnit::from_token("MIN"), Some(DurationUnit::Minutes));
        assert_eq!(DurationUnit::from_token("minute"), Some(DurationUnit::Minutes));
        assert_eq!(DurationUnit::from_token("Hours"), Some(DurationUnit::Hours));
        assert_eq!(DurationUnit::from_token("days"), Some(DurationUnit::Days));
        assert_eq!(DurationUnit::from_token("weeks"), None);
    }

    #[test]
    fn test_to_delta_uses_real_units() {
        assert_eq!(PunishmentDuration::minutes(5).to_delta(), Some(Duration::seconds(300)));
        assert_eq!(PunishmentDuration::hours(3).to_delta(), Some(Duration::seconds(3 * 3600)));
        assert_eq!(PunishmentDuration::days(2).to_delta(), Some(Duration::seconds(2 * 86_400)));
        assert_eq!(PunishmentDuration::minutes(0).to_delta(), None);
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(PunishmentDuration::minutes(1).to_string(), "1 minute");
        assert_eq!(PunishmentDuration::minutes(5).to_string(), "5 minutes");
        assert_eq!(PunishmentDuration::days(7).to_string(), "7 days");
    }

    #[test]
    fn test_random_reason_is_generic() {
        for _ in 0..20 {
            assert!(GENERIC_REASONS.contains(&random_reason().as_str()));
        }
    }
}
