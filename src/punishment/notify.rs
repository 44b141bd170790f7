//! Admin log notifications
//!
//! Audit trail messages and failure diagnostics go to an admin log sink.
//! Delivery is best effort: callers log a failed send and carry on.

use crate::punishment::{PunishmentKind, PunishmentResult, RegistryEntry, RegistryId};
use poise::serenity_prelude::{ChannelId, Colour, CreateEmbed, CreateMessage, Http};
use std::sync::Arc;
use tracing::info;

/// Message posted to the admin log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminMessage {
    /// Plain text line(s)
    Text(String),
    /// Titled summary with one field per counted item
    Summary {
        title: String,
        fields: Vec<(String, String)>,
    },
}

impl AdminMessage {
    /// Audit line for a newly issued punishment
    #[must_use]
    pub fn punished(entry: &RegistryEntry, target_name: Option<&str>) -> Self {
        let record = &entry.record;
        Self::Text(format!(
            "**Punished user** <{}> ({}) with {}\n   **Punished by:** <@{}>\n   **Reason:** {}\n   **Punishment registry id:** {}",
            record.target_id(),
            target_name.unwrap_or("unknown"),
            record.kind(),
            record.issuer_id(),
            record.reason(),
            entry.id,
        ))
    }

    /// Confirmation that a punishment was lifted
    #[must_use]
    pub fn lifted(target_id: u64, kind: PunishmentKind, target_name: Option<&str>) -> Self {
        Self::Text(format!(
            "Unpunished user <{target_id}> ({}), {kind} lifted",
            target_name.unwrap_or("unknown"),
        ))
    }

    /// Diagnostic for a lift whose target has already left
    #[must_use]
    pub fn target_gone(target_id: u64) -> Self {
        Self::Text(format!(
            "Failed to lift punishment\n   Error : user <{target_id}> is no longer present in the server"
        ))
    }

    /// Diagnostic for a timed punishment that was applied but could not be tracked
    #[must_use]
    pub fn untracked(registry_id: RegistryId, target_id: u64) -> Self {
        Self::Text(format!(
            "Punishment {registry_id} for user <{target_id}> was applied but could not be scheduled for removal, lift it manually"
        ))
    }

    /// Summary of counts, one field per kind
    #[must_use]
    pub fn counts(title: impl Into<String>, counts: &[(PunishmentKind, u64)]) -> Self {
        Self::Summary {
            title: title.into(),
            fields: counts
                .iter()
                .map(|(kind, count)| (kind.to_string(), count.to_string()))
                .collect(),
        }
    }

    /// Render as a Discord embed
    #[must_use]
    pub fn to_embed(&self) -> CreateEmbed {
        match self {
            Self::Text(text) => CreateEmbed::new().description(text).colour(Colour::RED),
            Self::Summary { title, fields } => CreateEmbed::new()
                .title(title)
                .fields(fields.iter().map(|(name, value)| (name.clone(), value.clone(), true)))
                .colour(Colour::RED),
        }
    }
}

/// Handle of a delivered admin log message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub message_id: u64,
}

/// Sink for admin log messages
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AdminLog: Send + Sync {
    async fn send(&self, message: AdminMessage) -> PunishmentResult<DeliveredMessage>;
}

/// Shared handle to an admin log sink
pub type DynAdminLog = Arc<dyn AdminLog>;

/// Admin log posting to a Discord text channel
pub struct ChannelAdminLog {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelAdminLog {
    #[must_use]
    pub fn new(http: Arc<Http>, channel_id: u64) -> Self {
        Self {
            http,
            channel_id: ChannelId::new(channel_id),
        }
    }
}

#[async_trait::async_trait]
impl AdminLog for ChannelAdminLog {
    async fn send(&self, message: AdminMessage) -> PunishmentResult<DeliveredMessage> {
        let builder = match &message {
            AdminMessage::Text(text) => CreateMessage::new().content(text),
            AdminMessage::Summary { .. } => CreateMessage::new().embed(message.to_embed()),
        };

        let sent = self
            .channel_id
            .send_message(self.http.as_ref(), builder)
            .await?;

        Ok(DeliveredMessage {
            message_id: sent.id.get(),
        })
    }
}

/// Admin log that only writes to the tracing output, used when no channel is configured
#[derive(Debug, Default)]
pub struct TracingAdminLog;

#[async_trait::async_trait]
impl AdminLog for TracingAdminLog {
    async fn send(&self, message: AdminMessage) -> PunishmentResult<DeliveredMessage> {
        match message {
            AdminMessage::Text(text) => info!(target: crate::PUNISHMENT_TARGET, "{text}"),
            AdminMessage::Summary { title, fields } => {
                info!(target: crate::PUNISHMENT_TARGET, ?fields, "{title}");
            }
        }
        Ok(DeliveredMessage { message_id: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::punishment::PunishmentRecord;
    use chrono::Utc;

    #[test]
    fn test_punished_message_mentions_everything() {
        let record = PunishmentRecord::from_arguments(
            111,
            222,
            PunishmentKind::Kick,
            Some("spamming"),
            Utc::now(),
        )
        .unwrap();
        let entry = RegistryEntry::new(record);

        let AdminMessage::Text(text) = AdminMessage::punished(&entry, Some("Spammer")) else {
            panic!("Expected a text message");
        };
        assert!(text.contains("<111> (Spammer)"));
        assert!(text.contains("with KICK"));
        assert!(text.contains("<@222>"));
        assert!(text.contains("spamming"));
        assert!(text.contains(&entry.id.to_string()));
    }

    #[test]
    fn test_target_gone_message() {
        let AdminMessage::Text(text) = AdminMessage::target_gone(42) else {
            panic!("Expected a text message");
        };
        assert!(text.starts_with("Failed to lift punishment"));
        assert!(text.contains("user <42> is no longer present"));
    }

    #[test]
    fn test_counts_summary_has_one_field_per_kind() {
        let counts: Vec<_> = PunishmentKind::ALL.iter().map(|kind| (*kind, 2)).collect();
        let AdminMessage::Summary { title, fields } = AdminMessage::counts("Amount of punishments", &counts)
        else {
            panic!("Expected a summary");
        };
        assert_eq!(title, "Amount of punishments");
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[4], ("PERMABAN".to_string(), "2".to_string()));
    }

    #[tokio::test]
    async fn test_tracing_admin_log_always_delivers() {
        let log = TracingAdminLog;
        let delivered = log.send(AdminMessage::Text("hello".into())).await.unwrap();
        assert_eq!(delivered, DeliveredMessage { message_id: 0 });
    }
}
