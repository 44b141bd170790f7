//! Chat platform side effects
//!
//! Strategies never talk to Discord directly; they go through
//! [`ModerationPlatform`] so the lifecycle can be exercised without a gateway.

use crate::punishment::{PunishmentError, PunishmentResult};
use poise::serenity_prelude::{
    self as serenity, CreateMessage, GuildId, Http, RoleId, UserId,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Number of days of messages removed when banning
const BAN_DELETE_MESSAGE_DAYS: u8 = 0;

/// External side effects a punishment can have on a member
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ModerationPlatform: Send + Sync {
    /// Send a direct notification to the member
    async fn notify_member(&self, user_id: u64, message: &str) -> PunishmentResult<()>;

    /// Grant the muted role
    ///
    /// Fails with `RoleNotFound` when no muted role exists and with
    /// `MemberUnavailable` when the member has left.
    async fn grant_muted_role(&self, user_id: u64, reason: &str) -> PunishmentResult<()>;

    /// Revoke the muted role
    ///
    /// Fails with `TargetUnavailable` when the member has left, whether or not
    /// the muted role still exists.
    async fn revoke_muted_role(&self, user_id: u64) -> PunishmentResult<()>;

    /// Remove the member from the guild
    async fn kick(&self, user_id: u64, reason: &str) -> PunishmentResult<()>;

    /// Ban the user from the guild
    async fn ban(&self, user_id: u64, reason: &str) -> PunishmentResult<()>;

    /// Lift a ban, `TargetUnavailable` when there is no ban to lift
    async fn unban(&self, user_id: u64) -> PunishmentResult<()>;

    /// Best-effort display name for log messages
    async fn display_name(&self, user_id: u64) -> Option<String>;
}

/// Shared handle to a platform implementation
pub type DynPlatform = Arc<dyn ModerationPlatform>;

/// [`ModerationPlatform`] backed by the Discord HTTP API for a single guild
pub struct SerenityPlatform {
    http: Arc<Http>,
    guild_id: GuildId,
    muted_role_id: Option<RoleId>,
}

impl SerenityPlatform {
    #[must_use]
    pub fn new(http: Arc<Http>, guild_id: u64, muted_role_id: Option<u64>) -> Self {
        Self {
            http,
            guild_id: GuildId::new(guild_id),
            muted_role_id: muted_role_id.map(RoleId::new),
        }
    }

    /// Muted role id, checked against the guild's current roles
    async fn muted_role(&self) -> PunishmentResult<RoleId> {
        let role_id = self.muted_role_id.ok_or(PunishmentError::RoleNotFound)?;
        let roles = self.guild_id.roles(self.http.as_ref()).await?;
        if roles.contains_key(&role_id) {
            Ok(role_id)
        } else {
            Err(PunishmentError::RoleNotFound)
        }
    }
}

/// HTTP status of a failed Discord request
fn status_of(error: &serenity::Error) -> Option<u16> {
    match error {
        serenity::Error::Http(http_error) => http_error.status_code().map(|status| status.as_u16()),
        _ => None,
    }
}

/// Map a failed request on a member to the punishment error taxonomy
fn classify(error: serenity::Error, user_id: u64, missing: fn(u64) -> PunishmentError) -> PunishmentError {
    match status_of(&error) {
        Some(404) => missing(user_id),
        Some(403) => PunishmentError::PermissionDenied(error.to_string()),
        _ => PunishmentError::from(error),
    }
}

#[async_trait::async_trait]
impl ModerationPlatform for SerenityPlatform {
    async fn notify_member(&self, user_id: u64, message: &str) -> PunishmentResult<()> {
        UserId::new(user_id)
            .direct_message(self.http.as_ref(), CreateMessage::new().content(message))
            .await
            .map_err(|e| classify(e, user_id, PunishmentError::MemberUnavailable))?;
        Ok(())
    }

    async fn grant_muted_role(&self, user_id: u64, reason: &str) -> PunishmentResult<()> {
        let role_id = self.muted_role().await?;
        self.http
            .add_member_role(self.guild_id, UserId::new(user_id), role_id, Some(reason))
            .await
            .map_err(|e| classify(e, user_id, PunishmentError::MemberUnavailable))?;

        info!("Granted muted role to user {user_id} in guild {}", self.guild_id);
        Ok(())
    }

    async fn revoke_muted_role(&self, user_id: u64) -> PunishmentResult<()> {
        // A departed member is TargetUnavailable even when the role is gone too
        self.guild_id
            .member(self.http.as_ref(), UserId::new(user_id))
            .await
            .map_err(|e| classify(e, user_id, PunishmentError::TargetUnavailable))?;

        let role_id = self.muted_role().await?;

        self.http
            .remove_member_role(self.guild_id, UserId::new(user_id), role_id, Some("Mute expired"))
            .await
            .map_err(|e| classify(e, user_id, PunishmentError::TargetUnavailable))?;

        info!("Revoked muted role from user {user_id} in guild {}", self.guild_id);
        Ok(())
    }

    async fn kick(&self, user_id: u64, reason: &str) -> PunishmentResult<()> {
        self.guild_id
            .kick_with_reason(self.http.as_ref(), UserId::new(user_id), reason)
            .await
            .map_err(|e| classify(e, user_id, PunishmentError::MemberUnavailable))?;

        info!("Kicked user {user_id} from guild {}", self.guild_id);
        Ok(())
    }

    async fn ban(&self, user_id: u64, reason: &str) -> PunishmentResult<()> {
        self.guild_id
            .ban_with_reason(self.http.as_ref(), UserId::new(user_id), BAN_DELETE_MESSAGE_DAYS, reason)
            .await
            .map_err(|e| classify(e, user_id, PunishmentError::MemberUnavailable))?;

        info!("Banned user {user_id} from guild {}", self.guild_id);
        Ok(())
    }

    async fn unban(&self, user_id: u64) -> PunishmentResult<()> {
        self.guild_id
            .unban(self.http.as_ref(), UserId::new(user_id))
            .await
            .map_err(|e| classify(e, user_id, PunishmentError::TargetUnavailable))?;

        info!("Unbanned user {user_id} in guild {}", self.guild_id);
        Ok(())
    }

    async fn display_name(&self, user_id: u64) -> Option<String> {
        match UserId::new(user_id).to_user(self.http.as_ref()).await {
            Ok(user) => Some(user.global_name.unwrap_or(user.name)),
            Err(e) => {
                debug!("Could not resolve user {user_id}: {e}");
                None
            }
        }
    }
}
