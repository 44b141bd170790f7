use crate::prompt::decision_for;
use crate::{Data, EVENT_TARGET};
use poise::serenity_prelude::{
    self as serenity, Context, EventHandler, GuildId, Member, Reaction, ReactionType, Ready,
};
use tracing::{error, info, warn};

pub struct Handler {
    pub data: Data,
}

impl Handler {
    #[must_use]
    pub const fn new(data: Data) -> Self {
        Self { data }
    }

    /// Answer an open prompt from a reaction; `false` if the reaction answers nothing
    fn resolve_prompt(&self, message_id: u64, user_id: u64, emoji: &ReactionType) -> bool {
        let ReactionType::Unicode(emoji) = emoji else {
            return false;
        };
        decision_for(emoji)
            .is_some_and(|confirmed| self.data.prompts.resolve(message_id, user_id, confirmed))
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!("Connected as {user_name}, shard {shard_id}");
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        if !guilds.contains(&GuildId::new(self.data.config.guild_id)) {
            warn!(
                "Not a member of the configured guild {}",
                self.data.config.guild_id
            );
        }
        info!("Cache ready! The bot is in {guild_count} guild(s)");
    }

    /// Muted members who leave and rejoin get their mute back
    async fn guild_member_addition(&self, _ctx: Context, new_member: Member) {
        if new_member.guild_id.get() != self.data.config.guild_id {
            return;
        }
        let user_id = new_member.user.id.get();

        match self.data.coordinator.restore_on_rejoin(user_id).await {
            Ok(true) => info!(target: EVENT_TARGET, "Re-muted rejoining user {user_id}"),
            Ok(false) => {}
            Err(e) => error!(target: EVENT_TARGET, "Failed to restore mute of user {user_id}: {e}"),
        }
    }

    async fn reaction_add(&self, _ctx: Context, add_reaction: Reaction) {
        let Some(user_id) = add_reaction.user_id else {
            return;
        };
        let message_id = add_reaction.message_id.get();
        if self.resolve_prompt(message_id, user_id.get(), &add_reaction.emoji) {
            info!(target: EVENT_TARGET, "Prompt {message_id} answered by {user_id}");
        }
    }
}
