use crate::prompt::{CANCEL_EMOJI, CONFIRM_EMOJI, Decision};
use crate::punishment::{
    AdminMessage, LiftedPunishment, PunishmentError, PunishmentKind, PunishmentRequest,
    RegistryEntry, ReversalOutcome, request_sweep,
};
use crate::{Context, Error};
use poise::serenity_prelude::{self as serenity, Colour, CreateEmbed, ReactionType};
use tracing::{debug, warn};

/// Only moderators of the configured guild may run punishment commands
async fn is_moderator(ctx: Context<'_>) -> Result<bool, Error> {
    if ctx.guild_id().map(serenity::GuildId::get) != Some(ctx.data().config.guild_id) {
        return Ok(false);
    }
    let Some(member) = ctx.author_member().await else {
        return Ok(false);
    };
    Ok(ctx.data().is_moderator(&member.roles))
}

/// Remove the prefix message that triggered the command
async fn delete_invocation(ctx: Context<'_>) {
    if let poise::Context::Prefix(prefix) = ctx {
        if let Err(e) = prefix.msg.delete(ctx.http()).await {
            debug!("Could not delete command message: {e}");
        }
    }
}

/// Reply shown in the channel once a punishment is issued
fn confirmation_message(entry: &RegistryEntry) -> String {
    let record = &entry.record;
    let duration = record
        .duration()
        .map(|duration| format!(" for {duration}"))
        .unwrap_or_default();
    format!(
        "<@{}> has been {}{duration}. Reason: {}",
        record.target_id(),
        record.kind().action(),
        record.reason()
    )
}

/// Reply shown once punishments are lifted
fn lifted_message(target_id: u64, lifted: &[LiftedPunishment]) -> String {
    if lifted.is_empty() {
        return format!("The punishment of <@{target_id}> was already lifted");
    }
    let mut kinds = Vec::new();
    for kind in lifted.iter().map(|lifted| lifted.entry.kind.as_str()) {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    let kinds = kinds.join(", ");
    let gone = lifted
        .iter()
        .any(|lifted| lifted.outcome == ReversalOutcome::TargetUnavailable);
    if gone {
        format!("Cleared {kinds} of <@{target_id}>, who is no longer in the server")
    } else {
        format!("Lifted {kinds} from <@{target_id}>")
    }
}

fn entry_embed(entry: &RegistryEntry) -> CreateEmbed {
    let record = &entry.record;
    let mut embed = CreateEmbed::new()
        .title(format!("Punishment {}", entry.id))
        .field("Kind", record.kind().as_str(), true)
        .field("User", format!("<@{}>", record.target_id()), true)
        .field("Issued by", format!("<@{}>", record.issuer_id()), true)
        .field("Reason", record.reason(), false)
        .field("Created", format!("<t:{}:f>", record.created_at().timestamp()), true)
        .colour(Colour::RED);

    if let (Some(duration), Some(expires_at)) = (record.duration(), record.expires_at()) {
        embed = embed
            .field("Duration", duration.to_string(), true)
            .field("Expires", format!("<t:{}:R>", expires_at.timestamp()), true);
    }
    embed
}

async fn punish(
    ctx: Context<'_>,
    target: &serenity::User,
    kind: PunishmentKind,
    arguments: Option<String>,
) -> Result<(), Error> {
    let request = PunishmentRequest::new(target.id.get(), ctx.author().id.get(), kind, arguments);

    match ctx.data().coordinator.issue(request).await {
        Ok(entry) => ctx.say(confirmation_message(&entry)).await?,
        Err(e) => {
            warn!("Failed to {kind} user {}: {e}", target.id);
            ctx.say(e.user_message()).await?
        }
    };
    Ok(())
}

/// Warn a member
#[poise::command(prefix_command, slash_command, guild_only, check = "is_moderator")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] member: serenity::Member,
    #[description = "Reason"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    delete_invocation(ctx).await;
    punish(ctx, &member.user, PunishmentKind::Warn, reason).await
}

/// Mute a member, e.g. `mute @user 10 minutes spamming`
#[poise::command(prefix_command, slash_command, guild_only, check = "is_moderator")]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "Member to mute"] member: serenity::Member,
    #[description = "Duration and reason, 5 minutes by default"]
    #[rest]
    arguments: Option<String>,
) -> Result<(), Error> {
    delete_invocation(ctx).await;
    punish(ctx, &member.user, PunishmentKind::Mute, arguments).await
}

/// Kick a member
#[poise::command(prefix_command, slash_command, guild_only, check = "is_moderator")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] member: serenity::Member,
    #[description = "Reason"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    delete_invocation(ctx).await;
    punish(ctx, &member.user, PunishmentKind::Kick, reason).await
}

/// Ban a member for a while, e.g. `ban @user 2 days raiding`
#[poise::command(prefix_command, slash_command, guild_only, check = "is_moderator")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member to ban"] member: serenity::Member,
    #[description = "Duration and reason, 5 minutes by default"]
    #[rest]
    arguments: Option<String>,
) -> Result<(), Error> {
    delete_invocation(ctx).await;
    punish(ctx, &member.user, PunishmentKind::Ban, arguments).await
}

/// Ban a member permanently, after confirmation
#[poise::command(prefix_command, slash_command, guild_only, check = "is_moderator")]
pub async fn permaban(
    ctx: Context<'_>,
    #[description = "Member to ban"] member: serenity::Member,
    #[description = "Reason"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    delete_invocation(ctx).await;

    let reply = ctx
        .say(format!(
            "Permanently ban <@{}>? React with {CONFIRM_EMOJI} to confirm or {CANCEL_EMOJI} to cancel",
            member.user.id
        ))
        .await?;
    let message = reply.message().await?;

    let prompts = &ctx.data().prompts;
    let pending = prompts.open(message.id.get(), ctx.author().id.get());
    for emoji in [CONFIRM_EMOJI, CANCEL_EMOJI] {
        if let Err(e) = message
            .react(ctx.http(), ReactionType::Unicode(emoji.to_string()))
            .await
        {
            warn!("Failed to add {emoji} to the confirmation prompt: {e}");
        }
    }

    let timeout = ctx.data().config.confirmation_timeout();
    match prompts.wait(pending, timeout).await {
        Decision::Confirmed => {
            punish(ctx, &member.user, PunishmentKind::PermaBan, reason).await?;
        }
        Decision::Cancelled => {
            ctx.say("Permanent ban cancelled").await?;
        }
        Decision::TimedOut => {
            ctx.say("No answer, permanent ban cancelled").await?;
        }
    }

    if let Err(e) = message.delete(ctx.http()).await {
        debug!("Could not delete the confirmation prompt: {e}");
    }
    Ok(())
}

/// Lift the active punishments of a user, optionally only one kind
#[poise::command(prefix_command, slash_command, guild_only, check = "is_moderator")]
pub async fn unpunish(
    ctx: Context<'_>,
    #[description = "User to unpunish"] user: serenity::User,
    #[description = "Only lift this kind (MUTE or BAN)"] kind: Option<String>,
) -> Result<(), Error> {
    delete_invocation(ctx).await;

    let kind = match kind.as_deref().map(str::parse::<PunishmentKind>).transpose() {
        Ok(kind) => kind,
        Err(e) => {
            ctx.say(e.to_string()).await?;
            return Ok(());
        }
    };

    let target_id = user.id.get();
    let reply = match ctx.data().coordinator.lift(target_id, kind).await {
        Ok(lifted) => lifted_message(target_id, &lifted),
        Err(e @ (PunishmentError::NoActivePunishment(_) | PunishmentError::Store(_))) => {
            e.user_message()
        }
        Err(e) => format!("Failed to lift punishment: {e}"),
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Punishment registry and active punishments
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "is_moderator",
    aliases("pun", "p", "punish"),
    subcommands("info", "active", "registry"),
    subcommand_required
)]
pub async fn punishment(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show one registry entry
#[poise::command(prefix_command, slash_command, guild_only, check = "is_moderator")]
pub async fn info(
    ctx: Context<'_>,
    #[description = "Registry id of the punishment"] id: String,
) -> Result<(), Error> {
    match ctx.data().coordinator.lookup(&id).await {
        Ok(entry) => {
            ctx.send(poise::CreateReply::default().embed(entry_embed(&entry)))
                .await?;
        }
        Err(e) => {
            ctx.say(e.user_message()).await?;
        }
    }
    Ok(())
}

/// Number of active punishments
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "is_moderator",
    subcommands("active_type")
)]
pub async fn active(ctx: Context<'_>) -> Result<(), Error> {
    let count = ctx
        .data()
        .coordinator
        .active_count(crate::punishment::ActiveFilter::all())
        .await?;
    ctx.say(format!("There are {count} active punishment(s)")).await?;
    Ok(())
}

/// Active punishments per kind
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "is_moderator",
    rename = "type"
)]
pub async fn active_type(ctx: Context<'_>) -> Result<(), Error> {
    let counts = ctx.data().coordinator.active_counts_by_kind().await?;
    send_counts(ctx, "Active punishments", &counts).await
}

/// Number of punishments ever issued
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "is_moderator",
    subcommands("registry_user", "registry_types")
)]
pub async fn registry(ctx: Context<'_>) -> Result<(), Error> {
    let count = ctx
        .data()
        .coordinator
        .registry_count(crate::punishment::RegistryFilter::all())
        .await?;
    ctx.say(format!("{count} punishment(s) have been issued")).await?;
    Ok(())
}

/// Punishments issued to one member, per kind
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "is_moderator",
    rename = "user"
)]
pub async fn registry_user(
    ctx: Context<'_>,
    #[description = "User to look up"] user: serenity::User,
) -> Result<(), Error> {
    let counts = ctx
        .data()
        .coordinator
        .registry_counts_for_target(user.id.get())
        .await?;
    send_counts(ctx, &format!("Punishments of {}", user.name), &counts).await
}

/// Punishments ever issued, per kind
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "is_moderator",
    rename = "types"
)]
pub async fn registry_types(ctx: Context<'_>) -> Result<(), Error> {
    let counts = ctx.data().coordinator.registry_counts_by_kind().await?;
    send_counts(ctx, "Amount of punishments", &counts).await
}

async fn send_counts(
    ctx: Context<'_>,
    title: &str,
    counts: &[(PunishmentKind, u64)],
) -> Result<(), Error> {
    let embed = AdminMessage::counts(title, counts).to_embed();
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Lift expired punishments now
#[poise::command(prefix_command, slash_command, guild_only, check = "is_moderator")]
pub async fn sweep(ctx: Context<'_>) -> Result<(), Error> {
    delete_invocation(ctx).await;
    let report = request_sweep(&ctx.data().sweep_tx).await?;
    ctx.say(format!(
        "Sweep done: {} lifted, {} already gone, {} failed",
        report.lifted + report.superseded,
        report.target_gone,
        report.failed
    ))
    .await?;
    Ok(())
}

/// Every command the bot registers
#[must_use]
pub fn all() -> Vec<poise::Command<crate::Data, Error>> {
    vec![
        warn(),
        mute(),
        kick(),
        ban(),
        permaban(),
        unpunish(),
        punishment(),
        sweep(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::punishment::{ActiveEntry, PunishmentRecord, RegistryId};
    use chrono::Utc;

    fn entry(kind: PunishmentKind, arguments: &str) -> RegistryEntry {
        RegistryEntry::new(
            PunishmentRecord::from_arguments(42, 7, kind, Some(arguments), Utc::now()).unwrap(),
        )
    }

    #[test]
    fn test_confirmation_messages() {
        assert_eq!(
            confirmation_message(&entry(PunishmentKind::Mute, "10 minutes spam")),
            "<@42> has been muted for 10 minutes. Reason: spam"
        );
        assert_eq!(
            confirmation_message(&entry(PunishmentKind::PermaBan, "raid")),
            "<@42> has been perma banned. Reason: raid"
        );
    }

    #[test]
    fn test_lifted_messages() {
        let lifted = |kind, outcome| LiftedPunishment {
            entry: ActiveEntry {
                registry_id: RegistryId::new(),
                target_id: 42,
                kind,
                expires_at: Utc::now(),
            },
            outcome,
        };

        assert_eq!(
            lifted_message(42, &[lifted(PunishmentKind::Mute, ReversalOutcome::Lifted)]),
            "Lifted MUTE from <@42>"
        );
        assert_eq!(
            lifted_message(
                42,
                &[
                    lifted(PunishmentKind::Mute, ReversalOutcome::TargetUnavailable),
                    lifted(PunishmentKind::Ban, ReversalOutcome::Lifted),
                ]
            ),
            "Cleared MUTE, BAN of <@42>, who is no longer in the server"
        );
        assert_eq!(
            lifted_message(
                42,
                &[
                    lifted(PunishmentKind::Mute, ReversalOutcome::Superseded),
                    lifted(PunishmentKind::Mute, ReversalOutcome::Lifted),
                ]
            ),
            "Lifted MUTE from <@42>"
        );
        assert!(lifted_message(42, &[]).contains("already lifted"));
    }

    #[test]
    fn test_command_definitions() {
        let commands = all();
        let names: Vec<_> = commands.iter().map(|cmd| cmd.name.as_str()).collect();
        assert_eq!(
            names,
            ["warn", "mute", "kick", "ban", "permaban", "unpunish", "punishment", "sweep"]
        );
        assert!(commands.iter().all(|cmd| cmd.guild_only));
        assert!(commands.iter().all(|cmd| !cmd.checks.is_empty()));
    }

    #[test]
    fn test_punishment_group() {
        let cmd = punishment();
        assert_eq!(cmd.aliases, ["pun", "p", "punish"]);
        let subcommands: Vec<_> = cmd.subcommands.iter().map(|sub| sub.name.as_str()).collect();
        assert_eq!(subcommands, ["info", "active", "registry"]);

        let active = &cmd.subcommands[1];
        assert_eq!(active.subcommands[0].name, "type");
        let registry = &cmd.subcommands[2];
        let names: Vec<_> = registry.subcommands.iter().map(|sub| sub.name.as_str()).collect();
        assert_eq!(names, ["user", "types"]);
    }
}
