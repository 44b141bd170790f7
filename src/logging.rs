use crate::{COMMAND_TARGET, CONSOLE_TARGET, Data, ERROR_TARGET, Error, PUNISHMENT_TARGET};
use poise::{Context, FrameworkError};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Command log file name
pub const COMMAND_LOG_FILE: &str = "commands";
/// Punishment lifecycle log file name
pub const PUNISHMENT_LOG_FILE: &str = "punishments";

/// Initialize the logging system with console and file outputs under `log_dir`
pub fn init(log_dir: &Path) -> Result<(), Error> {
    std::fs::create_dir_all(log_dir)?;

    // Set up file appenders with daily rotation
    let command_file = RollingFileAppender::new(Rotation::DAILY, log_dir, COMMAND_LOG_FILE);
    let punishment_file =
        RollingFileAppender::new(Rotation::DAILY, log_dir, PUNISHMENT_LOG_FILE);

    // Create a layer for console output (human-readable format)
    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(true);

    // Create a layer for command logs (JSON format)
    let command_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(command_file);

    // Lifecycle transitions only, kept as the durable audit trail
    let punishment_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(punishment_file)
        .with_filter(filter_fn(|metadata| {
            metadata.target().starts_with(PUNISHMENT_TARGET)
        }));

    // Default to INFO level if not specified, but filter out serenity heartbeat logs
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info").add_directive("serenity=error".parse()?),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(command_layer)
        .with(punishment_layer)
        .init();

    info!("Logging system initialized in {}", log_dir.display());
    Ok(())
}

fn guild_label(ctx: Context<'_, Data, Error>) -> String {
    ctx.guild_id()
        .map_or_else(|| "DM".to_string(), |id| id.get().to_string())
}

/// Fields shared by every command log line
struct Invocation {
    command: String,
    guild: String,
    user_id: u64,
}

impl Invocation {
    fn of(ctx: Context<'_, Data, Error>) -> Self {
        Self {
            command: ctx.command().qualified_name.clone(),
            guild: guild_label(ctx),
            user_id: ctx.author().id.get(),
        }
    }
}

/// Log the start of a command execution (pre-command hook)
pub async fn log_command_start(ctx: Context<'_, Data, Error>) {
    // Read back by log_command_end for the same invocation
    ctx.set_invocation_data(Instant::now()).await;

    let Invocation {
        command,
        guild,
        user_id,
    } = Invocation::of(ctx);
    let args = if ctx.command().parameters.is_empty() {
        String::new()
    } else {
        format!("{:?}", ctx.invocation_string())
    };

    info!(
        target: COMMAND_TARGET,
        %command,
        guild_id = %guild,
        user_id,
        arguments = %args,
        event = "start",
        "Moderator command started"
    );
}

/// Log the end of a command execution (post-command hook)
pub async fn log_command_end(ctx: Context<'_, Data, Error>) {
    let elapsed = ctx
        .invocation_data::<Instant>()
        .await
        .map(|start| start.elapsed());
    let duration_ms = elapsed.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

    let Invocation {
        command,
        guild,
        user_id,
    } = Invocation::of(ctx);
    info!(
        target: COMMAND_TARGET,
        %command,
        guild_id = %guild,
        user_id,
        duration_ms,
        event = "end",
        "Moderator command finished"
    );
}

/// Log errors that occur during command execution
pub fn log_command_error(error: &FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Command { error, ctx, .. } => {
            let Invocation {
                command,
                guild,
                user_id,
            } = Invocation::of(*ctx);
            error!(
                target: ERROR_TARGET,
                %command,
                guild_id = %guild,
                user_id,
                %error,
                "Moderator command failed"
            );
        }
        // Non-moderators trying punishment commands are expected, not errors
        FrameworkError::CommandCheckFailed { error, ctx, .. } => {
            let Invocation {
                command,
                guild,
                user_id,
            } = Invocation::of(*ctx);
            let reason = error
                .as_ref()
                .map_or_else(|| "not a moderator".to_string(), ToString::to_string);
            warn!(
                target: ERROR_TARGET,
                %command,
                guild_id = %guild,
                user_id,
                %reason,
                "Command refused"
            );
        }
        FrameworkError::ArgumentParse { error, input, ctx, .. } => {
            error!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                input = ?input,
                %error,
                "Invalid command arguments"
            );
        }
        err => {
            error!(target: ERROR_TARGET, error = ?err, "Other framework error");
        }
    }
}

pub fn log_console(message: &str) {
    info!(
        target: CONSOLE_TARGET,
        message = %message,
        event = "console",
    );
}
