use std::sync::Arc;

use gavel::config::{self, BotConfig};
use gavel::punishment::{
    ACTIVE_FILE, ActiveEntry, ChannelAdminLog, DocumentCollection, DynAdminLog, ExpirySweep,
    LifecycleCoordinator, REGISTRY_FILE, RegistryEntry, SerenityPlatform, TracingAdminLog,
};
use gavel::{BOT_NAME, Data, Error, commands, handlers, logging};
use poise::serenity_prelude::{self as serenity, GatewayIntents, GuildId, Http};
use tracing::{error, info};

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    let config = BotConfig::load_default().await?;
    logging::init(&config.log_dir)?;
    let token = config::discord_token()?;

    let http = Arc::new(Http::new(&token));
    let platform = Arc::new(SerenityPlatform::new(
        Arc::clone(&http),
        config.guild_id,
        config.muted_role_id,
    ));
    let admin_log: DynAdminLog = match config.admin_log_channel_id {
        Some(channel_id) => Arc::new(ChannelAdminLog::new(Arc::clone(&http), channel_id)),
        None => {
            info!("No admin log channel configured, audit messages go to the log only");
            Arc::new(TracingAdminLog)
        }
    };

    let registry = DocumentCollection::<RegistryEntry>::open_in(
        "punishment registry",
        &config.data_dir,
        REGISTRY_FILE,
    )
    .await?;
    let active =
        DocumentCollection::<ActiveEntry>::open_in("active punishments", &config.data_dir, ACTIVE_FILE)
            .await?;
    let coordinator =
        LifecycleCoordinator::new(Arc::new(registry), Arc::new(active), platform, admin_log);

    // Entries that expired while the bot was offline are lifted on the first tick
    let sweep = ExpirySweep::new(coordinator.clone(), config.sweep_interval()).spawn();

    let guild_id = GuildId::new(config.guild_id);
    let prefix = config.prefix.clone();
    let data = Data::new(config, coordinator, sweep.requests());
    let framework_data = data.clone();

    // Configure the Poise framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                case_insensitive_commands: true,
                ..Default::default()
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_start(ctx).await;
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_end(ctx).await;
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    logging::log_command_error(&error);
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                logging::log_console(&format!("Registering commands in guild {guild_id}"));
                poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id)
                    .await?;
                Ok(framework_data)
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGE_REACTIONS;
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .event_handler(handlers::Handler::new(data))
        .framework(framework)
        .await?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            return;
        }
        info!("Shutting down {BOT_NAME}");
        shard_manager.shutdown_all().await;
    });

    info!("Starting {BOT_NAME}...");
    let result = client.start().await;

    // Let an in-flight sweep finish before exiting
    if let Err(e) = sweep.shutdown().await {
        error!("Expiry sweep did not stop cleanly: {e}");
    }

    result.map_err(Into::into)
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start the runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(async_main()) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
