use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;

use deadline_bot::commands::{
    create_all_handlers, register_global_commands, register_guild_commands, CommandContext,
    CommandRegistry,
};
use deadline_bot::core::Config;
use deadline_bot::features::deadlines::{DeadlineRegistry, DeadlineService};
use deadline_bot::features::notifications::{
    BroadcastTarget, NotificationDispatcher, SerenityNotifier,
};
use deadline_bot::features::recurring::{BirthdayCheck, DailyCheck, DAILY_CHECK_JOB};
use deadline_bot::features::reminders::{ReminderScheduler, TokioJobRunner};
use deadline_bot::features::users::KnownUsers;
use deadline_bot::features::worker::JobWorker;
use deadline_bot::store::JsonStore;

struct Handler {
    registry: CommandRegistry,
    context: Arc<CommandContext>,
    guild_id: Option<GuildId>,
}

impl Handler {
    async fn handle_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        if let Ok(user) = i64::try_from(command.user.id.0) {
            self.context.known_users.record(user).await;
        }

        match self.registry.get(&command.data.name) {
            Some(handler) => handler.handle(self.context.clone(), ctx, command).await,
            None => {
                warn!("No handler registered for /{}", command.data.name);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());
        info!("🤖 Bot ID: {}", ready.user.id);

        // Register slash commands - use guild commands for development (instant), global for production
        if let Some(guild_id) = self.guild_id {
            info!("🔧 Development mode: Registering commands for guild {guild_id}");
            if let Err(e) = register_guild_commands(&ctx, guild_id).await {
                error!("❌ Failed to register guild slash commands: {e}");
            } else {
                info!("✅ Successfully registered slash commands for guild {guild_id} (instant update)");
            }
        } else {
            info!("🌍 Production mode: Registering commands globally");
            if let Err(e) = register_global_commands(&ctx).await {
                error!("❌ Failed to register global slash commands: {e}");
            } else {
                info!("✅ Successfully registered slash commands globally (may take up to 1 hour to propagate)");
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::ApplicationCommand(command) = interaction {
            if let Err(e) = self.handle_command(&ctx, &command).await {
                error!(
                    "Error handling slash command '{}': {}",
                    command.data.name, e
                );

                let error_message =
                    "❌ Sorry, I encountered an error processing your command. Please try again.";

                // The handler may already have replied; fall back to a follow-up
                #[allow(clippy::redundant_pattern_matching)]
                if let Err(_) = command
                    .create_interaction_response(&ctx.http, |response| {
                        response
                            .kind(InteractionResponseType::ChannelMessageWithSource)
                            .interaction_response_data(|message| {
                                message.content(error_message).ephemeral(true)
                            })
                    })
                    .await
                {
                    let _ = command
                        .create_followup_message(&ctx.http, |message| {
                            message.content(error_message).ephemeral(true)
                        })
                        .await;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Arc::new(Config::from_env()?);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Deadline Bot v{}...", deadline_bot::features::get_bot_version());
    info!("📁 Data directory: {}", config.data_dir.display());

    let store = Arc::new(JsonStore::new(&config.data_dir));

    // Deadlines and their reminder jobs; restored before anything can fire
    let runner = Arc::new(TokioJobRunner::new());
    let scheduler = Arc::new(ReminderScheduler::new(runner.clone()));
    let service = Arc::new(DeadlineService::new(
        Arc::new(DeadlineRegistry::new(store.clone())),
        scheduler,
    ));
    let summary = service.startup().await;
    info!(
        "📋 Restored {} reminders for {} deadlines ({} duplicates removed, {} elapsed reminders dropped)",
        summary.restore.jobs,
        summary.restore.deadlines,
        summary.duplicates_removed,
        summary.restore.dropped
    );

    let known_users = Arc::new(KnownUsers::load(store.clone()).await);
    let broadcast = Arc::new(BroadcastTarget::new(config.broadcast_channel_id));
    if config.broadcast_channel_id.is_none() {
        warn!("BROADCAST_CHANNEL_ID not set - shared reminders go to the channel they were created in until /set_group is used");
    }

    let http = Arc::new(Http::new(&config.discord_token));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(SerenityNotifier::new(http)),
        known_users.clone(),
        broadcast,
        std::time::Duration::from_secs(config.send_timeout_secs),
    ));

    // Daily birthday check on the same runner
    let daily = Arc::new(DailyCheck::new(
        DAILY_CHECK_JOB,
        config.daily_check_time,
        chrono::Duration::seconds(config.misfire_grace_secs as i64),
        Arc::new(BirthdayCheck::new(&config.birthdays_file, dispatcher.clone())),
        store,
    ));
    if let Err(e) = daily.register(runner.as_ref()).await {
        error!("❌ Failed to schedule the daily check: {e}");
    }

    // Runner -> worker channel
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = Arc::new(JobWorker::new(dispatcher.clone()).with_daily(daily));
    tokio::spawn(worker.run(rx));
    runner.clone().spawn(tx);
    info!("⏰ Job runner started with {} pending jobs", runner.len());

    let mut registry = CommandRegistry::new();
    for handler in create_all_handlers() {
        registry.register(handler);
    }
    info!("Registered handlers for: {}", registry.command_names().join(", "));

    // Parse guild ID if provided for development mode
    let guild_id = config
        .discord_guild_id
        .as_ref()
        .and_then(|id| id.parse::<u64>().ok())
        .map(GuildId);

    let handler = Handler {
        registry,
        context: Arc::new(CommandContext::new(
            service,
            dispatcher,
            known_users,
            config.clone(),
        )),
        guild_id,
    };

    let intents = GatewayIntents::GUILDS | GatewayIntents::DIRECT_MESSAGES;

    // Build the Discord client with proper gateway configuration
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    info!("Bot configured successfully. Connecting to Discord gateway...");

    if let Err(why) = client.start().await {
        error!("Gateway connection failed: {why:?}");
        error!("This could be due to:");
        error!("  - Invalid bot token");
        error!("  - Network connectivity issues");
        error!("  - Discord API outage");
        return Err(anyhow::anyhow!(
            "Failed to establish gateway connection: {}",
            why
        ));
    }

    Ok(())
}
