//! Utility command handlers
//!
//! Handles: help
//!
//! - **Version**: 2.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 2.0.0: Help describes the deadline commands; ping/status/uptime removed
//! - 1.0.0: Help, ping and status handlers

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::commands::context::CommandContext;
use crate::commands::handler::SlashCommandHandler;
use crate::features::deadlines::REMINDER_OFFSETS_DAYS;

/// Handler for utility commands: help
pub struct UtilityHandler;

#[async_trait]
impl SlashCommandHandler for UtilityHandler {
    fn command_names(&self) -> &'static [&'static str] {
        &["help"]
    }

    async fn handle(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        match command.data.name.as_str() {
            "help" => self.handle_help(&ctx, serenity_ctx, command).await,
            _ => Ok(()),
        }
    }
}

impl UtilityHandler {
    /// Handle /help command
    async fn handle_help(
        &self,
        ctx: &CommandContext,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let text = help_text(ctx.start_time.elapsed());

        command
            .create_interaction_response(&serenity_ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| message.content(text).ephemeral(true))
            })
            .await?;

        debug!("Help command completed for user {}", command.user.id);
        Ok(())
    }
}

fn help_text(uptime: Duration) -> String {
    let mut offsets: Vec<i64> = REMINDER_OFFSETS_DAYS.to_vec();
    offsets.sort_unstable_by(|a, b| b.cmp(a));
    let offsets = offsets
        .iter()
        .map(|d| match d {
            0 => "on the day".to_string(),
            1 => "1 day".to_string(),
            n => format!("{n} days"),
        })
        .collect::<Vec<_>>()
        .join(", ");

    let features = crate::features::get_features()
        .iter()
        .map(|f| format!("{} v{}", f.name, f.version))
        .collect::<Vec<_>>()
        .join(", ");

    let hours = uptime.as_secs() / 3600;
    let minutes = (uptime.as_secs() % 3600) / 60;

    format!(
        "**Deadline Bot v{}**\n\n\
        **Commands:**\n\
        `/add_deadline` - Add a personal or shared deadline (`YYYY-MM-DD HH:MM`, or `YYYY-MM-DD` for 23:59)\n\
        `/list_deadlines [active|expired|all]` - Show the deadlines you can see\n\
        `/remove_deadline <id>` - Remove a deadline and its reminders\n\
        `/set_group` - Post shared reminders in the current channel\n\
        `/help` - Show this help message\n\n\
        **Reminders** are sent {offsets} before each deadline. Personal deadlines \
        remind only you; shared ones go to the group and everyone who uses the bot.\n\n\
        🧩 {features}\n\
        ⏱️ Uptime: {hours}h {minutes}m",
        crate::features::get_bot_version()
    )
}
