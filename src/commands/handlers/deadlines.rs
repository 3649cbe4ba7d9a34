//! Deadline command handlers
//!
//! Handles: add_deadline, list_deadlines, remove_deadline, set_group
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Add, list, remove and set_group

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::Context;
use std::sync::Arc;

use crate::commands::context::CommandContext;
use crate::commands::handler::SlashCommandHandler;
use crate::commands::slash::{get_bool_option, get_integer_option, get_string_option};
use crate::core::{chunk_for_message, mention, BotError};
use crate::features::deadlines::{
    parse_due_input, Deadline, DeadlineFilter, Identity, NewDeadline, TemporalFilter,
};

/// Handler for deadline commands
pub struct DeadlineHandler;

#[async_trait]
impl SlashCommandHandler for DeadlineHandler {
    fn command_names(&self) -> &'static [&'static str] {
        &["add_deadline", "list_deadlines", "remove_deadline", "set_group"]
    }

    async fn handle(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let guild_id = command.guild_id.map(|id| id.0);
        if !ctx.config.is_origin_allowed(guild_id) {
            debug!("Rejected /{} from guild {:?}", command.data.name, guild_id);
            return respond(
                serenity_ctx,
                command,
                "❌ Deadlines are not available on this server.",
                true,
            )
            .await;
        }

        match command.data.name.as_str() {
            "add_deadline" => self.handle_add(&ctx, serenity_ctx, command).await,
            "list_deadlines" => self.handle_list(&ctx, serenity_ctx, command).await,
            "remove_deadline" => self.handle_remove(&ctx, serenity_ctx, command).await,
            "set_group" => self.handle_set_group(&ctx, serenity_ctx, command).await,
            _ => Ok(()),
        }
    }
}

impl DeadlineHandler {
    /// Handle /add_deadline - create and schedule a deadline
    async fn handle_add(
        &self,
        ctx: &CommandContext,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let options = &command.data.options;
        let is_private = get_bool_option(options, "private").unwrap_or(false);
        let subject = get_string_option(options, "subject")
            .ok_or_else(|| anyhow!("Missing subject parameter"))?;
        let title = get_string_option(options, "title")
            .ok_or_else(|| anyhow!("Missing title parameter"))?;
        let due = get_string_option(options, "due")
            .ok_or_else(|| anyhow!("Missing due parameter"))?;
        let description = get_string_option(options, "description").unwrap_or_default();

        let due_at = match parse_due_input(&due) {
            Ok(due_at) => due_at,
            Err(e) => return respond(serenity_ctx, command, &user_error(&e), true).await,
        };

        let new = NewDeadline {
            subject,
            title,
            description,
            due_at,
            is_private,
            created_by: identity(command.user.id.0)?,
            created_in: identity(command.channel_id.0)?,
            author_display_name: display_name(command),
        };

        let deadline = match ctx.service.add(new).await {
            Ok(deadline) => deadline,
            Err(e @ BotError::Validation(_)) => {
                return respond(serenity_ctx, command, &user_error(&e), true).await;
            }
            Err(e) => return Err(e.into()),
        };

        respond(
            serenity_ctx,
            command,
            &format_created(&deadline),
            deadline.is_private,
        )
        .await?;

        ctx.dispatcher.announce_created(&deadline).await;
        Ok(())
    }

    /// Handle /list_deadlines - show what the caller may see
    async fn handle_list(
        &self,
        ctx: &CommandContext,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let state = match get_string_option(&command.data.options, "filter") {
            Some(raw) => match raw.parse::<TemporalFilter>() {
                Ok(state) => state,
                Err(e) => return respond(serenity_ctx, command, &user_error(&e), true).await,
            },
            None => TemporalFilter::Active,
        };

        let filter = DeadlineFilter {
            viewer: identity(command.user.id.0)?,
            state,
        };
        let deadlines: Vec<Deadline> = ctx.service.list(filter).await.collect();
        debug!(
            "Listing {} deadlines ({state:?}) for user {}",
            deadlines.len(),
            command.user.id
        );

        respond(serenity_ctx, command, &format_list(&deadlines, state), true).await
    }

    /// Handle /remove_deadline - delete and cancel reminders
    async fn handle_remove(
        &self,
        ctx: &CommandContext,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let id = get_integer_option(&command.data.options, "id")
            .ok_or_else(|| anyhow!("Missing id parameter"))?;
        let Ok(id) = u64::try_from(id) else {
            return respond(serenity_ctx, command, "❌ Deadline IDs are positive numbers.", true)
                .await;
        };

        let remover = identity(command.user.id.0)?;
        let removed = match ctx.service.remove_as(id, remover).await {
            Ok(removed) => removed,
            Err(e @ BotError::NotFound(_)) => {
                return respond(serenity_ctx, command, &user_error(&e), true).await;
            }
            Err(e) => return Err(e.into()),
        };

        let remover_name = display_name(command);
        respond(
            serenity_ctx,
            command,
            &format_removed(&removed, &mention(&remover_name, remover)),
            removed.is_private,
        )
        .await?;

        ctx.dispatcher
            .announce_removed(&removed, remover, &remover_name)
            .await;
        Ok(())
    }

    /// Handle /set_group - make this channel the broadcast destination
    async fn handle_set_group(
        &self,
        ctx: &CommandContext,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        if command.guild_id.is_none() {
            return respond(
                serenity_ctx,
                command,
                "❌ Use this command in a server channel.",
                true,
            )
            .await;
        }

        let channel = identity(command.channel_id.0)?;
        ctx.broadcast().set_runtime(channel).await;
        info!("User {} set broadcast channel to {channel}", command.user.id);

        respond(
            serenity_ctx,
            command,
            "✅ Shared deadline reminders will be posted in this channel.",
            false,
        )
        .await
    }
}

/// Discord ids always fit in a signed 64-bit identity
fn identity(id: u64) -> Result<Identity> {
    Identity::try_from(id).map_err(|_| anyhow!("id {id} out of range"))
}

fn display_name(command: &ApplicationCommandInteraction) -> String {
    command
        .member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .unwrap_or_else(|| command.user.name.clone())
}

/// Message shown to the user for an input problem
fn user_error(error: &BotError) -> String {
    match error {
        BotError::Validation(reason) => format!("❌ {reason}"),
        BotError::NotFound(id) => format!("❌ Deadline ID={id} not found."),
        other => format!("❌ {other}"),
    }
}

fn format_created(deadline: &Deadline) -> String {
    format!(
        "✅ Deadline added! (ID={})\nSubject: {}\nTask: {}\nDue: {}\nType: {}\nDescription: {}\nAuthor: {}",
        deadline.id,
        deadline.subject,
        deadline.title,
        deadline.due_display(),
        deadline.kind_label(),
        deadline.description,
        mention(&deadline.author_display_name, deadline.created_by)
    )
}

fn format_removed(deadline: &Deadline, remover: &str) -> String {
    format!(
        "❌ Deadline ID={} removed!\nSubject: {} / Task: {}\nRemoved by: {remover}",
        deadline.id, deadline.subject, deadline.title
    )
}

fn format_list(deadlines: &[Deadline], state: TemporalFilter) -> String {
    if deadlines.is_empty() {
        return match state {
            TemporalFilter::Active => "📋 No active deadlines. Use `/add_deadline` to add one!",
            TemporalFilter::Expired => "📋 No expired deadlines.",
            TemporalFilter::All => "📋 No deadlines yet!",
        }
        .to_string();
    }

    let heading = match state {
        TemporalFilter::Active => "Active deadlines",
        TemporalFilter::Expired => "Expired deadlines",
        TemporalFilter::All => "All deadlines",
    };
    let mut output = format!("📋 **{heading}:**\n\n");
    for d in deadlines {
        output.push_str(&format!(
            "**#{}** {} / {}\n📅 {} ({})\n",
            d.id,
            d.subject,
            d.title,
            d.due_display(),
            d.kind_label()
        ));
        if !d.description.is_empty() {
            output.push_str(&format!("> {}\n", d.description));
        }
        output.push_str(&format!(
            "👤 {}\n\n",
            mention(&d.author_display_name, d.created_by)
        ));
    }
    output
}

/// Reply to the interaction, continuing long text in follow-ups
async fn respond(
    serenity_ctx: &Context,
    command: &ApplicationCommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    let mut chunks = chunk_for_message(content).into_iter();
    let first = chunks.next().unwrap_or_default();

    command
        .create_interaction_response(&serenity_ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|msg| msg.content(&first).ephemeral(ephemeral))
        })
        .await?;

    for chunk in chunks {
        if let Err(e) = command
            .create_followup_message(&serenity_ctx.http, |msg| {
                msg.content(&chunk).ephemeral(ephemeral)
            })
            .await
        {
            warn!("Failed to send follow-up for /{}: {e}", command.data.name);
            break;
        }
    }
    Ok(())
}
