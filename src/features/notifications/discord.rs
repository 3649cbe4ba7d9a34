//! Discord transport for the dispatcher
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use super::notifier::{Destination, MessageFormat, Notifier};
use crate::core::chunk_for_message;
use crate::features::deadlines::Identity;
use anyhow::Context as _;
use async_trait::async_trait;
use log::debug;
use serenity::builder::{CreateAllowedMentions, ParseValue};
use serenity::http::Http;
use serenity::model::id::{ChannelId, UserId};
use serenity::utils::MessageBuilder;
use std::sync::Arc;

/// Sends through the bot's HTTP client, splitting long messages
pub struct SerenityNotifier {
    http: Arc<Http>,
}

impl SerenityNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn channel_for(&self, destination: Destination) -> anyhow::Result<ChannelId> {
        match destination {
            Destination::Channel(id) => Ok(ChannelId(snowflake(id)?)),
            Destination::User(id) => {
                let dm = UserId(snowflake(id)?)
                    .create_dm_channel(&self.http)
                    .await
                    .with_context(|| format!("opening DM with user {id}"))?;
                Ok(dm.id)
            }
        }
    }
}

fn snowflake(id: Identity) -> anyhow::Result<u64> {
    u64::try_from(id).with_context(|| format!("{id} is not a Discord id"))
}

/// Mention kinds Discord may resolve into pings
///
/// `@everyone`, `@here` and role mentions typed into deadline text never
/// ping. Markdown messages may ping the users they mention; plain ones ping
/// nobody, since an allowed-mentions object without `parse` allows none.
fn allowed_parse(format: MessageFormat) -> Vec<ParseValue> {
    match format {
        MessageFormat::Markdown => vec![ParseValue::Users],
        MessageFormat::Plain => Vec::new(),
    }
}

fn restrict_mentions(
    mentions: &mut CreateAllowedMentions,
    format: MessageFormat,
) -> &mut CreateAllowedMentions {
    for value in allowed_parse(format) {
        mentions.parse(value);
    }
    mentions
}

#[async_trait]
impl Notifier for SerenityNotifier {
    async fn send(
        &self,
        destination: Destination,
        text: &str,
        format: MessageFormat,
    ) -> anyhow::Result<()> {
        let channel = self.channel_for(destination).await?;
        let content = match format {
            MessageFormat::Markdown => text.to_string(),
            MessageFormat::Plain => MessageBuilder::new().push_safe(text).build(),
        };

        for chunk in chunk_for_message(&content) {
            channel
                .send_message(&self.http, |message| {
                    message
                        .content(&chunk)
                        .allowed_mentions(|mentions| restrict_mentions(mentions, format))
                })
                .await?;
        }
        debug!("Sent message to {destination}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mass_mentions_never_allowed() {
        for format in [MessageFormat::Markdown, MessageFormat::Plain] {
            assert!(allowed_parse(format)
                .iter()
                .all(|value| !matches!(value, ParseValue::Everyone | ParseValue::Roles)));
        }
        assert!(matches!(
            allowed_parse(MessageFormat::Markdown).as_slice(),
            [ParseValue::Users]
        ));
        assert!(allowed_parse(MessageFormat::Plain).is_empty());
    }

    #[test]
    fn test_snowflake_rejects_negative_ids() {
        assert_eq!(snowflake(42).unwrap(), 42);
        assert!(snowflake(-100).is_err());
    }
}
