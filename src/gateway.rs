use std::sync::Arc;

use chrono::{DateTime, Utc};
use serenity::async_trait;
use serenity::builder::{EditMember, EditMessage};
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::Timestamp;
use serenity::model::guild::{Guild, Member};
use serenity::model::id::{ChannelId, GuildId, MessageId, RoleId, UserId};
use tracing::warn;

use crate::error::{Error, Result};

// Routing information an activity keeps around to address Gateway calls
// back to the place it was created from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScopeRef {
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub message_id: Option<u64>,
}

impl ScopeRef {
    pub fn new(guild_id: Option<u64>, channel_id: u64) -> Self {
        ScopeRef {
            guild_id,
            channel_id,
            message_id: None,
        }
    }

    // Scope for activities that belong to a guild but no channel.
    pub fn guild(guild_id: u64) -> Self {
        ScopeRef {
            guild_id: Some(guild_id),
            channel_id: 0,
            message_id: None,
        }
    }

    // Returns the tracked message as a MessageRef, when one was recorded.
    pub fn message_ref(&self) -> Option<MessageRef> {
        self.message_id.map(|message_id| MessageRef {
            channel_id: self.channel_id,
            message_id,
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

// A reduced view of a guild member, enough for the verification and
// anti-spam machines to make their decisions without serenity types.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemberView {
    pub user_id: u64,
    pub role_ids: Vec<u64>,
    pub kickable: bool,
    pub moderatable: bool,
}

impl MemberView {
    pub fn has_role(&self, role_id: u64) -> bool {
        self.role_ids.contains(&role_id)
    }
}

// Abstraction over the chat platform's imperative operations. The state
// machines only ever talk to this trait, which keeps them testable with
// the recording fake below.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<MessageRef>;

    // Edits a previously sent message. With `strip_components` the
    // interactive controls are removed as well (used by terminal actions).
    async fn edit_message(
        &self,
        message: &MessageRef,
        content: &str,
        strip_components: bool,
    ) -> Result<()>;

    async fn delete_message(&self, message: &MessageRef) -> Result<()>;

    // Deletes a batch of messages with a single call. The platform caps
    // the batch size and rejects messages older than two weeks; callers
    // go through the bulk executor which enforces both.
    async fn delete_messages(&self, channel_id: u64, message_ids: &[u64]) -> Result<()>;

    // May fail when the target disallows direct messages from the bot.
    async fn send_direct_message(&self, user_id: u64, content: &str) -> Result<()>;

    // Returns None when the member is no longer part of the guild.
    async fn fetch_member(&self, guild_id: u64, user_id: u64) -> Option<MemberView>;

    async fn add_role(&self, guild_id: u64, user_id: u64, role_id: u64, reason: &str)
    -> Result<()>;

    async fn kick_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<()>;

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<()>;
}

// The production implementation, backed by the serenity HTTP client and
// the gateway cache.
pub struct SerenityGateway {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        SerenityGateway { http, cache }
    }

    // Checks whether the bot outranks the member in the role hierarchy.
    // Falls back to `true` on cache misses; the actual call will surface
    // the permission error and gets logged by the caller.
    fn outranks(&self, guild_id: GuildId, member: &Member) -> bool {
        let bot_id = { self.cache.current_user().id };
        let Some(guild) = self.cache.guild(guild_id) else {
            return true;
        };
        if member.user.id == guild.owner_id {
            return false;
        }
        let Some(bot_member) = guild.members.get(&bot_id) else {
            return true;
        };
        top_role_position(&guild, bot_member) > top_role_position(&guild, member)
    }

    fn member_view(&self, guild_id: GuildId, member: &Member) -> MemberView {
        let manageable = self.outranks(guild_id, member);
        MemberView {
            user_id: member.user.id.get(),
            role_ids: member.roles.iter().map(|role_id| role_id.get()).collect(),
            kickable: manageable,
            moderatable: manageable,
        }
    }
}

fn top_role_position(guild: &Guild, member: &Member) -> u16 {
    member
        .roles
        .iter()
        .filter_map(|role_id| guild.roles.get(role_id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

#[async_trait]
impl Gateway for SerenityGateway {
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<MessageRef> {
        let message = ChannelId::new(channel_id).say(&*self.http, content).await?;
        Ok(MessageRef {
            channel_id,
            message_id: message.id.get(),
        })
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        content: &str,
        strip_components: bool,
    ) -> Result<()> {
        let mut builder = EditMessage::new().content(content);
        if strip_components {
            builder = builder.components(Vec::new());
        }
        ChannelId::new(message.channel_id)
            .edit_message(&*self.http, MessageId::new(message.message_id), builder)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<()> {
        ChannelId::new(message.channel_id)
            .delete_message(&*self.http, MessageId::new(message.message_id))
            .await?;
        Ok(())
    }

    async fn delete_messages(&self, channel_id: u64, message_ids: &[u64]) -> Result<()> {
        let ids = message_ids
            .iter()
            .map(|id| MessageId::new(*id))
            .collect::<Vec<MessageId>>();
        ChannelId::new(channel_id)
            .delete_messages(&*self.http, ids)
            .await?;
        Ok(())
    }

    async fn send_direct_message(&self, user_id: u64, content: &str) -> Result<()> {
        let channel = UserId::new(user_id).create_dm_channel(&*self.http).await?;
        channel.id.say(&*self.http, content).await?;
        Ok(())
    }

    async fn fetch_member(&self, guild_id: u64, user_id: u64) -> Option<MemberView> {
        match self
            .http
            .get_member(GuildId::new(guild_id), UserId::new(user_id))
            .await
        {
            Ok(member) => Some(self.member_view(GuildId::new(guild_id), &member)),
            Err(err) => {
                warn!("Can't fetch the member {}: {}", user_id, err);
                None
            }
        }
    }

    async fn add_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<()> {
        self.http
            .add_member_role(
                GuildId::new(guild_id),
                UserId::new(user_id),
                RoleId::new(role_id),
                Some(reason),
            )
            .await?;
        Ok(())
    }

    async fn kick_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<()> {
        self.http
            .kick_member(GuildId::new(guild_id), UserId::new(user_id), Some(reason))
            .await?;
        Ok(())
    }

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<()> {
        let timestamp = Timestamp::from_unix_timestamp(until.timestamp())
            .map_err(|err| Error::Serenity(err.to_string()))?;
        let builder = EditMember::new()
            .disable_communication_until_datetime(timestamp)
            .audit_log_reason(reason);
        GuildId::new(guild_id)
            .edit_member(&*self.http, UserId::new(user_id), builder)
            .await?;
        Ok(())
    }
}
