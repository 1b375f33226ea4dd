pub mod activities;
pub mod bulk;
pub mod commands;
pub mod db;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod state;
pub mod storage;
pub mod systems;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use poise::serenity_prelude::GatewayIntents;
use serenity::async_trait;
use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::client::{Client, Context, EventHandler};
use serenity::model::application::{ComponentInteraction, Interaction};
use serenity::model::channel::Message;
use serenity::model::event::GuildMemberUpdateEvent;
use serenity::model::gateway::Ready;
use serenity::model::guild::Member;
use serenity::model::id::GuildId;
use serenity::model::user::User;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::activities::giveaway::EntryOutcome;
use crate::activities::poll::VoteOutcome;
use crate::activities::spam::ObservedMessage;
use crate::activities::verify::DEFAULT_TIMEOUT_MINUTES;
use crate::activities::{giveaway, poll};
use crate::commands::UserData;
use crate::error::Error;
use crate::gateway::SerenityGateway;
use crate::registry::models::ActivityPayload;
use crate::state::BotState;
use crate::storage::BotStateStorage;

pub struct Handler;

async fn bot_state(ctx: &Context) -> Arc<BotState> {
    ctx.data
        .read()
        .await
        .get::<BotStateStorage>()
        .cloned()
        .expect("Expected BotState in ShareMap.")
}

async fn ephemeral_response(ctx: &Context, component: &ComponentInteraction, content: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );
    if let Err(err) = component.create_response(&ctx.http, response).await {
        warn!("Can't respond to the component interaction: {}", err);
    }
}

async fn update_response(ctx: &Context, component: &ComponentInteraction, content: String) {
    let response = CreateInteractionResponse::UpdateMessage(
        CreateInteractionResponseMessage::new().content(content),
    );
    if let Err(err) = component.create_response(&ctx.http, response).await {
        warn!("Can't update the interactive message: {}", err);
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // System and direct messages are never spam-checked; neither are
        // other bots.
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let (privileged, guild_name) = {
            match msg.guild(&ctx.cache) {
                Some(guild) => {
                    let privileged = guild
                        .members
                        .get(&msg.author.id)
                        .map(|member| {
                            let permissions = guild.member_permissions(member);
                            permissions.administrator() || permissions.manage_messages()
                        })
                        .unwrap_or(false);
                    (privileged, guild.name.clone())
                }
                None => (false, String::new()),
            }
        };
        if privileged {
            return;
        }

        let state = bot_state(&ctx).await;
        let observed = ObservedMessage {
            guild_id: guild_id.get(),
            guild_name,
            channel_id: msg.channel_id.get(),
            message_id: msg.id.get(),
            author_id: msg.author.id.get(),
            content: msg.content.clone(),
            mention_count: msg.mentions.len() + msg.mention_roles.len(),
            timestamp: DateTime::from_timestamp(msg.timestamp.unix_timestamp(), 0)
                .unwrap_or_else(Utc::now),
        };

        if let Some(violation) = state.spam.observe(&observed) {
            state.spam.enforce(&state.gateway, &observed, &violation).await;

            let config = state.config.get(guild_id.get());
            systems::log_to_guild(
                &state.gateway,
                &config,
                &format!(
                    "🚫 Anti-spam: <@{}> - {} (warning #{})",
                    observed.author_id,
                    violation.description,
                    violation.prior_warnings + 1,
                ),
            )
            .await;
        }
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        let state = bot_state(&ctx).await;
        let guild_id = new_member.guild_id.get();
        let user_id = new_member.user.id.get();
        let config = state.config.get(guild_id);

        let (guild_name, member_count) = {
            match ctx.cache.guild(new_member.guild_id) {
                Some(guild) => (guild.name.clone(), guild.member_count),
                None => ("this server".to_string(), 0),
            }
        };

        systems::auto_role::member_joined(&state.gateway, &config, guild_id, user_id);
        systems::welcome::member_joined(&state.gateway, &config, &guild_name, member_count, user_id)
            .await;

        match config.verify_role_id {
            Some(role_id) => {
                let timeout_minutes = config
                    .verify_timeout_minutes
                    .unwrap_or(DEFAULT_TIMEOUT_MINUTES);
                state.verify.start(
                    &state.gateway,
                    guild_id,
                    &guild_name,
                    user_id,
                    role_id,
                    timeout_minutes,
                );
            }
            None => warn!("VERIFY_ROLE_ID is not configured for guild {}", guild_id),
        }
    }

    async fn guild_member_removal(
        &self,
        ctx: Context,
        guild_id: GuildId,
        user: User,
        _member: Option<Member>,
    ) {
        let state = bot_state(&ctx).await;
        state.verify.member_left(guild_id.get(), user.id.get());

        let member_count = {
            ctx.cache
                .guild(guild_id)
                .map(|guild| guild.member_count)
                .unwrap_or(0)
        };
        let config = state.config.get(guild_id.get());
        systems::welcome::member_left(&state.gateway, &config, &user.tag(), member_count).await;
    }

    async fn guild_member_update(
        &self,
        ctx: Context,
        _old: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        let state = bot_state(&ctx).await;
        let role_ids = event
            .roles
            .iter()
            .map(|role_id| role_id.get())
            .collect::<Vec<u64>>();
        state
            .verify
            .member_updated(event.guild_id.get(), event.user.id.get(), &role_ids);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Component(component) = interaction else {
            return;
        };
        let state = bot_state(&ctx).await;
        let custom_id = component.data.custom_id.clone();
        let user_id = component.user.id.get();

        if let Some(raw) = custom_id.strip_prefix("giveaway_enter_") {
            let Ok(id) = Uuid::parse_str(raw) else {
                return;
            };
            match giveaway::enter(&state.registry, &id, user_id) {
                EntryOutcome::Entered(_) => {
                    if let Some(activity) = state.registry.get(&id) {
                        if let ActivityPayload::Giveaway(giveaway_state) = &activity.payload {
                            let content = giveaway::render_open(
                                giveaway_state,
                                activity.owner_id,
                                activity
                                    .expires_at
                                    .map(|deadline| deadline.timestamp())
                                    .unwrap_or_default(),
                            );
                            update_response(&ctx, &component, content).await;
                        }
                    }
                    info!("{} entered giveaway {}", component.user.name, id);
                }
                EntryOutcome::AlreadyEntered => {
                    ephemeral_response(&ctx, &component, "You are already entered in this giveaway!")
                        .await;
                }
                EntryOutcome::Closed => {
                    ephemeral_response(&ctx, &component, "This giveaway has already ended.").await;
                }
            }
        } else if let Some(raw) = custom_id.strip_prefix("poll_vote_") {
            let Some((id_part, index_part)) = raw.rsplit_once('_') else {
                return;
            };
            let (Ok(id), Ok(option_index)) =
                (Uuid::parse_str(id_part), index_part.parse::<usize>())
            else {
                return;
            };
            match poll::vote(&state.registry, &id, user_id, option_index) {
                VoteOutcome::Registered => {
                    if let Some(activity) = state.registry.get(&id) {
                        if let ActivityPayload::Poll(poll_state) = &activity.payload {
                            let content = poll::render_open(
                                poll_state,
                                activity
                                    .expires_at
                                    .map(|deadline| deadline.timestamp())
                                    .unwrap_or_default(),
                            );
                            update_response(&ctx, &component, content).await;
                        }
                    }
                }
                VoteOutcome::InvalidOption => {
                    ephemeral_response(&ctx, &component, "That option does not exist.").await;
                }
                VoteOutcome::Closed => {
                    ephemeral_response(&ctx, &component, "This poll has already ended.").await;
                }
            }
        } else if let Some(raw) = custom_id.strip_prefix("poll_end_") {
            let Ok(id) = Uuid::parse_str(raw) else {
                return;
            };
            match poll::end(&state.registry, &state.gateway, &id, user_id).await {
                Ok(()) => ephemeral_response(&ctx, &component, "Poll ended.").await,
                Err(err) => ephemeral_response(&ctx, &component, &err.to_string()).await,
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let framework = poise::Framework::<UserData, Error>::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                let state = ctx
                    .data
                    .read()
                    .await
                    .get::<BotStateStorage>()
                    .cloned()
                    .expect("Expected BotState in ShareMap.");
                Ok(UserData { state })
            })
        })
        .build();

    let token = env::var("DISCORD_TOKEN").expect("Expected a DISCORD_TOKEN in the environment");
    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&token, intents)
        .event_handler(Handler)
        .framework(framework)
        .await
        .expect("Cannot create a Discord client");

    let data_dir = env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));
    let platform = Arc::new(SerenityGateway::new(client.http.clone(), client.cache.clone()));
    let state = Arc::new(BotState::new(platform, &data_dir));
    {
        let mut data = client.data.write().await;
        data.insert::<BotStateStorage>(state);
    }

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }
}
