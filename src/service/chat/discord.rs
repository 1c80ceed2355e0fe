//! Chat service integration for ticket-bot.
//!
//! This module provides the Discord implementation of `GenericChatClient`:
//! - Receiving interactions, messages, and gateway lifecycle events
//! - Sending messages, embeds, buttons, attachments, and reactions
//! - Managing ticket threads and answering interactions
//!
//! Platform objects are converted into the crate's own event types at the edge, so
//! nothing beyond this module depends on serenity.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    AutoArchiveDuration, ButtonStyle as SerenityButtonStyle, ChannelId, ChannelType, Client, Command, Context, CreateActionRow, CreateAttachment, CreateButton,
    CreateCommand, CreateEmbed, CreateEmbedAuthor, CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage, CreateMessage,
    CreateThread, EditThread, EventHandler, GatewayIntents, GuildId, Http, Interaction, InteractionId, Message, MessageId, Permissions, ReactionType, Ready,
    ResumedEvent, RoleId, ShardStageUpdateEvent, Timestamp, User, UserId,
};
use tracing::{debug, error, info, info_span, instrument};

use crate::{
    base::{
        config::Config,
        types::{
            Attachment, Button, ButtonStyle, Card, ChannelCheck, ChatUser, Destination, InboundMessage, InteractionEvent, InteractionKind, InteractionRef, InteractionReply,
            MessageRef, OutboundMessage, Res, TICKET_COMMAND, Void,
        },
    },
    interaction,
    ledger::DedupLedger,
    registry::TicketRegistry,
    relay,
    runtime::Runtime,
};

use super::{ChatClient, GenericChatClient};

// Extra methods on `ChatClient` applied by the discord implementation.

impl ChatClient {
    /// Creates a new Discord chat client.
    pub async fn discord(config: &Config, registry: TicketRegistry, ledger: DedupLedger) -> Res<Self> {
        let client = DiscordChatClient::new(config, registry, ledger).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<DiscordChatClient> for ChatClient {
    fn from(client: DiscordChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// Discord client implementation.
#[derive(Clone)]
struct DiscordChatClient {
    pub bot_user_id: u64,
    pub http: Arc<Http>,
    pub web: reqwest::Client,
    pub config: Config,
    pub registry: TicketRegistry,
    pub ledger: DedupLedger,
}

impl DiscordChatClient {
    /// Create a new Discord chat client.
    #[instrument(name = "DiscordChatClient::new", skip_all)]
    pub async fn new(config: &Config, registry: TicketRegistry, ledger: DedupLedger) -> Res<Self> {
        info!("BOT_TOKEN length: {}", config.bot_token.len());
        info!("BOT_TOKEN: {}", config.masked_token());

        let http = Arc::new(Http::new(&config.bot_token));

        // Get the bot's user ID.

        let bot_user = http.get_current_user().await?;
        let bot_user_id = bot_user.id.get();

        info!("Discord bot user ID: {}", bot_user_id);

        Ok(Self {
            bot_user_id,
            http,
            web: reqwest::Client::new(),
            config: config.clone(),
            registry,
            ledger,
        })
    }

    /// Downloads attachments so they can be uploaded again.
    async fn fetch_attachments(&self, attachments: &[Attachment]) -> Res<Vec<CreateAttachment>> {
        let mut files = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            let bytes = self.web.get(&attachment.url).send().await?.error_for_status()?.bytes().await?;
            files.push(CreateAttachment::bytes(bytes.to_vec(), attachment.filename.clone()));
        }

        Ok(files)
    }

    fn auto_archive_duration(&self) -> AutoArchiveDuration {
        match self.config.thread_auto_archive_minutes {
            1440 => AutoArchiveDuration::OneDay,
            4320 => AutoArchiveDuration::ThreeDays,
            10080 => AutoArchiveDuration::OneWeek,
            _ => AutoArchiveDuration::OneHour,
        }
    }
}

#[async_trait]
impl GenericChatClient for DiscordChatClient {
    fn bot_user_id(&self) -> u64 {
        self.bot_user_id
    }

    async fn start(&self) -> Void {
        let handler = DiscordEventHandler {
            runtime: Runtime {
                config: self.config.clone(),
                registry: self.registry.clone(),
                ledger: self.ledger.clone(),
                chat: ChatClient::from(self.clone()),
            },
        };

        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

        info!("Attempting to log in ...");

        let mut client = Client::builder(&self.config.bot_token, intents).event_handler(handler).await?;
        let shard_manager = client.shard_manager.clone();

        // Run until the gateway gives up or Ctrl-C.
        tokio::select! {
            result = client.start() => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down ...");
                shard_manager.shutdown_all().await;
            }
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn check_ticket_channel(&self, channel_id: u64) -> Res<ChannelCheck> {
        let Some(channel) = ChannelId::new(channel_id).to_channel(&self.http).await?.guild() else {
            return Ok(ChannelCheck::NotText);
        };

        info!("Fetched channel: {} (ID: {}), Type: {:?}", channel.name, channel.id, channel.kind);

        if channel.kind != ChannelType::Text {
            return Ok(ChannelCheck::NotText);
        }

        let guild = channel.guild_id.to_partial_guild(&self.http).await?;
        let member = channel.guild_id.member(&self.http, UserId::new(self.bot_user_id)).await?;
        let permissions = guild.user_permissions_in(&channel, &member);

        if !permissions.contains(Permissions::MANAGE_THREADS | Permissions::SEND_MESSAGES) {
            return Ok(ChannelCheck::MissingPermissions);
        }

        Ok(ChannelCheck::Ready { guild_id: channel.guild_id.get() })
    }

    #[instrument(skip(self))]
    async fn create_private_thread(&self, channel_id: u64, name: &str) -> Res<u64> {
        let builder = CreateThread::new(name).kind(ChannelType::PrivateThread).auto_archive_duration(self.auto_archive_duration());

        let thread = ChannelId::new(channel_id)
            .create_thread(&self.http, builder)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create thread: {}", e))?;

        Ok(thread.id.get())
    }

    #[instrument(skip(self, message))]
    async fn send_message(&self, destination: &Destination, message: &OutboundMessage) -> Res<MessageRef> {
        let channel_id = match destination {
            Destination::User(user_id) => UserId::new(*user_id).create_dm_channel(&self.http).await?.id,
            Destination::Channel(channel_id) => ChannelId::new(*channel_id),
        };

        let mut builder = CreateMessage::new();
        if let Some(content) = &message.content {
            builder = builder.content(content);
        }
        if let Some(card) = &message.card {
            builder = builder.embed(build_embed(card));
        }
        if !message.buttons.is_empty() {
            builder = builder.components(build_action_rows(&message.buttons));
        }
        if !message.attachments.is_empty() {
            builder = builder.add_files(self.fetch_attachments(&message.attachments).await?);
        }

        let sent = channel_id
            .send_message(&self.http, builder)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(MessageRef {
            channel_id: sent.channel_id.get(),
            message_id: sent.id.get(),
        })
    }

    #[instrument(skip(self))]
    async fn react_to_message(&self, message: &MessageRef, emoji: &str) -> Void {
        let reaction = ReactionType::Unicode(emoji.to_string());

        self.http
            .create_reaction(ChannelId::new(message.channel_id), MessageId::new(message.message_id), &reaction)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to react to message: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn archive_thread(&self, thread_id: u64) -> Void {
        ChannelId::new(thread_id)
            .edit_thread(&self.http, EditThread::new().archived(true))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to archive thread: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn guild_has_role(&self, guild_id: u64, role_id: u64) -> Res<bool> {
        let roles = GuildId::new(guild_id).roles(&self.http).await?;

        Ok(roles.contains_key(&RoleId::new(role_id)))
    }

    #[instrument(skip(self, interaction, reply))]
    async fn reply(&self, interaction: &InteractionRef, reply: &InteractionReply) -> Void {
        let mut message = CreateInteractionResponseMessage::new().ephemeral(reply.ephemeral);
        if let Some(content) = &reply.content {
            message = message.content(content);
        }
        if let Some(card) = &reply.card {
            message = message.embed(build_embed(card));
        }
        if !reply.buttons.is_empty() {
            message = message.components(build_action_rows(&reply.buttons));
        }

        self.http
            .create_interaction_response(InteractionId::new(interaction.id), &interaction.token, &CreateInteractionResponse::Message(message), Vec::new())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to respond to interaction: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self, interaction))]
    async fn defer_update(&self, interaction: &InteractionRef) -> Void {
        self.http
            .create_interaction_response(InteractionId::new(interaction.id), &interaction.token, &CreateInteractionResponse::Acknowledge, Vec::new())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to defer interaction: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self, interaction, reply))]
    async fn follow_up(&self, interaction: &InteractionRef, reply: &InteractionReply) -> Void {
        let mut builder = CreateInteractionResponseFollowup::new().ephemeral(reply.ephemeral);
        if let Some(content) = &reply.content {
            builder = builder.content(content);
        }
        if let Some(card) = &reply.card {
            builder = builder.embed(build_embed(card));
        }
        if !reply.buttons.is_empty() {
            builder = builder.components(build_action_rows(&reply.buttons));
        }

        self.http
            .create_followup_message(&interaction.token, &builder, Vec::new())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to follow up on interaction: {}", e))?;

        Ok(())
    }
}

// Gateway event handler for Discord.

/// Dispatches gateway events into the ticket flows.
struct DiscordEventHandler {
    runtime: Runtime,
}

#[async_trait]
impl EventHandler for DiscordEventHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Bot is ready!");
        info!("Logged in as {}!", ready.user.tag());
        info!("Serving {} guilds", ready.guilds.len());

        let commands = vec![CreateCommand::new(TICKET_COMMAND).description("Create a new support ticket")];

        match Command::set_global_commands(&ctx.http, commands).await {
            Ok(registered) => {
                let names: Vec<_> = registered.iter().map(|c| c.name.as_str()).collect();
                info!("Slash commands registered: {}", names.join(", "));
            }
            Err(err) => error!("Failed to register slash commands: {}", err),
        }
    }

    async fn interaction_create(&self, _ctx: Context, interaction: Interaction) {
        let Some(event) = interaction_event(&interaction) else {
            debug!("Ignoring unsupported interaction.");
            return;
        };

        let span = info_span!("interaction", id = event.reference.id);
        span.in_scope(|| interaction::handle_interaction(event, self.runtime.clone()));
    }

    async fn message(&self, _ctx: Context, message: Message) {
        if message.author.bot {
            return;
        }

        interaction::message::handle_message(inbound_message(&message), self.runtime.clone());
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        info!("Shard {} moved from {:?} to {:?}.", event.shard_id.0, event.old, event.new);
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        info!("Session resumed.");
    }
}

// Conversions.

fn chat_user(user: &User) -> ChatUser {
    ChatUser {
        id: user.id.get(),
        name: user.name.clone(),
        avatar_url: Some(user.face()),
        is_bot: user.bot,
    }
}

fn role_ids(roles: &[RoleId]) -> Vec<u64> {
    roles.iter().map(|r| r.get()).collect()
}

fn is_thread(kind: ChannelType) -> bool {
    matches!(kind, ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread)
}

fn interaction_event(interaction: &Interaction) -> Option<InteractionEvent> {
    match interaction {
        Interaction::Command(command) => Some(InteractionEvent {
            reference: InteractionRef {
                id: command.id.get(),
                token: command.token.clone(),
            },
            user: chat_user(&command.user),
            guild_id: command.guild_id.map(|id| id.get()),
            channel_id: command.channel_id.get(),
            in_thread: command.channel.as_ref().is_some_and(|c| is_thread(c.kind)),
            member_role_ids: command.member.as_ref().map(|m| role_ids(&m.roles)).unwrap_or_default(),
            kind: InteractionKind::Command(command.data.name.clone()),
        }),
        Interaction::Component(component) => Some(InteractionEvent {
            reference: InteractionRef {
                id: component.id.get(),
                token: component.token.clone(),
            },
            user: chat_user(&component.user),
            guild_id: component.guild_id.map(|id| id.get()),
            channel_id: component.channel_id.get(),
            in_thread: component.channel.as_ref().is_some_and(|c| is_thread(c.kind)),
            member_role_ids: component.member.as_ref().map(|m| role_ids(&m.roles)).unwrap_or_default(),
            kind: InteractionKind::Button(component.data.custom_id.clone()),
        }),
        _ => None,
    }
}

fn inbound_message(message: &Message) -> InboundMessage {
    let timestamp = chrono::DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0).unwrap_or_else(chrono::Utc::now);

    InboundMessage {
        reference: MessageRef {
            channel_id: message.channel_id.get(),
            message_id: message.id.get(),
        },
        author: chat_user(&message.author),
        guild_id: message.guild_id.map(|id| id.get()),
        author_role_ids: message.member.as_ref().map(|m| role_ids(&m.roles)).unwrap_or_default(),
        content: message.content.clone(),
        attachments: relay::attachment_refs(message.attachments.iter().map(|a| (a.url.as_str(), a.filename.as_str()))),
        timestamp,
    }
}

fn build_embed(card: &Card) -> CreateEmbed {
    let mut builder = CreateEmbed::new().color(card.accent.color());
    if let Some(title) = &card.title {
        builder = builder.title(title);
    }
    if let Some(description) = &card.description {
        builder = builder.description(description);
    }
    if let Some(author) = &card.author {
        let mut a = CreateEmbedAuthor::new(&author.name);
        if let Some(icon) = &author.icon_url {
            a = a.icon_url(icon);
        }
        builder = builder.author(a);
    }
    for field in &card.fields {
        builder = builder.field(&field.name, &field.value, false);
    }
    if let Some(timestamp) = card.timestamp
        && let Ok(timestamp) = Timestamp::from_unix_timestamp(timestamp.timestamp())
    {
        builder = builder.timestamp(timestamp);
    }
    builder
}

fn build_action_rows(buttons: &[Button]) -> Vec<CreateActionRow> {
    // A row holds at most five buttons.
    buttons
        .chunks(5)
        .map(|row| {
            CreateActionRow::Buttons(
                row.iter()
                    .map(|b| {
                        let style = match b.style {
                            ButtonStyle::Primary => SerenityButtonStyle::Primary,
                            ButtonStyle::Danger => SerenityButtonStyle::Danger,
                        };
                        CreateButton::new(&b.custom_id).label(&b.label).style(style)
                    })
                    .collect(),
            )
        })
        .collect()
}
