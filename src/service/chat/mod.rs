pub mod discord;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{ChannelCheck, Destination, InteractionRef, InteractionReply, MessageRef, OutboundMessage, Res, Void};

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the platform operations the ticket flows and the relay need.
/// Implementing this trait allows different chat services to be used with the
/// ticket-bot, and lets tests drive the flows with a mock.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Get the bot user ID.
    ///
    /// Messages authored by this user are never relayed.
    fn bot_user_id(&self) -> u64;

    /// Start the chat client listener.
    ///
    /// This connects to the platform, registers the `/ticket` command, and dispatches
    /// incoming interactions and messages until the connection ends.
    async fn start(&self) -> Void;

    /// Check that a channel can host ticket threads.
    ///
    /// It must be a guild text channel in which the bot may manage threads and
    /// send messages.
    async fn check_ticket_channel(&self, channel_id: u64) -> Res<ChannelCheck>;

    /// Create a private thread under a channel, returning the thread ID.
    async fn create_private_thread(&self, channel_id: u64, name: &str) -> Res<u64>;

    /// Send a message to a channel or to a user's direct messages.
    ///
    /// Attachments are fetched from their URLs and uploaded with the message.
    async fn send_message(&self, destination: &Destination, message: &OutboundMessage) -> Res<MessageRef>;

    /// React to a message with an emoji.
    async fn react_to_message(&self, message: &MessageRef, emoji: &str) -> Void;

    /// Archive a thread.
    async fn archive_thread(&self, thread_id: u64) -> Void;

    /// Whether a role exists in a guild.
    async fn guild_has_role(&self, guild_id: u64, role_id: u64) -> Res<bool>;

    /// Answer an interaction directly.
    async fn reply(&self, interaction: &InteractionRef, reply: &InteractionReply) -> Void;

    /// Acknowledge a component interaction without changing its message.
    ///
    /// Later answers must go through [`GenericChatClient::follow_up`].
    async fn defer_update(&self, interaction: &InteractionRef) -> Void;

    /// Answer an interaction that has already been replied to or deferred.
    async fn follow_up(&self, interaction: &InteractionRef, reply: &InteractionReply) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
