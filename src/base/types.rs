use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Reaction applied to a message once it has been relayed.
pub const ACK_EMOJI: &str = "✅";

/// Name of the slash command that opens the category prompt.
pub const TICKET_COMMAND: &str = "ticket";

/// Prefix of the category buttons' custom ids.
pub const CREATE_TICKET_PREFIX: &str = "create_ticket_";

/// Custom id of the thread's close button.
pub const CLOSE_TICKET_ID: &str = "close_ticket";

// Tickets.

/// The fixed set of ticket categories a user may pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Technical Support")]
    TechnicalSupport,
    #[serde(rename = "HWID Reset")]
    HwidReset,
    #[serde(rename = "Selling")]
    Selling,
}

impl Category {
    /// All categories, in the order their buttons are shown.
    pub const ALL: [Category; 3] = [Category::TechnicalSupport, Category::HwidReset, Category::Selling];

    /// The user-facing label, which is also the persisted form.
    pub fn label(&self) -> &'static str {
        match self {
            Category::TechnicalSupport => "Technical Support",
            Category::HwidReset => "HWID Reset",
            Category::Selling => "Selling",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// The custom id of the button that opens a ticket in this category.
    pub fn button_id(&self) -> String {
        format!("{CREATE_TICKET_PREFIX}{}", self.label())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

/// A support ticket bound to one private thread and one owning user.
///
/// The identifier is the key of the persisted map, so it is not part of the record body.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(skip)]
    pub id: String,
    #[serde_as(as = "DisplayFromStr")]
    pub user_id: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub thread_id: u64,
    pub category: Category,
    pub status: TicketStatus,
}

impl Ticket {
    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Open
    }
}

// Button actions.

/// What a pressed button asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Open a ticket in the category with this label (not yet validated).
    CreateTicket(String),
    CloseTicket,
}

impl ButtonAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        if custom_id == CLOSE_TICKET_ID {
            return Some(ButtonAction::CloseTicket);
        }

        custom_id.strip_prefix(CREATE_TICKET_PREFIX).map(|label| ButtonAction::CreateTicket(label.to_string()))
    }
}

// Outbound messages.

/// Embed colour, which also tells readers which way a relay went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Accent {
    Success,
    Failure,
    ToUser,
    ToThread,
}

impl Accent {
    pub fn color(&self) -> u32 {
        match self {
            Accent::Success => 0x00FF00,
            Accent::Failure => 0xFF0000,
            Accent::ToUser => 0x0099FF,
            Accent::ToThread => 0x00FF00,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardAuthor {
    pub name: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardField {
    pub name: String,
    pub value: String,
}

/// A platform-neutral rich embed.
///
/// The timestamp is excluded from serialization so that duplicate detection only
/// considers what the reader sees as content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub title: Option<String>,
    pub description: Option<String>,
    pub accent: Accent,
    pub author: Option<CardAuthor>,
    pub fields: Vec<CardField>,
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Card {
    pub fn new(accent: Accent) -> Self {
        Self {
            title: None,
            description: None,
            accent,
            author: None,
            fields: Vec::new(),
            timestamp: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_author(mut self, name: impl Into<String>, icon_url: Option<String>) -> Self {
        self.author = Some(CardAuthor { name: name.into(), icon_url });
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(CardField { name: name.into(), value: value.into() });
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
        }
    }
}

/// A file attached to a message, referenced by where it can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

/// A message the bot posts to a channel or a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub content: Option<String>,
    pub card: Option<Card>,
    pub buttons: Vec<Button>,
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn card(card: Card) -> Self {
        Self {
            card: Some(card),
            ..Default::default()
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Where an outbound message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Destination {
    /// The user's direct-message channel.
    User(u64),
    /// A guild channel or thread.
    Channel(u64),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::User(id) => write!(f, "user:{id}"),
            Destination::Channel(id) => write!(f, "channel:{id}"),
        }
    }
}

/// Locates a posted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

// Inbound events.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: u64,
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_bot: bool,
}

/// A message created anywhere the bot can see.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub reference: MessageRef,
    pub author: ChatUser,
    /// `None` for direct messages.
    pub guild_id: Option<u64>,
    /// Roles of the author in the guild; empty for direct messages.
    pub author_role_ids: Vec<u64>,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }
}

/// What is needed to answer an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: u64,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionKind {
    /// A slash command, by name.
    Command(String),
    /// A button press, by custom id.
    Button(String),
}

#[derive(Debug, Clone)]
pub struct InteractionEvent {
    pub reference: InteractionRef,
    pub user: ChatUser,
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub in_thread: bool,
    pub member_role_ids: Vec<u64>,
    pub kind: InteractionKind,
}

/// An answer to an interaction, visible only to the invoking user when ephemeral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionReply {
    pub content: Option<String>,
    pub card: Option<Card>,
    pub buttons: Vec<Button>,
    pub ephemeral: bool,
}

impl InteractionReply {
    pub fn notice(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ephemeral: true,
            ..Default::default()
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            card: Some(Card::new(Accent::Failure).with_description(format!("Error: {}", description.into()))),
            ephemeral: true,
            ..Default::default()
        }
    }

    pub fn card(card: Card) -> Self {
        Self {
            card: Some(card),
            ..Default::default()
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

/// Whether the configured ticket channel can host ticket threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCheck {
    Ready { guild_id: u64 },
    NotText,
    MissingPermissions,
}
