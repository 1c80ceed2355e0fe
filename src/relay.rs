//! Message relay between ticket threads and ticket owners' direct messages.
//!
//! Routing rules, in order:
//! 1. A staff message in the thread of an open ticket goes to the owner's DMs.
//! 2. A direct message from a user with an open ticket goes to that ticket's thread.
//! 3. Anything else stays where it is.
//!
//! Bot messages never relay, and neither does anything for a closed ticket.

use tracing::{debug, info, instrument, warn};

use crate::{
    base::types::{ACK_EMOJI, Accent, Attachment, Card, Destination, InboundMessage, MessageRef, OutboundMessage, Res, Ticket},
    ledger::DedupLedger,
    runtime::Runtime,
    service::chat::ChatClient,
};

/// Where an inbound message should be forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// From the ticket thread to the owner's direct messages.
    ToOwner(Ticket),
    /// From the owner's direct messages to the ticket thread.
    ToThread(Ticket),
}

impl Route {
    pub fn ticket(&self) -> &Ticket {
        match self {
            Route::ToOwner(ticket) | Route::ToThread(ticket) => ticket,
        }
    }

    pub fn destination(&self) -> Destination {
        match self {
            Route::ToOwner(ticket) => Destination::User(ticket.user_id),
            Route::ToThread(ticket) => Destination::Channel(ticket.thread_id),
        }
    }

    pub fn accent(&self) -> Accent {
        match self {
            Route::ToOwner(_) => Accent::ToUser,
            Route::ToThread(_) => Accent::ToThread,
        }
    }
}

/// Decides where `message` should go, if anywhere.
#[instrument(skip_all, fields(channel_id = message.reference.channel_id, author_id = message.author.id))]
pub async fn route(runtime: &Runtime, message: &InboundMessage) -> Option<Route> {
    if message.author.is_bot || message.author.id == runtime.chat.bot_user_id() {
        return None;
    }

    if message.is_direct() {
        let ticket = runtime.registry.find_open_by_owner(message.author.id).await?;
        return Some(Route::ToThread(ticket));
    }

    let ticket = runtime.registry.find_by_thread(message.reference.channel_id).await?;

    if !ticket.is_open() {
        debug!("Ticket {} is closed; not relaying.", ticket.id);
        return None;
    }

    if !runtime.is_staff(&message.author_role_ids) {
        debug!("Ignoring non-staff message in ticket {}.", ticket.id);
        return None;
    }

    Some(Route::ToOwner(ticket))
}

/// Builds the copy of `message` that is posted on the other side.
pub fn relay_copy(message: &InboundMessage, accent: Accent) -> OutboundMessage {
    let card = Card::new(accent)
        .with_author(message.author.name.clone(), message.author.avatar_url.clone())
        .with_description(message.content.clone())
        .with_timestamp(message.timestamp);

    OutboundMessage::card(card).with_attachments(message.attachments.clone())
}

/// Sends `message` unless the same content already went to `destination`.
///
/// Returns `None` when the send was suppressed. A delivered message is acknowledged
/// with [`ACK_EMOJI`].
#[instrument(skip(chat, ledger, message))]
pub async fn deliver(chat: &ChatClient, ledger: &DedupLedger, destination: Destination, message: &OutboundMessage) -> Res<Option<MessageRef>> {
    let fingerprint = DedupLedger::fingerprint(&destination, message)?;

    if !ledger.reserve(&fingerprint) {
        warn!("Suppressing duplicate message to {}.", destination);
        return Ok(None);
    }

    let sent = match chat.send_message(&destination, message).await {
        Ok(sent) => sent,
        Err(err) => {
            ledger.release(&fingerprint);
            return Err(err);
        }
    };

    chat.react_to_message(&sent, ACK_EMOJI).await?;

    Ok(Some(sent))
}

/// Routes `message` and, when it belongs to an open ticket, forwards a copy.
///
/// On delivery both the copy and the original are acknowledged.
#[instrument(skip_all, fields(message_id = message.reference.message_id))]
pub async fn relay_message(runtime: &Runtime, message: &InboundMessage) -> Res<Option<MessageRef>> {
    let Some(route) = route(runtime, message).await else {
        return Ok(None);
    };

    let copy = relay_copy(message, route.accent());
    let Some(sent) = deliver(&runtime.chat, &runtime.ledger, route.destination(), &copy).await? else {
        return Ok(None);
    };

    runtime.chat.react_to_message(&message.reference, ACK_EMOJI).await?;

    info!("Relayed message {} for ticket {} to {}.", message.reference.message_id, route.ticket().id, route.destination());

    Ok(Some(sent))
}

/// Attachment references of a message, as URL and filename pairs.
pub fn attachment_refs<'a>(attachments: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<Attachment> {
    attachments
        .into_iter()
        .map(|(url, filename)| Attachment {
            url: url.to_string(),
            filename: filename.to_string(),
        })
        .collect()
}
