//! Ticket creation from a category button.
//!
//! The flow defers the button interaction, validates the ticket channel, opens a private
//! thread, registers the ticket, announces it to staff, and confirms to the user by DM.
//! Failures before the ticket is registered are reported to the user as an ephemeral
//! notice. Once registered, the ticket stands and later failures are only logged.

use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::types::{
        ACK_EMOJI, Accent, Button, ButtonStyle, CLOSE_TICKET_ID, Card, Category, ChannelCheck, Destination, InteractionEvent, InteractionReply, OutboundMessage, Res,
        Ticket, Void,
    },
    relay,
    runtime::Runtime,
};

const CREATED: &str = "Ticket created successfully! Please check your DMs.";
const CREATED_WITHOUT_DM: &str = "Ticket created, but I could not send you a DM. Please allow direct messages from server members so staff replies can reach you.";
const THREAD_FAILURE: &str = "Unable to create the ticket thread. Please contact an administrator.";
const NOT_TEXT_CHANNEL: &str = "The specified channel is not a text channel.";
const MISSING_PERMISSIONS: &str = "The bot does not have the necessary permissions to create threads or send messages in the specified channel.";

#[instrument(skip_all)]
pub fn handle_create_ticket(event: InteractionEvent, label: String, runtime: Runtime) {
    tokio::spawn(
        async move {
            // Process the event.
            let result = create_ticket(&event, &label, &runtime).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while handling: {:#}", err);
            }
        }
        .in_current_span(),
    );
}

/// Opens a ticket in the category labelled `label` for the invoking user.
///
/// Returns the new ticket, or `None` when the request was refused with a notice.
#[instrument(skip(event, runtime), fields(user_id = event.user.id))]
pub async fn create_ticket(event: &InteractionEvent, label: &str, runtime: &Runtime) -> Res<Option<Ticket>> {
    let Some(category) = Category::from_label(label) else {
        warn!("Unknown ticket category `{}`.", label);
        runtime.chat.reply(&event.reference, &InteractionReply::failure(format!("Unknown ticket category `{label}`."))).await?;
        return Ok(None);
    };

    // Thread creation can be slow; acknowledge first.
    runtime.chat.defer_update(&event.reference).await?;

    match open_ticket(event, category, runtime).await {
        Ok(ticket) => Ok(ticket),
        Err(err) => {
            if let Err(notice_err) = runtime.chat.follow_up(&event.reference, &InteractionReply::failure(THREAD_FAILURE)).await {
                warn!("Failed to report ticket creation failure: {:#}", notice_err);
            }
            Err(err)
        }
    }
}

async fn open_ticket(event: &InteractionEvent, category: Category, runtime: &Runtime) -> Res<Option<Ticket>> {
    let channel_id = runtime.config.channel_id;

    let guild_id = match runtime.chat.check_ticket_channel(channel_id).await? {
        ChannelCheck::Ready { guild_id } => guild_id,
        ChannelCheck::NotText => {
            warn!("Ticket channel {} is not a text channel.", channel_id);
            runtime.chat.follow_up(&event.reference, &InteractionReply::failure(NOT_TEXT_CHANNEL)).await?;
            return Ok(None);
        }
        ChannelCheck::MissingPermissions => {
            warn!("Missing thread permissions in ticket channel {}.", channel_id);
            runtime.chat.follow_up(&event.reference, &InteractionReply::failure(MISSING_PERMISSIONS)).await?;
            return Ok(None);
        }
    };

    // Open the thread and track it.

    let name = thread_name(category, &event.user.name);
    let thread_id = runtime.chat.create_private_thread(channel_id, &name).await?;

    info!("Created thread `{}` ({}).", name, thread_id);

    let ticket = runtime.registry.create(event.user.id, thread_id, category).await?;

    // The ticket exists from here on; later failures are logged, not reported as creation failures.

    if let Err(err) = announce_ticket(event, &ticket, guild_id, runtime).await {
        warn!("Failed to announce ticket {} in thread {}: {:#}", ticket.id, thread_id, err);
    }

    // Confirm to the user.

    let outcome = match relay::deliver(&runtime.chat, &runtime.ledger, Destination::User(event.user.id), &confirmation_message(&ticket)).await {
        Ok(_) => CREATED,
        Err(err) => {
            warn!("Failed to confirm ticket {} to user {}: {:#}", ticket.id, event.user.id, err);
            CREATED_WITHOUT_DM
        }
    };

    if let Err(err) = runtime.chat.follow_up(&event.reference, &InteractionReply::notice(outcome)).await {
        warn!("Failed to acknowledge ticket {}: {:#}", ticket.id, err);
    }

    Ok(Some(ticket))
}

/// Posts the opening card in the thread and pings staff.
async fn announce_ticket(event: &InteractionEvent, ticket: &Ticket, guild_id: u64, runtime: &Runtime) -> Void {
    let thread = Destination::Channel(ticket.thread_id);

    let opening = runtime.chat.send_message(&thread, &opening_message(ticket, &event.user.name)).await?;
    runtime.chat.react_to_message(&opening, ACK_EMOJI).await?;

    let staff_role_id = runtime.config.staff_role_id;

    if runtime.chat.guild_has_role(guild_id, staff_role_id).await? {
        let ping = format!("<@&{staff_role_id}> A new ticket has been created and requires your attention.");
        runtime.chat.send_message(&thread, &OutboundMessage::text(ping)).await?;
    } else {
        warn!("Staff role {} not found in guild {}; skipping ping.", staff_role_id, guild_id);
    }

    Ok(())
}

/// Name of a ticket's thread.
pub fn thread_name(category: Category, username: &str) -> String {
    format!("{category} - {username}")
}

/// The staff-facing message that opens a ticket thread.
pub fn opening_message(ticket: &Ticket, username: &str) -> OutboundMessage {
    let card = Card::new(Accent::Success)
        .with_title("New Ticket")
        .with_description(format!("A new ticket has been created in the {} category.", ticket.category))
        .with_field("User", username)
        .with_field("Category", ticket.category.label());

    OutboundMessage::card(card).with_buttons(vec![Button::new(CLOSE_TICKET_ID, "Close Ticket", ButtonStyle::Danger)])
}

/// The direct message confirming a ticket to its owner.
pub fn confirmation_message(ticket: &Ticket) -> OutboundMessage {
    let card = Card::new(Accent::Success)
        .with_title("Ticket Created")
        .with_description(format!(
            "Your ticket in the {} category has been created. Please reply to this message to communicate with the staff.",
            ticket.category
        ))
        .with_field("Ticket", &ticket.id);

    OutboundMessage::card(card)
}
