//! Ticket closure from the thread's close button.

use chrono::Utc;
use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::types::{Accent, Card, Destination, InteractionEvent, InteractionReply, OutboundMessage, Res, Ticket, Void},
    interaction::GENERIC_FAILURE,
    registry::CloseOutcome,
    relay,
    runtime::Runtime,
};

const NOT_A_THREAD: &str = "This command can only be used in a ticket thread.";
const NOT_A_TICKET: &str = "This thread is not associated with a ticket.";
const NOT_STAFF: &str = "Only staff members can close tickets.";
const ALREADY_CLOSED: &str = "This ticket has already been closed.";

#[instrument(skip_all)]
pub fn handle_close_ticket(event: InteractionEvent, runtime: Runtime) {
    tokio::spawn(
        async move {
            // Process the event.
            let result = close_ticket(&event, &runtime).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while handling: {:#}", err);
            }
        }
        .in_current_span(),
    );
}

/// Closes the ticket bound to the thread the button was pressed in.
///
/// Only the call that actually closes the ticket notifies the thread and the owner and
/// archives the thread. Returns the closed ticket, or `None` when the request was refused.
#[instrument(skip_all, fields(user_id = event.user.id, thread_id = event.channel_id))]
pub async fn close_ticket(event: &InteractionEvent, runtime: &Runtime) -> Res<Option<Ticket>> {
    let ticket = match resolve(event, runtime).await {
        Ok(Ok(ticket)) => ticket,
        Ok(Err(refusal)) => {
            runtime.chat.reply(&event.reference, &InteractionReply::failure(refusal)).await?;
            return Ok(None);
        }
        Err(err) => {
            if let Err(notice_err) = runtime.chat.reply(&event.reference, &InteractionReply::failure(GENERIC_FAILURE)).await {
                warn!("Failed to report close failure: {:#}", notice_err);
            }
            return Err(err);
        }
    };

    if let Err(err) = announce(event, &ticket, runtime).await {
        if let Err(notice_err) = runtime.chat.follow_up(&event.reference, &InteractionReply::failure(GENERIC_FAILURE)).await {
            warn!("Failed to report close failure: {:#}", notice_err);
        }
        return Err(err);
    }

    Ok(Some(ticket))
}

/// Closes the ticket if the request is allowed, or explains why it is not.
async fn resolve(event: &InteractionEvent, runtime: &Runtime) -> Res<Result<Ticket, &'static str>> {
    if !event.in_thread {
        return Ok(Err(NOT_A_THREAD));
    }

    let Some(ticket) = runtime.registry.find_by_thread(event.channel_id).await else {
        return Ok(Err(NOT_A_TICKET));
    };

    if !runtime.is_staff(&event.member_role_ids) {
        warn!("User {} is not staff; refusing to close ticket {}.", event.user.id, ticket.id);
        return Ok(Err(NOT_STAFF));
    }

    match runtime.registry.close(&ticket.id).await? {
        CloseOutcome::Closed(ticket) => Ok(Ok(ticket)),
        CloseOutcome::AlreadyClosed(_) => Ok(Err(ALREADY_CLOSED)),
        CloseOutcome::NotFound => Ok(Err(NOT_A_TICKET)),
    }
}

/// Tells the thread and the owner, then archives the thread.
///
/// The ticket is already closed at this point, so failed notices are logged and the
/// thread is archived regardless.
async fn announce(event: &InteractionEvent, ticket: &Ticket, runtime: &Runtime) -> Void {
    let notice = Card::new(Accent::Failure).with_title("Ticket Closed").with_description("This ticket has been closed.");
    if let Err(err) = runtime.chat.reply(&event.reference, &InteractionReply::card(notice)).await {
        warn!("Failed to announce closure of ticket {} in its thread: {:#}", ticket.id, err);
    }

    if let Err(err) = relay::deliver(&runtime.chat, &runtime.ledger, Destination::User(ticket.user_id), &closure_message(ticket)).await {
        warn!("Failed to notify user {} that ticket {} closed: {:#}", ticket.user_id, ticket.id, err);
    }

    runtime.chat.archive_thread(ticket.thread_id).await?;

    info!("Ticket {} closed by {} and thread {} archived.", ticket.id, event.user.id, ticket.thread_id);

    Ok(())
}

/// The direct message telling an owner their ticket was closed.
pub fn closure_message(ticket: &Ticket) -> OutboundMessage {
    let card = Card::new(Accent::Failure)
        .with_title("Ticket Closed")
        .with_description(format!(
            "Your ticket in the {} category has been closed by a staff member. Thank you for using our support system!",
            ticket.category
        ))
        .with_field("Ticket", &ticket.id)
        .with_timestamp(Utc::now());

    OutboundMessage::card(card)
}
