//! Event handling and user interactions for ticket-bot.
//!
//! This module provides functionality for handling chat interactions and messages:
//! - Opening the category prompt from the `/ticket` command
//! - Creating and closing tickets from button presses
//! - Relaying messages between ticket threads and direct messages

pub mod close_ticket;
pub mod create_ticket;
pub mod message;
pub mod ticket_command;

use tracing::{debug, instrument};

use crate::{
    base::types::{ButtonAction, InteractionEvent, InteractionKind, TICKET_COMMAND},
    runtime::Runtime,
};

/// Generic failure notice shown when an interaction cannot be completed.
pub const GENERIC_FAILURE: &str = "Unable to complete this request. Please contact an administrator.";

/// Dispatches an interaction to the handler for its command or button.
#[instrument(skip_all, fields(user_id = event.user.id))]
pub fn handle_interaction(event: InteractionEvent, runtime: Runtime) {
    match &event.kind {
        InteractionKind::Command(name) if name == TICKET_COMMAND => ticket_command::handle_ticket_command(event, runtime),
        InteractionKind::Button(custom_id) => match ButtonAction::parse(custom_id) {
            Some(ButtonAction::CreateTicket(label)) => create_ticket::handle_create_ticket(event, label, runtime),
            Some(ButtonAction::CloseTicket) => close_ticket::handle_close_ticket(event, runtime),
            None => debug!("Ignoring unknown button `{}`.", custom_id),
        },
        InteractionKind::Command(name) => debug!("Ignoring unknown command `{}`.", name),
    }
}
