//! Library root for `ticket-bot`.
//!
//! Ticket-bot is a Discord support-ticket assistant designed to:
//! - Let users open a ticket in a category from a `/ticket` prompt
//! - Give every ticket a private thread visible to staff and the bot
//! - Relay messages between that thread and the owner's direct messages
//! - Let staff close tickets, notifying the owner and archiving the thread
//!
//! Tickets are held in an in-memory registry mirrored to a JSON file. The
//! architecture is built around traits for the chat platform and the ticket
//! store, so either can be swapped or mocked.

pub mod base;
pub mod interaction;
pub mod ledger;
pub mod registry;
pub mod relay;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the ticket-bot runtime:
/// - Loads the ticket registry from its file
/// - Creates the runtime context with the registry, ledger, and chat client
/// - Starts the main event loop for processing interactions and messages
pub async fn start(config: Config) -> Void {
    info!("Starting ticket-bot ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
