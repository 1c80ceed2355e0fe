//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the ticket-bot:
//! - Chat services (e.g., Discord)
//! - Ticket stores (e.g., a JSON file)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod store;
