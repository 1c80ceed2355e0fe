//! Core components, types, and utilities for the ticket-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Ticket records, outbound message shapes, and inbound event types.
//! - Common types and result handling.

pub mod config;
pub mod types;
