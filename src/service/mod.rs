//! Service integrations for external transports and clients.
//!
//! This module contains implementations for the services used by hookbot:
//! - Chat services (e.g., IRC)
//! - Event bus (e.g., ZeroMQ)
//! - The webhook receiver that feeds the bus
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod bus;
pub mod chat;
pub mod receiver;
