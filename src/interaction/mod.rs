//! Event routing for hookbot.
//!
//! This module turns bus events into chat messages:
//! - Deciding which channels want an event
//! - Selecting and rendering the template for an event
//! - Running the announcer loop that ties both to the chat client

pub mod announcer;
pub mod filter;
pub mod render;
