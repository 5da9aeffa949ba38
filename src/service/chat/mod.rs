//! Chat service integration for hookbot.
//!
//! This module provides functionality for interacting with the chat network:
//! - Holding one connection open and reporting its lifecycle
//! - Sending messages to channels
//!
//! It defines the `GenericChatClient` trait that can be implemented for different
//! chat services, with a default implementation for IRC.

pub mod irc;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::base::types::{ConnectionSignal, Void};

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the core functionality for interacting with chat platforms
/// like IRC. Implementing this trait allows different chat services to be used
/// with hookbot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Run one connection to completion.
    ///
    /// Implementations connect, register, join the configured channels, and then
    /// report [`ConnectionSignal::Connected`] on `signals`. Server pings are reported
    /// as [`ConnectionSignal::Ping`]. Returns once the connection has ended.
    async fn run(&self, signals: mpsc::Sender<ConnectionSignal>) -> Void;

    /// Whether the client has registered and joined its channels.
    fn is_connected(&self) -> bool;

    /// Send one line of text to a channel.
    ///
    /// Sends to the same channel are delivered in submission order.
    async fn send_message(&self, channel: &str, text: &str) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
