//! Runtime services and shared state for hookbot.
//!
//! The runtime owns one chat connection at a time and feeds its lifecycle signals to
//! a [`ConnectionHandler`]. When a connection ends, it waits `reconnect_delay` and
//! connects again.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, trace, warn};

use crate::{
    base::{
        config::Config,
        types::{ConnectionSignal, Void},
    },
    interaction::{announcer::Announcer, render::TemplateSelector},
    service::{bus::EventBus, chat::ChatClient},
};

/// Receives the lifecycle signals of a chat connection.
#[async_trait]
pub trait ConnectionHandler: Send {
    async fn on_connected(&mut self);

    async fn on_disconnected(&mut self);

    async fn on_ping(&mut self) {}

    /// Route one signal to its handler.
    async fn dispatch(&mut self, signal: ConnectionSignal) {
        match signal {
            ConnectionSignal::Connected => self.on_connected().await,
            ConnectionSignal::Disconnected => self.on_disconnected().await,
            ConnectionSignal::Ping => self.on_ping().await,
        }
    }
}

#[async_trait]
impl ConnectionHandler for Announcer {
    async fn on_connected(&mut self) {
        self.start();
    }

    async fn on_disconnected(&mut self) {
        if let Some(stats) = self.stop().await {
            info!("announced {} events ({} lines) this session", stats.total, stats.delivered);
        }
    }

    async fn on_ping(&mut self) {
        trace!("ping");
    }
}

/// Runtime service context that can be shared across the application.
///
/// This struct holds the chat client, the event bus, the templates, and the configuration.
/// It is designed to be trivially cloneable.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The chat client instance.
    pub chat: ChatClient,
    /// The event bus instance.
    pub bus: EventBus,
    /// The template selector shared by every announcer session.
    pub templates: Arc<TemplateSelector>,
}

impl Runtime {
    /// Create a new runtime backed by IRC and ZeroMQ.
    #[instrument(skip_all)]
    pub fn new(config: Config) -> Self {
        let chat = ChatClient::irc(&config);
        let bus = EventBus::zmq(&config);

        Self::with_services(config, chat, bus)
    }

    /// Create a runtime from already constructed services.
    pub fn with_services(config: Config, chat: ChatClient, bus: EventBus) -> Self {
        let templates = Arc::new(TemplateSelector::from_config(&config));

        Self { config, chat, bus, templates }
    }

    /// Create an idle announcer wired to this runtime's services.
    pub fn announcer(&self) -> Announcer {
        Announcer::new(self.config.clone(), self.templates.clone(), self.chat.clone(), self.bus.clone())
    }

    /// Run until Ctrl-C, reconnecting whenever the connection drops.
    pub async fn start(&self) -> Void {
        let mut announcer = self.announcer();

        tokio::select! {
            _ = self.connect_forever(&mut announcer) => {}
            _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down ..."),
        }

        announcer.stop().await;

        Ok(())
    }

    async fn connect_forever(&self, handler: &mut dyn ConnectionHandler) {
        loop {
            if let Err(e) = self.run_connection(handler).await {
                error!("connection failed: {}", e);
            }

            warn!("disconnected from server. reconnect in {} seconds...", self.config.reconnect_delay.as_secs());
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// Run one connection to completion, dispatching its signals to `handler`.
    ///
    /// `Disconnected` is always dispatched once the connection has ended.
    pub async fn run_connection(&self, handler: &mut dyn ConnectionHandler) -> Void {
        let (tx, mut rx) = mpsc::channel(16);

        let connection = self.chat.run(tx);
        let signals = async {
            while let Some(signal) = rx.recv().await {
                handler.dispatch(signal).await;
            }
        };

        // The sender is dropped with the connection, which ends the signal loop.
        let (result, ()) = tokio::join!(connection, signals);

        handler.dispatch(ConnectionSignal::Disconnected).await;

        result
    }
}

// Tests.
