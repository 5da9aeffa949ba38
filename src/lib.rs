//! Library root for `hookbot`.
//!
//! Hookbot announces repository webhook events on IRC. It is built from two processes
//! that share an event bus:
//! - The receiver validates webhook deliveries and publishes them to the bus
//! - The bot consumes the bus, filters events per channel, renders them with
//!   templates, and sends them to IRC at a limited rate
//!
//! The architecture is built around extensible traits that allow for different
//! implementations of the chat client and the event bus.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the bot.
///
/// Sets up necessary services and starts the hookbot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with chat, bus, and template services
/// - Runs the connection loop until Ctrl-C
pub async fn start(config: Config) -> Void {
    info!("Starting hookbot ...");

    install_crypto_provider();

    let runtime = runtime::Runtime::new(config);

    runtime.start().await
}

/// Public async entry for the webhook receiver.
pub async fn receive(config: Config) -> Void {
    info!("Starting hookbot receiver ...");

    service::receiver::serve(&config).await
}

fn install_crypto_provider() {
    // Fails only when a provider is already installed.
    let _ = crypto::ring::default_provider().install_default();
}
