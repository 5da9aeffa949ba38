//! IRC implementation of the chat client.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use futures::StreamExt;
use ::irc::{
    client::{Client as IrcClient, ClientStream, Sender as IrcSender, data::Config as IrcConfig},
    proto::{Command, Response},
};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, instrument, trace};

use crate::base::{
    config::Config,
    types::{ConnectionSignal, Void},
};

use super::{ChatClient, GenericChatClient};

// Extra methods on `ChatClient` applied by the irc implementation.

impl ChatClient {
    /// Creates a new IRC chat client.
    pub fn irc(config: &Config) -> Self {
        Self::new(Arc::new(IrcChatClient::new(config)))
    }
}

// Structs.

/// IRC client implementation.
///
/// Each call to `run` opens a fresh connection; the sender half of the live
/// connection is kept so messages can be sent from other tasks.
pub struct IrcChatClient {
    config: Config,
    sender: RwLock<Option<IrcSender>>,
    connected: AtomicBool,
}

impl IrcChatClient {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            sender: RwLock::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Build the connection settings for the `irc` crate.
    fn irc_config(&self) -> IrcConfig {
        IrcConfig {
            nickname: Some(self.config.nick.clone()),
            username: Some(self.config.nick.clone()),
            realname: Some(self.config.nick.clone()),
            nick_password: self.config.nickserv_password.clone(),
            server: Some(self.config.host.clone()),
            port: Some(self.config.port),
            use_tls: Some(self.config.ssl),
            channels: self.config.channels.iter().map(|c| c.name.clone()).collect(),
            ..Default::default()
        }
    }

    /// Pump the message stream, translating registration and pings into signals.
    async fn pump(&self, stream: &mut ClientStream, signals: &mpsc::Sender<ConnectionSignal>) -> Void {
        while let Some(message) = stream.next().await.transpose()? {
            trace!("<- {}", message.to_string().trim_end());

            match message.command {
                // The server is done with the MOTD (or has none), so we are registered
                // and the client joins the configured channels.
                Command::Response(Response::RPL_ENDOFMOTD, _) | Command::Response(Response::ERR_NOMOTD, _) => {
                    for channel in &self.config.channels {
                        info!("joining {}", channel.name);
                    }

                    self.connected.store(true, Ordering::SeqCst);
                    signals.send(ConnectionSignal::Connected).await?;
                }
                Command::PING(..) => {
                    signals.send(ConnectionSignal::Ping).await?;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[async_trait]
impl GenericChatClient for IrcChatClient {
    #[instrument(name = "IrcChatClient::run", skip_all, fields(host = %self.config.host, port = self.config.port))]
    async fn run(&self, signals: mpsc::Sender<ConnectionSignal>) -> Void {
        let mut client = IrcClient::from_config(self.irc_config()).await?;

        info!("identifying to irc");
        client.identify()?;

        let mut stream = client.stream()?;
        *self.sender.write().await = Some(client.sender());

        let result = self.pump(&mut stream, &signals).await;

        debug!("irc connection closed");
        self.connected.store(false, Ordering::SeqCst);
        *self.sender.write().await = None;

        result
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    #[instrument(skip(self))]
    async fn send_message(&self, channel: &str, text: &str) -> Void {
        let guard = self.sender.read().await;
        let sender = guard.as_ref().ok_or_else(|| anyhow::anyhow!("Not connected to irc."))?;

        sender.send_privmsg(channel, text).map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(())
    }
}

// Tests.
