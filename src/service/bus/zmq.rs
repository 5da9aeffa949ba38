//! ZeroMQ implementation of the event bus.
//!
//! The announcer binds a SUB socket; webhook receivers connect PUB sockets to it.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use zeromq::{PubSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

use crate::base::{
    config::Config,
    types::{BusMessage, Res, Void},
};

use super::{EventBus, EventPublisher, GenericEventBus, GenericEventPublisher, GenericSubscription};

// Extra methods on the bus wrappers applied by the zmq implementation.

impl EventBus {
    /// Creates a bus whose subscriptions bind to `event_socket`.
    pub fn zmq(config: &Config) -> Self {
        Self::new(Arc::new(ZmqEventBus::new(&config.event_socket)))
    }
}

impl EventPublisher {
    /// Creates a publisher connected to `event_socket`.
    pub async fn zmq(config: &Config) -> Res<Self> {
        Ok(Self::new(Arc::new(ZmqEventPublisher::connect(&config.event_socket).await?)))
    }
}

/// Turn a multipart message into a topic and body.
fn decode_frames(frames: Vec<Bytes>) -> Res<BusMessage> {
    let [topic, body] = <[Bytes; 2]>::try_from(frames).map_err(|frames| anyhow!("expected 2 message parts, got {}", frames.len()))?;

    Ok(BusMessage {
        topic: String::from_utf8(topic.to_vec())?,
        body: body.to_vec(),
    })
}

// Subscriber.

pub struct ZmqEventBus {
    address: String,
}

impl ZmqEventBus {
    pub fn new(address: &str) -> Self {
        Self { address: address.to_string() }
    }
}

#[async_trait]
impl GenericEventBus for ZmqEventBus {
    #[instrument(name = "ZmqEventBus::subscribe", skip_all, fields(address = %self.address))]
    async fn subscribe(&self) -> Res<Box<dyn GenericSubscription>> {
        let mut socket = SubSocket::new();
        socket.bind(&self.address).await?;
        socket.subscribe("").await?;

        debug!("event socket open");

        Ok(Box::new(ZmqSubscription { socket }))
    }
}

struct ZmqSubscription {
    socket: SubSocket,
}

#[async_trait]
impl GenericSubscription for ZmqSubscription {
    async fn recv(&mut self) -> Res<BusMessage> {
        loop {
            let message = self.socket.recv().await?;

            match decode_frames(message.into_vec()) {
                Ok(message) => return Ok(message),
                Err(e) => warn!("discarding malformed bus message: {}", e),
            }
        }
    }

    async fn close(self: Box<Self>) {
        debug!("closing socket");

        for e in self.socket.close().await {
            warn!("error while closing event socket: {}", e);
        }
    }
}

// Publisher.

pub struct ZmqEventPublisher {
    socket: Mutex<PubSocket>,
}

impl ZmqEventPublisher {
    #[instrument(name = "ZmqEventPublisher::connect")]
    pub async fn connect(address: &str) -> Res<Self> {
        let mut socket = PubSocket::new();
        socket.connect(address).await?;

        Ok(Self { socket: Mutex::new(socket) })
    }
}

#[async_trait]
impl GenericEventPublisher for ZmqEventPublisher {
    #[instrument(skip(self, body))]
    async fn publish(&self, topic: &str, body: &[u8]) -> Void {
        let mut message = ZmqMessage::from(topic.to_string());
        message.push_back(Bytes::copy_from_slice(body));

        self.socket.lock().await.send(message).await?;

        Ok(())
    }
}

// Tests.
