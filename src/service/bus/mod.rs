//! Pub/sub event bus between the webhook receiver and the announcer.
//!
//! Every bus message has two parts: a topic (the event class, or `error`) and a
//! JSON-encoded body.

pub mod zmq;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{BusMessage, Res, Void};

// Traits.

/// An open subscription to the bus.
#[async_trait]
pub trait GenericSubscription: Send {
    /// Wait for the next message.
    ///
    /// Errors are transport failures; the subscription is unusable afterwards.
    async fn recv(&mut self) -> Res<BusMessage>;

    /// Release the underlying socket.
    async fn close(self: Box<Self>);
}

/// Generic subscriber side of the bus.
#[async_trait]
pub trait GenericEventBus: Send + Sync + 'static {
    /// Open a subscription to every topic.
    async fn subscribe(&self) -> Res<Box<dyn GenericSubscription>>;
}

/// Generic publisher side of the bus.
#[async_trait]
pub trait GenericEventPublisher: Send + Sync + 'static {
    /// Publish one message.
    async fn publish(&self, topic: &str, body: &[u8]) -> Void;
}

// Structs.

/// Event bus client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<dyn GenericEventBus>,
}

impl Deref for EventBus {
    type Target = dyn GenericEventBus;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl EventBus {
    pub fn new(inner: Arc<dyn GenericEventBus>) -> Self {
        Self { inner }
    }
}

/// Event publisher for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct EventPublisher {
    inner: Arc<dyn GenericEventPublisher>,
}

impl Deref for EventPublisher {
    type Target = dyn GenericEventPublisher;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl EventPublisher {
    pub fn new(inner: Arc<dyn GenericEventPublisher>) -> Self {
        Self { inner }
    }
}
