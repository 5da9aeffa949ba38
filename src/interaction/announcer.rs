//! The announcer: turns bus events into filtered, rendered, rate-limited channel messages.
//!
//! An [`Announcer`] is idle until the chat connection reports that it is connected.
//! Starting it spawns a session task that opens a fresh subscription and consumes
//! events in bus order until it is stopped. Stopping cancels the pending receive and
//! closes the subscription before the session is considered gone, so the next start
//! can bind the same address again.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    base::{
        config::Config,
        ratelimit::Ratelimit,
        types::{BusMessage, Event, Void},
    },
    interaction::{filter::wants_event, render::TemplateSelector},
    service::{
        bus::{EventBus, GenericSubscription},
        chat::ChatClient,
    },
};

/// How often to re-check the connection while it is not yet established.
pub const CONNECTION_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncerState {
    /// No session.
    Idle,
    /// A session is consuming events.
    Running,
    /// A stop was requested and the session is releasing its socket.
    Draining,
}

/// Counters for one announcer session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnouncerStats {
    /// Events decoded, across all classes.
    pub total: u64,
    /// Events decoded, per event class.
    pub by_class: BTreeMap<String, u64>,
    /// Lines handed to the chat client successfully.
    pub delivered: u64,
}

impl AnnouncerStats {
    fn record(&mut self, class: &str) {
        self.total += 1;
        *self.by_class.entry(class.to_string()).or_default() += 1;
    }
}

/// Everything a session needs. Shared and immutable.
#[derive(Clone)]
struct Context {
    config: Config,
    templates: Arc<TemplateSelector>,
    chat: ChatClient,
    bus: EventBus,
}

struct Session {
    stop: oneshot::Sender<()>,
    task: JoinHandle<AnnouncerStats>,
}

pub struct Announcer {
    context: Context,
    state: AnnouncerState,
    session: Option<Session>,
}

impl Announcer {
    pub fn new(config: Config, templates: Arc<TemplateSelector>, chat: ChatClient, bus: EventBus) -> Self {
        Self {
            context: Context { config, templates, chat, bus },
            state: AnnouncerState::Idle,
            session: None,
        }
    }

    /// The current state. A session that ended on its own reports `Idle`.
    pub fn state(&self) -> AnnouncerState {
        match &self.session {
            Some(session) if self.state == AnnouncerState::Running && session.task.is_finished() => AnnouncerState::Idle,
            _ => self.state,
        }
    }

    /// Start a new session, unless one is already running.
    pub fn start(&mut self) {
        if let Some(session) = &self.session {
            if !session.task.is_finished() {
                warn!("announcer is already running");
                return;
            }

            debug!("discarding ended announcer session");
        }

        info!("starting announcer");

        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(run_session(self.context.clone(), stopped).instrument(info_span!("announcer")));

        self.session = Some(Session { stop, task });
        self.state = AnnouncerState::Running;
    }

    /// Stop the running session and wait for its socket to close.
    ///
    /// Returns the session's counters, or `None` if nothing was running.
    pub async fn stop(&mut self) -> Option<AnnouncerStats> {
        let session = self.session.take()?;

        info!("stopping announcer");
        self.state = AnnouncerState::Draining;

        // The session may already have ended on its own.
        let _ = session.stop.send(());

        let stats = match session.task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!("announcer task failed: {}", e);
                None
            }
        };

        self.state = AnnouncerState::Idle;

        stats
    }
}

/// Body of one session: open the socket, consume until stopped, always close.
async fn run_session(context: Context, mut stopped: oneshot::Receiver<()>) -> AnnouncerStats {
    let mut stats = AnnouncerStats::default();

    let mut subscription = tokio::select! {
        _ = &mut stopped => return stats,
        result = context.bus.subscribe() => match result {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("could not open event socket, announcer idle until restarted: {}", e);
                return stats;
            }
        },
    };

    let mut ratelimit = Ratelimit::from(&context.config.ratelimit);

    tokio::select! {
        // A dropped sender also ends the session.
        _ = &mut stopped => debug!("announcer stop requested"),
        result = consume(&context, subscription.as_mut(), &mut ratelimit, &mut stats) => {
            if let Err(e) = result {
                error!("announcer stopped receiving, idle until restarted: {}", e);
            }
        }
    }

    subscription.close().await;

    debug!("announcer session stats: {:?}", stats);

    stats
}

/// Consume events forever, or until the subscription fails.
async fn consume(context: &Context, subscription: &mut dyn GenericSubscription, ratelimit: &mut Ratelimit, stats: &mut AnnouncerStats) -> Void {
    loop {
        if !context.chat.is_connected() {
            debug!("waiting for connection");
            tokio::time::sleep(CONNECTION_POLL_INTERVAL).await;
            continue;
        }

        let message = subscription.recv().await?;
        announce(context, message, ratelimit, stats).await;
    }
}

/// Route one bus message to every channel that wants it.
async fn announce(context: &Context, message: BusMessage, ratelimit: &mut Ratelimit, stats: &mut AnnouncerStats) {
    let event = match Event::decode(&message.topic, &message.body) {
        Ok(event) => event,
        Err(e) => {
            warn!("discarding undecodable {} event: {}", message.topic, e);
            return;
        }
    };

    stats.record(&event.class);
    info!("received {} event for {}", event.name, event.repo);

    let lines = match context.templates.render(&event) {
        Ok(Some(lines)) => lines,
        Ok(None) => return,
        Err(e) => {
            warn!("failed to render {} event: {}", event.name, e);
            return;
        }
    };

    for channel in &context.config.channels {
        if !wants_event(&context.config.filters, channel, &event.name, &event.repo) {
            continue;
        }

        debug!("delivering {} message for {} to {}", event.name, event.repo, channel.name);

        for line in &lines {
            ratelimit.acquire().await;

            match context.chat.send_message(&channel.name, line).await {
                Ok(()) => stats.delivered += 1,
                Err(e) => warn!("failed to deliver message to {}: {}", channel.name, e),
            }
        }
    }
}

// Tests.
