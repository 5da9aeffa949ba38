use serde_json::Value;

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Repository name used for events that do not carry a repository.
pub const NO_REPO: &str = "none/none";

/// A decoded bus event.
///
/// The routing identity (`name` and `repo`) is derived once, at decode time, and
/// the event is never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The event class (the bus topic), e.g. `pull_request`.
    pub class: String,
    /// Lowercased `class:action`, with `none` standing in for a missing action.
    pub name: String,
    /// Lowercased `repository.full_name`, or [`NO_REPO`].
    pub repo: String,
    /// The full JSON payload, handed to templates as-is.
    pub payload: Value,
}

impl Event {
    /// Build an event from a bus topic and its JSON-encoded body.
    pub fn decode(class: &str, body: &[u8]) -> Res<Self> {
        let payload: Value = serde_json::from_slice(body)?;
        Ok(Self::from_payload(class, payload))
    }

    /// Build an event from an already-decoded payload.
    pub fn from_payload(class: &str, payload: Value) -> Self {
        let action = payload.get("action").and_then(Value::as_str).unwrap_or("none");
        let name = format!("{class}:{action}").to_lowercase();

        let repo = payload
            .get("repository")
            .and_then(|r| r.get("full_name"))
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .unwrap_or_else(|| NO_REPO.to_string());

        Self {
            class: class.to_string(),
            name,
            repo,
            payload,
        }
    }
}

/// A raw two-part message taken off the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub body: Vec<u8>,
}

/// Signals emitted by a chat connection over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionSignal {
    /// Registered with the server and joined the configured channels.
    Connected,
    /// The server pinged us.
    Ping,
    /// The connection is gone.
    Disconnected,
}
