//! Load configuration via `config` crate with env-override support.

use std::{
    fmt,
    net::SocketAddr,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use config::{ConfigBuilder, FileFormat, Source, Value, builder::DefaultState};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_with::{DurationSeconds, serde_as};
use tracing::warn;

use super::types::Res;

/// Config file basename searched for in the working directory (any supported extension).
pub const DEFAULT_CONFIG_NAME: &str = "hookbot";

/// Prefix for environment overrides (`HOOKBOT_NICK`, `HOOKBOT_RATELIMIT__BUCKET`, ...).
pub const ENV_PREFIX: &str = "HOOKBOT";

/// Root keys a config file may nest everything under.
pub const ROOT_KEYS: [&str; 2] = ["hookbot", "mocbot"];

/// Longest accepted ratelimit interval.
pub const MAX_RATELIMIT_INTERVAL: Duration = Duration::from_secs(86400);

const KNOWN_KEYS: [&str; 16] = [
    "nick",
    "nickserv_password",
    "host",
    "port",
    "ssl",
    "reconnect_delay",
    "event_socket",
    "include_repos",
    "exclude_repos",
    "include_events",
    "exclude_events",
    "channels",
    "ratelimit",
    "template_dirs",
    "webhook_bind",
    "webhook_secret",
];

fn default_nick() -> String {
    "mocbot".to_string()
}

fn default_host() -> String {
    "chat.freenode.net".to_string()
}

fn default_port() -> u16 {
    6697
}

fn default_ssl() -> bool {
    true
}

fn default_reconnect_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_event_socket() -> String {
    "tcp://127.0.0.1:1509".to_string()
}

fn default_template_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("run/templates"), PathBuf::from("templates")]
}

fn default_webhook_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_ratelimit_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_ratelimit_bucket() -> u32 {
    5
}

fn default_ratelimit_bucket_interval() -> Duration {
    Duration::from_secs(10)
}

// Patterns.

/// A compiled filter pattern.
///
/// Patterns are regular expressions anchored at the start of the candidate, so
/// `acme/` matches `acme/widgets` but `widgets` does not.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Res<Self> {
        let regex = Regex::new(&format!("^(?:{source})"))?;

        Ok(Self { source: source.to_string(), regex })
    }

    /// Whether the pattern matches at the start of `candidate`.
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

/// The four include/exclude pattern lists carried by both the global
/// configuration and each channel.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Filters {
    #[serde(default)]
    pub include_repos: Vec<Pattern>,
    #[serde(default)]
    pub exclude_repos: Vec<Pattern>,
    #[serde(default)]
    pub include_events: Vec<Pattern>,
    #[serde(default)]
    pub exclude_events: Vec<Pattern>,
}

/// Configuration for an individual channel.
#[derive(Debug, Deserialize, Clone)]
pub struct Channel {
    /// Channel name, including the leading `#`.
    pub name: String,
    #[serde(flatten)]
    pub filters: Filters,
}

/// Outbound message rate limiting.
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct RatelimitConfig {
    /// Minimum spacing between messages once the bucket is empty, in seconds.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_ratelimit_interval")]
    pub interval: Duration,
    /// Burst size.
    #[serde(default = "default_ratelimit_bucket")]
    pub bucket: u32,
    /// Idle time after which the bucket is refilled, in seconds.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_ratelimit_bucket_interval")]
    pub bucket_interval: Duration,
}

impl Default for RatelimitConfig {
    fn default() -> Self {
        Self {
            interval: default_ratelimit_interval(),
            bucket: default_ratelimit_bucket(),
            bucket_interval: default_ratelimit_bucket_interval(),
        }
    }
}

// Config.

/// Configuration for the hookbot application.
///
/// Cloning is cheap; every clone shares the same immutable inner value.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// IRC nickname (`HOOKBOT_NICK`).
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Password sent to NickServ after registration (`HOOKBOT_NICKSERV_PASSWORD`).
    #[serde(default)]
    pub nickserv_password: Option<String>,
    /// IRC server host (`HOOKBOT_HOST`).
    #[serde(default = "default_host")]
    pub host: String,
    /// IRC server port (`HOOKBOT_PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect with TLS (`HOOKBOT_SSL`).
    #[serde(default = "default_ssl")]
    pub ssl: bool,
    /// Seconds to wait before reconnecting after a disconnect (`HOOKBOT_RECONNECT_DELAY`).
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: Duration,
    /// Address of the event bus (`HOOKBOT_EVENT_SOCKET`).
    ///
    /// The bot binds here; the webhook receiver connects here.
    #[serde(default = "default_event_socket")]
    pub event_socket: String,
    /// Filters applied to every channel, in addition to the channel's own.
    #[serde(flatten)]
    pub filters: Filters,
    /// Channels to join and announce to, in delivery order.
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Outbound rate limiting.
    #[serde(default)]
    pub ratelimit: RatelimitConfig,
    /// Directories searched for templates before the built-in set.
    #[serde(default = "default_template_dirs")]
    pub template_dirs: Vec<PathBuf>,
    /// Listen address for the webhook receiver (`HOOKBOT_WEBHOOK_BIND`).
    #[serde(default = "default_webhook_bind")]
    pub webhook_bind: SocketAddr,
    /// Shared secret used to verify webhook signatures (`HOOKBOT_WEBHOOK_SECRET`).
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            nickserv_password: None,
            host: default_host(),
            port: default_port(),
            ssl: default_ssl(),
            reconnect_delay: default_reconnect_delay(),
            event_socket: default_event_socket(),
            filters: Filters::default(),
            channels: Vec::new(),
            ratelimit: RatelimitConfig::default(),
            template_dirs: default_template_dirs(),
            webhook_bind: default_webhook_bind(),
            webhook_secret: None,
        }
    }
}

impl Config {
    /// Load from an explicit file, or `hookbot.*` in the working directory, then
    /// apply `HOOKBOT_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Res<Self> {
        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else {
            cfg = cfg.add_source(config::File::with_name(DEFAULT_CONFIG_NAME).required(false));
        }

        Self::build(cfg.add_source(config::Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__").try_parsing(true)))
    }

    /// Parse configuration from a string, without consulting files or the environment.
    pub fn parse(source: &str, format: FileFormat) -> Res<Self> {
        Self::build(config::Config::builder().add_source(config::File::from_str(source, format)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Res<Self> {
        let mut values = builder.build()?.collect()?;

        // Settings under a root key fill in whatever the top level leaves unset.
        for root in ROOT_KEYS {
            if let Some(nested) = values.remove(root) {
                for (key, value) in nested.into_table()? {
                    values.entry(key).or_insert(value);
                }
            }
        }

        for key in values.keys().filter(|key| !KNOWN_KEYS.contains(&key.as_str())) {
            warn!("ignoring unknown config key `{}`", key);
        }

        let result = Config {
            inner: Arc::new(Value::from(values).try_deserialize()?),
        };

        if result.port == 0 {
            return Err(anyhow::anyhow!("IRC port must be non-zero."));
        }

        if result.ratelimit.bucket_interval.is_zero() {
            return Err(anyhow::anyhow!("Ratelimit bucket interval must be at least one second."));
        }

        if result.ratelimit.interval > MAX_RATELIMIT_INTERVAL || result.ratelimit.bucket_interval > MAX_RATELIMIT_INTERVAL {
            return Err(anyhow::anyhow!("Ratelimit intervals must be at most {} seconds.", MAX_RATELIMIT_INTERVAL.as_secs()));
        }

        Ok(result)
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::parse("{}", FileFormat::Json).unwrap();

        assert_eq!(config.nick, "mocbot");
        assert_eq!(config.host, "chat.freenode.net");
        assert_eq!(config.port, 6697);
        assert!(config.ssl);
        assert_eq!(config.reconnect_delay, Duration::from_secs(10));
        assert_eq!(config.event_socket, "tcp://127.0.0.1:1509");
        assert_eq!(config.ratelimit.bucket, 5);
        assert_eq!(config.ratelimit.interval, Duration::from_secs(1));
        assert_eq!(config.ratelimit.bucket_interval, Duration::from_secs(10));
        assert!(config.channels.is_empty());
        assert!(config.webhook_secret.is_none());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
nick: test
host: irc.example.com
port: 1234
ssl: false
reconnect_delay: 3
include_repos:
  - acme/
ratelimit:
  bucket: 2
channels:
  - name: '#test'
    include_events:
      - push
    exclude_repos:
      - acme/boring
  - name: '#other'
"#;
        let config = Config::parse(yaml, FileFormat::Yaml).unwrap();

        assert_eq!(config.nick, "test");
        assert_eq!(config.host, "irc.example.com");
        assert_eq!(config.port, 1234);
        assert!(!config.ssl);
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.ratelimit.bucket, 2);
        assert_eq!(config.ratelimit.interval, Duration::from_secs(1));
        assert_eq!(config.filters.include_repos.len(), 1);

        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].name, "#test");
        assert_eq!(config.channels[0].filters.include_events[0].as_str(), "push");
        assert_eq!(config.channels[0].filters.exclude_repos.len(), 1);
        assert_eq!(config.channels[1].name, "#other");
        assert!(config.channels[1].filters.include_events.is_empty());
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(&path, "nick = \"filebot\"\n\n[[channels]]\nname = \"#file\"\ninclude_repos = [\"test/\"]\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.nick, "filebot");
        assert_eq!(config.channels[0].name, "#file");
    }

    #[test]
    fn test_patterns_are_compiled_as_prefix_matches() {
        let config = Config::parse(r##"{"channels": [{"name": "#test", "include_repos": ["test/"]}]}"##, FileFormat::Json).unwrap();
        let pattern = &config.channels[0].filters.include_repos[0];

        assert!(pattern.matches("test/pattern"));
        assert!(!pattern.matches("other/test/pattern"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = Config::parse(r#"{"include_events": ["push("]}"#, FileFormat::Json);

        assert!(result.is_err());
    }

    #[test]
    fn test_channel_without_name_is_rejected() {
        let result = Config::parse(r#"{"channels": [{"include_events": ["push"]}]}"#, FileFormat::Json);

        assert!(result.is_err());
    }

    #[test]
    fn test_zero_port_is_rejected() {
        let result = Config::parse(r#"{"port": 0}"#, FileFormat::Json);

        assert!(result.is_err());
    }

    #[test]
    fn test_pattern_alternation_stays_anchored() {
        let pattern = Pattern::new("push|issues").unwrap();

        assert!(pattern.matches("issues:opened"));
        assert!(!pattern.matches("pull_request:opened"));
        assert!(!pattern.matches("x-issues"));
    }

    #[test]
    fn test_oversized_ratelimit_intervals_are_rejected() {
        let interval = Config::parse(r#"{"ratelimit": {"interval": 18446744073709551615}}"#, FileFormat::Json);
        let bucket_interval = Config::parse(r#"{"ratelimit": {"bucket_interval": 86401}}"#, FileFormat::Json);
        let longest = Config::parse(r#"{"ratelimit": {"interval": 86400, "bucket_interval": 86400}}"#, FileFormat::Json);

        assert!(interval.is_err());
        assert!(bucket_interval.is_err());
        assert!(longest.is_ok());
    }

    #[test]
    fn test_settings_under_root_key() {
        let yaml = r#"
mocbot:
  nick: mocbot_dev
  include_repos:
    - larsks/
  channels:
    - name: '#oddbit'
      include_events:
        - push
"#;
        let config = Config::parse(yaml, FileFormat::Yaml).unwrap();

        assert_eq!(config.nick, "mocbot_dev");
        assert_eq!(config.filters.include_repos[0].as_str(), "larsks/");
        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.channels[0].name, "#oddbit");
    }

    #[test]
    fn test_top_level_settings_win_over_root_key() {
        let config = Config::parse(r#"{"nick": "outer", "hookbot": {"nick": "inner", "port": 7000}}"#, FileFormat::Json).unwrap();

        assert_eq!(config.nick, "outer");
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = Config::parse(r#"{"nick": "bot", "colour": "blue"}"#, FileFormat::Json).unwrap();

        assert_eq!(config.nick, "bot");
    }
}
