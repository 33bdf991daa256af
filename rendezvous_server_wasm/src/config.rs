//! Server configuration
//!
//! Defaults reproduce the relay's reference behavior: unbounded queues,
//! a `ready` notification on every join while both roles are present, and
//! purely in-memory rooms.

use crate::error::ConfigError;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Environment variable holding the per-queue message capacity
pub const QUEUE_CAPACITY_VAR: &str = "RENDEZVOUS_QUEUE_CAPACITY";
/// Environment variable selecting the overflow policy
pub const OVERFLOW_VAR: &str = "RENDEZVOUS_OVERFLOW";
/// Environment variable selecting the ready mode
pub const READY_MODE_VAR: &str = "RENDEZVOUS_READY";
/// Environment variable naming the shared state file
pub const STATE_FILE_VAR: &str = "RENDEZVOUS_STATE_FILE";
/// Environment variable holding the log filter
pub const LOG_FILTER_VAR: &str = "RUST_LOG";

/// What happens when a message is pushed onto a full queue
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest queued message to make room
    #[default]
    DropOldest,
    /// Refuse user sends with [`crate::SignalingError::QueueFull`]
    Reject,
}

/// Capacity of each role's queue
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum QueueLimit {
    /// Queues grow without bound
    #[default]
    Unbounded,
    /// Queues hold at most `capacity` messages
    Bounded {
        /// Maximum number of queued messages per role
        capacity: NonZeroUsize,
        /// Behavior once `capacity` is reached
        overflow: OverflowPolicy,
    },
}

/// When `ready` notifications are emitted
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReadyMode {
    /// Every join that leaves both roles present enqueues `ready`,
    /// including redundant joins
    #[default]
    EveryJoin,
    /// Only the join that moves the room into "both present" enqueues `ready`
    Transition,
}

/// Runtime configuration for [`crate::ServerState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Queue bound applied to both roles
    pub queue_limit: QueueLimit,
    /// Ready notification policy
    pub ready_mode: ReadyMode,
    /// Shared JSON state file; `None` keeps rooms in memory
    pub state_file: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            queue_limit: QueueLimit::Unbounded,
            ready_mode: ReadyMode::EveryJoin,
            state_file: None,
            log_filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unset and empty values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        let overflow = match get(OVERFLOW_VAR) {
            Some(raw) => parse_overflow(&raw)?,
            None => OverflowPolicy::default(),
        };

        if let Some(raw) = get(QUEUE_CAPACITY_VAR) {
            let capacity = raw
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|_| ConfigError::InvalidCapacity(raw.clone()))?;
            config.queue_limit = QueueLimit::Bounded { capacity, overflow };
        }

        if let Some(raw) = get(READY_MODE_VAR) {
            config.ready_mode = match raw.trim() {
                "every-join" => ReadyMode::EveryJoin,
                "transition" => ReadyMode::Transition,
                _ => return Err(ConfigError::InvalidReadyMode(raw.clone())),
            };
        }

        config.state_file = get(STATE_FILE_VAR).map(PathBuf::from);

        if let Some(filter) = get(LOG_FILTER_VAR) {
            config.log_filter = filter;
        }

        Ok(config)
    }
}

fn parse_overflow(raw: &str) -> Result<OverflowPolicy, ConfigError> {
    match raw.trim() {
        "drop-oldest" => Ok(OverflowPolicy::DropOldest),
        "reject" => Ok(OverflowPolicy::Reject),
        _ => Err(ConfigError::InvalidOverflowPolicy(raw.to_string())),
    }
}
