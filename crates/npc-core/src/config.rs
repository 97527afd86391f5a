//! Configuration loading for the NPC engine.
//!
//! Engine settings live in `npc-engine.yaml`; each session is described by
//! its own YAML file listed under `sessions`. Every field has a default, so
//! an empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use npc_actions::{EffectLimits, UnknownPropertyPolicy};
use npc_db::PersistenceConfig;
use npc_types::{ActionCatalog, AgentState, SessionId, SessionState, WorldState};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration, mirroring `npc-engine.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Processing settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Default session store.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// External decision service.
    #[serde(default)]
    pub decision: DecisionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Session definition files to load at startup.
    #[serde(default)]
    pub sessions: Vec<PathBuf>,
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// Environment variables override YAML values:
    /// - `DATABASE_URL` overrides `persistence.postgres_url`
    /// - `DRAGONFLY_URL` overrides `persistence.dragonfly_url`
    /// - `NPC_DECISION_ENDPOINT` overrides `decision.endpoint`
    /// - `NPC_DECISION_API_KEY` overrides `decision.api_key`
    ///
    /// Relative session paths are resolved against the directory holding
    /// the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        if let Some(dir) = path.parent() {
            for session in &mut config.sessions {
                if session.is_relative() {
                    *session = dir.join(&*session);
                }
            }
        }
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.persistence.apply_env_overrides();
        config.decision.apply_env_overrides();
        Ok(config)
    }
}

/// Event processing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineSettings {
    /// Deadline for a single agent decision, in milliseconds.
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,

    /// What to do with properties an action does not declare.
    #[serde(default)]
    pub unknown_properties: UnknownPropertyPolicy,

    /// Short-term memories kept per agent.
    #[serde(default = "default_max_short_term_memories")]
    pub max_short_term_memories: usize,

    /// World events kept in the recent-events log.
    #[serde(default = "default_max_recent_events")]
    pub max_recent_events: usize,
}

impl EngineSettings {
    /// Decision deadline as a [`Duration`].
    pub const fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    /// Memory and event-log bounds.
    pub const fn effect_limits(&self) -> EffectLimits {
        EffectLimits {
            max_short_term_memories: self.max_short_term_memories,
            max_recent_events: self.max_recent_events,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            decision_timeout_ms: default_decision_timeout_ms(),
            unknown_properties: UnknownPropertyPolicy::default(),
            max_short_term_memories: default_max_short_term_memories(),
            max_recent_events: default_max_recent_events(),
        }
    }
}

/// External decision service settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecisionConfig {
    /// URL the decision requests are posted to. Without one, agents only
    /// acknowledge events.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent with each request.
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl DecisionConfig {
    /// Override the endpoint and key with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NPC_DECISION_ENDPOINT") {
            self.endpoint = Some(val);
        }
        if let Ok(val) = std::env::var("NPC_DECISION_API_KEY") {
            self.api_key = Some(val);
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Session definitions
// ---------------------------------------------------------------------------

/// A session definition file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionConfig {
    /// Session identifier.
    #[serde(alias = "session_id")]
    pub id: SessionId,

    /// Human-readable title.
    #[serde(default)]
    pub title: String,

    /// Agents present at start.
    #[serde(default, alias = "npcs")]
    pub agents: Vec<AgentState>,

    /// Players known at start.
    #[serde(default)]
    pub players: Vec<String>,

    /// Initial world.
    #[serde(default)]
    pub world: WorldState,

    /// Custom actions and built-in selection.
    #[serde(default, alias = "actions")]
    pub catalog: ActionCatalog,

    /// Store for this session, overriding the engine default.
    #[serde(default)]
    pub persistence: Option<PersistenceConfig>,

    /// Activate the session right after creation.
    #[serde(default = "default_activate")]
    pub activate: bool,
}

impl SessionConfig {
    /// Load a session definition from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse a session definition from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        if let Some(persistence) = &mut config.persistence {
            persistence.apply_env_overrides();
        }
        Ok(config)
    }

    /// The store this session should use, given the engine default.
    pub fn persistence_or<'a>(&'a self, default: &'a PersistenceConfig) -> &'a PersistenceConfig {
        self.persistence.as_ref().unwrap_or(default)
    }

    /// Build the initial session state. Agents are not yet placed in the
    /// world or seeded with resources; the session does that when it is
    /// created.
    pub fn into_state(self) -> SessionState {
        let mut state = SessionState::new(self.id, self.title);
        state.players = self.players.into_iter().collect();
        state.world = self.world;
        state.catalog = self.catalog;
        state.agents = self
            .agents
            .into_iter()
            .map(|agent| (agent.id.clone(), agent))
            .collect();
        state
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_decision_timeout_ms() -> u64 {
    5000
}

const fn default_max_short_term_memories() -> usize {
    20
}

const fn default_max_recent_events() -> usize {
    100
}

const fn default_request_timeout_ms() -> u64 {
    4000
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_activate() -> bool {
    true
}
