//! NPC engine binary.
//!
//! Wires configuration, session stores and the decision capability into a
//! [`SessionManager`], then serves event submissions read as
//! newline-delimited JSON from stdin. Each input line produces one JSON line
//! on stdout, tagged with the line number it answers; logs go to stderr.
//!
//! Lines addressed to the same session are handled one after another in
//! input order. Different sessions are served concurrently, so replies for
//! different sessions may interleave.
//!
//! # Input
//!
//! ```text
//! {"session_id": "tavern", "source": "player_1", "target": "marcus",
//!  "action_id": "speak", "kind": "player_to_agent",
//!  "properties": {"message": "Hello"}}
//! {"session_id": "tavern", "events": [ {...}, {...} ]}
//! ```
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `npc-engine.yaml` (or `NPC_ENGINE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the decision capability
//! 4. Create or restore every configured session
//! 5. Serve submissions until stdin closes

mod error;
mod http_decision;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use npc_core::{EngineConfig, LoggingConfig, SessionConfig, SessionManager};
use npc_db::{SessionStore, StoreBackend, StoreError};
use npc_types::{EventResult, EventSubmission, SessionId};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;
use crate::http_decision::DecisionBackend;

type Manager = SessionManager<StoreBackend, DecisionBackend>;

/// One line of input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Submission {
    /// Several events for one session, committed together.
    Batch {
        session_id: SessionId,
        events: Vec<EventSubmission>,
    },
    /// A single event.
    Single(Box<EventSubmission>),
}

impl Submission {
    fn session_id(&self) -> &SessionId {
        match self {
            Self::Batch { session_id, .. } => session_id,
            Self::Single(submission) => &submission.session_id,
        }
    }
}

/// One line of output.
#[derive(Debug, Serialize)]
struct Reply {
    line: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<EventResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Reply {
    const fn failed(line: u64, error: String) -> Self {
        Self {
            line,
            results: None,
            error: Some(error),
        }
    }
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if initialization fails or stdout cannot be written.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        config = %config_path.display(),
        store = %config.persistence.kind,
        decision_timeout_ms = config.engine.decision_timeout_ms,
        sessions = config.sessions.len(),
        "npc-engine starting"
    );

    // 3. Decision capability.
    let decision = DecisionBackend::from_config(&config.decision)?;
    info!(backend = decision.name(), "decision capability ready");

    // 4. Sessions.
    let manager: Arc<Manager> = Arc::new(SessionManager::new(decision, &config.engine));
    for path in &config.sessions {
        load_session(&manager, &config, SessionConfig::from_file(path)?).await?;
    }

    // 5. Serve.
    let served = serve(Arc::clone(&manager)).await?;
    info!(lines = served, "stdin closed, npc-engine shutdown complete");
    Ok(())
}

/// Load `npc-engine.yaml`, or the file named by `NPC_ENGINE_CONFIG`.
///
/// A missing default file means defaults; a missing explicit file is an
/// error.
fn load_config() -> Result<(EngineConfig, PathBuf), AppError> {
    if let Ok(path) = std::env::var("NPC_ENGINE_CONFIG") {
        let path = PathBuf::from(path);
        return Ok((EngineConfig::from_file(&path)?, path));
    }
    let path = PathBuf::from("npc-engine.yaml");
    if path.exists() {
        Ok((EngineConfig::from_file(&path)?, path))
    } else {
        Ok((EngineConfig::parse("{}")?, path))
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Connect the session's store, then restore the session from it or create
/// it from its definition.
async fn load_session(
    manager: &Manager,
    config: &EngineConfig,
    session: SessionConfig,
) -> Result<(), AppError> {
    let store = StoreBackend::connect(session.persistence_or(&config.persistence)).await?;
    let kind = store.kind();

    let summary = match store.load(&session.id).await {
        Ok(_) => manager.restore_session(&session.id, store).await?,
        Err(StoreError::NotFound(_)) => manager.create_from_config(session, store).await?,
        Err(e) => return Err(e.into()),
    };
    info!(
        session_id = %summary.id,
        status = %summary.status,
        agents = summary.agents,
        store = %kind,
        "session loaded"
    );
    Ok(())
}

/// Read submissions from stdin until EOF and write replies as they
/// complete.
async fn serve(manager: Arc<Manager>) -> Result<u64, AppError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Reply>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(reply) = rx.recv().await {
            let mut line = serde_json::to_vec(&reply)?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        Ok::<(), AppError>(())
    });

    let mut dispatcher = Dispatcher::new(manager, tx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no: u64 = 0;
    while let Some(text) = lines.next_line().await? {
        line_no = line_no.saturating_add(1);
        if text.trim().is_empty() {
            continue;
        }
        dispatcher.dispatch(line_no, &text);
    }
    drop(dispatcher);

    match writer.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "writer task failed"),
    }
    Ok(line_no)
}

/// Hands each parsed line to its session's queue. Every session gets one
/// worker task that drains its queue in order.
struct Dispatcher {
    manager: Arc<Manager>,
    replies: mpsc::UnboundedSender<Reply>,
    queues: BTreeMap<SessionId, mpsc::UnboundedSender<(u64, Submission)>>,
}

impl Dispatcher {
    const fn new(manager: Arc<Manager>, replies: mpsc::UnboundedSender<Reply>) -> Self {
        Self {
            manager,
            replies,
            queues: BTreeMap::new(),
        }
    }

    fn dispatch(&mut self, line: u64, text: &str) {
        let submission = match serde_json::from_str::<Submission>(text) {
            Ok(submission) => submission,
            Err(e) => {
                warn!(line, error = %e, "malformed submission");
                send(&self.replies, Reply::failed(line, format!("malformed submission: {e}")));
                return;
            }
        };

        let queue = self
            .queues
            .entry(submission.session_id().clone())
            .or_insert_with(|| spawn_worker(Arc::clone(&self.manager), self.replies.clone()));
        if queue.send((line, submission)).is_err() {
            warn!(line, "session worker stopped, submission dropped");
        }
    }
}

fn spawn_worker(
    manager: Arc<Manager>,
    replies: mpsc::UnboundedSender<Reply>,
) -> mpsc::UnboundedSender<(u64, Submission)> {
    let (tx, mut rx) = mpsc::unbounded_channel::<(u64, Submission)>();
    tokio::spawn(async move {
        while let Some((line, submission)) = rx.recv().await {
            send(&replies, handle(&manager, line, submission).await);
        }
    });
    tx
}

fn send(replies: &mpsc::UnboundedSender<Reply>, reply: Reply) {
    let line = reply.line;
    if replies.send(reply).is_err() {
        warn!(line, "output closed, reply dropped");
    }
}

async fn handle(manager: &Manager, line: u64, submission: Submission) -> Reply {
    let outcome = match submission {
        Submission::Single(submission) => manager.submit(*submission).await.map(|r| vec![r]),
        Submission::Batch { session_id, events } => {
            manager.submit_batch(&session_id, events).await
        }
    };

    match outcome {
        Ok(results) => Reply {
            line,
            results: Some(results),
            error: None,
        },
        Err(e) => {
            warn!(line, error = %e, "submission rejected");
            Reply::failed(line, e.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use npc_core::{AcknowledgeDecision, EngineSettings};
    use npc_db::MemoryStore;
    use npc_types::{AgentState, Personality, SessionState};

    use super::*;

    async fn tavern_manager(marcus_energy: f64) -> Arc<Manager> {
        let manager: Arc<Manager> = Arc::new(SessionManager::new(
            DecisionBackend::Acknowledge(AcknowledgeDecision::new()),
            &EngineSettings::default(),
        ));
        let mut state = SessionState::new("tavern", "Tavern");
        let mut marcus = AgentState::new("marcus", Personality::default());
        marcus.energy = marcus_energy;
        let elara = AgentState::new("elara", Personality::default());
        for agent in [marcus, elara] {
            state.agents.insert(agent.id.clone(), agent);
        }
        manager
            .create_session(state, StoreBackend::Memory(MemoryStore::new()))
            .await
            .unwrap();
        manager.activate(&SessionId::new("tavern")).await.unwrap();
        manager
    }

    fn greeting(n: u32) -> String {
        serde_json::json!({
            "session_id": "tavern",
            "source": "marcus",
            "target": "elara",
            "action_id": "speak",
            "kind": "agent_to_agent",
            "properties": {"message": format!("hello {n}")}
        })
        .to_string()
    }

    #[tokio::test]
    async fn lines_for_one_session_run_in_input_order() {
        // Enough energy for exactly one greeting: only the first line may win.
        let manager = tavern_manager(1.0).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new(Arc::clone(&manager), tx);
        for line in 1..=3 {
            dispatcher.dispatch(line, &greeting(u32::try_from(line).unwrap()));
        }
        drop(dispatcher);

        let mut replies = Vec::new();
        while let Some(reply) = rx.recv().await {
            replies.push(reply);
        }
        replies.sort_by_key(|r| r.line);
        assert_eq!(replies.len(), 3);
        assert!(replies[0].error.is_none());
        assert!(replies[1].error.as_deref().unwrap().contains("insufficient energy"));
        assert!(replies[2].error.is_some());
    }

    #[tokio::test]
    async fn malformed_lines_are_answered_directly() {
        let manager = tavern_manager(100.0).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new(manager, tx);
        dispatcher.dispatch(7, "{not json");
        drop(dispatcher);

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.line, 7);
        assert!(reply.error.unwrap().starts_with("malformed submission"));
        assert!(rx.recv().await.is_none());
    }
}
