//! Interpreter sessions shared by the server.
//!
//! A [`SessionStore`] maps session ids to [`Session`]s, each owning one
//! [`Evaluator`]. The evaluator sits behind a `tokio::sync::Mutex`, so at
//! most one run or event trigger is in flight per session while distinct
//! sessions proceed concurrently.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use oraculo_core::host::DisabledGenerator;
//! use oraculo_core::session::SessionStore;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = SessionStore::new(Arc::new(DisabledGenerator::new()));
//! let (id, result) = store.interpret("print \"hi\"", None).await.unwrap();
//! assert_eq!(result.console, vec!["hi".to_string()]);
//! store.end(id).await.unwrap();
//! # });
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EvalError, SyntaxError};
use crate::evaluator::{Evaluator, RunResult};
use crate::host::{Generator, HtmlPresenter};
use crate::parser::parse;

#[derive(Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("session '{0}' not found or expired")]
    NotFound(Uuid),

    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// One interpreter session.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    last_active: RwLock<DateTime<Utc>>,
    evaluator: Mutex<Evaluator>,
}

impl Session {
    fn new(evaluator: Evaluator) -> Arc<Self> {
        let now = Utc::now();
        Arc::new(Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: RwLock::new(now),
            evaluator: Mutex::new(evaluator),
        })
    }

    pub async fn last_active(&self) -> DateTime<Utc> {
        *self.last_active.read().await
    }

    async fn touch(&self) {
        *self.last_active.write().await = Utc::now();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("last_active", &"<RwLock<DateTime<Utc>>>")
            .field("evaluator", &"<Mutex<Evaluator>>")
            .finish()
    }
}

/// All live sessions of a server.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    generator: Arc<dyn Generator>,
}

impl SessionStore {
    /// Creates an empty store. Every session's evaluator shares `generator`.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            generator,
        }
    }

    fn new_evaluator(&self) -> Evaluator {
        Evaluator::new(Box::new(HtmlPresenter::new()), Arc::clone(&self.generator))
    }

    async fn get(&self, id: Uuid) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    /// Parses `code` and runs it.
    ///
    /// With the id of a live session the program replaces that session's
    /// program and all its state; otherwise a new session is created. The
    /// source is parsed first, so a syntax error leaves every session as it
    /// was.
    pub async fn interpret(
        &self,
        code: &str,
        session_id: Option<Uuid>,
    ) -> Result<(Uuid, RunResult), SessionError> {
        let program = parse(code)?;

        let existing = match session_id {
            Some(id) => self.sessions.read().await.get(&id).cloned(),
            None => None,
        };
        let session = match existing {
            Some(session) => {
                info!(session_id = %session.id, "replacing session program");
                session
            }
            None => {
                let session = Session::new(self.new_evaluator());
                if let Some(requested) = session_id {
                    debug!(requested = %requested, "unknown session id, starting a new session");
                }
                info!(session_id = %session.id, "session created");
                self.sessions
                    .write()
                    .await
                    .insert(session.id, Arc::clone(&session));
                session
            }
        };

        session.touch().await;
        let mut evaluator = session.evaluator.lock().await;
        evaluator.set_program(program);
        let result = evaluator.run().await;
        Ok((session.id, result))
    }

    /// Runs a session from where it stopped.
    pub async fn continue_run(&self, id: Uuid) -> Result<RunResult, SessionError> {
        let session = self.get(id).await?;
        session.touch().await;
        let mut evaluator = session.evaluator.lock().await;
        if evaluator.program().is_none() {
            return Err(EvalError::NoProgram.into());
        }
        Ok(evaluator.run().await)
    }

    /// Answers a pending `ask` and continues the run.
    pub async fn submit_input(
        &self,
        id: Uuid,
        variable_name: &str,
        input_value: &str,
    ) -> Result<RunResult, SessionError> {
        let session = self.get(id).await?;
        session.touch().await;
        let mut evaluator = session.evaluator.lock().await;
        evaluator.submit_input(variable_name, input_value)?;
        debug!(session_id = %id, variable = %variable_name, "input submitted");
        Ok(evaluator.run().await)
    }

    pub async fn trigger_event(&self, id: Uuid, event_id: &str) -> Result<RunResult, SessionError> {
        let session = self.get(id).await?;
        session.touch().await;
        let mut evaluator = session.evaluator.lock().await;
        Ok(evaluator.trigger_event(event_id).await?)
    }

    pub async fn end(&self, id: Uuid) -> Result<(), SessionError> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                info!(session_id = %id, "session ended");
                Ok(())
            }
            None => Err(SessionError::NotFound(id)),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drops every session idle for longer than `max_idle`. Returns how many
    /// were dropped.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let now = Utc::now();

        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut stale = Vec::new();
        for session in sessions {
            if now - session.last_active().await > max_idle {
                stale.push(session.id);
            }
        }

        if stale.is_empty() {
            return 0;
        }
        let mut map = self.sessions.write().await;
        for id in &stale {
            map.remove(id);
            warn!(session_id = %id, "evicted idle session");
        }
        stale.len()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &"<RwLock<HashMap<Uuid, Arc<Session>>>>")
            .field("generator", &"<dyn Generator>")
            .finish()
    }
}
