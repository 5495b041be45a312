//! Shared test helpers for oraculo-core integration tests.
//!
//! Provides scripted collaborators for the evaluator and a harness that runs
//! an IPC server over a fresh session store.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use oraculo_core::evaluator::{Evaluator, RunResult};
use oraculo_core::host::{Generator, HtmlPresenter, Presenter};
use oraculo_core::ipc::{socket_path, IpcClient, IpcServer};
use oraculo_core::parser::parse;
use oraculo_core::session::SessionStore;

// ---------------------------------------------------------------------------
// Scripted generator
// ---------------------------------------------------------------------------

/// Generator that replays canned replies in order and records every prompt.
/// Once the replies run out it returns an empty string.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies.lock().unwrap().pop_front().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Recording presenter
// ---------------------------------------------------------------------------

/// Presenter that hands out sequential ids (`el-1`, `el-2`, ...) and records
/// each created element as `kind:text`.
#[derive(Default)]
pub struct RecordingPresenter {
    next_id: usize,
    fragments: Vec<String>,
}

impl Presenter for RecordingPresenter {
    fn create_element(&mut self, kind: &str, text: &str) -> String {
        self.next_id += 1;
        self.fragments.push(format!("{}:{}", kind, text));
        format!("el-{}", self.next_id)
    }

    fn append_raw_markup(&mut self, markup: &str) {
        self.fragments.push(markup.to_string());
    }

    fn fragments(&self) -> &[String] {
        &self.fragments
    }

    fn clear(&mut self) {
        self.fragments.clear();
    }
}

// ---------------------------------------------------------------------------
// Evaluator helpers
// ---------------------------------------------------------------------------

/// An evaluator with the default HTML presenter and the given generator.
pub fn evaluator_with(generator: ScriptedGenerator) -> Evaluator {
    Evaluator::new(Box::new(HtmlPresenter::new()), Arc::new(generator))
}

/// An evaluator with a [`RecordingPresenter`] and no generated content.
pub fn recording_evaluator() -> Evaluator {
    Evaluator::new(
        Box::new(RecordingPresenter::default()),
        Arc::new(ScriptedGenerator::default()),
    )
}

/// Parses `source` into a recording evaluator and runs it once.
pub async fn run_script(source: &str) -> (Evaluator, RunResult) {
    let mut evaluator = recording_evaluator();
    evaluator.set_program(parse(source).expect("test script should parse"));
    let result = evaluator.run().await;
    (evaluator, result)
}

// ---------------------------------------------------------------------------
// IPC harness
// ---------------------------------------------------------------------------

/// Generate a unique server name for test isolation.
pub fn unique_server_name() -> String {
    format!(
        "test_{}",
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    )
}

/// An IPC server over a fresh [`SessionStore`], running on a background task.
pub struct TestHarness {
    pub store: Arc<SessionStore>,
    pub name: String,
    pub socket: PathBuf,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl TestHarness {
    pub async fn start(generator: ScriptedGenerator) -> Self {
        let name = unique_server_name();
        let store = Arc::new(SessionStore::new(Arc::new(generator)));
        let server = IpcServer::new(Arc::clone(&store), &name);
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        // Give the server time to bind.
        let socket = socket_path(&name);
        for _ in 0..50 {
            if socket.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Self {
            store,
            name,
            socket,
            _server_handle: handle,
        }
    }

    pub async fn connect_client(&self) -> IpcClient {
        IpcClient::connect(&self.name)
            .await
            .expect("client should connect to test server")
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self._server_handle.abort();
        let _ = std::fs::remove_file(&self.socket);
    }
}
