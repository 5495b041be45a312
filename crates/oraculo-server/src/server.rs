//! Server state: the session store and its idle-session sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use oraculo_core::config::{GeneratorConfig, OraculoConfig};
use oraculo_core::host::generator_from_config;
use oraculo_core::session::SessionStore;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Backend state for the session server.
pub struct ServerState {
    pub name: String,
    store: Arc<SessionStore>,
    idle_timeout: Duration,
}

impl ServerState {
    /// Builds the store from `config`. A `generator` program, when given,
    /// replaces the configured one.
    pub fn new(name: String, config: &OraculoConfig, generator: Option<String>) -> Self {
        let generator_config = generator
            .map(GeneratorConfig::new)
            .or_else(|| config.generator.clone());
        let idle_timeout = Duration::from_secs(config.session_idle_secs);

        info!(
            server = %name,
            generator = ?generator_config.as_ref().map(|g| g.program.as_str()),
            idle_secs = config.session_idle_secs,
            "ServerState initialised"
        );

        Self {
            name,
            store: Arc::new(SessionStore::new(generator_from_config(generator_config.as_ref()))),
            idle_timeout,
        }
    }

    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// A quarter of the idle timeout, kept between one second and a minute.
    pub fn sweep_interval(&self) -> Duration {
        (self.idle_timeout / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
    }

    /// Evicts idle sessions once. Returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let evicted = self.store.evict_idle(self.idle_timeout).await;
        if evicted > 0 {
            let remaining = self.store.len().await;
            info!(evicted, remaining, "idle sessions evicted");
        } else {
            debug!("sweep found no idle sessions");
        }
        evicted
    }

    /// Runs [`sweep`](Self::sweep) every [`sweep_interval`](Self::sweep_interval)
    /// until the returned handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(state.sweep_interval());
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                state.sweep().await;
            }
        })
    }
}
