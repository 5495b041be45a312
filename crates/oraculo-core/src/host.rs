//! Collaborators the evaluator talks to.
//!
//! - [`Presenter`] turns `create` and generated markup into HTML fragments.
//! - [`Generator`] produces content for `ai.craftHtml`. It never fails: an
//!   empty string means "nothing produced" (no backend configured, the
//!   backend failed, or it timed out).
//!
//! # Example
//!
//! ```
//! use oraculo_core::host::{HtmlPresenter, Presenter};
//!
//! let mut presenter = HtmlPresenter::new();
//! let id = presenter.create_element("button", "Go");
//! assert!(presenter.fragments()[0].contains(&id));
//! ```

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::GeneratorConfig;

/// Materializes page elements and owns the resulting HTML fragments.
pub trait Presenter: Send {
    /// Creates an element of `kind` labelled `text` and returns its id.
    fn create_element(&mut self, kind: &str, text: &str) -> String;

    /// Appends markup verbatim.
    fn append_raw_markup(&mut self, markup: &str);

    /// All fragments produced so far, in order.
    fn fragments(&self) -> &[String];

    /// Drops every fragment (a new program is starting).
    fn clear(&mut self);
}

/// Default presenter producing plain HTML strings.
///
/// `title` becomes `<h1>`, `button` becomes `<button>`, and any other kind a
/// `<div>` tagged with `data-kind`.
#[derive(Debug, Default)]
pub struct HtmlPresenter {
    fragments: Vec<String>,
}

impl HtmlPresenter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Presenter for HtmlPresenter {
    fn create_element(&mut self, kind: &str, text: &str) -> String {
        let id = format!("oraculo-el-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let text = escape_html(text);
        let fragment = match kind {
            "title" => format!(r#"<h1 id="{}">{}</h1>"#, id, text),
            "button" => format!(r#"<button id="{}">{}</button>"#, id, text),
            other => format!(
                r#"<div id="{}" data-kind="{}">{}</div>"#,
                id,
                escape_html(other),
                text
            ),
        };
        self.fragments.push(fragment);
        id
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

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Content generation backend for `ai.craftHtml`.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns generated text, or an empty string when nothing was produced.
    async fn generate(&self, prompt: &str) -> String;
}

/// Generator used when no backend is configured. Always returns nothing.
#[derive(Debug, Default)]
pub struct DisabledGenerator {
    warned: AtomicBool,
}

impl DisabledGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Generator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> String {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("no content generator configured; ai.craftHtml will produce nothing");
        }
        String::new()
    }
}

/// Runs an external program per request: the prompt is written to its
/// stdin and its trimmed stdout is the generated content.
///
/// The child is killed if it outlives the timeout.
#[derive(Debug, Clone)]
pub struct ProcessGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    async fn invoke(&self, prompt: &str) -> std::io::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            // Dropping stdin closes the pipe so the child sees EOF.
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("generator exited with {}", output.status),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Generator for ProcessGenerator {
    async fn generate(&self, prompt: &str) -> String {
        debug!(program = %self.program, prompt_len = prompt.len(), "invoking generator");
        match tokio::time::timeout(self.timeout, self.invoke(prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(program = %self.program, error = %e, "generator failed");
                String::new()
            }
            Err(_) => {
                warn!(
                    program = %self.program,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "generator timed out"
                );
                String::new()
            }
        }
    }
}

/// The generator described by `config`, or a [`DisabledGenerator`] when
/// none is configured.
pub fn generator_from_config(config: Option<&GeneratorConfig>) -> Arc<dyn Generator> {
    match config {
        Some(config) => {
            debug!(program = %config.program, "using process generator");
            Arc::new(ProcessGenerator::from_config(config))
        }
        None => Arc::new(DisabledGenerator::new()),
    }
}
