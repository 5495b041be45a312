//! Resumable tree-walking evaluator.
//!
//! The walk is driven by an explicit stack of [`Frame`]s instead of native
//! recursion. Each compound statement pushes a frame that records its own
//! progress (next statement index, remaining loop items), so when `ask`
//! suspends the program the stack *is* the continuation: the next
//! [`Evaluator::run`] picks up at the statement after the `ask`, inside the
//! same loop iteration and branch, without replaying any output.
//!
//! # Lifecycle
//!
//! ```text
//! set_program ─▶ Ready ──run──▶ Finished
//!                  ▲   └──────▶ Suspended ──submit_input──▶ Ready
//!                  │   └──────▶ Failed (terminal)
//! ```
//!
//! Errors raised while running never escape [`Evaluator::run`]; they are
//! appended to the console log and the evaluator becomes [`Status::Failed`].
//!
//! # Example
//!
//! ```
//! use oraculo_core::evaluator::Evaluator;
//! use oraculo_core::parser::parse;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut evaluator = Evaluator::with_defaults();
//! evaluator.set_program(parse("ask \"Name?\" -> name\nprint \"Hello, ${name}\"").unwrap());
//!
//! let result = evaluator.run().await;
//! assert_eq!(result.pending_input.unwrap().question, "Name?");
//!
//! evaluator.submit_input("name", "Ada").unwrap();
//! let result = evaluator.run().await;
//! assert_eq!(result.console, vec!["Hello, Ada".to_string()]);
//! # });
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ast::*;
use crate::error::{EvalError, EvalResult};
use crate::host::{DisabledGenerator, Generator, HtmlPresenter, Presenter};
use crate::scope::{ScopeChain, ScopeId};
use crate::value::Value;

/// Command that delegates to the content generator.
pub const GENERATE_COMMAND: &str = "ai.craftHtml";

const GENERATION_PREAMBLE: &str = "You are a web development expert. Produce only the HTML for the \
following request. Do not include Markdown, explanations or any other text, only plain HTML. \
Request: ";

const EVENT_TYPE_CLICK: &str = "onClick";

/// Largest loop bound magnitude; every integer up to 2^53 is exact in an `f64`.
const MAX_LOOP_BOUND: f64 = 9_007_199_254_740_992.0;

/// An outstanding request for a value supplied from outside the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInput {
    pub variable_name: String,
    pub question: String,
}

/// Public view of a registered event callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandlerView {
    pub event_id: String,
    pub element_id: String,
    pub event_type: String,
}

/// Everything a caller sees after a run or an event trigger.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub html: Vec<String>,
    pub console: Vec<String>,
    pub pending_input: Option<PendingInput>,
    pub event_handlers: Vec<EventHandlerView>,
}

impl RunResult {
    pub fn html_output(&self) -> String {
        self.html.join("\n")
    }

    pub fn console_output(&self) -> String {
        self.console.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// No program attached.
    Idle,
    /// Program attached, ready to run or resume.
    Ready,
    /// Waiting for [`Evaluator::submit_input`].
    Suspended,
    /// Ran to the end. Further runs are no-ops.
    Finished,
    /// A runtime error stopped the program. The evaluator must be replaced.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Main,
    Callback,
}

enum Flow {
    Continue,
    Suspend,
}

#[derive(Debug)]
enum LoopItems {
    /// `next` is `None` once the counter has passed `i64::MAX`.
    Range { next: Option<i64>, last: i64 },
    List(VecDeque<String>),
}

impl LoopItems {
    fn next_value(&mut self) -> Option<Value> {
        match self {
            LoopItems::Range { next, last } => {
                let current = (*next).filter(|n| *n <= *last)?;
                *next = current.checked_add(1);
                Some(Value::Number(current as f64))
            }
            LoopItems::List(items) => items.pop_front().map(Value::String),
        }
    }
}

#[derive(Debug)]
enum Frame {
    Block {
        block: Arc<Block>,
        next: usize,
        /// Whether finishing this block exits the current scope.
        owns_scope: bool,
    },
    Loop {
        variable: String,
        items: LoopItems,
        body: Arc<Block>,
    },
}

struct EventRegistration {
    event_id: String,
    element_id: String,
    block: Arc<Block>,
    scope: ScopeId,
}

pub struct Evaluator {
    program: Option<Program>,
    frames: Vec<Frame>,
    scopes: ScopeChain,
    console: Vec<String>,
    presenter: Box<dyn Presenter>,
    generator: Arc<dyn Generator>,
    events: Vec<EventRegistration>,
    status: Status,
    pending: Option<PendingInput>,
}

impl Evaluator {
    pub fn new(presenter: Box<dyn Presenter>, generator: Arc<dyn Generator>) -> Self {
        Self {
            program: None,
            frames: Vec::new(),
            scopes: ScopeChain::new(),
            console: Vec::new(),
            presenter,
            generator,
            events: Vec::new(),
            status: Status::Idle,
            pending: None,
        }
    }

    /// An evaluator with an [`HtmlPresenter`] and no content generator.
    pub fn with_defaults() -> Self {
        Self::new(Box::new(HtmlPresenter::new()), Arc::new(DisabledGenerator::new()))
    }

    /// Attaches `program` and resets all run state: frames, scopes, both
    /// output streams and the event registry.
    pub fn set_program(&mut self, program: Program) {
        self.frames = vec![Frame::Block {
            block: Arc::clone(&program.body),
            next: 0,
            owns_scope: false,
        }];
        self.program = Some(program);
        self.scopes = ScopeChain::new();
        self.console.clear();
        self.presenter.clear();
        self.events.clear();
        self.pending = None;
        self.status = Status::Ready;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn pending_input(&self) -> Option<&PendingInput> {
        self.pending.as_ref()
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    pub fn console(&self) -> &[String] {
        &self.console
    }

    /// Runs until the program ends, suspends, or fails.
    ///
    /// Calling this on a finished, failed or suspended evaluator returns the
    /// current snapshot without executing anything.
    pub async fn run(&mut self) -> RunResult {
        if self.status != Status::Ready {
            debug!(status = ?self.status, "run requested in non-ready state");
            return self.snapshot();
        }

        match self.drive(Mode::Main).await {
            Ok(Flow::Suspend) => {
                self.status = Status::Suspended;
                if let Some(pending) = &self.pending {
                    info!(variable = %pending.variable_name, "program suspended for input");
                }
            }
            Ok(Flow::Continue) => {
                self.status = Status::Finished;
                self.pending = None;
                info!(lines = self.console.len(), "program finished");
            }
            Err(e) => self.fail(e),
        }
        self.snapshot()
    }

    /// Binds the answer to a pending `ask` in the scope that was current when
    /// the program suspended. Follow with [`run`](Self::run) to continue.
    pub fn submit_input(&mut self, variable_name: &str, value: impl Into<Value>) -> EvalResult<()> {
        if self.status != Status::Suspended {
            return Err(EvalError::NotSuspended);
        }
        if let Some(pending) = &self.pending {
            if pending.variable_name != variable_name {
                debug!(
                    expected = %pending.variable_name,
                    got = %variable_name,
                    "input bound under a different name"
                );
            }
        }
        self.scopes.define(variable_name, value.into());
        self.pending = None;
        self.status = Status::Ready;
        Ok(())
    }

    /// Runs the callback registered under `event_id` in the scope it was
    /// defined in. The main continuation is left untouched.
    ///
    /// `ask` inside a callback does not suspend; it logs a diagnostic line.
    /// Runtime errors inside a callback are logged and do not fail the
    /// evaluator.
    pub async fn trigger_event(&mut self, event_id: &str) -> EvalResult<RunResult> {
        let registration = self
            .events
            .iter()
            .find(|e| e.event_id == event_id)
            .ok_or_else(|| EvalError::EventNotFound(event_id.to_string()))?;
        let block = Arc::clone(&registration.block);
        let scope = registration.scope;
        info!(event_id, element_id = %registration.element_id, "triggering event");

        let saved_frames = std::mem::take(&mut self.frames);
        let saved_scope = self.scopes.current();

        let outcome = match self.scopes.set_current(scope) {
            Ok(()) => {
                self.frames.push(Frame::Block {
                    block,
                    next: 0,
                    owns_scope: false,
                });
                self.drive(Mode::Callback).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            warn!(event_id, error = %e, "event handler failed");
            self.console.push(format!("// error in event handler '{}': {}", event_id, e));
        }

        self.frames = saved_frames;
        self.scopes.set_current(saved_scope)?;

        let mut result = self.snapshot();
        result.pending_input = None;
        Ok(result)
    }

    pub fn event_handlers(&self) -> Vec<EventHandlerView> {
        self.events
            .iter()
            .map(|e| EventHandlerView {
                event_id: e.event_id.clone(),
                element_id: e.element_id.clone(),
                event_type: EVENT_TYPE_CLICK.to_string(),
            })
            .collect()
    }

    pub fn snapshot(&self) -> RunResult {
        RunResult {
            html: self.presenter.fragments().to_vec(),
            console: self.console.clone(),
            pending_input: self.pending.clone(),
            event_handlers: self.event_handlers(),
        }
    }

    fn fail(&mut self, error: EvalError) {
        warn!(error = %error, "run failed");
        self.console.push(format!("runtime error: {}", error));
        self.pending = None;
        self.frames.clear();
        self.status = Status::Failed;
    }

    async fn drive(&mut self, mode: Mode) -> EvalResult<Flow> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(Flow::Continue);
            };

            match frame {
                Frame::Block { block, next, owns_scope } => {
                    if *next >= block.statements.len() {
                        let owns_scope = *owns_scope;
                        self.frames.pop();
                        if owns_scope {
                            self.scopes.exit()?;
                        }
                        continue;
                    }
                    let block = Arc::clone(block);
                    let index = *next;
                    // Advance first: a suspension resumes after this statement.
                    *next += 1;

                    if let Flow::Suspend = self.execute(&block.statements[index], mode).await? {
                        return Ok(Flow::Suspend);
                    }
                }
                Frame::Loop { variable, items, body } => match items.next_value() {
                    Some(value) => {
                        let variable = variable.clone();
                        let body = Arc::clone(body);
                        self.scopes.enter();
                        self.scopes.define(variable, value);
                        self.frames.push(Frame::Block {
                            block: body,
                            next: 0,
                            owns_scope: true,
                        });
                    }
                    None => {
                        self.frames.pop();
                    }
                },
            }
        }
    }

    async fn execute(&mut self, stmt: &Statement, mode: Mode) -> EvalResult<Flow> {
        match stmt {
            Statement::Command(call) => self.execute_command(call, mode).await,
            Statement::If(stmt) => {
                let condition = self.eval_expression(&stmt.condition)?;
                let branch = if condition.is_truthy() {
                    Some(&stmt.then_block)
                } else {
                    stmt.else_block.as_ref()
                };
                if let Some(block) = branch {
                    self.scopes.enter();
                    self.frames.push(Frame::Block {
                        block: Arc::clone(block),
                        next: 0,
                        owns_scope: true,
                    });
                }
                Ok(Flow::Continue)
            }
            Statement::For(stmt) => {
                let items = self.loop_items(stmt)?;
                debug!(line = stmt.line, variable = %stmt.variable, "entering loop");
                self.frames.push(Frame::Loop {
                    variable: stmt.variable.clone(),
                    items,
                    body: Arc::clone(&stmt.body),
                });
                Ok(Flow::Continue)
            }
        }
    }

    fn loop_items(&self, stmt: &ForLoopStatement) -> EvalResult<LoopItems> {
        match &stmt.source {
            LoopSource::Range { from, to } => {
                let start = self.eval_expression(from)?;
                let end = self.eval_expression(to)?;
                match (start.as_number(), end.as_number()) {
                    (Some(a), Some(b)) if a.is_finite() && b.is_finite() => {
                        let (a, b) = (a.floor(), b.floor());
                        if a.abs() > MAX_LOOP_BOUND || b.abs() > MAX_LOOP_BOUND {
                            return Err(EvalError::Type(format!(
                                "loop bounds must be between -2^53 and 2^53, got {} and {} (line {})",
                                start, end, stmt.line
                            )));
                        }
                        Ok(LoopItems::Range {
                            next: Some(a as i64),
                            last: b as i64,
                        })
                    }
                    _ => Err(EvalError::Type(format!(
                        "loop bounds must be numbers, got {} and {} (line {})",
                        start.type_name(),
                        end.type_name(),
                        stmt.line
                    ))),
                }
            }
            LoopSource::Collection(expr) => match self.eval_expression(expr)? {
                Value::String(s) if s.trim().is_empty() => Ok(LoopItems::List(VecDeque::new())),
                Value::String(s) => Ok(LoopItems::List(
                    s.split(',').map(|item| item.trim().to_string()).collect(),
                )),
                other => Err(EvalError::Type(format!(
                    "'for ... in' expects a comma-separated string, got {} (line {})",
                    other.type_name(),
                    stmt.line
                ))),
            },
        }
    }

    fn eval_expression(&self, expr: &Expression) -> EvalResult<Value> {
        match expr {
            Expression::Literal(lit) => Ok(Value::from(lit)),
            Expression::Identifier(name) => self.scopes.resolve(name),
            Expression::Binary { left, op, right } => {
                let lhs = self.eval_expression(left)?;
                let rhs = self.eval_expression(right)?;
                Ok(Value::Boolean(lhs.compare(*op, &rhs)))
            }
        }
    }

    fn eval_args(&self, args: &[Expression]) -> EvalResult<Vec<Value>> {
        args.iter().map(|arg| self.eval_expression(arg)).collect()
    }

    async fn execute_command(&mut self, call: &CommandStatement, mode: Mode) -> EvalResult<Flow> {
        let line = call.line;
        debug!(line, command = %call.name, "executing command");

        match call.name.as_str() {
            "print" => {
                let args = self.eval_args(&call.args)?;
                let template = args.first().map(Value::as_string).unwrap_or_default();
                let text = self.interpolate(&template);
                self.console.push(text);
            }
            "create" => {
                let (kind, rest) = match call.args.split_first() {
                    Some((first, rest)) => (self.element_kind(first)?, rest),
                    None => {
                        return Err(EvalError::Type(format!(
                            "create requires an element kind: create button \"Label\" (line {})",
                            line
                        )))
                    }
                };
                let rest = self.eval_args(rest)?;
                let text = rest.first().map(Value::as_string).unwrap_or_default();
                let element_id = self.presenter.create_element(&kind, &text);
                debug!(line, kind = %kind, element_id = %element_id, "element created");

                if let Some(block) = &call.callback {
                    self.register_event(element_id, Arc::clone(block));
                }
            }
            "ask" => return self.ask(call, mode),
            GENERATE_COMMAND => {
                let args = self.eval_args(&call.args)?;
                let prompt = args.first().map(Value::as_string).ok_or_else(|| {
                    EvalError::Type(format!(
                        "{} requires a prompt (line {})",
                        GENERATE_COMMAND, line
                    ))
                })?;

                let request = format!("{}{}", GENERATION_PREAMBLE, prompt);
                let generated = self.generator.generate(&request).await;
                let markup = strip_code_fence(&generated);

                if markup.is_empty() {
                    self.console.push(format!("// {}: no content generated", GENERATE_COMMAND));
                } else {
                    info!(line, bytes = markup.len(), "generated markup appended");
                    self.presenter.append_raw_markup(markup);
                }
            }
            other => {
                warn!(line, command = %other, "unknown command");
                self.console.push(format!("// unknown command '{}'", other));
            }
        }
        Ok(Flow::Continue)
    }

    /// The element kind is usually written bare (`create button "Go"`); an
    /// identifier that is not bound is taken as the kind name itself.
    fn element_kind(&self, expr: &Expression) -> EvalResult<String> {
        match expr {
            Expression::Identifier(name) => Ok(self
                .scopes
                .lookup(name)
                .map(Value::as_string)
                .unwrap_or_else(|| name.clone())),
            other => Ok(self.eval_expression(other)?.as_string()),
        }
    }

    fn ask(&mut self, call: &CommandStatement, mode: Mode) -> EvalResult<Flow> {
        // The target is `-> name`, or a trailing bare identifier. Either way
        // it names the binding and is not evaluated.
        let (prompt_args, target) = match (&call.binding, call.args.split_last()) {
            (Some(name), _) => (&call.args[..], name.clone()),
            (None, Some((Expression::Identifier(name), rest))) => (rest, name.clone()),
            _ => {
                return Err(EvalError::Type(format!(
                    "ask requires a variable name: ask \"Question?\" -> name (line {})",
                    call.line
                )))
            }
        };
        let args = self.eval_args(prompt_args)?;
        let question = args.first().map(Value::as_string).unwrap_or_default();

        if mode == Mode::Callback {
            warn!(line = call.line, "ask ignored inside event handler");
            self.console.push("// ask is not available inside event handlers".to_string());
            return Ok(Flow::Continue);
        }

        self.pending = Some(PendingInput {
            variable_name: target,
            question,
        });
        Ok(Flow::Suspend)
    }

    fn register_event(&mut self, element_id: String, block: Arc<Block>) {
        let event_id = format!("event-{}", Uuid::new_v4());
        info!(event_id = %event_id, element_id = %element_id, "registered onClick handler");
        self.events.push(EventRegistration {
            event_id,
            element_id,
            block,
            scope: self.scopes.current(),
        });
    }

    /// Replaces every `${name}` whose name resolves in the scope chain.
    /// Unresolved placeholders are kept verbatim.
    fn interpolate(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let name = &after[..end];
            match self.scopes.lookup(name) {
                Some(value) => out.push_str(&value.to_string()),
                None => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("status", &self.status)
            .field("frames", &self.frames.len())
            .field("scopes", &self.scopes.len())
            .field("console", &self.console.len())
            .field("events", &self.events.len())
            .field("pending", &self.pending)
            .field("presenter", &"<dyn Presenter>")
            .field("generator", &"<dyn Generator>")
            .finish()
    }
}

/// Trims generated text and removes a surrounding Markdown code fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "html") on the opening line.
    let body = body.split_once('\n').map_or("", |(_, rest)| rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
