//! In-process script runner.
//!
//! Console lines go to stdout as they are produced. `ask` prompts on stderr
//! and reads the answer from stdin. Once the program finishes, each further
//! stdin line selects an event (by index or id) to trigger.

use std::path::PathBuf;

use oraculo_core::config::{GeneratorConfig, OraculoConfig};
use oraculo_core::evaluator::{Evaluator, EventHandlerView, RunResult, Status};
use oraculo_core::host::{generator_from_config, HtmlPresenter};
use oraculo_core::parser::parse;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use crate::CliError;

pub struct RunOptions {
    pub html: Option<PathBuf>,
    pub print_html: bool,
    pub generator: Option<String>,
    pub quiet: bool,
}

type Input = Lines<BufReader<Stdin>>;

pub async fn run_script(source: &str, label: &str, options: RunOptions) -> Result<(), CliError> {
    let program = parse(source).map_err(|e| CliError::Syntax(format!("{}: {}", label, e)))?;

    let generator = options
        .generator
        .clone()
        .map(GeneratorConfig::new)
        .or_else(|| OraculoConfig::load().generator);
    let mut evaluator = Evaluator::new(
        Box::new(HtmlPresenter::new()),
        generator_from_config(generator.as_ref()),
    );
    evaluator.set_program(program);

    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0;
    let mut result = evaluator.run().await;

    loop {
        printed = echo_console(&result, printed);
        let Some(pending) = result.pending_input.clone() else {
            break;
        };
        if !options.quiet {
            eprint!("{} ", pending.question);
        }
        let answer = input
            .next_line()
            .await
            .map_err(|e| CliError::Io(e.to_string()))?
            .ok_or_else(|| {
                CliError::Io(format!(
                    "input ended while waiting for '{}'",
                    pending.variable_name
                ))
            })?;
        evaluator
            .submit_input(&pending.variable_name, answer.trim_end())
            .map_err(|e| CliError::Runtime(e.to_string()))?;
        result = evaluator.run().await;
    }

    if evaluator.status() == Status::Failed {
        write_html(&result, &options)?;
        let message = result
            .console
            .last()
            .map(|line| line.trim_start_matches("runtime error: ").to_string())
            .unwrap_or_default();
        return Err(CliError::Runtime(message));
    }

    if !result.event_handlers.is_empty() {
        result = dispatch_events(&mut evaluator, &mut input, result, printed, options.quiet).await?;
    }

    write_html(&result, &options)
}

async fn dispatch_events(
    evaluator: &mut Evaluator,
    input: &mut Input,
    mut result: RunResult,
    mut printed: usize,
    quiet: bool,
) -> Result<RunResult, CliError> {
    let mut listed = 0;
    loop {
        if !quiet && result.event_handlers.len() > listed {
            list_events(&result.event_handlers, listed);
            listed = result.event_handlers.len();
        }

        let Some(line) = input
            .next_line()
            .await
            .map_err(|e| CliError::Io(e.to_string()))?
        else {
            return Ok(result);
        };
        let choice = line.trim();
        if choice.is_empty() {
            continue;
        }

        let Some(event_id) = resolve_event(choice, &result.event_handlers) else {
            eprintln!("unknown event '{}'", choice);
            continue;
        };
        debug!(event_id = %event_id, "triggering event from stdin");
        result = evaluator
            .trigger_event(&event_id)
            .await
            .map_err(|e| CliError::Runtime(e.to_string()))?;
        printed = echo_console(&result, printed);
    }
}

fn list_events(handlers: &[EventHandlerView], from: usize) {
    for (index, handler) in handlers.iter().enumerate().skip(from) {
        eprintln!(
            "[{}] {} ({} on {})",
            index, handler.event_id, handler.event_type, handler.element_id
        );
    }
}

/// Accepts a list index or a full event id.
fn resolve_event(choice: &str, handlers: &[EventHandlerView]) -> Option<String> {
    if let Ok(index) = choice.parse::<usize>() {
        return handlers.get(index).map(|h| h.event_id.clone());
    }
    handlers
        .iter()
        .find(|h| h.event_id == choice)
        .map(|h| h.event_id.clone())
}

/// Prints console lines not yet shown and returns the new count.
fn echo_console(result: &RunResult, printed: usize) -> usize {
    for line in result.console.get(printed..).unwrap_or_default() {
        println!("{}", line);
    }
    result.console.len()
}

fn write_html(result: &RunResult, options: &RunOptions) -> Result<(), CliError> {
    if let Some(path) = &options.html {
        std::fs::write(path, result.html_output())
            .map_err(|e| CliError::Io(format!("{}: {}", path.display(), e)))?;
    }
    if options.print_html && !result.html.is_empty() {
        println!("{}", result.html_output());
    }
    Ok(())
}
