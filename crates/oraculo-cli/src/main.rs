//! Command-line runner and IPC client for OráculoScript.
//!
//! Runs scripts in-process, checks them for syntax errors, or drives
//! sessions on a running `oraculo-server` over Unix socket IPC.
//!
//! # Usage
//!
//! ```bash
//! # Run a script; `ask` prompts on stderr and reads answers from stdin
//! oraculo run greeting.ora
//!
//! # Read the script from stdin and write the HTML to a file
//! cat page.ora | oraculo run --html page.html
//!
//! # Generate markup for ai.craftHtml with an external program
//! oraculo run page.ora --generator llm-html --print-html
//!
//! # Syntax check only
//! oraculo check page.ora
//!
//! # Drive a session on a running server
//! oraculo remote start page.ora
//! oraculo remote submit <SESSION> name Ada
//! oraculo remote trigger <SESSION> event-...
//! oraculo remote end <SESSION>
//!
//! # Connect to a specific server
//! oraculo -s staging remote start page.ora
//! ```

mod local;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use oraculo_core::ipc::{oraculo_dir, IpcClient, IpcRequest, IpcResponse};
use oraculo_core::parser::parse;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use local::RunOptions;

/// Command-line runner and IPC client for OráculoScript.
#[derive(Parser)]
#[command(name = "oraculo")]
#[command(about = "Run OráculoScript programs locally or on an oraculo server")]
#[command(version)]
struct Cli {
    /// Server name to connect to
    #[arg(short, long, default_value = "default", env = "ORACULO_SOCKET")]
    socket: String,

    /// Suppress prompts and event listings on stderr
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script in-process
    Run {
        /// Path to the script (reads from stdin if omitted)
        script: Option<PathBuf>,
        /// Write the generated HTML to this file
        #[arg(long)]
        html: Option<PathBuf>,
        /// Print the generated HTML after the console output
        #[arg(long)]
        print_html: bool,
        /// Program backing ai.craftHtml (overrides the config file)
        #[arg(short, long, env = "ORACULO_GENERATOR")]
        generator: Option<String>,
    },

    /// Parse a script without running it
    Check {
        /// Path to the script
        script: PathBuf,
    },

    /// List all running oraculo servers
    Servers,

    /// Send a request to a running server
    Remote {
        #[command(subcommand)]
        action: RemoteCommand,
    },
}

#[derive(Subcommand)]
enum RemoteCommand {
    /// Interpret a script in a new session, or replace a session's program
    Start {
        /// Path to the script
        script: PathBuf,
        /// Existing session to reuse
        #[arg(long)]
        session: Option<Uuid>,
    },

    /// Run a session from where it stopped
    Continue {
        session: Uuid,
    },

    /// Answer a pending `ask`
    Submit {
        session: Uuid,
        /// Variable named by the pending ask
        variable: String,
        value: String,
    },

    /// Trigger a registered event
    Trigger {
        session: Uuid,
        /// Event id (event-...)
        event: String,
    },

    /// End a session
    End {
        session: Uuid,
    },

    /// Stop the server
    Stop,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
pub(crate) enum CliError {
    Syntax(String),
    Runtime(String),
    Io(String),
    Remote(String),
}

impl CliError {
    fn code(&self) -> u8 {
        match self {
            CliError::Syntax(_) => 2,
            CliError::Runtime(_) => 3,
            CliError::Io(_) => 4,
            CliError::Remote(_) => 5,
        }
    }

    fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Syntax(msg) => write!(f, "Syntax error: {}", msg),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            CliError::Io(msg) => write!(f, "IO error: {}", msg),
            CliError::Remote(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

fn discover_servers() -> Vec<String> {
    let pattern = oraculo_dir().join("oraculo_*.sock");
    glob::glob(pattern.to_str().unwrap_or_default())
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            entry.ok().and_then(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.strip_prefix("oraculo_"))
                    .map(String::from)
            })
        })
        .collect()
}

fn read_script(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::Io(format!("{}: {}", path.display(), e)))
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Run {
            script,
            html,
            print_html,
            generator,
        } => {
            let (source, label) = match &script {
                Some(path) => (read_script(path)?, path.display().to_string()),
                None => {
                    let mut source = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut source)
                        .await
                        .map_err(|e| CliError::Io(format!("stdin: {}", e)))?;
                    (source, "<stdin>".to_string())
                }
            };
            let options = RunOptions {
                html,
                print_html,
                generator,
                quiet: cli.quiet,
            };
            local::run_script(&source, &label, options).await
        }
        Command::Check { script } => {
            let source = read_script(&script)?;
            parse(&source)
                .map_err(|e| CliError::Syntax(format!("{}: {}", script.display(), e)))?;
            println!("ok");
            Ok(())
        }
        Command::Servers => {
            let servers = discover_servers();
            if servers.is_empty() {
                if !cli.quiet {
                    eprintln!("No running servers found");
                }
            } else {
                for server in servers {
                    println!("{}", server);
                }
            }
            Ok(())
        }
        Command::Remote { action } => remote(&cli.socket, action).await,
    }
}

async fn remote(socket: &str, action: RemoteCommand) -> Result<(), CliError> {
    let request = match action {
        RemoteCommand::Start { script, session } => IpcRequest::Interpret {
            code: read_script(&script)?,
            session_id: session,
        },
        RemoteCommand::Continue { session } => IpcRequest::Continue { session_id: session },
        RemoteCommand::Submit {
            session,
            variable,
            value,
        } => IpcRequest::SubmitInput {
            session_id: session,
            variable_name: variable,
            input_value: value,
        },
        RemoteCommand::Trigger { session, event } => IpcRequest::TriggerEvent {
            session_id: session,
            event_id: event,
        },
        RemoteCommand::End { session } => IpcRequest::EndSession { session_id: session },
        RemoteCommand::Stop => IpcRequest::Shutdown,
    };

    let mut client = IpcClient::connect(socket).await.map_err(|e| {
        CliError::Remote(format!(
            "Failed to connect to server '{}': {}. Is oraculo-server running?",
            socket, e
        ))
    })?;
    let response = client
        .send(&request)
        .await
        .map_err(|e| CliError::Remote(format!("Failed to send request: {}", e)))?;

    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| CliError::Remote(e.to_string()))?;
    println!("{}", json);

    match response {
        IpcResponse::Error { message } => Err(CliError::Remote(message)),
        _ => Ok(()),
    }
}
