//! # oraculo-core
//!
//! Core library for OráculoScript, a small command language for building
//! interactive pages: print lines, create elements with click callbacks, ask
//! the user for input, and generate HTML through an external backend.
//!
//! ## Pipeline
//!
//! ```text
//! source ─▶ lexer::tokenize ─▶ parser::parse ─▶ ast::Program ─▶ evaluator::Evaluator
//! ```
//!
//! ## Modules
//!
//! - [`lexer`] - Source text to located tokens
//! - [`parser`] - Recursive-descent parser producing the [`ast`]
//! - [`value`] - Runtime values, truthiness and loosely-typed comparison
//! - [`scope`] - Lexical scope chain with capturable scopes
//! - [`evaluator`] - Resumable evaluator (`ask` suspends, `submit_input` resumes)
//! - [`host`] - Presentation and content-generation collaborators
//! - [`session`] - Concurrent session store used by the server
//! - [`ipc`] - Unix socket IPC between the CLI and the server
//! - [`config`] - Persistent configuration in `~/.oraculo/config.json`
//!
//! ## Example
//!
//! ```
//! use oraculo_core::evaluator::Evaluator;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let program = oraculo_core::parse(r#"
//! for i from 1 to 3 {
//!     print "step ${i}"
//! }
//! "#).unwrap();
//!
//! let mut evaluator = Evaluator::with_defaults();
//! evaluator.set_program(program);
//! let result = evaluator.run().await;
//! assert_eq!(result.console, vec!["step 1", "step 2", "step 3"]);
//! # });
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod ipc;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod session;
pub mod value;

pub use error::{EvalError, LexError, SyntaxError};
pub use lexer::tokenize;
pub use parser::parse;
