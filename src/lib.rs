//! A minimal interactive shell.
//!
//! A line goes through three stages: [`lexer`] splits it into words and
//! operators, [`scanner`] and [`parser`] validate the operators and build a
//! tree of `&&` chains and `|` pipelines, and the [`Interpreter`] runs that
//! tree. Built-in commands run in-process against a shared [`env::Environment`];
//! anything else is launched as a child process. Where each command's lines end
//! up (terminal, `>` file, or the next command) is decided in one place.
//!
//! A line ending in `&` runs on its own thread and shares the environment with
//! the interactive loop.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod external;
mod interpreter;
pub mod lexer;
pub mod parser;
mod router;
pub mod scanner;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Dispatch, Interpreter};

pub use config::ShellConfig;
pub use error::ShellError;
