use crate::env::SharedEnvironment;
use crate::lexer::Word;
use anyhow::Result;
use std::io::Read;
use std::process::Stdio;

/// Lines produced by a command that have not been routed to a destination yet.
///
/// Only the Output Router decides whether they end up on standard output, in
/// a file, or as arguments of a piped-to command.
pub type Output = Vec<String>;

/// Abstraction over a readable input stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// A blanket implementation exists for any type that implements `Read` and
/// `Into<Stdio>` (e.g. `File`).
pub trait Stdin: Read {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Read + Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Everything a command runs with besides its own arguments.
pub struct Invocation<'a> {
    /// The `<` file, or `None` when standard input is inherited.
    pub stdin: Option<Box<dyn Stdin>>,
    /// Set when the router needs the produced lines (pipe or `>`). When clear,
    /// an external command writes straight to the shell's standard output.
    pub capture: bool,
    pub env: &'a SharedEnvironment,
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command, returning the lines it produced.
    fn execute(self: Box<Self>, invocation: Invocation<'_>) -> Result<Output>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`. Factories
/// are shared with background tasks, hence `Send + Sync`.
pub trait CommandFactory: Send + Sync {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[Word]) -> Option<Box<dyn ExecutableCommand>>;
}
