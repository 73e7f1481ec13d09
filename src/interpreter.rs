use crate::command::{CommandFactory, ExecutableCommand, Invocation, Output, Stdin};
use crate::config::ShellConfig;
use crate::env::{Environment, SharedEnvironment};
use crate::lexer::{self, Word};
use crate::parser::{self, AstNode, ParsedLine, Redirection};
use crate::router::{self, Destination};
use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only built-ins and the external command launcher of this crate are supported.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// What happened to a dispatched line.
#[derive(Debug)]
pub enum Dispatch {
    /// The line ran to completion (or was blank).
    Foreground,
    /// The line ends in `&` and runs on its own thread. The interactive loop
    /// drops the handle; it is returned so library callers can wait.
    Background(JoinHandle<()>),
}

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter maintains a [`SharedEnvironment`] and a list of [`CommandFactory`] objects
/// that are queried, in order, to create commands by name. See [`Default`] for the built-in
/// factories included out of the box.
///
/// Cloning is cheap; clones share the environment, which is how background
/// tasks see (and race on) the same working directory and variables as the
/// foreground loop.
///
/// Example
/// ```
/// use minish::Interpreter;
/// let sh = Interpreter::default();
/// let mut out = Vec::new();
/// sh.dispatch("echo \"hello world\"", &mut out).unwrap();
/// assert_eq!(out, b"hello world\n");
/// ```
#[derive(Clone)]
pub struct Interpreter {
    env: SharedEnvironment,
    commands: Arc<Vec<Box<dyn CommandFactory>>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: SharedEnvironment::new(Environment::new()),
            commands: Arc::new(commands),
        }
    }

    /// Replace the captured process environment with `env`.
    pub fn with_environment(self, env: Environment) -> Self {
        Self {
            env: SharedEnvironment::new(env),
            ..self
        }
    }

    pub fn environment(&self) -> &SharedEnvironment {
        &self.env
    }

    /// Run a single command invocation by name with arguments, printing its
    /// output to standard output.
    pub fn run(&self, name: &str, args: &[&str]) -> Result<()> {
        let argv = std::iter::once(name)
            .chain(args.iter().copied())
            .map(|s| Word::Literal(s.to_string()))
            .collect();
        let command = AstNode::Command {
            argv,
            redirect: Redirection::default(),
        };
        self.execute_ast(&command, &mut io::stdout())
    }

    /// Interpret one line: tokenize, build the operator tree, then run it here
    /// or, for a trailing `&`, on a new thread.
    ///
    /// Foreground output is written to `stdout`. Nothing runs unless the whole
    /// line parses.
    pub fn dispatch(&self, line: &str, stdout: &mut dyn Write) -> Result<Dispatch> {
        let tokens = lexer::split_into_tokens(line)?;
        if tokens.is_empty() {
            return Ok(Dispatch::Foreground);
        }
        tracing::debug!(?tokens, "tokenized line");

        let ParsedLine { root, background } = parser::construct_ast(&tokens)?;
        tracing::debug!(?root, background, "parsed line");

        if background {
            let interpreter = self.clone();
            let handle = thread::spawn(move || {
                if let Err(err) = interpreter.execute_ast(&root, &mut io::stdout()) {
                    tracing::warn!(error = %format!("{err:#}"), "background command failed");
                    eprintln!("{err:#}");
                }
            });
            tracing::info!("line dispatched to background");
            return Ok(Dispatch::Background(handle));
        }

        self.execute_ast(&root, stdout)?;
        Ok(Dispatch::Foreground)
    }

    /// Read-Eval-Print Loop: prompt, read a line, dispatch it, report errors
    /// on standard error and keep going.
    pub fn repl(&self, config: &ShellConfig) -> rustyline::Result<()> {
        let editor_config = Config::builder()
            .max_history_size(config.history_size)?
            .build();
        let mut rl = DefaultEditor::with_config(editor_config)?;

        loop {
            match rl.readline(&config.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if let Err(err) = self.dispatch(&line, &mut io::stdout()) {
                        eprintln!("{err:#}");
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    fn execute_ast(&self, root: &AstNode, stdout: &mut dyn Write) -> Result<()> {
        match root {
            AstNode::Sequence(links) => {
                // `&&`: the first failure ends the chain and is the result.
                for link in links {
                    self.execute_ast(link, stdout)?;
                }
                Ok(())
            }
            AstNode::Pipeline(stages) => self.execute_pipeline(stages, stdout),
            AstNode::Command { .. } => self.execute_pipeline(std::slice::from_ref(root), stdout),
        }
    }

    fn execute_pipeline(&self, stages: &[AstNode], stdout: &mut dyn Write) -> Result<()> {
        let mut carried: Option<Output> = None;

        for (i, stage) in stages.iter().enumerate() {
            let AstNode::Command { argv, redirect } = stage else {
                anyhow::bail!("pipeline contains non-command node");
            };

            let mut argv = argv.clone();
            if let Some(lines) = carried.take() {
                router::substitute(&mut argv, lines);
            }

            let piped = i + 1 < stages.len();
            let destination =
                Destination::resolve(piped, redirect.output.as_deref(), &self.env.lock());
            let lines =
                self.execute_command(&argv, redirect.input.as_deref(), destination.captures())?;
            carried = router::route(lines, &destination, stdout)?;
        }

        Ok(())
    }

    fn execute_command(&self, argv: &[Word], input: Option<&str>, capture: bool) -> Result<Output> {
        let (verb, args) = argv.split_first().context("empty command")?;

        let stdin: Option<Box<dyn Stdin>> = match input {
            Some(path) => {
                let path = self.env.lock().resolve(path);
                let file = File::open(&path).with_context(|| format!("{}", path.display()))?;
                Some(Box::new(file))
            }
            None => None,
        };

        let cmd = self.create(verb.text(), args)?;
        cmd.execute(Invocation {
            stdin,
            capture,
            env: &self.env,
        })
    }

    /// The first factory that recognises `name` wins; the external command
    /// factory sits last and recognises everything.
    fn create(&self, name: &str, args: &[Word]) -> Result<Box<dyn ExecutableCommand>> {
        for factory in self.commands.iter() {
            if let Some(cmd) = factory.try_create(name, args) {
                return Ok(cmd);
            }
        }
        Err(anyhow::anyhow!("command not found: {}", name))
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands: every built-in,
    /// then the external command launcher.
    fn default() -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::new(vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Mkdir>::default()),
            Box::new(Factory::<Mv>::default()),
            Box::new(Factory::<Rename>::default()),
            Box::new(Factory::<Rm>::default()),
            Box::new(Factory::<Getpid>::default()),
            Box::new(Factory::<Setenv>::default()),
            Box::new(Factory::<Getenv>::default()),
            Box::new(Factory::<Unset>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Ls>::default()),
            Box::new(Factory::<Cat>::default()),
            Box::new(Factory::<Kill>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}
