use crate::command::{CommandFactory, ExecutableCommand, Invocation, Output};
use crate::env::Environment;
use crate::error::ShellError;
use crate::interpreter::Factory;
use crate::lexer::Word;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use regex::Regex;
use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::LazyLock;

static VAR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid variable name pattern"));

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. Arguments reach them as written,
/// so a quoted literal still carries its quotes.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command against a private copy of the environment; what it
    /// changes is committed back once it succeeds.
    ///
    /// `stdin` is the `<` file when one was given. The produced lines are
    /// returned, never written: the router decides where they go.
    fn execute(self, stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, invocation: Invocation<'_>) -> Result<Output> {
        let Invocation { mut stdin, env, .. } = invocation;
        tracing::debug!(builtin = T::name(), "running built-in");
        // The shared lock is held only to copy and to commit, never across I/O.
        let before = env.snapshot();
        let mut local = before.clone();
        let output =
            <T as BuiltinCommand>::execute(*self, stdin.as_mut().map(|s| s as &mut dyn Read), &mut local)?;
        env.commit(&before, local);
        Ok(output)
    }
}

/// Stands in for a built-in whose arguments argh refused, or that was asked
/// for `--help`.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, _invocation: Invocation<'_>) -> Result<Output> {
        if self.is_error {
            return Err(ShellError::invalid(self.output.trim_end()).into());
        }
        Ok(self.output.lines().map(str::to_string).collect())
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[Word]) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        let raw: Vec<String> = args.iter().map(Word::raw).collect();
        // Operands may start with `-`; only a lone `--help` is a flag.
        let raw: Vec<&str> = match raw.as_slice() {
            [flag] if flag == "--help" => vec![flag.as_str()],
            _ => std::iter::once("--").chain(raw.iter().map(String::as_str)).collect(),
        };
        Some(match T::from_args(&[name], &raw) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

fn is_quoted(arg: &str) -> bool {
    arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"')
}

/// Strips one pair of enclosing double quotes, if present.
fn unquote(arg: &str) -> &str {
    if is_quoted(arg) {
        &arg[1..arg.len() - 1]
    } else {
        arg
    }
}

fn required<'a>(verb: &'static str, arg: &'a Option<String>) -> Result<&'a str, ShellError> {
    arg.as_deref()
        .map(unquote)
        .ok_or(ShellError::PathRequired(verb))
}

/// Exactly two operands, unquoted.
fn operand_pair<'a>(verb: &'static str, paths: &'a [String]) -> Result<(&'a str, &'a str), ShellError> {
    match paths {
        [from, to] => Ok((unquote(from), unquote(to))),
        [] | [_] => Err(ShellError::PathRequired(verb)),
        _ => Err(ShellError::invalid(format!("{verb}: expected two operands"))),
    }
}

fn read_lines(reader: impl Read, lines: &mut Output) -> std::io::Result<()> {
    for line in BufReader::new(reader).lines() {
        lines.push(line?);
    }
    Ok(())
}

#[derive(FromArgs)]
/// change the working directory; `/` when no target is given.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        let target = self.target.as_deref().map(unquote).unwrap_or("/");
        let new_dir = env.resolve(target);

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: {}", new_dir.display()))?;
        if !canonical.is_dir() {
            anyhow::bail!("cd: {}: not a directory", canonical.display());
        }

        env.current_dir = canonical;
        Ok(Vec::new())
    }
}

#[derive(FromArgs)]
/// print the current working directory.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        // The directory may have been removed from under us.
        fs::metadata(&env.current_dir)
            .with_context(|| format!("pwd: {}", env.current_dir.display()))?;
        Ok(vec![env.current_dir.to_string_lossy().into_owned()])
    }
}

#[derive(FromArgs)]
/// create a directory with default permissions.
pub struct Mkdir {
    #[argh(positional)]
    /// directory to create.
    pub path: Option<String>,
}

impl BuiltinCommand for Mkdir {
    fn name() -> &'static str {
        "mkdir"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        let path = required("mkdir", &self.path)?;
        fs::create_dir(env.resolve(path)).with_context(|| format!("mkdir: {}", path))?;
        Ok(Vec::new())
    }
}

#[derive(FromArgs)]
/// move a file; into the target when the target is a directory.
pub struct Mv {
    #[argh(positional, greedy)]
    /// file or directory to move, then the new name or directory to move into.
    pub paths: Vec<String>,
}

impl BuiltinCommand for Mv {
    fn name() -> &'static str {
        "mv"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        let (source, target) = operand_pair("mv", &self.paths)?;
        let source = env.resolve(source);
        let target = env.resolve(target);

        match fs::metadata(&target) {
            Ok(meta) if meta.is_dir() => {
                let name = source.file_name().ok_or_else(|| {
                    ShellError::invalid(format!("mv: {}: no file name", source.display()))
                })?;
                let dest = target.join(name);
                if source.is_dir() {
                    fs::rename(&source, &dest)
                        .with_context(|| format!("mv: {}", source.display()))?;
                } else {
                    fs::copy(&source, &dest)
                        .with_context(|| format!("mv: {}", source.display()))?;
                    fs::remove_file(&source)
                        .with_context(|| format!("mv: {}", source.display()))?;
                }
            }
            Ok(_) => fs::rename(&source, &target)
                .with_context(|| format!("mv: {}", source.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => fs::rename(&source, &target)
                .with_context(|| format!("mv: {}", source.display()))?,
            Err(e) => return Err(e).with_context(|| format!("mv: {}", target.display())),
        }
        Ok(Vec::new())
    }
}

#[derive(FromArgs)]
/// rename a file or directory.
pub struct Rename {
    #[argh(positional, greedy)]
    /// current name, then new name.
    pub paths: Vec<String>,
}

impl BuiltinCommand for Rename {
    fn name() -> &'static str {
        "rename"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        let (from, to) = operand_pair("rename", &self.paths)?;
        fs::rename(env.resolve(from), env.resolve(to))
            .with_context(|| format!("rename: {}", from))?;
        Ok(Vec::new())
    }
}

#[derive(FromArgs)]
/// remove files and empty directories, in order, stopping at the first failure.
pub struct Rm {
    #[argh(positional, greedy)]
    /// paths to remove.
    pub paths: Vec<String>,
}

impl BuiltinCommand for Rm {
    fn name() -> &'static str {
        "rm"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        if self.paths.is_empty() {
            return Err(ShellError::PathRequired("rm").into());
        }
        for path in &self.paths {
            let path = unquote(path);
            let resolved = env.resolve(path);
            let meta =
                fs::symlink_metadata(&resolved).with_context(|| format!("rm: {}", path))?;
            let removed = if meta.is_dir() {
                fs::remove_dir(&resolved)
            } else {
                fs::remove_file(&resolved)
            };
            removed.with_context(|| format!("rm: {}", path))?;
        }
        Ok(Vec::new())
    }
}

#[derive(FromArgs)]
/// print the process id of the shell.
pub struct Getpid {}

impl BuiltinCommand for Getpid {
    fn name() -> &'static str {
        "getpid"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, _env: &mut Environment) -> Result<Output> {
        Ok(vec![std::process::id().to_string()])
    }
}

#[derive(FromArgs)]
/// set an environment variable: `setenv key = value`.
pub struct Setenv {
    #[argh(positional, greedy)]
    /// the key, `=` and the value.
    pub parts: Vec<String>,
}

impl BuiltinCommand for Setenv {
    fn name() -> &'static str {
        "setenv"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        let [key, eq, value] = self.parts.as_slice() else {
            return Err(ShellError::invalid("setenv: expected `key = value`").into());
        };
        if eq != "=" {
            return Err(ShellError::invalid("setenv: expected `key = value`").into());
        }

        let key = unquote(key);
        if !VAR_NAME.is_match(key) {
            return Err(
                ShellError::invalid(format!("setenv: `{key}` is not a valid variable name")).into(),
            );
        }

        env.set_var(key, unquote(value));
        Ok(Vec::new())
    }
}

#[derive(FromArgs)]
/// print the value of an environment variable, if it is set and not empty.
pub struct Getenv {
    #[argh(positional)]
    /// variable name.
    pub key: Option<String>,
}

impl BuiltinCommand for Getenv {
    fn name() -> &'static str {
        "getenv"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        let value = self
            .key
            .as_deref()
            .and_then(|key| env.get_var(unquote(key)))
            .filter(|value| !value.is_empty());
        Ok(value.map(str::to_string).into_iter().collect())
    }
}

#[derive(FromArgs)]
/// remove an environment variable.
pub struct Unset {
    #[argh(positional)]
    /// variable name.
    pub key: Option<String>,
}

impl BuiltinCommand for Unset {
    fn name() -> &'static str {
        "unset"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        let key = required("unset", &self.key)?;
        env.remove_var(key);
        Ok(Vec::new())
    }
}

#[derive(FromArgs)]
/// print quoted literals without their quotes, separated by spaces.
pub struct Echo {
    #[argh(positional, greedy)]
    /// quoted literals to print.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, _env: &mut Environment) -> Result<Output> {
        if self.args.is_empty() {
            return Err(ShellError::invalid("echo: expected a quoted literal").into());
        }
        let mut literals = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            if !is_quoted(arg) {
                return Err(ShellError::invalid(format!("echo: `{arg}` is not quoted")).into());
            }
            literals.push(unquote(arg));
        }
        Ok(literals.join(" ").lines().map(str::to_string).collect())
    }
}

#[derive(FromArgs)]
/// list the entries of the current directory, one per line.
pub struct Ls {}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&env.current_dir)
            .with_context(|| format!("ls: {}", env.current_dir.display()))?
        {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[derive(FromArgs)]
/// print the lines of the redirected input and of each file, in order.
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, stdin: Option<&mut dyn Read>, env: &mut Environment) -> Result<Output> {
        if self.files.is_empty() && stdin.is_none() {
            return Err(ShellError::PathRequired("cat").into());
        }

        let mut lines = Vec::new();
        if let Some(input) = stdin {
            read_lines(input, &mut lines).context("cat: redirected input")?;
        }
        for fname in &self.files {
            let fname = unquote(fname);
            let f = fs::File::open(env.resolve(fname)).with_context(|| format!("cat: {}", fname))?;
            read_lines(f, &mut lines).with_context(|| format!("cat: {}", fname))?;
        }
        Ok(lines)
    }
}

#[derive(FromArgs)]
/// terminate the shell's own process.
pub struct Kill {}

impl BuiltinCommand for Kill {
    fn name() -> &'static str {
        "kill"
    }

    #[cfg(unix)]
    fn execute(self, _stdin: Option<&mut dyn Read>, _env: &mut Environment) -> Result<Output> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        kill(Pid::this(), Signal::SIGKILL).context("kill")?;
        Ok(Vec::new())
    }

    #[cfg(not(unix))]
    fn execute(self, _stdin: Option<&mut dyn Read>, _env: &mut Environment) -> Result<Output> {
        anyhow::bail!("kill: not supported on this platform")
    }
}

#[derive(FromArgs)]
/// exit the shell, background tasks included.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdin: Option<&mut dyn Read>, _env: &mut Environment) -> Result<Output> {
        std::process::exit(0)
    }
}
