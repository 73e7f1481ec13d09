//! Output routing: the one place that decides where a command's lines go and
//! how they are formatted.
//!
//! Formatting rule: every line is written followed by `\n`, to standard output
//! and to files alike. A command that produced no lines writes nothing, but a
//! `>` target is still created (or truncated).

use crate::command::Output;
use crate::env::Environment;
use crate::lexer::Word;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Where the lines of one command end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    /// The resolved `>` target.
    File(PathBuf),
    /// Arguments of the next command in the pipeline.
    Pipe,
}

impl Destination {
    /// Priority order: a following `|` wins over `>`, which wins over standard
    /// output.
    pub fn resolve(piped: bool, output: Option<&str>, env: &Environment) -> Self {
        match (piped, output) {
            (true, _) => Destination::Pipe,
            (false, Some(path)) => Destination::File(env.resolve(path)),
            (false, None) => Destination::Stdout,
        }
    }

    /// Whether the producing command has to hand its lines over instead of
    /// writing to the terminal itself.
    pub fn captures(&self) -> bool {
        !matches!(self, Destination::Stdout)
    }
}

/// Delivers `lines` to `destination`. The lines come back only for
/// [`Destination::Pipe`], to be substituted into the next command.
pub fn route(
    lines: Output,
    destination: &Destination,
    stdout: &mut dyn Write,
) -> Result<Option<Output>> {
    match destination {
        Destination::Pipe => Ok(Some(lines)),
        Destination::File(path) => {
            let file = File::create(path).with_context(|| format!("{}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_lines(&mut writer, &lines)?;
            writer.flush().with_context(|| format!("{}", path.display()))?;
            Ok(None)
        }
        Destination::Stdout => {
            write_lines(stdout, &lines)?;
            stdout.flush()?;
            Ok(None)
        }
    }
}

fn write_lines(writer: &mut dyn Write, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}

/// Appends the upstream `lines` to the arguments of the piped-to command, one
/// argument per non-empty line.
///
/// `echo` only prints quoted literals, so for it the lines are joined into a
/// single quoted literal instead.
pub fn substitute(argv: &mut Vec<Word>, lines: Output) {
    let to_echo = argv.first().is_some_and(|verb| verb.text() == "echo");
    if to_echo {
        argv.push(Word::Quoted(lines.join("\n")));
    } else {
        argv.extend(
            lines
                .into_iter()
                .filter(|line| !line.is_empty())
                .map(Word::Literal),
        );
    }
}
