use crate::error::ShellError;
use crate::lexer::{Operator, Token, Word};
use crate::scanner::{self, OperatorScan};

/// Files a single command reads from and writes to instead of the standard
/// streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirection {
    /// Path following `<`.
    pub input: Option<String>,
    /// Path following `>`.
    pub output: Option<String>,
}

/// AST node for one command line.
///
/// The line is parsed once into this tree; chaining and piping walk the tree
/// instead of re-tokenizing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
    /// Links joined by `&&`. A link runs only if every link before it
    /// succeeded.
    Sequence(Vec<AstNode>),

    /// Commands connected by `|`, in execution order. Each command's output
    /// becomes arguments of the next one.
    Pipeline(Vec<AstNode>),

    /// A simple command unit.
    Command {
        /// The verb followed by its arguments (`argv[0]`, `argv[1]`, ...).
        argv: Vec<Word>,
        redirect: Redirection,
    },
}

/// A parsed line together with the trailing-`&` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub root: AstNode,
    pub background: bool,
}

struct AstBuilder<'a> {
    tokens: &'a [Token],
}

impl<'a> AstBuilder<'a> {
    fn from(tokens: &'a [Token]) -> Self {
        AstBuilder { tokens }
    }

    fn build_ast(self) -> Result<ParsedLine, ShellError> {
        let (body, background) = scanner::strip_background(self.tokens);
        let scan = OperatorScan::line(body)?;
        tracing::trace!(?scan, "operators located");
        let root = Self::parse_sequence(body)?;
        Ok(ParsedLine { root, background })
    }

    /// sequence: pipeline ('&&' pipeline)*
    fn parse_sequence(tokens: &[Token]) -> Result<AstNode, ShellError> {
        let mut links = scanner::split_on(tokens, Operator::And)?
            .into_iter()
            .map(Self::parse_pipeline)
            .collect::<Result<Vec<_>, _>>()?;

        if links.len() == 1 {
            Ok(links.remove(0))
        } else {
            Ok(AstNode::Sequence(links))
        }
    }

    /// pipeline: command ('|' command)*
    fn parse_pipeline(tokens: &[Token]) -> Result<AstNode, ShellError> {
        let mut commands = scanner::split_on(tokens, Operator::Pipe)?
            .into_iter()
            .map(Self::parse_command)
            .collect::<Result<Vec<_>, _>>()?;

        if commands.len() == 1 {
            Ok(commands.remove(0))
        } else {
            Ok(AstNode::Pipeline(commands))
        }
    }

    /// command: word (word | '=' | '<' word | '>' word)*
    fn parse_command(tokens: &[Token]) -> Result<AstNode, ShellError> {
        if let Some(Token::Op(op)) = tokens.first() {
            return Err(ShellError::invalid(format!("`{op}` has no command before it")));
        }
        let scan = OperatorScan::segment(tokens)?;

        let is_operator = |i: usize| Some(i) == scan.input || Some(i) == scan.output;
        let target_of = |op: Option<usize>| op.map(|p| p + 1);

        let mut argv = Vec::new();
        let mut redirect = Redirection::default();

        for (i, token) in tokens.iter().enumerate() {
            if is_operator(i) {
                continue;
            }
            match token {
                Token::Word(word) if Some(i) == target_of(scan.input) => {
                    redirect.input = Some(word.text().to_string());
                }
                Token::Word(word) if Some(i) == target_of(scan.output) => {
                    redirect.output = Some(word.text().to_string());
                }
                Token::Word(word) => argv.push(word.clone()),
                // Meaningful to `setenv` only; everyone else sees a plain `=`.
                Token::Op(Operator::Assign) => argv.push(Word::Literal("=".to_string())),
                Token::Op(op) => return Err(ShellError::invalid(format!("unexpected `{op}`"))),
            }
        }

        Ok(AstNode::Command { argv, redirect })
    }
}

/// Constructs the operator tree for one tokenized line.
///
/// The whole line is validated here, before anything executes: a bad segment
/// at the end of a `&&` chain stops the first link from running too.
pub fn construct_ast(tokens: &[Token]) -> Result<ParsedLine, ShellError> {
    AstBuilder::from(tokens).build_ast()
}
