//! Operator scanning: where the operators of a token stream sit, and whether
//! each of them has the operands it needs.

use crate::error::ShellError;
use crate::lexer::{Operator, Token};

/// Positions of the first occurrence of each operator in a token slice.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OperatorScan {
    pub input: Option<usize>,
    pub output: Option<usize>,
    pub pipe: Option<usize>,
    pub chain: Option<usize>,
}

impl OperatorScan {
    /// Records the first `<`, `>`, `|` and `&&` without validating anything.
    pub fn locate(tokens: &[Token]) -> Self {
        let first = |op| tokens.iter().position(|t| t.is_op(op));
        OperatorScan {
            input: first(Operator::RedirectIn),
            output: first(Operator::RedirectOut),
            pipe: first(Operator::Pipe),
            chain: first(Operator::And),
        }
    }

    /// Scans a whole line: `<` and `>` may each occur once in it, whatever
    /// `|` and `&&` split it into.
    pub fn line(tokens: &[Token]) -> Result<Self, ShellError> {
        let scan = Self::locate(tokens);
        for (first, op) in [
            (scan.input, Operator::RedirectIn),
            (scan.output, Operator::RedirectOut),
        ] {
            if let Some(i) = first {
                if tokens[i + 1..].iter().any(|t| t.is_op(op)) {
                    return Err(ShellError::MultipleRedirection(op.as_str()));
                }
            }
        }
        Ok(scan)
    }

    /// Scans one command segment, a slice with no `|` or `&&` in it.
    ///
    /// Each redirection operator may occur once, never in first position, and
    /// must be followed by a word naming the file.
    pub fn segment(tokens: &[Token]) -> Result<Self, ShellError> {
        let mut scan = OperatorScan::default();

        for (i, token) in tokens.iter().enumerate() {
            let Token::Op(op) = token else { continue };
            let slot = match op {
                Operator::RedirectIn => &mut scan.input,
                Operator::RedirectOut => &mut scan.output,
                Operator::Assign => continue,
                Operator::Background => {
                    return Err(ShellError::invalid("`&` is only allowed at the end of a line"));
                }
                Operator::Pipe | Operator::And => {
                    return Err(ShellError::invalid(format!("unexpected `{op}`")));
                }
            };
            if slot.is_some() {
                return Err(ShellError::MultipleRedirection(op.as_str()));
            }
            if i == 0 {
                return Err(ShellError::invalid(format!("`{op}` has no command before it")));
            }
            if tokens.get(i + 1).and_then(Token::as_word).is_none() {
                return Err(ShellError::invalid(format!("`{op}` is missing a file operand")));
            }
            *slot = Some(i);
        }

        Ok(scan)
    }
}

/// Strips a trailing `&`, reporting whether it was there.
pub fn strip_background(tokens: &[Token]) -> (&[Token], bool) {
    match tokens.split_last() {
        Some((last, rest)) if last.is_op(Operator::Background) => (rest, true),
        _ => (tokens, false),
    }
}

/// Splits `tokens` at every `op`; an empty piece means `op` sits at the first
/// or last position (or next to another operator of its kind) and is missing
/// an operand.
pub fn split_on(tokens: &[Token], op: Operator) -> Result<Vec<&[Token]>, ShellError> {
    let pieces: Vec<&[Token]> = tokens.split(|t| t.is_op(op)).collect();
    if pieces.iter().any(|piece| piece.is_empty()) {
        return Err(ShellError::invalid(format!("`{op}` is missing an operand")));
    }
    Ok(pieces)
}
