//! A module implementing lexical analysis (tokenization) of one command line.
//!
//! The lexer knows three things: whitespace separates words, a double-quoted
//! region is one literal no matter what it contains, and the operator
//! characters `<`, `>`, `|`, `&&`, `&` and `=` always stand on their own even
//! when written flush against other text (`ls>out` is `ls`, `>`, `out`).

use std::fmt;
use thiserror::Error;

/// Operators recognised on a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Input redirection, `<`.
    RedirectIn,
    /// Output redirection, `>`.
    RedirectOut,
    /// The pipe operator, `|`.
    Pipe,
    /// Conditional chaining, `&&`.
    And,
    /// Background execution, `&`.
    Background,
    /// The equality symbol, `=`.
    Assign,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::RedirectIn => "<",
            Operator::RedirectOut => ">",
            Operator::Pipe => "|",
            Operator::And => "&&",
            Operator::Background => "&",
            Operator::Assign => "=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-operator token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Word {
    /// Plain text that contained no quotes.
    Literal(String),
    /// The interior of a double-quoted region, interior spaces preserved.
    Quoted(String),
}

impl Word {
    /// Text of the word with the enclosing quotes removed.
    pub fn text(&self) -> &str {
        match self {
            Word::Literal(s) | Word::Quoted(s) => s,
        }
    }

    /// The word as it was written, enclosing quotes retained.
    pub fn raw(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Word::Literal(s) => f.write_str(s),
            Word::Quoted(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(Word),
    Op(Operator),
}

impl Token {
    pub fn is_op(&self, op: Operator) -> bool {
        matches!(self, Token::Op(o) if *o == op)
    }

    pub fn as_word(&self) -> Option<&Word> {
        match self {
            Token::Word(w) => Some(w),
            Token::Op(_) => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => w.fmt(f),
            Token::Op(op) => op.fmt(f),
        }
    }
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// A closing double quote was not found.
    #[error("parse error: unterminated quoted string")]
    UnfinishedQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    /// Runs the machine over the whole line.
    ///
    /// Zero-length words are never emitted: an empty quoted region or a word
    /// interrupted before its first character simply produces no token.
    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch, &mut out),
            }
        }

        if self.state == LexingState::ReadingDoubleQuote {
            return Err(LexingError::UnfinishedQuote);
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            c if c.is_whitespace() => {}
            '"' => self.state = LexingState::ReadingDoubleQuote,
            c if is_operator_char(c) => self.push_operator(c, out),
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            c if c.is_whitespace() => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '"' => {
                self.finish_word(out);
                self.state = LexingState::ReadingDoubleQuote;
            }
            c if is_operator_char(c) => {
                self.finish_word(out);
                self.push_operator(c, out);
                self.state = LexingState::Start;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            '"' => {
                if !self.buffer.is_empty() {
                    out.push(Token::Word(Word::Quoted(std::mem::take(&mut self.buffer))));
                }
                self.state = LexingState::Start;
            }
            c => self.buffer.push(c),
        }
    }

    fn push_operator(&mut self, ch: char, out: &mut Vec<Token>) {
        let op = match ch {
            '<' => Operator::RedirectIn,
            '>' => Operator::RedirectOut,
            '|' => Operator::Pipe,
            '=' => Operator::Assign,
            '&' if self.peek_char() == Some('&') => {
                self.read_char();
                Operator::And
            }
            '&' => Operator::Background,
            _ => unreachable!("not an operator character: {ch:?}"),
        };
        out.push(Token::Op(op));
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        if !self.buffer.is_empty() {
            out.push(Token::Word(Word::Literal(std::mem::take(&mut self.buffer))));
        }
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '|' | '&' | '=')
}

/// The main entry point function to perform lexical analysis.
///
/// The trailing newline of a line read from a terminal is treated like any
/// other whitespace. The returned stream keeps the original left-to-right
/// order.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(line).make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Token {
        Token::Word(Word::Literal(s.to_string()))
    }

    fn quoted(s: &str) -> Token {
        Token::Word(Word::Quoted(s.to_string()))
    }

    #[test]
    fn splits_on_whitespace_and_drops_newline() {
        let tokens = split_into_tokens("ls   -la\tsrc\n").unwrap();
        assert_eq!(tokens, vec![lit("ls"), lit("-la"), lit("src")]);
    }

    #[test]
    fn quoted_region_is_one_token() {
        let tokens = split_into_tokens("echo \"hello   world\"").unwrap();
        assert_eq!(tokens, vec![lit("echo"), quoted("hello   world")]);
        assert_eq!(tokens[1].to_string(), "\"hello   world\"");
    }

    #[test]
    fn operators_inside_quotes_are_literal() {
        let tokens = split_into_tokens("echo \"a > b && c | d\"").unwrap();
        assert_eq!(tokens, vec![lit("echo"), quoted("a > b && c | d")]);
    }

    #[test]
    fn operators_split_from_adjacent_text() {
        let tokens = split_into_tokens("ls>out.txt").unwrap();
        assert_eq!(
            tokens,
            vec![lit("ls"), Token::Op(Operator::RedirectOut), lit("out.txt")]
        );

        let tokens = split_into_tokens("cat<in|wc").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("cat"),
                Token::Op(Operator::RedirectIn),
                lit("in"),
                Token::Op(Operator::Pipe),
                lit("wc"),
            ]
        );
    }

    #[test]
    fn double_ampersand_is_chain_single_is_background() {
        let tokens = split_into_tokens("mkdir d&&rm d &").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("mkdir"),
                lit("d"),
                Token::Op(Operator::And),
                lit("rm"),
                lit("d"),
                Token::Op(Operator::Background),
            ]
        );
    }

    #[test]
    fn assignment_splits_into_three_tokens() {
        let tokens = split_into_tokens("setenv FOO=bar").unwrap();
        assert_eq!(
            tokens,
            vec![lit("setenv"), lit("FOO"), Token::Op(Operator::Assign), lit("bar")]
        );
    }

    #[test]
    fn empty_words_are_omitted() {
        assert!(split_into_tokens("").unwrap().is_empty());
        assert!(split_into_tokens("   \n").unwrap().is_empty());
        assert_eq!(split_into_tokens("echo \"\"").unwrap(), vec![lit("echo")]);
    }

    #[test]
    fn quote_starts_a_new_token() {
        let tokens = split_into_tokens("ab\"c d\"ef").unwrap();
        assert_eq!(tokens, vec![lit("ab"), quoted("c d"), lit("ef")]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = split_into_tokens("echo \"oops").unwrap_err();
        assert_eq!(err, LexingError::UnfinishedQuote);
    }
}
