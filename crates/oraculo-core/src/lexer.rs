//! Tokenizer for OráculoScript source text.
//!
//! [`tokenize`] makes a single left-to-right pass and yields a flat list of
//! [`Located`] tokens terminated by [`Token::Eof`]. Whitespace and `//` line
//! comments are dropped but still advance the line/column counters.

use std::fmt;

use crate::error::LexError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    String(String),
    Number(f64),
    Ident(String),
    // Keywords
    If,
    Else,
    For,
    In,
    From,
    To,
    And,
    Or,
    Not,
    True,
    False,
    // Operators and punctuation
    EqEq,
    NotEq,
    Le,
    Lt,
    Ge,
    Gt,
    Arrow,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Eof,
}

/// Coarse token classification, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    String,
    Number,
    Identifier,
    Keyword,
    Operator,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Identifier => "identifier",
            TokenKind::Keyword => "keyword",
            TokenKind::Operator => "operator",
            TokenKind::Eof => "end of input",
        };
        f.write_str(name)
    }
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::String(_) => TokenKind::String,
            Token::Number(_) => TokenKind::Number,
            Token::Ident(_) => TokenKind::Identifier,
            Token::If
            | Token::Else
            | Token::For
            | Token::In
            | Token::From
            | Token::To
            | Token::And
            | Token::Or
            | Token::Not
            | Token::True
            | Token::False => TokenKind::Keyword,
            Token::Eof => TokenKind::Eof,
            _ => TokenKind::Operator,
        }
    }

    fn keyword(word: &str) -> Option<Token> {
        let token = match word {
            "if" => Token::If,
            "else" => Token::Else,
            "for" => Token::For,
            "in" => Token::In,
            "from" => Token::From,
            "to" => Token::To,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "true" => Token::True,
            "false" => Token::False,
            _ => return None,
        };
        Some(token)
    }
}

/// A token together with its source text and 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub token: Token,
    /// The exact source slice, quotes included for strings.
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Located {
    /// Short human-readable form: the token kind plus its text.
    pub fn describe(&self) -> String {
        match self.token {
            Token::Eof => "end of input".to_string(),
            _ => format!("{} '{}'", self.token.kind(), self.text),
        }
    }
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn slice(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn error(&self, ch: char, line: usize, column: usize) -> LexError {
        LexError { ch, line, column }
    }
}

/// Splits `source` into tokens.
///
/// Two-character operators are matched before their one-character prefixes,
/// and words are classified as keywords only when the whole word matches, so
/// `format` or `index` stay identifiers.
pub fn tokenize(source: &str) -> Result<Vec<Located>, LexError> {
    let mut sc = Scanner::new(source);
    let mut tokens = Vec::new();

    while let Some(ch) = sc.peek() {
        let (line, column, start) = (sc.line, sc.column, sc.pos);

        if ch.is_whitespace() {
            sc.bump();
            continue;
        }

        let token = match ch {
            '/' if sc.peek_next() == Some('/') => {
                while let Some(c) = sc.peek() {
                    if c == '\n' {
                        break;
                    }
                    sc.bump();
                }
                continue;
            }
            '"' => {
                sc.bump();
                let mut s = String::new();
                loop {
                    match sc.bump() {
                        Some('"') => break,
                        Some(c) => s.push(c),
                        // An unterminated string leaves the quote unmatched.
                        None => return Err(sc.error('"', line, column)),
                    }
                }
                Token::String(s)
            }
            c if c.is_ascii_digit() => {
                while sc.peek().is_some_and(|d| d.is_ascii_digit()) {
                    sc.bump();
                }
                if sc.peek() == Some('.') {
                    sc.bump();
                    while sc.peek().is_some_and(|d| d.is_ascii_digit()) {
                        sc.bump();
                    }
                }
                let text = sc.slice(start);
                let n: f64 = text.parse().map_err(|_| sc.error(c, line, column))?;
                Token::Number(n)
            }
            '=' | '!' | '<' | '>' | '-' => {
                sc.bump();
                let next = sc.peek();
                match (ch, next) {
                    ('=', Some('=')) => {
                        sc.bump();
                        Token::EqEq
                    }
                    ('!', Some('=')) => {
                        sc.bump();
                        Token::NotEq
                    }
                    ('<', Some('=')) => {
                        sc.bump();
                        Token::Le
                    }
                    ('>', Some('=')) => {
                        sc.bump();
                        Token::Ge
                    }
                    ('-', Some('>')) => {
                        sc.bump();
                        Token::Arrow
                    }
                    ('<', _) => Token::Lt,
                    ('>', _) => Token::Gt,
                    _ => return Err(sc.error(ch, line, column)),
                }
            }
            '{' => {
                sc.bump();
                Token::LBrace
            }
            '}' => {
                sc.bump();
                Token::RBrace
            }
            '(' => {
                sc.bump();
                Token::LParen
            }
            ')' => {
                sc.bump();
                Token::RParen
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while sc
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                {
                    sc.bump();
                }
                let word = sc.slice(start);
                Token::keyword(&word).unwrap_or(Token::Ident(word))
            }
            other => return Err(sc.error(other, line, column)),
        };

        tokens.push(Located {
            token,
            text: sc.slice(start),
            line,
            column,
        });
    }

    tokens.push(Located {
        token: Token::Eof,
        text: String::new(),
        line: sc.line,
        column: sc.column,
    });
    Ok(tokens)
}
