//! Recursive-descent parser.
//!
//! ```text
//! program      := statement*
//! statement    := if_stmt | for_stmt | command_stmt
//! command_stmt := IDENT arg* ( '->' ( 'onClick' block | IDENT ) )?
//! if_stmt      := 'if' expr block ('else' block)?
//! for_stmt     := 'for' IDENT ( 'in' (STRING|IDENT) | 'from' primary 'to' primary ) block
//! expr         := primary (cmp_op primary)?
//! primary      := STRING | NUMBER | BOOL | IDENT | '(' expr ')'
//! ```
//!
//! Command arguments must start on the same line as the command name; a line
//! break ends the argument list. Any mismatch aborts the parse with a
//! [`SyntaxError`]; there is no recovery.

use std::sync::Arc;

use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::{tokenize, Located, Token};

struct Parser {
    tokens: Vec<Located>,
    pos: usize,
}

impl Parser {
    fn new(mut tokens: Vec<Located>) -> Self {
        if tokens.last().map_or(true, |t| t.token != Token::Eof) {
            let (line, column) = tokens
                .last()
                .map_or((1, 1), |t| (t.line, t.column + t.text.chars().count()));
            tokens.push(Located {
                token: Token::Eof,
                text: String::new(),
                line,
                column,
            });
        }
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Located {
        self.peek_ahead(0)
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    /// Looks `n` tokens past the current one; clamps to the trailing `Eof`.
    fn peek_ahead(&self, n: usize) -> &Located {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    fn advance(&mut self) -> Located {
        let t = self.current().clone();
        if t.token != Token::Eof {
            self.pos += 1;
        }
        t
    }

    fn error(&self, at: &Located, message: String) -> SyntaxError {
        SyntaxError {
            message,
            line: at.line,
            column: at.column,
        }
    }

    fn expected(&self, what: &str) -> SyntaxError {
        let found = self.current();
        self.error(found, format!("expected {}, found {}", what, found.describe()))
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<Located, SyntaxError> {
        if self.peek() == expected {
            Ok(self.advance())
        } else {
            Err(self.expected(what))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected(what)),
        }
    }

    fn parse_program(&mut self) -> Result<Program, SyntaxError> {
        let mut statements = Vec::new();
        while *self.peek() != Token::Eof {
            statements.push(self.parse_statement()?);
        }
        Ok(Program {
            body: Arc::new(Block { statements }),
        })
    }

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        match self.peek() {
            Token::If => self.parse_if(),
            Token::For => self.parse_for(),
            Token::Ident(_) => Ok(Statement::Command(self.parse_command()?)),
            _ => Err(self.expected("a statement")),
        }
    }

    fn is_argument(token: &Token) -> bool {
        matches!(
            token,
            Token::String(_) | Token::Number(_) | Token::Ident(_) | Token::True | Token::False
        )
    }

    fn parse_command(&mut self) -> Result<CommandStatement, SyntaxError> {
        let head = self.advance();
        let name = match head.token {
            Token::Ident(ref s) => s.clone(),
            _ => {
                return Err(self.error(
                    &head,
                    format!("expected command name, found {}", head.describe()),
                ))
            }
        };

        let mut args = Vec::new();
        while Self::is_argument(self.peek()) && self.current().line == head.line {
            let arrow_follows = self.peek_ahead(1).token == Token::Arrow;
            args.push(self.parse_primary()?);
            if arrow_follows {
                break;
            }
        }

        let mut binding = None;
        let mut callback = None;
        if *self.peek() == Token::Arrow {
            self.advance();
            match self.peek().clone() {
                Token::Ident(s) if s == "onClick" => {
                    self.advance();
                    callback = Some(Arc::new(self.parse_block()?));
                }
                Token::Ident(s) => {
                    self.advance();
                    binding = Some(s);
                }
                _ => return Err(self.expected("'onClick' or an identifier after '->'")),
            }
        }

        Ok(CommandStatement {
            name,
            args,
            binding,
            callback,
            line: head.line,
            column: head.column,
        })
    }

    fn parse_if(&mut self) -> Result<Statement, SyntaxError> {
        self.expect(&Token::If, "'if'")?;
        let condition = self.parse_expression()?;
        let then_block = Arc::new(self.parse_block()?);

        let else_block = if *self.peek() == Token::Else {
            self.advance();
            Some(Arc::new(self.parse_block()?))
        } else {
            None
        };

        Ok(Statement::If(IfStatement {
            condition,
            then_block,
            else_block,
        }))
    }

    fn parse_for(&mut self) -> Result<Statement, SyntaxError> {
        let head = self.expect(&Token::For, "'for'")?;
        let variable = self.expect_ident("loop variable name after 'for'")?;

        let source = match self.peek().clone() {
            Token::In => {
                self.advance();
                match self.peek().clone() {
                    Token::String(s) => {
                        self.advance();
                        LoopSource::Collection(Expression::Literal(Literal::String(s)))
                    }
                    Token::Ident(name) => {
                        self.advance();
                        LoopSource::Collection(Expression::Identifier(name))
                    }
                    _ => return Err(self.expected("string or identifier after 'in'")),
                }
            }
            Token::From => {
                self.advance();
                let from = self.parse_bound("'from'")?;
                self.expect(&Token::To, "'to'")?;
                let to = self.parse_bound("'to'")?;
                LoopSource::Range { from, to }
            }
            _ => return Err(self.expected("'in' or 'from' after loop variable")),
        };

        let body = Arc::new(self.parse_block()?);
        Ok(Statement::For(ForLoopStatement {
            variable,
            source,
            body,
            line: head.line,
        }))
    }

    fn parse_bound(&mut self, after: &str) -> Result<Expression, SyntaxError> {
        match self.peek() {
            Token::Number(_) | Token::Ident(_) => self.parse_primary(),
            _ => Err(self.expected(&format!("number or identifier after {}", after))),
        }
    }

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        self.expect(&Token::LBrace, "'{'")?;
        let mut statements = Vec::new();
        while *self.peek() != Token::RBrace {
            if *self.peek() == Token::Eof {
                return Err(self.expected("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(&Token::RBrace, "'}'")?;
        Ok(Block { statements })
    }

    fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        let left = self.parse_primary()?;

        let op = match self.peek() {
            Token::EqEq => CompareOp::Eq,
            Token::NotEq => CompareOp::NotEq,
            Token::Gt => CompareOp::Gt,
            Token::Lt => CompareOp::Lt,
            Token::Ge => CompareOp::Ge,
            Token::Le => CompareOp::Le,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_primary()?;

        Ok(Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> Result<Expression, SyntaxError> {
        let expr = match self.peek().clone() {
            Token::String(s) => Expression::Literal(Literal::String(s)),
            Token::Number(n) => Expression::Literal(Literal::Number(n)),
            Token::True => Expression::Literal(Literal::Boolean(true)),
            Token::False => Expression::Literal(Literal::Boolean(false)),
            Token::Ident(name) => Expression::Identifier(name),
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&Token::RParen, "')'")?;
                return Ok(inner);
            }
            _ => return Err(self.expected("an expression")),
        };
        self.advance();
        Ok(expr)
    }
}

/// Parses an already tokenized program.
pub fn parse_tokens(tokens: Vec<Located>) -> Result<Program, SyntaxError> {
    Parser::new(tokens).parse_program()
}

/// Tokenizes and parses `source`.
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source)?;
    parse_tokens(tokens)
}
