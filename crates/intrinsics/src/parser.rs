//! Parser for intrinsic functions.
//!
//! ```text
//! program      -> statement* EOF ;
//! statement    -> expression ;
//! expression   -> term ;
//! term         -> factor ( ( "-" | "+" ) factor )* ;
//! factor       -> unary ( ( "/" | "*" ) unary )* ;
//! unary        -> "-" unary | call ;
//! call         -> primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
//! arguments    -> expression ( "," expression )* ;
//! primary      -> NUMBER | STRING | IDENTIFIER | JSONPATH | "(" expression ")" ;
//! ```

use crate::ast::{Expr, Stmt};
use crate::error::ParseError;
use crate::token::{Token, TokenKind};

/// The most arguments a call site may carry.
const MAX_CALL_ARGUMENTS: usize = 254;

/// Parse tokens into an abstract syntax tree.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parse the token list into statements.
    pub fn parse(mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.at_end() {
            statements.push(Stmt::Expression(self.expression()?));
        }
        Ok(statements)
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.term()
    }

    /// Addition and subtraction, left-associative.
    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;

        while self.match_kinds(&[TokenKind::Minus, TokenKind::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// Division and multiplication, binding tighter than term.
    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;

        while self.match_kinds(&[TokenKind::Slash, TokenKind::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kinds(&[TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_kinds(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_kinds(&[TokenKind::Dot]) {
                let name = self.consume(TokenKind::Identifier, "Expected property name after '.'.")?;

                // There are no objects to access properties on, so dotted
                // chains fold into the variable's lexeme and the whole name
                // is resolved at once (`States.Format`).
                match &mut expr {
                    Expr::Variable { name: variable_name } => {
                        variable_name.lexeme.push('.');
                        variable_name.lexeme.push_str(&name.lexeme);
                        variable_name.end = name.end;
                    }
                    _ => return Err(ParseError::new(name, "Expected a callable name before '.'.")),
                }

                if self.match_kinds(&[TokenKind::LeftParen]) {
                    expr = self.finish_call(expr)?;
                }
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut arguments = Vec::new();

        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_CALL_ARGUMENTS {
                    return Err(ParseError::new(
                        self.peek().clone(),
                        format!("Number of arguments must not exceed {MAX_CALL_ARGUMENTS}."),
                    ));
                }
                arguments.push(self.expression()?);
                if !self.match_kinds(&[TokenKind::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenKind::RightParen, "Expected ')' after arguments.")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kinds(&[TokenKind::Number, TokenKind::String]) {
            let literal = self
                .previous()
                .literal
                .clone()
                .expect("number and string tokens carry a literal");
            return Ok(Expr::Literal(literal));
        }

        if self.match_kinds(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expected ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        if self.match_kinds(&[TokenKind::Identifier, TokenKind::JsonPath]) {
            return Ok(Expr::Variable {
                name: self.previous().clone(),
            });
        }

        Err(ParseError::new(self.peek().clone(), "Expected expression."))
    }

    /// Advance over the current token when it matches one of `kinds`.
    fn match_kinds(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }

        Err(ParseError::new(self.peek().clone(), message))
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }
}
