//! Scanner for intrinsic functions.
//!
//! Converts a single-line intrinsic-function source string into tokens for
//! the parser. Besides the usual arithmetic and call punctuation, the scanner
//! recognizes compound JSONPath lexemes: a `$` (or `$$` for the context root)
//! followed by dot-, descendant-, index/list/slice/filter-, and wildcard
//! selectors. Bracket contents are consumed naively; an invalid selector body
//! fails later, when the path is resolved.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ScanError;
use crate::token::{Literal, Token, TokenKind};

/// Scanner for intrinsic-function source code.
pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    /// Start of the lexeme currently being scanned.
    start: usize,
    /// Cursor position in the source.
    current: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
        }
    }

    /// Scan the entire source, producing the token list terminated by `Eof`.
    pub fn scan(mut self) -> Result<Vec<Token>, ScanError> {
        while !self.at_end() {
            self.start = self.current;
            self.scan_token()?;
        }

        self.tokens
            .push(Token::new(TokenKind::Eof, "", None, self.current, self.current));
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> Result<(), ScanError> {
        let character = self.advance().expect("scan_token called at end of source");

        match character {
            '(' => self.add_token(TokenKind::LeftParen, None),
            ')' => self.add_token(TokenKind::RightParen, None),
            ',' => self.add_token(TokenKind::Comma, None),
            '.' => self.add_token(TokenKind::Dot, None),
            '-' => self.add_token(TokenKind::Minus, None),
            '+' => self.add_token(TokenKind::Plus, None),
            '/' => self.add_token(TokenKind::Slash, None),
            '*' => self.add_token(TokenKind::Star, None),
            '\'' => self.scan_string()?,
            '$' => self.scan_jsonpath()?,
            ' ' => {}
            character if character.is_ascii_digit() => self.scan_number()?,
            character if is_identifier_first(character) => self.scan_identifier(),
            character => {
                return Err(ScanError::UnrecognizedCharacter {
                    character,
                    offset: self.current,
                });
            }
        }

        Ok(())
    }

    /// Scan an apostrophe-delimited string. `\'` is the only escape.
    fn scan_string(&mut self) -> Result<(), ScanError> {
        loop {
            match self.peek() {
                None => return Err(ScanError::UnterminatedString { offset: self.start }),
                Some('\'') => break,
                Some('\\') if self.peek_nth(2) == Some('\'') => {
                    self.advance();
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }

        // Everything between the apostrophes, with escapes resolved.
        let value = self.substr(self.start + 1, self.current).replace("\\'", "'");

        // Consume the closing apostrophe so the lexeme includes it.
        self.advance();

        self.add_token(TokenKind::String, Some(Literal::String(value)));
        Ok(())
    }

    /// Scan a JSONPath variable lexeme.
    fn scan_jsonpath(&mut self) -> Result<(), ScanError> {
        if self.peek() == Some('$') {
            // Context-object root: `$$…`.
            self.advance();
        }

        loop {
            match self.advance() {
                Some('.') => match self.peek() {
                    Some('*') => {
                        // dot-wild-selector
                        self.advance();
                    }
                    Some('.') => {
                        // descendant-selector; a member name or an index
                        // selector follows the second dot.
                        self.advance();
                        if self.peek().is_some_and(is_member_name_first) {
                            self.scan_member_name()?;
                        }
                    }
                    _ => self.scan_member_name()?,
                },
                Some('[') => {
                    if self.peek() == Some('*') {
                        // An index wildcard MUST be exactly `[*]`.
                        self.advance();
                        if self.advance() != Some(']') {
                            return Err(ScanError::MalformedWildcard { offset: self.current });
                        }
                    } else {
                        // index-, list-, slice-, or filter-selector: consume
                        // to the closing bracket without validating the body.
                        loop {
                            match self.advance() {
                                Some(']') => break,
                                Some(_) => {}
                                None => return Err(ScanError::UnterminatedSelector { offset: self.start }),
                            }
                        }
                    }
                }
                // Optional blank space is allowed between selectors.
                Some(' ' | '\t' | '\n' | '\r') => {}
                Some(_) => {
                    // Unsupported here; step back one so the outer scan
                    // tokenizes it as arithmetic or punctuation.
                    self.current -= 1;
                    break;
                }
                None => break,
            }
        }

        self.add_token(TokenKind::JsonPath, None);
        Ok(())
    }

    /// Scan a dot-selector member name per the JSONPath ABNF: the first
    /// character must be a letter, underscore, or non-ASCII; later characters
    /// additionally allow digits.
    fn scan_member_name(&mut self) -> Result<(), ScanError> {
        match self.advance() {
            Some(character) if is_member_name_first(character) => {}
            _ => return Err(ScanError::InvalidMemberName { offset: self.current }),
        }

        while self.peek().is_some_and(is_member_name_char) {
            self.advance();
        }

        Ok(())
    }

    fn scan_number(&mut self) -> Result<(), ScanError> {
        while self.peek().is_some_and(|character| character.is_ascii_digit()) {
            self.advance();
        }

        // A dot is only part of the number when digits follow; otherwise it
        // is a method-call dot and stays for the outer scan.
        if self.peek() == Some('.') && self.peek_nth(2).is_some_and(|character| character.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|character| character.is_ascii_digit()) {
                self.advance();
            }
        }

        let lexeme = self.substr(self.start, self.current);
        let value = Decimal::from_str(&lexeme).map_err(|_| ScanError::InvalidNumber { offset: self.start })?;
        self.add_token(TokenKind::Number, Some(Literal::Number(value)));
        Ok(())
    }

    fn scan_identifier(&mut self) {
        while self.peek().is_some_and(is_identifier_char) {
            self.advance();
        }

        self.add_token(TokenKind::Identifier, None);
    }

    fn add_token(&mut self, kind: TokenKind, literal: Option<Literal>) {
        let lexeme = self.substr(self.start, self.current);
        self.tokens.push(Token::new(kind, lexeme, literal, self.start, self.current));
    }

    fn at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.current).copied()
    }

    fn peek_nth(&self, count: usize) -> Option<char> {
        self.source.get(self.current + count - 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let character = self.source.get(self.current).copied();
        if character.is_some() {
            self.current += 1;
        }
        character
    }

    fn substr(&self, start: usize, end: usize) -> String {
        self.source[start..end].iter().collect()
    }
}

fn is_identifier_first(character: char) -> bool {
    character.is_ascii_alphabetic() || character == '_'
}

fn is_identifier_char(character: char) -> bool {
    is_identifier_first(character) || character.is_ascii_digit()
}

fn is_member_name_first(character: char) -> bool {
    character.is_ascii_alphabetic() || character == '_' || !character.is_ascii()
}

fn is_member_name_char(character: char) -> bool {
    is_member_name_first(character) || character.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Token> {
        Scanner::new(source).scan().expect("scan should succeed")
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|token| token.kind).collect()
    }

    #[test]
    fn punctuation_tokens() {
        let tokens = scan("( ) , . - + / *");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Slash,
                TokenKind::Star,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn ends_with_eof() {
        let tokens = scan("1");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn string_literal_resolves_escapes() {
        let tokens = scan(r"'it\'s'");
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, r"'it\'s'");
        assert_eq!(tokens[0].literal, Some(Literal::String("it's".to_string())));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert_eq!(
            Scanner::new("'oops").scan(),
            Err(ScanError::UnterminatedString { offset: 0 })
        );
    }

    #[test]
    fn integer_and_fractional_numbers() {
        let tokens = scan("12 3.5");
        assert_eq!(tokens[0].literal, Some(Literal::Number(Decimal::from_str("12").unwrap())));
        assert_eq!(tokens[1].literal, Some(Literal::Number(Decimal::from_str("3.5").unwrap())));
    }

    #[test]
    fn number_followed_by_dot_is_not_fractional() {
        // `1.foo` lexes as NUMBER DOT IDENTIFIER.
        let tokens = scan("1.foo");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Number, TokenKind::Dot, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn identifiers_and_dotted_names() {
        let tokens = scan("States.Format");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Identifier, TokenKind::Dot, TokenKind::Identifier, TokenKind::Eof]
        );
        assert_eq!(tokens[0].lexeme, "States");
        assert_eq!(tokens[2].lexeme, "Format");
    }

    #[test]
    fn jsonpath_dot_selectors() {
        let tokens = scan("$.detail.name");
        assert_eq!(kinds(&tokens), vec![TokenKind::JsonPath, TokenKind::Eof]);
        assert_eq!(tokens[0].lexeme, "$.detail.name");
    }

    #[test]
    fn jsonpath_context_root() {
        let tokens = scan("$$.State.Name");
        assert_eq!(tokens[0].kind, TokenKind::JsonPath);
        assert_eq!(tokens[0].lexeme, "$$.State.Name");
    }

    #[test]
    fn jsonpath_selectors_and_wildcards() {
        for source in ["$.a[-2:]", "$.a[1:3]", "$.a[*]", "$.a.*", "$..name", "$.a[0]"] {
            let tokens = scan(source);
            assert_eq!(tokens[0].kind, TokenKind::JsonPath, "source: {source}");
            assert_eq!(tokens[0].lexeme, source, "source: {source}");
        }
    }

    #[test]
    fn jsonpath_stops_before_arithmetic() {
        let tokens = scan("$.price * 0.1");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::JsonPath, TokenKind::Star, TokenKind::Number, TokenKind::Eof]
        );
        assert_eq!(tokens[0].lexeme.trim(), "$.price");
    }

    #[test]
    fn jsonpath_member_must_start_with_letter_or_underscore() {
        assert!(matches!(
            Scanner::new("$.1bad").scan(),
            Err(ScanError::InvalidMemberName { .. })
        ));
    }

    #[test]
    fn jsonpath_wildcard_must_be_exact() {
        assert!(matches!(
            Scanner::new("$.a[*x]").scan(),
            Err(ScanError::MalformedWildcard { .. })
        ));
    }

    #[test]
    fn jsonpath_unterminated_selector() {
        assert!(matches!(
            Scanner::new("$.a[1:").scan(),
            Err(ScanError::UnterminatedSelector { .. })
        ));
    }

    #[test]
    fn unrecognized_character_is_an_error() {
        assert!(matches!(
            Scanner::new("a & b").scan(),
            Err(ScanError::UnrecognizedCharacter { character: '&', .. })
        ));
    }

    #[test]
    fn token_offsets_are_monotonically_non_decreasing() {
        let tokens = scan("States.Format('Hello, {}!', $.name, 1 + 2.5)");
        let mut previous_start = 0usize;
        for token in &tokens {
            assert!(token.start >= previous_start, "token {token:?} goes backwards");
            assert!(token.end >= token.start);
            previous_start = token.start;
        }
    }
}
