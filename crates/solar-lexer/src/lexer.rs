// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The lexer implementation using logos.

use logos::Logos;
use solar_ast::token::{Token, TokenKind};
use solar_ast::Span;
use solar_stdlib::BuiltinRegistry;

/// Raw token type for logos - literal payloads are parsed in a second pass.
///
/// Matcher order resolves prefix ambiguities: `**` before `*`, `>=`/`<=`/
/// `!=`/`==` before their single-character prefixes, decimals before
/// integers. logos picks the longest match, which realizes the same
/// priority order.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum RawToken {
    // === Operators (order matters - longer first) ===
    #[token("~>")]
    Assign,
    #[token("**")]
    StarStar,
    #[token(">=")]
    GtEq,
    #[token("<=")]
    LtEq,
    #[token("!=")]
    BangEq,
    #[token("==")]
    EqEq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,

    // === Literals ===
    // Strings carry no escape processing
    #[regex(r#""[^"]*""#)]
    Str,

    // Decimals must win over integers
    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    #[regex(r"[0-9]+")]
    Int,

    // === Identifier (classified against keywords and built-ins later) ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

/// The lexer for Solar source code.
///
/// Identifier classification happens here: a matched identifier is first
/// looked up in the reserved-word table, then in the built-in registry
/// (which demotes it to a function token), and otherwise stays a plain
/// identifier.
pub struct Lexer<'a> {
    source: &'a str,
    registry: &'a BuiltinRegistry,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, registry: &'a BuiltinRegistry) -> Self {
        Self { source, registry }
    }

    /// Tokenize the entire source, halting on the first error.
    ///
    /// The returned sequence always ends with an end-of-input sentinel.
    pub fn tokenize(&self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut raw = RawToken::lexer(self.source);

        while let Some(result) = raw.next() {
            let span = raw.span();
            let slice = raw.slice();

            let kind = match result {
                Ok(token) => self.convert(token, slice, span.start, span.end)?,
                Err(()) => {
                    // An opening quote that never closes fails the string
                    // matcher and surfaces here as a bare `"`.
                    if self.source[span.start..].starts_with('"') {
                        return Err(LexError::unterminated_string(span.start, self.source.len()));
                    }
                    let ch = self.source[span.start..].chars().next().unwrap_or('?');
                    return Err(LexError::bad_char(ch, span.start));
                }
            };

            tokens.push(Token {
                kind,
                span: Span::new(span.start, span.end),
            });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(self.source.len(), self.source.len()),
        });

        Ok(tokens)
    }

    fn convert(
        &self,
        raw: RawToken,
        slice: &str,
        start: usize,
        end: usize,
    ) -> Result<TokenKind, LexError> {
        Ok(match raw {
            RawToken::Assign => TokenKind::Assign,
            RawToken::StarStar => TokenKind::StarStar,
            RawToken::GtEq => TokenKind::GtEq,
            RawToken::LtEq => TokenKind::LtEq,
            RawToken::BangEq => TokenKind::BangEq,
            RawToken::EqEq => TokenKind::EqEq,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => TokenKind::Star,
            RawToken::Slash => TokenKind::Slash,
            RawToken::Lt => TokenKind::Lt,
            RawToken::Gt => TokenKind::Gt,
            RawToken::LParen => TokenKind::LParen,
            RawToken::RParen => TokenKind::RParen,
            RawToken::LBrace => TokenKind::LBrace,
            RawToken::RBrace => TokenKind::RBrace,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Semi => TokenKind::Semi,
            RawToken::Colon => TokenKind::Colon,

            RawToken::Str => {
                // Strip the surrounding quotes, no escape processing
                TokenKind::Str(slice[1..slice.len() - 1].to_string())
            }
            RawToken::Float => {
                let value = slice
                    .parse::<f64>()
                    .map_err(|_| LexError::invalid_number(start, end))?;
                TokenKind::Float(value)
            }
            RawToken::Int => {
                let value = slice
                    .parse::<i64>()
                    .map_err(|_| LexError::invalid_number(start, end))?;
                TokenKind::Int(value)
            }

            RawToken::Ident => classify_identifier(slice, self.registry),
        })
    }
}

/// Reserved word lookup, then built-in lookup, then plain identifier.
fn classify_identifier(name: &str, registry: &BuiltinRegistry) -> TokenKind {
    match name {
        "se" => TokenKind::Se,
        "senao" => TokenKind::Senao,
        "definir" => TokenKind::Definir,
        "retornar" => TokenKind::Retornar,
        "verdadeiro" => TokenKind::Verdadeiro,
        "falso" => TokenKind::Falso,
        "para" => TokenKind::Para,
        "enquanto" => TokenKind::Enquanto,
        "importar" => TokenKind::Importar,
        "de" => TokenKind::De,
        _ if registry.is_builtin(name) => TokenKind::Function(name.to_string()),
        _ => TokenKind::Ident(name.to_string()),
    }
}

/// A lexer error with location and friendly message.
#[derive(Debug, Clone)]
pub struct LexError {
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LexError {}

impl LexError {
    fn bad_char(ch: char, pos: usize) -> Self {
        Self {
            span: Span::new(pos, pos + ch.len_utf8()),
            message: format!("unexpected character '{}'", ch),
            hint: None,
        }
    }

    fn unterminated_string(start: usize, end: usize) -> Self {
        Self {
            span: Span::new(start, end),
            message: "unterminated string literal".to_string(),
            hint: Some("add a closing '\"'".to_string()),
        }
    }

    fn invalid_number(start: usize, end: usize) -> Self {
        Self {
            span: Span::new(start, end),
            message: "invalid number literal".to_string(),
            hint: Some("integers must fit in 64 bits".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solar_stdlib::default_builtins;

    fn lex(source: &str) -> Vec<TokenKind> {
        let registry = default_builtins();
        Lexer::new(source, &registry)
            .tokenize()
            .expect("lexing failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_err(source: &str) -> LexError {
        let registry = default_builtins();
        Lexer::new(source, &registry).tokenize().unwrap_err()
    }

    #[test]
    fn assignment_with_annotation() {
        assert_eq!(
            lex("x: inteiro ~> 42;"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Colon,
                TokenKind::Ident("inteiro".into()),
                TokenKind::Assign,
                TokenKind::Int(42),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn power_wins_over_multiply() {
        assert_eq!(
            lex("2 ** 3 * 4"),
            vec![
                TokenKind::Int(2),
                TokenKind::StarStar,
                TokenKind::Int(3),
                TokenKind::Star,
                TokenKind::Int(4),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn compound_comparisons_win_over_prefixes() {
        assert_eq!(
            lex("a >= b <= c != d == e < f > g"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::GtEq,
                TokenKind::Ident("b".into()),
                TokenKind::LtEq,
                TokenKind::Ident("c".into()),
                TokenKind::BangEq,
                TokenKind::Ident("d".into()),
                TokenKind::EqEq,
                TokenKind::Ident("e".into()),
                TokenKind::Lt,
                TokenKind::Ident("f".into()),
                TokenKind::Gt,
                TokenKind::Ident("g".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn decimal_wins_over_integer() {
        assert_eq!(
            lex("3.25 3"),
            vec![TokenKind::Float(3.25), TokenKind::Int(3), TokenKind::Eof]
        );
    }

    #[test]
    fn keywords_and_builtins_are_classified() {
        assert_eq!(
            lex("se imprime senao quadrado"),
            vec![
                TokenKind::Se,
                TokenKind::Function("imprime".into()),
                TokenKind::Senao,
                TokenKind::Ident("quadrado".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_eq!(
            lex("1 // resto da linha\n+ 2"),
            vec![TokenKind::Int(1), TokenKind::Plus, TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn string_contents_keep_no_quotes() {
        assert_eq!(
            lex("\"ola mundo\""),
            vec![TokenKind::Str("ola mundo".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn bad_character_is_fatal() {
        let err = lex_err("x ~> 1 @ 2;");
        assert!(err.message.contains('@'));
        assert_eq!(err.span.start, 7);
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let err = lex_err("imprime(\"oi");
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn lexing_is_idempotent() {
        let registry = default_builtins();
        let source = "definir dobro(x) { retornar x * 2; } imprime(dobro(21));";
        let a = Lexer::new(source, &registry).tokenize().unwrap();
        let b = Lexer::new(source, &registry).tokenize().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn spans_point_into_source() {
        let registry = default_builtins();
        let source = "abc ~> 12";
        let tokens = Lexer::new(source, &registry).tokenize().unwrap();
        assert_eq!(&source[tokens[0].span.start..tokens[0].span.end], "abc");
        assert_eq!(&source[tokens[1].span.start..tokens[1].span.end], "~>");
        assert_eq!(&source[tokens[2].span.start..tokens[2].span.end], "12");
    }
}
