// src/core/lexer.rs

//! A small tokenizer for C-like parser sources.
//!
//! It only knows enough of the language to find string literals reliably:
//! comments, character literals and escapes are handled, everything else is
//! reduced to identifiers, numbers and single-character punctuation.

use crate::models::BuildWarning;

/// A lexical token together with the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What was read.
    pub kind: TokenKind,
    /// 1-based.
    pub line: usize,
}

/// Token categories the scanner cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// Numeric literal as written.
    Number(String),
    /// Literal content with `\"` and `\\` unescaped; other escapes are kept verbatim.
    Str(String),
    /// Any other single character.
    Punct(char),
}

/// Output of a tokenizer run.
#[derive(Debug, Default)]
pub struct TokenStream {
    /// Tokens in source order.
    pub tokens: Vec<Token>,
    /// Unterminated literals and comments.
    pub warnings: Vec<BuildWarning>,
}

/// Tokenizes `text`. `origin` is only used to label warnings.
pub fn tokenize(text: &str, origin: &str) -> TokenStream {
    let mut out = TokenStream::default();
    let mut chars = text.chars().peekable();
    let mut line = 1usize;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '/' if chars.peek() == Some(&'/') => {
                // Line comment: skip to end of line, the newline is counted above.
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let start = line;
                let mut closed = false;
                while let Some(next) = chars.next() {
                    if next == '\n' {
                        line += 1;
                    } else if next == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    out.warnings.push(BuildWarning::parse(
                        format!("{}:{}", origin, start),
                        "unterminated block comment",
                    ));
                }
            }
            '"' => {
                let start = line;
                let mut value = String::new();
                let mut closed = false;
                while let Some(next) = chars.next() {
                    match next {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('"') => value.push('"'),
                            Some('\\') => value.push('\\'),
                            Some('\n') => line += 1,
                            Some(other) => {
                                value.push('\\');
                                value.push(other);
                            }
                            None => break,
                        },
                        '\n' => {
                            // C string literals cannot span lines.
                            line += 1;
                            break;
                        }
                        other => value.push(other),
                    }
                }
                if closed {
                    out.tokens.push(Token {
                        kind: TokenKind::Str(value),
                        line: start,
                    });
                } else {
                    out.warnings.push(BuildWarning::parse(
                        format!("{}:{}", origin, start),
                        "unterminated string literal skipped",
                    ));
                }
            }
            '\'' => {
                // Character literal, e.g. '(' or '\''. Dropped entirely.
                while let Some(next) = chars.next() {
                    match next {
                        '\\' => {
                            chars.next();
                        }
                        '\'' => break,
                        '\n' => {
                            line += 1;
                            break;
                        }
                        _ => {}
                    }
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.tokens.push(Token {
                    kind: TokenKind::Ident(ident),
                    line,
                });
            }
            c if c.is_ascii_digit() => {
                let mut number = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '.' {
                        number.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.tokens.push(Token {
                    kind: TokenKind::Number(number),
                    line,
                });
            }
            other => out.tokens.push(Token {
                kind: TokenKind::Punct(other),
                line,
            }),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text, "t.c").tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_strings_and_comments() {
        let toks = kinds("/* \"no\" */ strcmp(a, \"Foo()\"); // \"skip\"\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("strcmp".into()),
                TokenKind::Punct('('),
                TokenKind::Ident("a".into()),
                TokenKind::Punct(','),
                TokenKind::Str("Foo()".into()),
                TokenKind::Punct(')'),
                TokenKind::Punct(';'),
            ]
        );
    }

    #[test]
    fn test_escapes_and_char_literals() {
        let toks = kinds(r#"c == '"' ; x = "say \"hi\" %[^\n]";"#);
        assert!(toks.contains(&TokenKind::Str(r#"say "hi" %[^\n]"#.into())));
        assert!(!toks.iter().any(|t| matches!(t, TokenKind::Punct('"'))));
    }

    #[test]
    fn test_line_numbers() {
        let stream = tokenize("a\n/* one\ntwo */\n\"x\"", "t.c");
        let last = stream.tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Str("x".into()));
        assert_eq!(last.line, 4);
    }

    #[test]
    fn test_unterminated_constructs_are_warnings() {
        let stream = tokenize("ok(\"open\n more); /* never closed", "t.c");
        assert_eq!(stream.warnings.len(), 2);
        assert!(matches!(stream.tokens.first().map(|t| &t.kind), Some(TokenKind::Ident(s)) if s == "ok"));
    }
}
