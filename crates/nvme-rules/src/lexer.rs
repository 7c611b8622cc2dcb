// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Line tokenizer for rule files.

use crate::error::{ParseErrorKind, RuleParseError};
use crate::position::Position;
use crate::rule::Comparison;

/// Normalized spelling of every `delta` operator variant.
pub(crate) const DELTA: &str = "delta<=";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Identifier, keyword, path, number, unit or range text.
    Word(String),
    /// Double-quoted string with escapes resolved.
    Str(String),
    Colon,
    Cmp(Comparison),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) pos: Position,
}

impl Token {
    /// Source-ish text for diagnostics.
    pub(crate) fn text(&self) -> String {
        match &self.kind {
            TokenKind::Word(w) => w.clone(),
            TokenKind::Str(s) => format!("\"{s}\""),
            TokenKind::Colon => ":".to_owned(),
            TokenKind::Cmp(c) => c.to_string(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '"' | ':' | '#' | '=' | '!' | '<' | '>' | '≤' | '≥')
}

struct Lexer<'s> {
    chars: std::iter::Peekable<std::str::Chars<'s>>,
    line: usize,
    column: usize,
}

impl Lexer<'_> {
    fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.column += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn string(&mut self, start: Position) -> Result<String, RuleParseError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(RuleParseError::new(
                        start,
                        ParseErrorKind::UnterminatedString,
                    ))
                }
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => {
                        return Err(RuleParseError::new(
                            start,
                            ParseErrorKind::UnterminatedString,
                        ))
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn word(&mut self, first: char) -> String {
        let mut out = String::from(first);
        while let Some(c) = self.peek().filter(|c| is_word_char(*c)) {
            out.push(c);
            self.bump();
        }
        if out == "delta" || out == "delta-" {
            if self.eat('≤') {
                return DELTA.to_owned();
            }
            let mut ahead = self.chars.clone();
            if ahead.next() == Some('<') && ahead.next() == Some('=') {
                self.bump();
                self.bump();
                return DELTA.to_owned();
            }
        }
        out
    }

    fn comparison(&mut self, first: char, at: Position) -> Result<Comparison, RuleParseError> {
        Ok(match first {
            '≤' => Comparison::Le,
            '≥' => Comparison::Ge,
            '<' if self.eat('=') => Comparison::Le,
            '<' => Comparison::Lt,
            '>' if self.eat('=') => Comparison::Ge,
            '>' => Comparison::Gt,
            '=' if self.eat('=') => Comparison::Eq,
            '!' if self.eat('=') => Comparison::Ne,
            other => {
                return Err(RuleParseError::new(
                    at,
                    ParseErrorKind::UnexpectedChar(other),
                ))
            }
        })
    }
}

/// Tokenize one line. Everything after an unquoted `#` is a comment.
pub(crate) fn lex_line(text: &str, line: usize) -> Result<Vec<Token>, RuleParseError> {
    let mut lx = Lexer {
        chars: text.chars().peekable(),
        line,
        column: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let pos = lx.pos();
        let Some(c) = lx.bump() else {
            break;
        };
        let kind = match c {
            c if c.is_whitespace() => continue,
            '#' => break,
            '"' => TokenKind::Str(lx.string(pos)?),
            ':' => TokenKind::Colon,
            '=' | '!' | '<' | '>' | '≤' | '≥' => TokenKind::Cmp(lx.comparison(c, pos)?),
            c => TokenKind::Word(lx.word(c)),
        };
        tokens.push(Token { kind, pos });
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<TokenKind> {
        lex_line(line, 1).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn w(s: &str) -> TokenKind {
        TokenKind::Word(s.to_owned())
    }

    #[test]
    fn splits_rule_line() {
        assert_eq!(
            kinds("rule spare: smart.available_spare>=10 # trailing"),
            vec![
                w("rule"),
                w("spare"),
                TokenKind::Colon,
                w("smart.available_spare"),
                TokenKind::Cmp(Comparison::Ge),
                w("10"),
            ]
        );
    }

    #[test]
    fn unicode_and_delta_spellings() {
        assert_eq!(
            kinds("≤ ≥"),
            vec![TokenKind::Cmp(Comparison::Le), TokenKind::Cmp(Comparison::Ge)]
        );
        for spelling in ["delta<=", "delta-≤", "delta-<="] {
            assert_eq!(kinds(spelling), vec![w(DELTA)], "{spelling}");
        }
        assert_eq!(kinds("unit °C"), vec![w("unit"), w("°C")]);
    }

    #[test]
    fn strings_keep_hashes_and_escapes() {
        assert_eq!(
            kinds(r#"== "a # b \"q\"""#),
            vec![
                TokenKind::Cmp(Comparison::Eq),
                TokenKind::Str("a # b \"q\"".to_owned())
            ]
        );
    }

    #[test]
    fn positions_count_characters() {
        let toks = lex_line("  ≤ x", 7).unwrap();
        assert_eq!(toks[0].pos, Position::new(7, 3));
        assert_eq!(toks[1].pos, Position::new(7, 5));
    }

    #[test]
    fn errors_carry_position() {
        let err = lex_line("a = b", 3).unwrap_err();
        assert_eq!(err.position, Position::new(3, 3));
        assert_eq!(err.kind, ParseErrorKind::UnexpectedChar('='));
        let err = lex_line(r#"x "open"#, 1).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
        assert_eq!(err.position.column, 3);
    }
}
