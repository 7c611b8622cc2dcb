// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rule-file parser.
//!
//! The format is line-oriented:
//!
//! ```text
//! # comment
//! [group]
//! rule <name>: <target> <op> [unit <symbol>] [severity info|warn|fail]
//! ```
//!
//! where `<op>` is a comparison (`== != < <= ≤ > >= ≥`) followed by a
//! reference, `in-range lo..hi` (`*` for an open bound), `present`,
//! `absent`, `unchanged`, or `delta<= <number>`.

use std::collections::BTreeSet;

use nvme_info::{PathPattern, Unit, Value};

use crate::error::{ParseErrorKind, RuleParseError};
use crate::lexer::{lex_line, Token, TokenKind, DELTA};
use crate::position::Position;
use crate::rule::{Operator, Reference, Rule, RuleSet, Severity};

struct Cursor {
    tokens: std::vec::IntoIter<Token>,
    peeked: Option<Token>,
    eol: Position,
}

impl Cursor {
    fn new(tokens: Vec<Token>, eol: Position) -> Self {
        Self {
            tokens: tokens.into_iter(),
            peeked: None,
            eol,
        }
    }

    fn next(&mut self) -> Option<Token> {
        self.peeked.take().or_else(|| self.tokens.next())
    }

    fn peek(&mut self) -> Option<&Token> {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next();
        }
        self.peeked.as_ref()
    }

    fn expect(&mut self, expected: &'static str) -> Result<Token, RuleParseError> {
        self.next().ok_or_else(|| {
            RuleParseError::new(self.eol, ParseErrorKind::UnexpectedEnd { expected })
        })
    }

    fn word(&mut self, expected: &'static str) -> Result<(String, Position), RuleParseError> {
        let tok = self.expect(expected)?;
        match tok.kind {
            TokenKind::Word(w) => Ok((w, tok.pos)),
            _ => Err(unexpected(&tok, expected)),
        }
    }
}

fn unexpected(tok: &Token, expected: &'static str) -> RuleParseError {
    RuleParseError::new(
        tok.pos,
        ParseErrorKind::UnexpectedToken {
            expected,
            found: tok.text(),
        },
    )
}

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parse a numeric literal: decimal, `0x` hex, optional `-` and fraction.
///
/// Non-negative integers are `Int`; everything else is `Real`.
pub(crate) fn number(text: &str) -> Option<Value> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Value::Int(u128::from_str_radix(hex, 16).ok()?)
    } else if !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()) {
        Value::Int(body.parse().ok()?)
    } else {
        let (whole, frac) = body.split_once('.')?;
        let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if !digits(whole) || !digits(frac) {
            return None;
        }
        Value::Real(body.parse().ok()?)
    };
    if !negative {
        return Some(value);
    }
    match value {
        Value::Int(n) => Some(Value::Real(-(n as f64))),
        Value::Real(x) => Some(Value::Real(-x)),
        _ => None,
    }
}

fn pattern(text: &str, at: Position) -> Result<PathPattern, RuleParseError> {
    PathPattern::parse(text).map_err(|e| {
        RuleParseError::new(
            at,
            ParseErrorKind::InvalidPath {
                path: text.to_owned(),
                reason: e.to_string(),
            },
        )
    })
}

fn reference(tok: Token) -> Result<Reference, RuleParseError> {
    let word = match tok.kind {
        TokenKind::Str(s) => return Ok(Reference::Literal(Value::Text(s))),
        TokenKind::Word(w) => w,
        _ => return Err(unexpected(&tok, "reference")),
    };
    if let Some(v) = number(&word) {
        return Ok(Reference::Literal(v));
    }
    if word == "true" || word == "false" {
        return Ok(Reference::Literal(Value::Bool(word == "true")));
    }
    if word.contains('.') {
        return Ok(Reference::Path(pattern(&word, tok.pos)?));
    }
    if is_name(&word) {
        return Ok(Reference::Literal(Value::Enum(word)));
    }
    Err(RuleParseError::new(
        tok.pos,
        ParseErrorKind::InvalidNumber(word),
    ))
}

fn range(first: String, at: Position, cur: &mut Cursor) -> Result<Operator, RuleParseError> {
    let complete = |t: &str| {
        t.split_once("..")
            .is_some_and(|(lo, hi)| !lo.is_empty() && !hi.is_empty())
    };
    let mut text = first;
    // Allow `lo .. hi` and `lo ..hi` as well as `lo..hi`.
    for _ in 0..2 {
        if complete(&text) {
            break;
        }
        let joinable = match cur.peek() {
            Some(Token {
                kind: TokenKind::Word(w),
                ..
            }) if text.ends_with("..") || w.starts_with("..") => Some(w.clone()),
            _ => None,
        };
        let Some(w) = joinable else {
            break;
        };
        text.push_str(&w);
        cur.next();
    }
    let invalid = || RuleParseError::new(at, ParseErrorKind::InvalidRange(text.clone()));
    let (lo, hi) = text.split_once("..").ok_or_else(invalid)?;
    let bound = |b: &str| match b {
        "*" => Ok(None),
        b => number(b).map(Some).ok_or_else(invalid),
    };
    let (lo, hi) = (bound(lo)?, bound(hi)?);
    let as_f64 = |b: &Option<Value>| b.as_ref().and_then(Value::as_f64);
    if let (Some(l), Some(h)) = (as_f64(&lo), as_f64(&hi)) {
        if l > h {
            return Err(invalid());
        }
    }
    Ok(Operator::InRange { lo, hi })
}

fn operator(cur: &mut Cursor) -> Result<Operator, RuleParseError> {
    const EXPECTED: &str = "operator";
    let tok = cur.expect(EXPECTED)?;
    let word = match tok.kind {
        TokenKind::Cmp(c) => {
            let rhs = cur.expect("reference")?;
            return Ok(Operator::Compare(c, reference(rhs)?));
        }
        TokenKind::Word(ref w) => w.clone(),
        _ => return Err(unexpected(&tok, EXPECTED)),
    };
    match word.as_str() {
        "present" => Ok(Operator::Present),
        "absent" => Ok(Operator::Absent),
        "unchanged" => Ok(Operator::Unchanged),
        "in-range" => {
            let (first, at) = cur.word("range")?;
            range(first, at, cur)
        }
        DELTA => {
            let (amount, at) = cur.word("number")?;
            let value = number(&amount)
                .ok_or_else(|| RuleParseError::new(at, ParseErrorKind::InvalidNumber(amount)))?;
            Ok(Operator::DeltaAtMost(value))
        }
        _ => Err(unexpected(&tok, EXPECTED)),
    }
}

fn rule(
    cur: &mut Cursor,
    position: Position,
    group: Option<&str>,
) -> Result<Rule, RuleParseError> {
    let (name, at) = cur.word("rule name")?;
    if !is_name(&name) {
        return Err(RuleParseError::new(at, ParseErrorKind::InvalidName(name)));
    }
    let colon = cur.expect("`:`")?;
    if colon.kind != TokenKind::Colon {
        return Err(unexpected(&colon, "`:`"));
    }
    let (target, at) = cur.word("target path")?;
    let target = pattern(&target, at)?;
    let operator = operator(cur)?;
    let mut unit = None;
    let mut severity = None;
    while let Some(tok) = cur.next() {
        match &tok.kind {
            TokenKind::Word(w) if w == "unit" => {
                if unit.is_some() {
                    return Err(RuleParseError::new(
                        tok.pos,
                        ParseErrorKind::DuplicateOption("unit"),
                    ));
                }
                let (symbol, at) = cur.word("unit symbol")?;
                let parsed = Unit::from_symbol(&symbol);
                unit = Some(parsed.ok_or_else(|| {
                    RuleParseError::new(at, ParseErrorKind::UnknownUnit(symbol))
                })?);
            }
            TokenKind::Word(w) if w == "severity" => {
                if severity.is_some() {
                    return Err(RuleParseError::new(
                        tok.pos,
                        ParseErrorKind::DuplicateOption("severity"),
                    ));
                }
                let (level, at) = cur.word("severity")?;
                let parsed = Severity::parse(&level);
                severity = Some(parsed.ok_or_else(|| {
                    RuleParseError::new(at, ParseErrorKind::UnknownSeverity(level))
                })?);
            }
            _ => return Err(unexpected(&tok, "`unit` or `severity`")),
        }
    }
    Ok(Rule {
        name,
        group: group.map(str::to_owned),
        target,
        operator,
        unit,
        severity: severity.unwrap_or_default(),
        position,
    })
}

pub(crate) fn parse(source: &str) -> Result<RuleSet, RuleParseError> {
    let mut rules = Vec::new();
    let mut names = BTreeSet::new();
    let mut group: Option<String> = None;
    for (i, text) in source.lines().enumerate() {
        let line = i + 1;
        let tokens = lex_line(text, line)?;
        let eol = Position::new(line, text.chars().count() + 1);
        let mut cur = Cursor::new(tokens, eol);
        let Some(first) = cur.next() else {
            continue;
        };
        let TokenKind::Word(head) = &first.kind else {
            return Err(unexpected(&first, "`rule` or `[group]`"));
        };
        if head == "rule" {
            let parsed = rule(&mut cur, first.pos, group.as_deref())?;
            if !names.insert(parsed.name.clone()) {
                return Err(RuleParseError::new(
                    first.pos,
                    ParseErrorKind::DuplicateRule(parsed.name),
                ));
            }
            rules.push(parsed);
        } else if let Some(inner) = head.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            if !is_name(inner) {
                return Err(RuleParseError::new(
                    first.pos,
                    ParseErrorKind::InvalidName(inner.to_owned()),
                ));
            }
            group = Some(inner.to_owned());
            if let Some(extra) = cur.next() {
                return Err(unexpected(&extra, "end of line"));
            }
        } else {
            return Err(unexpected(&first, "`rule` or `[group]`"));
        }
    }
    Ok(RuleSet::from_rules(rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Comparison;

    fn one(line: &str) -> Rule {
        let set = RuleSet::parse(line).unwrap();
        assert_eq!(set.len(), 1);
        set.rules()[0].clone()
    }

    fn err(src: &str) -> RuleParseError {
        RuleSet::parse(src).unwrap_err()
    }

    #[test]
    fn numbers() {
        assert_eq!(number("42"), Some(Value::Int(42)));
        assert_eq!(number("0x1F"), Some(Value::Int(31)));
        assert_eq!(number("-3"), Some(Value::Real(-3.0)));
        assert_eq!(number("2.5"), Some(Value::Real(2.5)));
        assert_eq!(number("-0.25"), Some(Value::Real(-0.25)));
        for bad in ["", "-", "0x", "1.", ".5", "1.2.3", "smart.x", "1e3"] {
            assert_eq!(number(bad), None, "{bad}");
        }
    }

    #[test]
    fn full_rule_with_options() {
        let r = one("rule hot: smart.composite_temp < 70 unit °C severity warn # note");
        assert_eq!(r.name, "hot");
        assert_eq!(r.target.as_str(), "smart.composite_temp");
        assert_eq!(
            r.operator,
            Operator::Compare(Comparison::Lt, Reference::Literal(Value::Int(70)))
        );
        assert_eq!(r.unit, Some(Unit::Celsius));
        assert_eq!(r.severity, Severity::Warn);
        assert_eq!(r.position, Position::new(1, 1));
    }

    #[test]
    fn references() {
        let op = |src: &str| one(&format!("rule r: a.b {src}")).operator;
        assert_eq!(
            op("== smart.x"),
            Operator::Compare(
                Comparison::Eq,
                Reference::Path(PathPattern::parse("smart.x").unwrap())
            )
        );
        assert_eq!(
            op("!= io"),
            Operator::Compare(Comparison::Ne, Reference::Literal(Value::Enum("io".into())))
        );
        assert_eq!(
            op(r#"== "Acme 1TB""#),
            Operator::Compare(Comparison::Eq, Reference::Literal(Value::Text("Acme 1TB".into())))
        );
        assert_eq!(
            op("≥ true"),
            Operator::Compare(Comparison::Ge, Reference::Literal(Value::Bool(true)))
        );
    }

    #[test]
    fn range_spellings() {
        for src in ["0..70", "0 .. 70", "0.. 70", "0 ..70"] {
            assert_eq!(
                one(&format!("rule r: a.b in-range {src}")).operator,
                Operator::InRange {
                    lo: Some(Value::Int(0)),
                    hi: Some(Value::Int(70)),
                },
                "{src}"
            );
        }
        assert_eq!(
            one("rule r: a.b in-range *..0.5").operator,
            Operator::InRange {
                lo: None,
                hi: Some(Value::Real(0.5)),
            }
        );
        assert!(matches!(
            err("rule r: a.b in-range 9..1").kind,
            ParseErrorKind::InvalidRange(_)
        ));
    }

    #[test]
    fn groups_and_comments() {
        let set = RuleSet::parse(
            "# header\n\n[wear]\nrule a: smart.x present\n  \
             [thermal]  # c\nrule b: smart.y absent\n",
        )
        .unwrap();
        let groups: Vec<_> = set.iter().map(|r| r.group.as_deref()).collect();
        assert_eq!(groups, [Some("wear"), Some("thermal")]);
        assert_eq!(set.rules()[1].position, Position::new(6, 1));
    }

    #[test]
    fn delta_and_pair_operators() {
        assert_eq!(
            one("rule r: smart.unsafe_shutdowns delta-≤ 2").operator,
            Operator::DeltaAtMost(Value::Int(2))
        );
        assert_eq!(one("rule r: a.b unchanged").operator, Operator::Unchanged);
    }

    #[test]
    fn errors_report_line_and_column() {
        let e = err("rule ok: a.b present\nrule bad a.b present");
        assert_eq!(e.position, Position::new(2, 10));
        assert!(matches!(e.kind, ParseErrorKind::UnexpectedToken { expected: "`:`", .. }));
        assert_eq!(e.to_string(), "2:10: expected `:`, found `a.b`");

        let e = err("rule r: a.b ==");
        assert_eq!(e.position, Position::new(1, 15));
        assert!(matches!(e.kind, ParseErrorKind::UnexpectedEnd { .. }));

        let e = err("rule r: a.b present unit parsecs");
        assert_eq!(e.kind, ParseErrorKind::UnknownUnit("parsecs".into()));
        assert_eq!(e.position, Position::new(1, 26));

        let e = err("rule r: A.b present");
        assert!(matches!(e.kind, ParseErrorKind::InvalidPath { .. }));

        let e = err("rule r: a.b present\nrule r: a.c present");
        assert_eq!(e.kind, ParseErrorKind::DuplicateRule("r".into()));
        assert_eq!(e.position.line, 2);

        let e = err("check a.b present");
        assert!(matches!(e.kind, ParseErrorKind::UnexpectedToken { .. }));

        let e = err("rule r: a.b present severity fatal");
        assert_eq!(e.kind, ParseErrorKind::UnknownSeverity("fatal".into()));

        let e = err("rule r: a.b present severity warn severity info");
        assert_eq!(e.kind, ParseErrorKind::DuplicateOption("severity"));
    }
}
