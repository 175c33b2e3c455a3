//! SPDX license expression AST and recursive-descent parser.
//!
//! Parses compound expressions such as:
//!   `MIT OR Apache-2.0`
//!   `GPL-2.0-or-later WITH Classpath-exception-2.0`
//!   `(MIT AND BSD-2-Clause) OR DocumentRef-x:LicenseRef-custom`
//!
//! Grammar (tightest binding first: `+`, `WITH`, `AND`, `OR`):
//! ```text
//! expr      := and_expr ( "OR" and_expr )*
//! and_expr  := with_expr ( "AND" with_expr )*
//! with_expr := simple ( "WITH" id )?
//! simple    := "(" expr ")" | license_id
//! ```
//! `AND`/`OR` chains fold to the left.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::license::lexer::{tokenize, Token, TokenKind};

/// A parsed SPDX license expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprNode {
    /// A plain SPDX identifier, e.g. `MIT` or `GPL-2.0+`.
    LicenseId { id: String, or_later: bool },
    /// A `LicenseRef-`/`AdditionRef-` identifier, optionally scoped to an
    /// external document (`DocumentRef-<id>`).
    LicenseRef {
        license_ref: String,
        document_ref: Option<String>,
    },
    /// A license with an exception that relaxes its terms.
    With {
        license: Box<ExprNode>,
        exception: String,
    },
    /// Conjunction: every operand must be honored.
    And {
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    /// Disjunction: the licensee may pick either operand.
    Or {
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
}

/// Parse an SPDX license expression.
pub fn parse(text: &str) -> Result<ExprNode, ParseError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError::new(text, 0, "empty license expression"));
    }

    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_or()?;

    if let Some(token) = parser.peek() {
        let detail = match token.kind {
            TokenKind::RParen => "unmatched ')'".to_string(),
            _ => format!("unexpected trailing token '{}'", token.text),
        };
        return Err(ParseError::new(text, token.offset, detail));
    }

    Ok(expr)
}

/// Every leaf identifier in `node`.
///
/// The `+` suffix is dropped and `WITH` exceptions are skipped: only the
/// base license of a `WITH` clause is collected.
pub fn license_ids(node: &ExprNode) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    node.collect_ids(&mut ids);
    ids
}

impl FromStr for ExprNode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl ExprNode {
    pub fn license_id(id: impl Into<String>) -> Self {
        ExprNode::LicenseId {
            id: id.into(),
            or_later: false,
        }
    }

    pub fn or_later(id: impl Into<String>) -> Self {
        ExprNode::LicenseId {
            id: id.into(),
            or_later: true,
        }
    }

    pub fn with(license: ExprNode, exception: impl Into<String>) -> Self {
        ExprNode::With {
            license: Box::new(license),
            exception: exception.into(),
        }
    }

    pub fn and(left: ExprNode, right: ExprNode) -> Self {
        ExprNode::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: ExprNode, right: ExprNode) -> Self {
        ExprNode::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `true` for `LicenseId` and `LicenseRef`.
    pub fn is_leaf(&self) -> bool {
        matches!(self, ExprNode::LicenseId { .. } | ExprNode::LicenseRef { .. })
    }

    pub fn license_ids(&self) -> BTreeSet<String> {
        license_ids(self)
    }

    fn collect_ids(&self, ids: &mut BTreeSet<String>) {
        match self {
            ExprNode::LicenseId { id, .. } => {
                ids.insert(id.clone());
            }
            ExprNode::LicenseRef { .. } => {
                ids.insert(self.to_string());
            }
            ExprNode::With { license, .. } => license.collect_ids(ids),
            ExprNode::And { left, right } | ExprNode::Or { left, right } => {
                left.collect_ids(ids);
                right.collect_ids(ids);
            }
        }
    }

    /// Rebuild the tree with every `LicenseId` identifier passed through `f`.
    ///
    /// Refs, exceptions and or-later flags are left untouched.
    pub fn map_ids<F>(&self, f: &F) -> ExprNode
    where
        F: Fn(&str) -> String,
    {
        self.map_leaves(&|id: &str, or_later: bool| (f(id), or_later))
    }

    /// Like [`ExprNode::map_ids`], but `f` also sees and may rewrite the
    /// or-later flag of each `LicenseId`.
    pub fn map_leaves<F>(&self, f: &F) -> ExprNode
    where
        F: Fn(&str, bool) -> (String, bool),
    {
        match self {
            ExprNode::LicenseId { id, or_later } => {
                let (id, or_later) = f(id, *or_later);
                ExprNode::LicenseId { id, or_later }
            }
            ExprNode::LicenseRef { .. } => self.clone(),
            ExprNode::With { license, exception } => ExprNode::With {
                license: Box::new(license.map_leaves(f)),
                exception: exception.clone(),
            },
            ExprNode::And { left, right } => {
                ExprNode::and(left.map_leaves(f), right.map_leaves(f))
            }
            ExprNode::Or { left, right } => ExprNode::or(left.map_leaves(f), right.map_leaves(f)),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            ExprNode::Or { .. } => 1,
            ExprNode::And { .. } => 2,
            _ => 3,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8, right: bool) -> fmt::Result {
        // Chains fold left, so a right operand of equal precedence needs
        // parentheses to reparse into the same tree.
        let own = self.precedence();
        if own < parent || (right && own == parent) {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprNode::LicenseId { id, or_later } => {
                write!(f, "{}", id)?;
                if *or_later {
                    write!(f, "+")?;
                }
                Ok(())
            }
            ExprNode::LicenseRef {
                license_ref,
                document_ref,
            } => match document_ref {
                Some(doc) => write!(f, "{}:{}", doc, license_ref),
                None => write!(f, "{}", license_ref),
            },
            ExprNode::With { license, exception } => {
                license.fmt_operand(f, 3, false)?;
                write!(f, " WITH {}", exception)
            }
            ExprNode::And { left, right } => {
                left.fmt_operand(f, 2, false)?;
                write!(f, " AND ")?;
                right.fmt_operand(f, 2, true)
            }
            ExprNode::Or { left, right } => {
                left.fmt_operand(f, 1, false)?;
                write!(f, " OR ")?;
                right.fmt_operand(f, 1, true)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Recursive descent parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn previous(&self) -> Option<&Token<'a>> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, offset: usize, detail: impl Into<String>) -> ParseError {
        ParseError::new(self.text, offset, detail)
    }

    /// Parse an OR-level expression (lowest precedence).
    fn parse_or(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = ExprNode::or(left, right);
        }
        Ok(left)
    }

    /// Parse an AND-level expression.
    fn parse_and(&mut self) -> Result<ExprNode, ParseError> {
        let mut left = self.parse_with()?;
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::And)) {
            self.advance();
            let right = self.parse_with()?;
            left = ExprNode::and(left, right);
        }
        Ok(left)
    }

    /// Parse a simple expression with an optional `WITH` exception.
    fn parse_with(&mut self) -> Result<ExprNode, ParseError> {
        let base = self.parse_simple()?;

        let with_offset = match self.peek() {
            Some(token) if token.kind == TokenKind::With => token.offset,
            _ => return Ok(base),
        };
        if !base.is_leaf() {
            return Err(self.error(
                with_offset,
                "WITH must follow a single license identifier, not a compound expression",
            ));
        }
        self.advance();

        let exception = match self.advance() {
            Some(Token {
                kind: TokenKind::Id { or_later: true, .. },
                offset,
                text,
            }) => {
                return Err(self.error(
                    offset + text.len() - 1,
                    "an exception cannot carry the or-later suffix '+'",
                ));
            }
            Some(Token {
                kind: TokenKind::Id { .. },
                text,
                ..
            }) => text.to_string(),
            Some(token) if token.is_operator() => {
                return Err(self.error(
                    token.offset,
                    format!("consecutive operators 'WITH' and '{}'", token.text),
                ));
            }
            Some(token) => {
                return Err(self.error(
                    token.offset,
                    format!("expected an exception identifier after 'WITH', found '{}'", token.text),
                ));
            }
            None => {
                return Err(self.error(
                    self.text.len(),
                    "operator 'WITH' is missing its right operand",
                ));
            }
        };

        Ok(ExprNode::with(base, exception))
    }

    /// Parse a parenthesized expression or a single license identifier.
    fn parse_simple(&mut self) -> Result<ExprNode, ParseError> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.missing_operand_at_end()),
        };

        match token.kind {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(self.error(
                        other.offset,
                        format!("unexpected token '{}', expected ')'", other.text),
                    )),
                    None => Err(self.error(token.offset, "unclosed '('")),
                }
            }
            TokenKind::RParen => {
                let detail = match self.previous() {
                    Some(prev) if prev.is_operator() => {
                        format!("operator '{}' is missing its right operand", prev.text)
                    }
                    Some(prev) if prev.kind == TokenKind::LParen => {
                        "empty parentheses".to_string()
                    }
                    _ => "unmatched ')'".to_string(),
                };
                Err(self.error(token.offset, detail))
            }
            TokenKind::And | TokenKind::Or | TokenKind::With => {
                let detail = match self.previous() {
                    Some(prev) if prev.is_operator() => {
                        format!("consecutive operators '{}' and '{}'", prev.text, token.text)
                    }
                    _ => format!("operator '{}' is missing its left operand", token.text),
                };
                Err(self.error(token.offset, detail))
            }
            TokenKind::Id {
                document_ref,
                id,
                or_later,
            } => {
                self.advance();
                leaf(self.text, &token, document_ref, id, or_later)
            }
        }
    }

    fn missing_operand_at_end(&self) -> ParseError {
        match self.previous() {
            Some(prev) if prev.is_operator() => self.error(
                self.text.len(),
                format!("operator '{}' is missing its right operand", prev.text),
            ),
            Some(prev) if prev.kind == TokenKind::LParen => self.error(prev.offset, "unclosed '('"),
            _ => self.error(self.text.len(), "unexpected end of expression"),
        }
    }
}

fn leaf(
    text: &str,
    token: &Token<'_>,
    document_ref: Option<&str>,
    id: &str,
    or_later: bool,
) -> Result<ExprNode, ParseError> {
    let is_ref = id.starts_with("LicenseRef-") || id.starts_with("AdditionRef-");
    if !is_ref {
        return Ok(ExprNode::LicenseId {
            id: id.to_string(),
            or_later,
        });
    }

    let prefix_len = if id.starts_with("LicenseRef-") {
        "LicenseRef-".len()
    } else {
        "AdditionRef-".len()
    };
    if id.len() == prefix_len {
        return Err(ParseError::new(
            text,
            token.offset + token.text.len(),
            format!("'{}' must be followed by an identifier", id),
        ));
    }
    if or_later {
        return Err(ParseError::new(
            text,
            token.offset + token.text.len() - 1,
            "a LicenseRef cannot carry the or-later suffix '+'",
        ));
    }

    Ok(ExprNode::LicenseRef {
        license_ref: id.to_string(),
        document_ref: document_ref.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ExprNode {
        ExprNode::license_id(s)
    }

    #[test]
    fn test_simple() {
        assert_eq!(parse("MIT").unwrap(), id("MIT"));
        assert_eq!(parse("  Apache-2.0 ").unwrap(), id("Apache-2.0"));
    }

    #[test]
    fn test_or_later() {
        assert_eq!(parse("GPL-2.0+").unwrap(), ExprNode::or_later("GPL-2.0"));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(
            parse("A OR B AND C").unwrap(),
            ExprNode::or(id("A"), ExprNode::and(id("B"), id("C")))
        );
    }

    #[test]
    fn test_with_binds_tighter_than_and() {
        assert_eq!(
            parse("A WITH X AND B").unwrap(),
            ExprNode::and(ExprNode::with(id("A"), "X"), id("B"))
        );
    }

    #[test]
    fn test_left_associative_chains() {
        assert_eq!(
            parse("A AND B AND C").unwrap(),
            ExprNode::and(ExprNode::and(id("A"), id("B")), id("C"))
        );
        assert_eq!(
            parse("A or B or C").unwrap(),
            ExprNode::or(ExprNode::or(id("A"), id("B")), id("C"))
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(
            parse("(A OR B) AND C").unwrap(),
            ExprNode::and(ExprNode::or(id("A"), id("B")), id("C"))
        );
    }

    #[test]
    fn test_parenthesized_leaf_accepts_with() {
        assert_eq!(
            parse("(GPL-2.0-only) WITH Classpath-exception-2.0").unwrap(),
            ExprNode::with(id("GPL-2.0-only"), "Classpath-exception-2.0")
        );
    }

    #[test]
    fn test_license_ref_forms() {
        assert_eq!(
            parse("LicenseRef-acme").unwrap(),
            ExprNode::LicenseRef {
                license_ref: "LicenseRef-acme".into(),
                document_ref: None,
            }
        );
        assert_eq!(
            parse("DocumentRef-sbom:LicenseRef-acme").unwrap(),
            ExprNode::LicenseRef {
                license_ref: "LicenseRef-acme".into(),
                document_ref: Some("DocumentRef-sbom".into()),
            }
        );
        assert!(matches!(
            parse("AdditionRef-extra").unwrap(),
            ExprNode::LicenseRef { .. }
        ));
    }

    #[test]
    fn test_round_trip() {
        let inputs = [
            "MIT",
            "GPL-2.0+",
            "MIT OR Apache-2.0",
            "A OR B AND C",
            "(A OR B) AND C",
            "A AND (B AND C)",
            "A OR (B OR C)",
            "((A OR B) AND (C OR D)) OR E",
            "GPL-2.0-or-later WITH Classpath-exception-2.0 AND MIT",
            "DocumentRef-x:LicenseRef-y OR LicenseRef-z",
            "Apache-2.0 WITH DocumentRef-x:AdditionRef-llvm",
            "mit and (isc or 0BSD+)",
        ];
        for input in inputs {
            let first = parse(input).unwrap();
            let second = parse(&first.to_string()).unwrap();
            assert_eq!(first, second, "round trip of {input:?} via {first}");
        }
    }

    #[test]
    fn test_display_minimal_parens() {
        assert_eq!(parse("(A AND B) OR C").unwrap().to_string(), "A AND B OR C");
        assert_eq!(parse("A AND (B OR C)").unwrap().to_string(), "A AND (B OR C)");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let a = parse("MIT OR (Apache-2.0 AND ISC)").unwrap();
        let b = parse("MIT OR (Apache-2.0 AND ISC)").unwrap();
        assert_eq!(a, b);
        assert_eq!(license_ids(&a), license_ids(&b));
    }

    #[test]
    fn test_license_ids_skips_exceptions_and_suffix() {
        let expr = parse("GPL-2.0+ WITH Classpath-exception-2.0 OR MIT AND LicenseRef-x").unwrap();
        let ids: Vec<String> = license_ids(&expr).into_iter().collect();
        assert_eq!(ids, vec!["GPL-2.0", "LicenseRef-x", "MIT"]);
    }

    #[test]
    fn test_map_ids_preserves_shape() {
        let expr = parse("GPL-2.0+ WITH Classpath-exception-2.0 OR LicenseRef-x").unwrap();
        let mapped = expr.map_ids(&|id: &str| {
            if id == "GPL-2.0" {
                "GPL-2.0-only".to_string()
            } else {
                id.to_string()
            }
        });
        assert_eq!(
            mapped.to_string(),
            "GPL-2.0-only+ WITH Classpath-exception-2.0 OR LicenseRef-x"
        );
    }

    #[test]
    fn test_map_leaves_can_drop_or_later() {
        let expr = parse("GPL-2.0+ AND MIT+").unwrap();
        let mapped = expr.map_leaves(&|id: &str, or_later: bool| {
            if id == "GPL-2.0" && or_later {
                ("GPL-2.0-or-later".to_string(), false)
            } else {
                (id.to_string(), or_later)
            }
        });
        assert_eq!(mapped.to_string(), "GPL-2.0-or-later AND MIT+");
    }

    #[test]
    fn test_empty_input() {
        let err = parse("   ").unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(err.detail.contains("empty"));
    }

    #[test]
    fn test_leading_operator() {
        let err = parse("AND MIT").unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(err.detail.contains("left operand"));
    }

    #[test]
    fn test_trailing_operator() {
        let err = parse("MIT OR").unwrap_err();
        assert_eq!(err.offset, 6);
        assert!(err.detail.contains("right operand"));
    }

    #[test]
    fn test_consecutive_operators() {
        let err = parse("MIT AND OR ISC").unwrap_err();
        assert_eq!(err.offset, 8);
        assert!(err.detail.contains("consecutive"));
    }

    #[test]
    fn test_unclosed_paren() {
        let err = parse("(MIT OR ISC").unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(err.detail.contains("unclosed"));
    }

    #[test]
    fn test_dangling_close_paren() {
        let err = parse("MIT)").unwrap_err();
        assert_eq!(err.offset, 3);
        assert!(err.detail.contains("unmatched ')'"));
    }

    #[test]
    fn test_mixed_case_operator_is_trailing_token() {
        let err = parse("MIT And ISC").unwrap_err();
        assert_eq!(err.offset, 4);
        assert!(err.detail.contains("trailing token 'And'"));
    }

    #[test]
    fn test_with_after_compound_is_rejected() {
        let err = parse("(MIT OR ISC) WITH Classpath-exception-2.0").unwrap_err();
        assert_eq!(err.offset, 13);
        assert!(err.detail.contains("WITH"));
    }

    #[test]
    fn test_with_missing_exception() {
        let err = parse("GPL-2.0-only WITH").unwrap_err();
        assert!(err.detail.contains("right operand"));
    }

    #[test]
    fn test_license_ref_rejects_or_later() {
        let err = parse("LicenseRef-acme+").unwrap_err();
        assert_eq!(err.offset, 15);
    }

    #[test]
    fn test_unexpected_character() {
        let err = parse("MIT, ISC").unwrap_err();
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn test_from_str() {
        let expr: ExprNode = "MIT OR ISC".parse().unwrap();
        assert_eq!(expr, ExprNode::or(id("MIT"), id("ISC")));
    }
}
