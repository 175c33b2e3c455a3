//! Tokenizer for SPDX license expressions.
//!
//! Produces a flat list of tokens, each remembering its byte offset so the
//! parser can point at the exact spot of a syntax error.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind<'a> {
    And,
    Or,
    With,
    LParen,
    RParen,
    /// An idstring, possibly qualified with `DocumentRef-<id>:` and/or
    /// followed by the `+` or-later suffix.
    Id {
        document_ref: Option<&'a str>,
        id: &'a str,
        or_later: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub offset: usize,
    pub text: &'a str,
}

impl Token<'_> {
    pub fn is_operator(&self) -> bool {
        matches!(self.kind, TokenKind::And | TokenKind::Or | TokenKind::With)
    }
}

fn is_id_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'-'
}

/// Operators are recognised only in all-uppercase or all-lowercase spelling.
fn keyword(word: &str) -> Option<TokenKind<'static>> {
    match word {
        "AND" | "and" => Some(TokenKind::And),
        "OR" | "or" => Some(TokenKind::Or),
        "WITH" | "with" => Some(TokenKind::With),
        _ => None,
    }
}

fn scan_id(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_id_byte(bytes[end]) {
        end += 1;
    }
    end
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];

        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        match b {
            b'(' | b')' => {
                let kind = if b == b'(' {
                    TokenKind::LParen
                } else {
                    TokenKind::RParen
                };
                tokens.push(Token {
                    kind,
                    offset: pos,
                    text: &text[pos..pos + 1],
                });
                pos += 1;
            }
            b'+' => {
                return Err(ParseError::new(
                    text,
                    pos,
                    "'+' must directly follow a license identifier",
                ));
            }
            _ if is_id_byte(b) => {
                let start = pos;
                let mut end = scan_id(bytes, start);
                let mut document_ref = None;
                let mut id = &text[start..end];

                if end < bytes.len() && bytes[end] == b':' && id.starts_with("DocumentRef-") {
                    let ref_start = end + 1;
                    let ref_end = scan_id(bytes, ref_start);
                    let license_ref = &text[ref_start..ref_end];
                    if !(license_ref.starts_with("LicenseRef-")
                        || license_ref.starts_with("AdditionRef-"))
                    {
                        return Err(ParseError::new(
                            text,
                            ref_start,
                            format!(
                                "'{}:' must be followed by a LicenseRef- or AdditionRef- identifier",
                                id
                            ),
                        ));
                    }
                    document_ref = Some(id);
                    id = license_ref;
                    end = ref_end;
                }

                if document_ref.is_none() {
                    if let Some(kind) = keyword(id) {
                        tokens.push(Token {
                            kind,
                            offset: start,
                            text: id,
                        });
                        pos = end;
                        continue;
                    }
                }

                let or_later = end < bytes.len() && bytes[end] == b'+';
                if or_later {
                    end += 1;
                }

                tokens.push(Token {
                    kind: TokenKind::Id {
                        document_ref,
                        id,
                        or_later,
                    },
                    offset: start,
                    text: &text[start..end],
                });
                pos = end;
            }
            _ => {
                let ch = text[pos..].chars().next().unwrap_or('?');
                return Err(ParseError::new(
                    text,
                    pos,
                    format!("unexpected character '{}'", ch),
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind<'_>> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_operators_and_parens() {
        assert_eq!(
            kinds("(MIT or Apache-2.0) AND ISC"),
            vec![
                TokenKind::LParen,
                TokenKind::Id { document_ref: None, id: "MIT", or_later: false },
                TokenKind::Or,
                TokenKind::Id { document_ref: None, id: "Apache-2.0", or_later: false },
                TokenKind::RParen,
                TokenKind::And,
                TokenKind::Id { document_ref: None, id: "ISC", or_later: false },
            ]
        );
    }

    #[test]
    fn test_mixed_case_keyword_is_identifier() {
        assert_eq!(
            kinds("And"),
            vec![TokenKind::Id { document_ref: None, id: "And", or_later: false }]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(
            kinds("ANDROID"),
            vec![TokenKind::Id { document_ref: None, id: "ANDROID", or_later: false }]
        );
    }

    #[test]
    fn test_or_later_suffix() {
        let tokens = tokenize("GPL-2.0+").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "GPL-2.0+");
        assert_eq!(
            tokens[0].kind,
            TokenKind::Id { document_ref: None, id: "GPL-2.0", or_later: true }
        );
    }

    #[test]
    fn test_detached_plus_is_rejected() {
        let err = tokenize("GPL-2.0 +").unwrap_err();
        assert_eq!(err.offset, 8);
    }

    #[test]
    fn test_document_ref() {
        let tokens = tokenize("DocumentRef-spdx-tool-1.2:LicenseRef-MIT-Style-2").unwrap();
        assert_eq!(
            tokens[0].kind,
            TokenKind::Id {
                document_ref: Some("DocumentRef-spdx-tool-1.2"),
                id: "LicenseRef-MIT-Style-2",
                or_later: false,
            }
        );
    }

    #[test]
    fn test_document_ref_requires_license_ref() {
        let err = tokenize("DocumentRef-x:MIT").unwrap_err();
        assert_eq!(err.offset, 14);
    }

    #[test]
    fn test_unexpected_character_offset() {
        let err = tokenize("MIT / Apache-2.0").unwrap_err();
        assert_eq!(err.offset, 4);
        assert!(err.detail.contains("'/'"));
    }
}
