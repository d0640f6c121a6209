//! Operator and punctuation recognition.
//!
//! Symbols are matched with a prefix trie keyed by byte. The scanner walks
//! the trie as far as the input allows and keeps the deepest node that ends
//! a valid symbol, so `<<=` is one `LSAssign` token while `<<x` yields
//! `LowerLower` and leaves `x` for the next token.
//!
//! The trie is built on first use and shared, read-only, by every scanner
//! in the process.

use std::sync::OnceLock;

use hlslcc_syntax::TokenKind;

/// Every token whose text is made of symbol characters.
pub(crate) const SYMBOLS: &[TokenKind] = &[
    TokenKind::Plus,
    TokenKind::PlusEqual,
    TokenKind::PlusPlus,
    TokenKind::Minus,
    TokenKind::MinusEqual,
    TokenKind::MinusMinus,
    TokenKind::Times,
    TokenKind::TimesEqual,
    TokenKind::Div,
    TokenKind::DivEqual,
    TokenKind::Mod,
    TokenKind::ModEqual,
    TokenKind::LeftParenthesis,
    TokenKind::RightParenthesis,
    TokenKind::LeftSquareBracket,
    TokenKind::RightSquareBracket,
    TokenKind::LeftBrace,
    TokenKind::RightBrace,
    TokenKind::Equal,
    TokenKind::EqualEqual,
    TokenKind::Not,
    TokenKind::NotEqual,
    TokenKind::Lower,
    TokenKind::LowerEqual,
    TokenKind::LowerLower,
    TokenKind::LSAssign,
    TokenKind::Greater,
    TokenKind::GreaterEqual,
    TokenKind::GreaterGreater,
    TokenKind::RSAssign,
    TokenKind::And,
    TokenKind::AndAnd,
    TokenKind::AndEqual,
    TokenKind::Or,
    TokenKind::OrOr,
    TokenKind::OrEqual,
    TokenKind::Xor,
    TokenKind::XorEqual,
    TokenKind::Neg,
    TokenKind::Question,
    TokenKind::Colon,
    TokenKind::ColonColon,
    TokenKind::Semicolon,
    TokenKind::Comma,
    TokenKind::Dot,
];

#[derive(Default)]
struct Node {
    children: Vec<(u8, u32)>,
    token: Option<TokenKind>,
}

pub(crate) struct SymbolTrie {
    nodes: Vec<Node>,
}

impl SymbolTrie {
    fn build() -> Self {
        let mut trie = SymbolTrie {
            nodes: vec![Node::default()],
        };
        for &kind in SYMBOLS {
            if let Some(text) = kind.fixed_text() {
                trie.insert(text.as_bytes(), kind);
            }
        }
        trie
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "the symbol set has well under 2^32 nodes"
    )]
    fn insert(&mut self, text: &[u8], kind: TokenKind) {
        let mut node = 0usize;
        for &byte in text {
            let existing = self.nodes[node]
                .children
                .iter()
                .find(|(b, _)| *b == byte)
                .map(|&(_, child)| child as usize);
            node = match existing {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children.push((byte, child as u32));
                    child
                }
            };
        }
        self.nodes[node].token = Some(kind);
    }

    fn child(&self, node: usize, byte: u8) -> Option<usize> {
        self.nodes
            .get(node)?
            .children
            .iter()
            .find(|(b, _)| *b == byte)
            .map(|&(_, child)| child as usize)
    }

    /// Longest symbol at the start of `input`, with its length in bytes.
    pub(crate) fn longest_match(&self, input: &[u8]) -> Option<(TokenKind, usize)> {
        let mut node = 0;
        let mut best = None;
        for (depth, &byte) in input.iter().enumerate() {
            match self.child(node, byte) {
                Some(next) => node = next,
                None => break,
            }
            if let Some(kind) = self.nodes[node].token {
                best = Some((kind, depth + 1));
            }
        }
        best
    }
}

static TRIE: OnceLock<SymbolTrie> = OnceLock::new();

/// The process-wide symbol trie.
pub(crate) fn trie() -> &'static SymbolTrie {
    TRIE.get_or_init(SymbolTrie::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_match_prefers_longer_symbols() {
        let trie = trie();
        assert_eq!(trie.longest_match(b"<<="), Some((TokenKind::LSAssign, 3)));
        assert_eq!(trie.longest_match(b"<<x"), Some((TokenKind::LowerLower, 2)));
        assert_eq!(trie.longest_match(b"<x"), Some((TokenKind::Lower, 1)));
        assert_eq!(trie.longest_match(b">=1"), Some((TokenKind::GreaterEqual, 2)));
        assert_eq!(trie.longest_match(b"::"), Some((TokenKind::ColonColon, 2)));
        assert_eq!(trie.longest_match(b"@"), None);
    }

    /// Every symbol matches itself in full.
    #[test]
    fn every_symbol_matches_itself() {
        for &kind in SYMBOLS {
            let text = kind.fixed_text().unwrap_or_default();
            assert_eq!(trie().longest_match(text.as_bytes()), Some((kind, text.len())));
        }
    }

    #[test]
    fn trie_is_shared() {
        assert!(std::ptr::eq(trie(), trie()));
    }
}
