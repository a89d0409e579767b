use serde::{Deserialize, Serialize};

/// A single token produced by tokenization. Positions are 1-based and
/// strictly increasing within one field value (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub position: u32,
    pub offset: usize,
    pub length: usize,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Word,
    Number,
    Symbol,
}

impl Token {
    pub fn new(text: String, position: u32, offset: usize) -> Self {
        let length = text.len();
        Token { text, position, offset, length, token_type: TokenType::Word }
    }
}
