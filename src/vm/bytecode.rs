//! Program file encoding.
//!
//! Binary format:
//! - A flat sequence of words, each a 4-byte big-endian signed integer
//! - No header, footer or padding
//!
//! A valid file is therefore a positive multiple of 4 bytes long.

use super::value::{WORD_SIZE, Word};

/// Error type for bytecode decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BytecodeError {
    /// Length is zero or not a whole number of words
    #[error("bad program length: {len} bytes is not a positive multiple of {}", WORD_SIZE)]
    MalformedEncoding { len: usize },
}

/// Decode a program file into words, in stream order.
pub fn decode(data: &[u8]) -> Result<Vec<Word>, BytecodeError> {
    if data.is_empty() || data.len() % WORD_SIZE != 0 {
        return Err(BytecodeError::MalformedEncoding { len: data.len() });
    }

    let words = data
        .chunks_exact(WORD_SIZE)
        .map(|chunk| Word::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok(words)
}

/// Encode words into the program file format.
pub fn encode(words: &[Word]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(words.len() * WORD_SIZE);
    for word in words {
        buf.extend_from_slice(&word.to_be_bytes());
    }
    buf
}
