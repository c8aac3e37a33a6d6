//! Disassembler: program words back to readable listings.
//!
//! Decoding is a linear sweep from address 0. Words that are not opcodes,
//! and opcodes whose operand runs past the end of the program, are shown as
//! `.word` directives, so the human listing always re-assembles to the same
//! words.

use serde::Serialize;

use super::WORD_DIRECTIVE;
use crate::vm::{Op, Word};

/// One decoded listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    /// Address of the first word
    pub addr: usize,
    /// Mnemonic, or `.word` for raw data
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operand: Option<Word>,
    /// Number of words covered
    #[serde(skip)]
    pub width: usize,
}

impl Line {
    /// Whether `pc` points at one of this entry's words.
    pub fn covers(&self, pc: usize) -> bool {
        (self.addr..self.addr + self.width).contains(&pc)
    }

    /// Assembly text without address or comment.
    pub fn text(&self) -> String {
        match self.operand {
            Some(operand) => format!("{} {}", self.op, operand),
            None => self.op.to_string(),
        }
    }
}

/// Decode `words` into listing entries.
pub fn disassemble(words: &[Word]) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut addr = 0;

    while let Some(&word) = words.get(addr) {
        let line = match Op::from_word(word) {
            Some(op) if op.arity() == 0 => Line {
                addr,
                op: op.name(),
                operand: None,
                width: 1,
            },
            Some(op) if addr + 1 < words.len() => Line {
                addr,
                op: op.name(),
                operand: Some(words[addr + 1]),
                width: 2,
            },
            _ => Line {
                addr,
                op: WORD_DIRECTIVE,
                operand: Some(word),
                width: 1,
            },
        };
        addr += line.width;
        lines.push(line);
    }

    lines
}

/// Human listing: one entry per line, address and character hints in comments.
pub fn render_human(lines: &[Line]) -> String {
    let mut out = String::new();
    for line in lines {
        let text = line.text();
        let hint = match (line.op, line.operand) {
            (op, Some(value)) if op == Op::Push.name() => printable(value)
                .map(|c| format!(" {:?}", c))
                .unwrap_or_default(),
            _ => String::new(),
        };
        out.push_str(&format!("    {:<20}; {:04}{}\n", text, line.addr, hint));
    }
    out
}

/// JSON listing: an array of `{ addr, op, operand }` records.
pub fn render_json(lines: &[Line]) -> String {
    serde_json::to_string_pretty(lines).unwrap_or_else(|_| "[]".to_string())
}

fn printable(value: Word) -> Option<char> {
    u8::try_from(value)
        .ok()
        .map(char::from)
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
}
