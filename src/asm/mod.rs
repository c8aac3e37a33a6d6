//! Assembly language for the stack VM.
//!
//! Converts human-readable assembly source into program words, and back
//! (see [`dump`]).
//!
//! # Syntax
//!
//! ```text
//! start:              ; a label names the address of the next word
//!     PUSH 'H'        ; character literal
//!     PRINT
//!     PUSH 0
//!     JZ done         ; label operand
//! done:
//!     HALT
//!     .word 0x2a      ; raw word
//! ```
//!
//! - One instruction per line; mnemonics are case-insensitive
//! - Operands are decimal or `0x` hex integers (optionally negative),
//!   character literals, or label names
//! - Comments start with `;`

pub mod dump;

use std::collections::HashMap;
use std::fmt::Write;
use std::num::IntErrorKind;

use crate::vm::{Op, Word};

const COMMENT_CHAR: char = ';';
const LABEL_SUFFIX: char = ':';
const QUOTE: char = '\'';

/// Mnemonic of the raw-word directive.
pub const WORD_DIRECTIVE: &str = ".word";

/// Errors produced while assembling. Every variant carries its 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    #[error("line {line}: unknown instruction `{name}`")]
    UnknownInstruction { line: usize, name: String },

    #[error("line {line}: {name} takes {expected} operand(s), found {found}")]
    ArityMismatch {
        line: usize,
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid operand `{text}`")]
    InvalidOperand { line: usize, text: String },

    #[error("line {line}: `{text}` does not fit in a 32-bit word")]
    OutOfRange { line: usize, text: String },

    #[error("line {line}: invalid label name `{name}`")]
    InvalidLabel { line: usize, name: String },

    #[error("line {line}: duplicate label `{name}`")]
    DuplicateLabel { line: usize, name: String },

    #[error("line {line}: undefined label `{name}`")]
    UndefinedLabel { line: usize, name: String },

    #[error("line {line}: unterminated character literal")]
    UnterminatedChar { line: usize },
}

impl AsmError {
    pub fn line(&self) -> usize {
        match self {
            AsmError::UnknownInstruction { line, .. }
            | AsmError::ArityMismatch { line, .. }
            | AsmError::InvalidOperand { line, .. }
            | AsmError::OutOfRange { line, .. }
            | AsmError::InvalidLabel { line, .. }
            | AsmError::DuplicateLabel { line, .. }
            | AsmError::UndefinedLabel { line, .. }
            | AsmError::UnterminatedChar { line } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Value(Word),
    Label(String),
}

#[derive(Debug)]
enum Item {
    Instruction { op: Op, operand: Option<Operand> },
    Data(Operand),
}

impl Item {
    /// Number of words the item occupies.
    fn size(&self) -> usize {
        match self {
            Item::Instruction { op, .. } => 1 + op.arity(),
            Item::Data(_) => 1,
        }
    }
}

/// Assemble `source` into program words.
///
/// Two passes: the first records label addresses, the second resolves label
/// operands, so labels may be used before they are defined.
pub fn assemble(source: &str) -> Result<Vec<Word>, AsmError> {
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut items: Vec<(usize, Item)> = Vec::new();
    let mut addr = 0usize;

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let mut tokens = tokenize(line, raw)?;

        while let Some(name) = tokens.first().and_then(|t| t.strip_suffix(LABEL_SUFFIX)) {
            if !is_identifier(name) {
                return Err(AsmError::InvalidLabel {
                    line,
                    name: name.to_string(),
                });
            }
            if labels.insert(name.to_string(), addr).is_some() {
                return Err(AsmError::DuplicateLabel {
                    line,
                    name: name.to_string(),
                });
            }
            tokens.remove(0);
        }

        let Some((&head, args)) = tokens.split_first() else {
            continue;
        };
        let item = parse_item(line, head, args)?;
        addr += item.size();
        items.push((line, item));
    }

    let mut words = Vec::with_capacity(addr);
    for (line, item) in items {
        match item {
            Item::Instruction { op, operand } => {
                words.push(op.word());
                if let Some(operand) = operand {
                    words.push(resolve(line, operand, &labels)?);
                }
            }
            Item::Data(operand) => words.push(resolve(line, operand, &labels)?),
        }
    }
    Ok(words)
}

fn parse_item(line: usize, head: &str, args: &[&str]) -> Result<Item, AsmError> {
    if head.eq_ignore_ascii_case(WORD_DIRECTIVE) {
        let [arg] = args else {
            return Err(AsmError::ArityMismatch {
                line,
                name: WORD_DIRECTIVE.to_string(),
                expected: 1,
                found: args.len(),
            });
        };
        return Ok(Item::Data(parse_operand(line, arg)?));
    }

    let op = Op::from_name(head).ok_or_else(|| AsmError::UnknownInstruction {
        line,
        name: head.to_string(),
    })?;
    if args.len() != op.arity() {
        return Err(AsmError::ArityMismatch {
            line,
            name: op.name().to_string(),
            expected: op.arity(),
            found: args.len(),
        });
    }
    let operand = match args.first() {
        Some(arg) => Some(parse_operand(line, arg)?),
        None => None,
    };
    Ok(Item::Instruction { op, operand })
}

fn resolve(
    line: usize,
    operand: Operand,
    labels: &HashMap<String, usize>,
) -> Result<Word, AsmError> {
    match operand {
        Operand::Value(value) => Ok(value),
        Operand::Label(name) => {
            let addr = labels
                .get(&name)
                .copied()
                .ok_or_else(|| AsmError::UndefinedLabel {
                    line,
                    name: name.clone(),
                })?;
            Word::try_from(addr).map_err(|_| AsmError::OutOfRange { line, text: name })
        }
    }
}

/// Split a line into whitespace-separated tokens, dropping the comment.
///
/// Character literals are kept whole, so `' '` and `';'` are single tokens.
fn tokenize(line: usize, text: &str) -> Result<Vec<&str>, AsmError> {
    let mut out = Vec::with_capacity(4);
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == COMMENT_CHAR {
            break;
        }

        let mut end = text.len();
        if c == QUOTE {
            chars.next();
            let mut closed = false;
            while let Some((i, c)) = chars.next() {
                if c == '\\' {
                    chars.next();
                } else if c == QUOTE {
                    end = i + c.len_utf8();
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err(AsmError::UnterminatedChar { line });
            }
        } else {
            while let Some(&(i, c)) = chars.peek() {
                if c.is_whitespace() || c == COMMENT_CHAR {
                    end = i;
                    break;
                }
                chars.next();
            }
        }
        out.push(&text[start..end]);
    }

    Ok(out)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_operand(line: usize, text: &str) -> Result<Operand, AsmError> {
    if text.starts_with(QUOTE) {
        return parse_char(text)
            .map(|c| Operand::Value(c as Word))
            .ok_or_else(|| AsmError::InvalidOperand {
                line,
                text: text.to_string(),
            });
    }
    if is_identifier(text) {
        return Ok(Operand::Label(text.to_string()));
    }
    parse_int(line, text).map(Operand::Value)
}

/// Parse a quoted character literal with the usual escapes.
fn parse_char(text: &str) -> Option<char> {
    let inner = text.strip_prefix(QUOTE)?.strip_suffix(QUOTE)?;
    let mut chars = inner.chars();
    let c = match chars.next()? {
        '\\' => match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            _ => return None,
        },
        c => c,
    };
    chars.next().is_none().then_some(c)
}

fn parse_int(line: usize, text: &str) -> Result<Word, AsmError> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (radix, digits) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(AsmError::InvalidOperand {
            line,
            text: text.to_string(),
        });
    }

    let magnitude = i64::from_str_radix(digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => AsmError::OutOfRange {
            line,
            text: text.to_string(),
        },
        _ => AsmError::InvalidOperand {
            line,
            text: text.to_string(),
        },
    })?;
    let value = if negative { -magnitude } else { magnitude };
    Word::try_from(value).map_err(|_| AsmError::OutOfRange {
        line,
        text: text.to_string(),
    })
}

/// Format an assembly error with the offending source line underneath.
pub fn render_diagnostic(file: &str, source: &str, err: &AsmError) -> String {
    let mut diag = String::new();
    let line = err.line();
    let _ = writeln!(diag, "error: {err}");
    let _ = writeln!(diag, " --> {file}:{line}");
    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, raw_line.trim_end_matches('\r'));
    }
    diag
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALT: Word = Op::Halt as Word;
    const NOP: Word = Op::Nop as Word;
    const PRINT: Word = Op::Print as Word;
    const PUSH: Word = Op::Push as Word;
    const JMP: Word = Op::Jmp as Word;
    const JZ: Word = Op::Jz as Word;
    const CALL: Word = Op::Call as Word;
    const RET: Word = Op::Ret as Word;

    #[test]
    fn test_assemble_empty_source() {
        assert_eq!(assemble("").unwrap(), Vec::<Word>::new());
        assert_eq!(assemble("\n  \n; only a comment\n").unwrap(), Vec::<Word>::new());
    }

    #[test]
    fn test_assemble_hello() {
        let words = assemble("PUSH 72\nPRINT\nPUSH 105 ; 'i'\nPRINT\nHALT\n").unwrap();
        assert_eq!(words, vec![PUSH, 72, PRINT, PUSH, 105, PRINT, HALT]);
    }

    #[test]
    fn test_assemble_case_insensitive() {
        assert_eq!(assemble("push 1\nHalt").unwrap(), vec![PUSH, 1, HALT]);
    }

    #[test]
    fn test_assemble_literals() {
        let words = assemble(
            "PUSH -7\nPUSH 0x41\nPUSH -0x10\nPUSH 'A'\nPUSH ' '\nPUSH ';'\nPUSH '\\n'\nPUSH 'λ'",
        )
        .unwrap();
        assert_eq!(
            words,
            vec![PUSH, -7, PUSH, 65, PUSH, -16, PUSH, 32, PUSH, 59, PUSH, 10, PUSH, 0x3bb]
        );
    }

    #[test]
    fn test_assemble_word_bounds() {
        assert_eq!(
            assemble("PUSH 2147483647\nPUSH -2147483648").unwrap(),
            vec![PUSH, Word::MAX, PUSH, Word::MIN]
        );
        assert!(matches!(
            assemble("PUSH 2147483648"),
            Err(AsmError::OutOfRange { line: 1, .. })
        ));
        assert!(matches!(
            assemble("NOP\nPUSH 99999999999999999999"),
            Err(AsmError::OutOfRange { line: 2, .. })
        ));
    }

    #[test]
    fn test_assemble_labels_forward_and_backward() {
        let source = "
start:
    CALL greet
    PUSH start
    JMP
greet:
    PUSH 'o'
    PRINT
    RET
";
        let words = assemble(source).unwrap();
        assert_eq!(
            words,
            vec![CALL, 5, PUSH, 0, JMP, PUSH, 111, PRINT, RET]
        );
    }

    #[test]
    fn test_assemble_label_on_same_line() {
        let words = assemble("NOP\nloop: end: PUSH 0\nJZ loop\nJZ end").unwrap();
        assert_eq!(words, vec![NOP, PUSH, 0, JZ, 1, JZ, 1]);
    }

    #[test]
    fn test_assemble_word_directive() {
        let words = assemble("HALT\ndata: .word 42\n.word data\n.word 'x'").unwrap();
        assert_eq!(words, vec![HALT, 42, 1, 120]);
    }

    #[test]
    fn test_assemble_unknown_instruction() {
        assert_eq!(
            assemble("NOP\nMUL"),
            Err(AsmError::UnknownInstruction {
                line: 2,
                name: "MUL".to_string()
            })
        );
    }

    #[test]
    fn test_assemble_arity_mismatch() {
        assert!(matches!(
            assemble("PUSH"),
            Err(AsmError::ArityMismatch {
                line: 1,
                expected: 1,
                found: 0,
                ..
            })
        ));
        assert!(matches!(
            assemble("HALT 3"),
            Err(AsmError::ArityMismatch {
                expected: 0,
                found: 1,
                ..
            })
        ));
        assert!(matches!(
            assemble(".word"),
            Err(AsmError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_assemble_invalid_operands() {
        for bad in ["PUSH 12ab", "PUSH 0x", "PUSH -", "PUSH 'ab'", "PUSH '\\q'", "PUSH --1"] {
            assert!(
                matches!(assemble(bad), Err(AsmError::InvalidOperand { line: 1, .. })),
                "{}",
                bad
            );
        }
        assert_eq!(
            assemble("PUSH 'a"),
            Err(AsmError::UnterminatedChar { line: 1 })
        );
    }

    #[test]
    fn test_assemble_label_errors() {
        assert_eq!(
            assemble("a:\na:"),
            Err(AsmError::DuplicateLabel {
                line: 2,
                name: "a".to_string()
            })
        );
        assert_eq!(
            assemble("JZ nowhere"),
            Err(AsmError::UndefinedLabel {
                line: 1,
                name: "nowhere".to_string()
            })
        );
        assert!(matches!(
            assemble("1abc:"),
            Err(AsmError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn test_assemble_comment_without_space() {
        assert_eq!(assemble("NOP;x\nHALT").unwrap(), vec![NOP, HALT]);
    }

    #[test]
    fn test_diagnostic_points_at_line() {
        let source = "NOP\nBOGUS 1\n";
        let err = assemble(source).unwrap_err();
        let diag = render_diagnostic("prog.asm", source, &err);
        assert!(diag.contains("error: line 2: unknown instruction `BOGUS`"));
        assert!(diag.contains(" --> prog.asm:2"));
        assert!(diag.contains("   2 | BOGUS 1"));
    }
}
