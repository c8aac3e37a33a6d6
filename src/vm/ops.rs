use std::fmt;

use super::value::Word;

/// Instruction set of the stack VM.
///
/// The discriminant is the opcode word as it appears in program memory.
/// Opcodes with an immediate operand read it from the word that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Op {
    Halt = 0,
    Nop = 1,
    Print = 2,
    Push = 3, // [imm]
    Pop = 4,
    Add = 5,
    Jmp = 6,
    Jz = 7,   // [imm]
    Jnz = 8,  // [imm]
    Call = 9, // [imm]
    Ret = 10,
}

/// Largest number of immediate operands any opcode takes.
pub const MAX_ARITY: usize = 1;

impl Op {
    /// Every opcode, in opcode order.
    pub const ALL: [Op; 11] = [
        Op::Halt,
        Op::Nop,
        Op::Print,
        Op::Push,
        Op::Pop,
        Op::Add,
        Op::Jmp,
        Op::Jz,
        Op::Jnz,
        Op::Call,
        Op::Ret,
    ];

    /// Decode an opcode word. `None` for anything outside the instruction set.
    pub fn from_word(word: Word) -> Option<Op> {
        usize::try_from(word)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    /// The opcode word.
    pub fn word(self) -> Word {
        self as Word
    }

    /// Number of immediate operand words following the opcode.
    pub fn arity(self) -> usize {
        match self {
            Op::Push | Op::Jz | Op::Jnz | Op::Call => 1,
            Op::Halt | Op::Nop | Op::Print | Op::Pop | Op::Add | Op::Jmp | Op::Ret => 0,
        }
    }

    /// Assembly mnemonic.
    pub fn name(self) -> &'static str {
        match self {
            Op::Halt => "HALT",
            Op::Nop => "NOP",
            Op::Print => "PRINT",
            Op::Push => "PUSH",
            Op::Pop => "POP",
            Op::Add => "ADD",
            Op::Jmp => "JMP",
            Op::Jz => "JZ",
            Op::Jnz => "JNZ",
            Op::Call => "CALL",
            Op::Ret => "RET",
        }
    }

    /// Look an opcode up by mnemonic, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Op> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
