//! Errors raised by the execution engine.

use std::io;

use super::ops::Op;
use super::value::Word;

/// A failure while loading or running a program.
///
/// Every variant is terminal for the run that produced it: the engine stops
/// and hands the error back unchanged.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Push attempted on a full stack.
    #[error("stack overflow")]
    StackOverflow,

    /// Pop attempted on an empty stack.
    #[error("stack underflow")]
    StackUnderflow,

    /// The program counter left program memory during a fetch.
    #[error("program out of bounds: pc {pc}, program length {len}")]
    OutOfBounds { pc: usize, len: usize },

    /// A jump target outside program memory.
    #[error("jump out of memory bounds: address {addr}, program length {len}")]
    JumpOutOfBounds { addr: Word, len: usize },

    /// The fetched word is not a known opcode.
    #[error("unknown opcode {opcode} at address {pc}")]
    UnknownOpcode { opcode: Word, pc: usize },

    /// Storage for a stack of the requested capacity could not be allocated.
    #[error("cannot allocate a stack of {capacity} words")]
    StackAllocation { capacity: usize },

    /// Load attempted with no words.
    #[error("empty program")]
    EmptyProgram,

    /// The program is too long for its addresses to fit in a word.
    #[error("program too large: {len} words")]
    ProgramTooLarge { len: usize },

    /// An opcode was executed without the immediate operand it needs.
    #[error("missing operand for {op}")]
    MissingOperand { op: Op },

    /// Writing to the output sink failed.
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}
