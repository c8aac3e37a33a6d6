pub mod bytecode;
mod error;
mod ops;
mod output;
mod stack;
mod value;
mod vm;

pub use error::VmError;
pub use ops::{MAX_ARITY, Op};
pub use output::SharedOutput;
pub use stack::BoundedStack;
pub use value::{Address, WORD_SIZE, Word, word_to_char};
pub use vm::{ControlFlow, VM};

/// A loaded program: a non-empty, immutable sequence of words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    words: Box<[Word]>,
}

impl Program {
    /// Copy `words` into a new program.
    ///
    /// Fails on an empty slice, and on one too long for every address
    /// (including the one-past-the-end pc that CALL may save) to fit in a word.
    pub fn new(words: &[Word]) -> Result<Self, VmError> {
        if words.is_empty() {
            return Err(VmError::EmptyProgram);
        }
        if words.len() > Word::MAX as usize {
            return Err(VmError::ProgramTooLarge { len: words.len() });
        }
        Ok(Self {
            words: words.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Always false; kept for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<Word> {
        self.words.get(pc).copied()
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }
}
