use std::fmt;

/// The VM's only value type.
///
/// A word is an opcode, an operand, a stack value or an address depending on
/// where in the fetch cycle it is consumed. It carries no tag.
pub type Word = i32;

/// Width of a [`Word`] in bytes, as laid out in program files.
pub const WORD_SIZE: usize = 4;

/// A word used as a jump target.
///
/// Same representation as [`Word`]; the wrapper only keeps addresses and
/// plain values apart in function signatures. Any value is constructible,
/// bounds are checked when the jump happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub Word);

impl Address {
    /// The address as a program index, or `None` if it is negative.
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl From<Word> for Address {
    fn from(word: Word) -> Self {
        Address(word)
    }
}

impl From<Address> for Word {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render a word the way PRINT writes it: as a Unicode scalar value, with
/// U+FFFD standing in for anything that is not one.
pub fn word_to_char(word: Word) -> char {
    char::from_u32(word as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}
