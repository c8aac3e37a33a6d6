use super::error::VmError;
use super::value::Word;

/// A fixed-capacity LIFO of words.
///
/// All storage is allocated up front and zeroed; `push` and `pop` never
/// allocate. Slots at or above `top` are not part of the stack and are not
/// cleared on pop.
#[derive(Debug, Clone)]
pub struct BoundedStack {
    items: Box<[Word]>,
    top: usize,
}

impl BoundedStack {
    /// Create an empty stack holding at most `capacity` words.
    ///
    /// A capacity of zero is legal: every push overflows and every pop
    /// underflows. Fails with [`VmError::StackAllocation`] when the storage
    /// cannot be allocated.
    pub fn new(capacity: usize) -> Result<Self, VmError> {
        let mut items = Vec::new();
        items
            .try_reserve_exact(capacity)
            .map_err(|_| VmError::StackAllocation { capacity })?;
        items.resize(capacity, 0);
        Ok(Self {
            items: items.into_boxed_slice(),
            top: 0,
        })
    }

    /// Push a word. Fails with [`VmError::StackOverflow`] when full, leaving
    /// the stack unchanged.
    pub fn push(&mut self, value: Word) -> Result<(), VmError> {
        let slot = self.items.get_mut(self.top).ok_or(VmError::StackOverflow)?;
        *slot = value;
        self.top += 1;
        Ok(())
    }

    /// Pop the most recently pushed word. Fails with
    /// [`VmError::StackUnderflow`] when empty.
    pub fn pop(&mut self) -> Result<Word, VmError> {
        if self.top == 0 {
            return Err(VmError::StackUnderflow);
        }
        self.top -= 1;
        Ok(self.items[self.top])
    }

    /// The top word, without removing it.
    pub fn peek(&self) -> Option<Word> {
        self.as_slice().last().copied()
    }

    pub fn len(&self) -> usize {
        self.top
    }

    pub fn is_empty(&self) -> bool {
        self.top == 0
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// The live contents, bottom first.
    pub fn as_slice(&self) -> &[Word] {
        &self.items[..self.top]
    }
}
