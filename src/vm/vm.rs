use std::io::Write;

use crate::config::VmConfig;
use crate::vm::{Address, BoundedStack, MAX_ARITY, Op, Program, VmError, Word, word_to_char};

/// Outcome of a single fetch/decode/execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// Keep going
    Continue,
    /// HALT was fetched
    Halt,
}

/// The stack virtual machine.
///
/// Owns an operand stack, a return-address stack, the loaded program, the
/// program counter and the output sink PRINT writes to. Program memory is
/// only ever read through [`VM::fetch`].
pub struct VM {
    stack: BoundedStack,
    return_stack: BoundedStack,
    program: Option<Program>,
    pc: usize,
    /// Output stream for PRINT
    output: Box<dyn Write + Send>,
}

impl VM {
    /// Create a VM with default stack sizes writing to `output`.
    pub fn with_output(output: Box<dyn Write + Send>) -> Result<Self, VmError> {
        Self::new_with_config(VmConfig::default(), output)
    }

    /// Create a VM with explicit stack sizes.
    ///
    /// # Arguments
    /// * `config` - Operand and return stack capacities
    /// * `output` - Output stream for PRINT, flushed after every character
    pub fn new_with_config(
        config: VmConfig,
        output: Box<dyn Write + Send>,
    ) -> Result<Self, VmError> {
        Ok(Self {
            stack: BoundedStack::new(config.stack_size)?,
            return_stack: BoundedStack::new(config.return_stack_size)?,
            program: None,
            pc: 0,
            output,
        })
    }

    /// Load a copy of `words` as the program and reset the pc to 0.
    ///
    /// The stacks are left as they are.
    pub fn load_program(&mut self, words: &[Word]) -> Result<(), VmError> {
        self.program = Some(Program::new(words)?);
        self.pc = 0;
        Ok(())
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    fn program_len(&self) -> usize {
        self.program.as_ref().map_or(0, Program::len)
    }

    /// Index of the next word to fetch.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn stack(&self) -> &BoundedStack {
        &self.stack
    }

    pub fn return_stack(&self) -> &BoundedStack {
        &self.return_stack
    }

    /// Read the word at the pc and advance past it.
    pub fn fetch(&mut self) -> Result<Word, VmError> {
        let word = self
            .program
            .as_ref()
            .and_then(|program| program.get(self.pc))
            .ok_or(VmError::OutOfBounds {
                pc: self.pc,
                len: self.program_len(),
            })?;
        self.pc += 1;
        Ok(word)
    }

    /// Fetch `N` operand words in order.
    pub fn load_params<const N: usize>(&mut self) -> Result<[Word; N], VmError> {
        let mut params = [0; N];
        for param in params.iter_mut() {
            *param = self.fetch()?;
        }
        Ok(params)
    }

    /// Move the pc to `addr`, which must lie inside the program.
    pub fn jump(&mut self, addr: Address) -> Result<(), VmError> {
        let len = self.program_len();
        match addr.index() {
            Some(target) if target < len => {
                self.pc = target;
                Ok(())
            }
            _ => Err(VmError::JumpOutOfBounds { addr: addr.0, len }),
        }
    }

    /// Run one full cycle: fetch the opcode, its operands, and execute it.
    pub fn step(&mut self) -> Result<ControlFlow, VmError> {
        let at = self.pc;
        let word = self.fetch()?;
        let op = Op::from_word(word).ok_or(VmError::UnknownOpcode {
            opcode: word,
            pc: at,
        })?;

        if op == Op::Halt {
            return Ok(ControlFlow::Halt);
        }
        if op.arity() == 0 {
            self.execute(op, &[])?;
        } else {
            let params = self.load_params::<MAX_ARITY>()?;
            self.execute(op, &params)?;
        }
        Ok(ControlFlow::Continue)
    }

    /// Run until HALT or the first error.
    ///
    /// There is no step limit; a program that never halts runs forever.
    pub fn run(&mut self) -> Result<(), VmError> {
        while self.step()? == ControlFlow::Continue {}
        Ok(())
    }

    /// Perform the effect of `op` with already-fetched operands.
    ///
    /// Operations are not transactional: when ADD underflows on its second
    /// pop, the first popped value is gone.
    pub fn execute(&mut self, op: Op, params: &[Word]) -> Result<(), VmError> {
        match op {
            Op::Halt | Op::Nop => {}
            Op::Print => {
                let value = self.stack.pop()?;
                self.print(value)?;
            }
            Op::Push => {
                let value = operand(op, params)?;
                self.stack.push(value)?;
            }
            Op::Pop => {
                self.stack.pop()?;
            }
            Op::Add => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.wrapping_add(b))?;
            }
            Op::Jmp => {
                let addr = self.stack.pop()?;
                self.jump(Address(addr))?;
            }
            Op::Jz => {
                let target = operand(op, params)?;
                if self.stack.pop()? == 0 {
                    self.jump(Address(target))?;
                }
            }
            Op::Jnz => {
                let target = operand(op, params)?;
                if self.stack.pop()? != 0 {
                    self.jump(Address(target))?;
                }
            }
            Op::Call => {
                let target = operand(op, params)?;
                let ret = Word::try_from(self.pc).map_err(|_| VmError::ProgramTooLarge {
                    len: self.program_len(),
                })?;
                self.return_stack.push(ret)?;
                self.jump(Address(target))?;
            }
            Op::Ret => {
                let addr = self.return_stack.pop()?;
                self.jump(Address(addr))?;
            }
        }
        Ok(())
    }

    fn print(&mut self, value: Word) -> Result<(), VmError> {
        let mut buf = [0u8; 4];
        let encoded = word_to_char(value).encode_utf8(&mut buf);
        self.output.write_all(encoded.as_bytes())?;
        self.output.flush()?;
        Ok(())
    }
}

fn operand(op: Op, params: &[Word]) -> Result<Word, VmError> {
    params.first().copied().ok_or(VmError::MissingOperand { op })
}
