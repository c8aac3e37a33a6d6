//! stack-vm - a small stack-based bytecode virtual machine
//!
//! This library provides the execution engine, the program encoding, and
//! the assembler, disassembler and debugger built on top of them.

pub mod asm;
pub mod config;
pub mod debugger;
pub mod runner;
pub mod vm;

// Re-export commonly used types
pub use config::{RuntimeConfig, VmConfig};
pub use runner::{RunError, RunSummary, run_supervised};
pub use vm::{ControlFlow, Op, Program, VM, VmError, Word};
