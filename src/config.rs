//! Runtime configuration types.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Name of the configuration file picked up from the working directory.
pub const CONFIG_FILE: &str = "svm.toml";

/// Default capacity of both stacks.
pub const DEFAULT_STACK_SIZE: usize = 1024;

/// Engine construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Capacity of the operand stack, in words
    pub stack_size: usize,
    /// Capacity of the return-address stack, in words
    pub return_stack_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            return_stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// Settings for a single `svm run`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Execution timeout in seconds (0 = no timeout)
    pub timeout: u64,
    /// Emit a trace event for every executed instruction
    pub trace: bool,
}

/// Runtime configuration, as read from `svm.toml`.
///
/// ```toml
/// [vm]
/// stack_size = 256
/// return_stack_size = 64
///
/// [run]
/// timeout = 5
/// trace = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub vm: VmConfig,
    pub run: RunConfig,
}

impl RuntimeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }

    /// Load `svm.toml` from `dir` if it exists, otherwise use the defaults.
    pub fn discover(dir: &Path) -> Result<Self, String> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}
